//! Create-if-absent, shared by every per-resource importer.

use termbase_core::{EntityId, Lookup, Record, Table};

use super::ImportContext;
use crate::error::RecordError;
use crate::report::Bucket;

/// A record ready to be inserted.
pub struct Draft<R> {
    record: R,
    assign_id: fn(&mut R, EntityId),
}

impl<R: Record> Draft<R> {
    /// A draft that only needs its id set.
    pub fn new(record: R) -> Self {
        Self {
            record,
            assign_id: R::set_id,
        }
    }

    /// A draft whose other fields also derive from the new id.
    ///
    /// `assign_id` runs after the id itself is set.
    pub fn with_id_hook(record: R, assign_id: fn(&mut R, EntityId)) -> Self {
        Self { record, assign_id }
    }

    fn build(&self, id: EntityId) -> R {
        let mut record = self.record.clone();
        record.set_id(id);
        (self.assign_id)(&mut record, id);
        record
    }
}

/// Result of [`upsert`].
#[derive(Debug)]
pub enum Upserted<R> {
    /// The natural key was already taken; nothing was written.
    Existed(R),
    /// A new row was inserted and linked.
    Created(R),
}

impl<R> Upserted<R> {
    /// Report bucket for this outcome.
    pub fn bucket(&self) -> Bucket {
        match self {
            Self::Existed(_) => Bucket::Existed,
            Self::Created(_) => Bucket::Created,
        }
    }

    /// The stored record.
    pub fn into_inner(self) -> R {
        match self {
            Self::Existed(record) | Self::Created(record) => record,
        }
    }
}

/// Inserts a record unless its natural key is already stored.
///
/// `map_fields` turns the legacy record into a [`Draft`] and only runs when
/// the key is free, so foreign keys of records that already exist are never
/// resolved. `link` runs after the insert for post-create bookkeeping.
pub fn upsert<R, M, L>(
    ctx: &mut ImportContext,
    table: &dyn Table<R>,
    natural_key: Lookup<'_>,
    map_fields: M,
    link: L,
) -> Result<Upserted<R>, RecordError>
where
    R: Record,
    M: FnOnce(&mut ImportContext) -> Result<Draft<R>, RecordError>,
    L: FnOnce(&mut ImportContext, &R) -> Result<(), RecordError>,
{
    if let Some(existing) = table.find(&natural_key) {
        return Ok(Upserted::Existed(existing));
    }
    let draft = map_fields(ctx)?;
    let created = table.insert_with(&mut |id| draft.build(id))?;
    link(ctx, &created)?;
    Ok(Upserted::Created(created))
}

/// Post-create hook that does nothing.
pub fn no_link<R>(_: &mut ImportContext, _: &R) -> Result<(), RecordError> {
    Ok(())
}
