//! Legacy id backfill for rows imported without one.

use termbase_core::RepoKind;
use tracing::debug;

use super::{ImportContext, ImporterKind, LineImporter, RecordResult};
use crate::error::RecordError;
use crate::legacy::LegacyRecord;
use crate::report::Bucket;

/// Table an id backfill writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdsTarget {
    /// Sources and their versions.
    Source,
    /// Collections and their versions.
    Collection,
    /// Concepts and their versions.
    Concept,
}

/// Sets `internal_reference_id` on the source, collection or concept with
/// the record's `uri`.
#[derive(Debug)]
pub struct IdsImporter {
    target: IdsTarget,
}

impl IdsImporter {
    /// Creates the backfill importer for `target`.
    #[must_use]
    pub fn new(target: IdsTarget) -> Self {
        Self { target }
    }
}

impl LineImporter for IdsImporter {
    fn kind(&self) -> ImporterKind {
        match self.target {
            IdsTarget::Source => ImporterKind::SourceIds,
            IdsTarget::Collection => ImporterKind::CollectionIds,
            IdsTarget::Concept => ImporterKind::ConceptIds,
        }
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        let legacy_id = record
            .take_oid("_id")
            .ok_or(RecordError::MissingField("_id"))?;
        let uri = record.require_str("uri")?;

        let updated = match self.target {
            IdsTarget::Source => ctx
                .store
                .repositories(RepoKind::Source)
                .set_internal_reference_id(&uri, &legacy_id)?,
            IdsTarget::Collection => ctx
                .store
                .repositories(RepoKind::Collection)
                .set_internal_reference_id(&uri, &legacy_id)?,
            IdsTarget::Concept => ctx
                .store
                .concepts()
                .set_internal_reference_id(&uri, &legacy_id)?,
        };

        if updated {
            debug!(uri = %uri, legacy_id = %legacy_id, "Updated legacy id");
            Ok(Bucket::Updated)
        } else {
            debug!(uri = %uri, "No row to update");
            Ok(Bucket::NotFound)
        }
    }
}

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;
