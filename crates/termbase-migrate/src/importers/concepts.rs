//! Concept and concept-version importers.

use std::collections::BTreeSet;

use termbase_core::{
    versioning, Concept, EntityId, IndexKind, Lookup, RepoKind, Repository, Table,
};
use tracing::debug;

use super::upsert::{upsert, Draft};
use super::{ImportContext, ImporterKind, LineImporter, RecordResult};
use crate::error::RecordError;
use crate::legacy::LegacyRecord;

/// Legacy version bookkeeping with no counterpart.
pub(crate) const DISCARDED_VERSION_FIELDS: &[&str] = &[
    "parent_type_id",
    "parent_id",
    "root_version_id",
    "parent_version_id",
    "previous_version_id",
    "versioned_object_type_id",
];

/// Fields shared by concept identity rows and versions.
fn describe(
    ctx: &mut ImportContext,
    concept: &mut Concept,
    record: &mut LegacyRecord,
) -> Result<(), RecordError> {
    concept.names = ctx.localized_texts(record.take_array("names"), "name", "name_type")?;
    concept.descriptions = ctx.localized_texts(
        record.take_array("descriptions"),
        "description",
        "description_type",
    )?;
    concept.concept_class = record.take_str("concept_class");
    concept.datatype = record.take_str("datatype");
    concept.external_id = record.take_str("external_id");
    concept.retired = record.take_bool("retired").unwrap_or(false);
    concept.extras = record.take_object("extras");
    Ok(())
}

fn relink(ctx: &ImportContext, concept: &Concept) -> Result<(), RecordError> {
    let relinked = versioning::relink_concept_mappings(ctx.store.as_ref(), concept)?;
    if relinked > 0 {
        debug!(uri = %concept.uri, relinked, "Relinked mappings to concept");
    }
    Ok(())
}

/// Parent source plus the source versions listed by legacy id.
pub(crate) fn member_sources(
    sources: &dyn Table<Repository>,
    parent: EntityId,
    legacy_ids: &[String],
) -> BTreeSet<EntityId> {
    let mut members = BTreeSet::from([parent]);
    if !legacy_ids.is_empty() {
        members.extend(sources.find_by_internal_ids(legacy_ids).iter().map(|s| s.id));
    }
    members
}

/// Imports concept identity rows, keyed by URI.
#[derive(Debug, Default)]
pub struct ConceptImporter;

impl LineImporter for ConceptImporter {
    fn kind(&self) -> ImporterKind {
        ImporterKind::Concept
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        record.discard(&["parent_type_id"]);
        let concept_uri = record.require_str("uri")?;
        let store = ctx.store.clone();

        let outcome = upsert(
            ctx,
            store.concepts(),
            Lookup::Uri(&concept_uri),
            |ctx| {
                let parent = record
                    .take_oid("parent_id")
                    .and_then(|legacy_id| {
                        ctx.repository(RepoKind::Source, Lookup::InternalReferenceId(&legacy_id))
                    })
                    .ok_or_else(|| RecordError::unresolved("Parent source"))?;
                let mut concept = Concept {
                    mnemonic: record.require_str("mnemonic")?,
                    uri: concept_uri.clone(),
                    parent: parent.id,
                    is_latest_version: false,
                    sources: BTreeSet::from([parent.id]),
                    internal_reference_id: record.take_oid("_id"),
                    audit: ctx.audit(record),
                    ..Concept::default()
                };
                describe(ctx, &mut concept, record)?;
                Ok(Draft::with_id_hook(concept, |concept, id| {
                    concept.version = id.to_string();
                    concept.versioned_object_id = id;
                }))
            },
            |ctx, concept| {
                relink(ctx, concept)?;
                ctx.caches.concepts.remember(concept);
                Ok(())
            },
        )?;
        Ok(outcome.bucket())
    }
}

/// Imports concept versions, keyed by URI.
///
/// The legacy `mnemonic` is the version label; mnemonic and parent come from
/// the concept named by `versioned_object_id`.
#[derive(Debug, Default)]
pub struct ConceptVersionImporter;

impl LineImporter for ConceptVersionImporter {
    fn kind(&self) -> ImporterKind {
        ImporterKind::ConceptVersion
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        record.discard(DISCARDED_VERSION_FIELDS);
        let versioned_object = record
            .take_oid("versioned_object_id")
            .and_then(|legacy_id| ctx.concept(Lookup::InternalReferenceId(&legacy_id)))
            .ok_or_else(|| RecordError::unresolved("versioned_object"))?;
        let concept_uri = record.require_str("uri")?;
        let store = ctx.store.clone();

        let outcome = upsert(
            ctx,
            store.concepts(),
            Lookup::Uri(&concept_uri),
            |ctx| {
                let audit = ctx.version_audit(record);
                let source_version_ids = record.take_string_list("source_version_ids");
                let mut concept = Concept {
                    mnemonic: versioned_object.mnemonic.clone(),
                    version: record.require_str("mnemonic")?,
                    uri: concept_uri.clone(),
                    parent: versioned_object.parent,
                    versioned_object_id: versioned_object.id,
                    is_latest_version: record.take_bool("is_latest_version").unwrap_or(false),
                    comment: record.take_str("update_comment"),
                    sources: member_sources(
                        ctx.store.sources(),
                        versioned_object.parent,
                        &source_version_ids,
                    ),
                    internal_reference_id: record.take_oid("_id"),
                    audit,
                    ..Concept::default()
                };
                describe(ctx, &mut concept, record)?;
                Ok(Draft::new(concept))
            },
            |ctx, concept| {
                relink(ctx, concept)?;
                if concept.is_latest_version {
                    let mut latest = concept.clone();
                    versioning::mark_latest(ctx.store.concepts(), &mut latest)?;
                }
                ctx.indexer.reindex(IndexKind::Concepts, vec![concept.id]);
                Ok(())
            },
        )?;
        Ok(outcome.bucket())
    }
}

#[cfg(test)]
#[path = "concepts_tests.rs"]
mod tests;
