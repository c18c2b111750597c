//! Mapping and mapping-version importers.
//!
//! Legacy mappings name their ends by legacy concept and source ids. The
//! from-concept is mandatory; on the to-side a resolved `to_concept_id` wins
//! over `to_source_id`, which in turn only sets the target source.

use std::collections::BTreeSet;

use termbase_core::{versioning, Concept, IndexKind, Lookup, Mapping, RepoKind, Repository};

use super::concepts::{member_sources, DISCARDED_VERSION_FIELDS};
use super::upsert::{upsert, Draft};
use super::{ImportContext, ImporterKind, LineImporter, RecordResult};
use crate::error::RecordError;
use crate::legacy::LegacyRecord;

/// Mapping ends resolved from legacy ids.
struct Ends {
    from_concept: Option<Concept>,
    to_concept: Option<Concept>,
    to_source: Option<Repository>,
}

impl Ends {
    fn resolve(ctx: &mut ImportContext, record: &mut LegacyRecord) -> Self {
        let from_concept = record
            .take_oid("from_concept_id")
            .and_then(|id| ctx.concept(Lookup::InternalReferenceId(&id)));
        let to_concept = record
            .take_oid("to_concept_id")
            .and_then(|id| ctx.concept(Lookup::InternalReferenceId(&id)));
        let to_source = record
            .take_oid("to_source_id")
            .and_then(|id| ctx.repository(RepoKind::Source, Lookup::InternalReferenceId(&id)));
        Self {
            from_concept,
            to_concept,
            to_source,
        }
    }
}

/// Fields that carry over unchanged from the legacy record.
fn describe(mapping: &mut Mapping, record: &mut LegacyRecord) {
    mapping.from_concept_code = record.take_str("from_concept_code");
    mapping.from_concept_name = record.take_str("from_concept_name");
    mapping.from_source_url = record.take_str("from_source_url");
    mapping.to_concept_code = record.take_str("to_concept_code");
    mapping.to_concept_name = record.take_str("to_concept_name");
    mapping.to_source_url = record.take_str("to_source_url");
    mapping.retired = record.take_bool("retired").unwrap_or(false);
    mapping.external_id = record.take_str("external_id");
    mapping.extras = record.take_object("extras");
}

/// Imports mapping identity rows, keyed by URI.
#[derive(Debug, Default)]
pub struct MappingImporter;

impl LineImporter for MappingImporter {
    fn kind(&self) -> ImporterKind {
        ImporterKind::Mapping
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        let ends = Ends::resolve(ctx, record);
        let mapping_uri = record.require_str("uri")?;
        let store = ctx.store.clone();

        let outcome = upsert(
            ctx,
            store.mappings(),
            Lookup::Uri(&mapping_uri),
            |ctx| {
                let from_concept = ends
                    .from_concept
                    .as_ref()
                    .ok_or_else(|| RecordError::unresolved("From concept"))?;
                let parent = record
                    .take_oid("parent_id")
                    .and_then(|legacy_id| {
                        ctx.repository(RepoKind::Source, Lookup::InternalReferenceId(&legacy_id))
                    })
                    .ok_or_else(|| RecordError::unresolved("Parent source"))?;
                let mnemonic = record.require_str("mnemonic")?;
                let mut mapping = Mapping {
                    version: mnemonic.clone(),
                    mnemonic,
                    uri: mapping_uri.clone(),
                    parent: parent.id,
                    is_latest_version: false,
                    map_type: record.take_str("map_type").unwrap_or_default(),
                    sources: BTreeSet::from([parent.id]),
                    internal_reference_id: record.take_oid("_id"),
                    audit: ctx.audit(record),
                    ..Mapping::default()
                };
                describe(&mut mapping, record);

                mapping.from_concept = Some(from_concept.id);
                mapping.from_source = Some(from_concept.parent);
                mapping
                    .from_concept_code
                    .get_or_insert_with(|| from_concept.mnemonic.clone());
                if let Some(to_concept) = &ends.to_concept {
                    mapping.to_concept = Some(to_concept.id);
                    mapping.to_source = Some(to_concept.parent);
                    mapping
                        .to_concept_code
                        .get_or_insert_with(|| to_concept.mnemonic.clone());
                } else if let Some(to_source) = &ends.to_source {
                    mapping.to_source = Some(to_source.id);
                }
                Ok(Draft::with_id_hook(mapping, |mapping, id| {
                    mapping.versioned_object_id = id;
                }))
            },
            |ctx, mapping| {
                ctx.caches.mappings.remember(mapping);
                Ok(())
            },
        )?;
        Ok(outcome.bucket())
    }
}

/// Imports mapping versions, keyed by URI.
///
/// Ends that do not resolve fall back to those of the versioned object.
#[derive(Debug, Default)]
pub struct MappingVersionImporter;

impl LineImporter for MappingVersionImporter {
    fn kind(&self) -> ImporterKind {
        ImporterKind::MappingVersion
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        record.discard(DISCARDED_VERSION_FIELDS);
        let versioned_object = record
            .take_oid("versioned_object_id")
            .and_then(|legacy_id| ctx.mapping(Lookup::InternalReferenceId(&legacy_id)))
            .ok_or_else(|| RecordError::unresolved("versioned_object"))?;
        let mapping_uri = record.require_str("uri")?;
        let store = ctx.store.clone();

        let outcome = upsert(
            ctx,
            store.mappings(),
            Lookup::Uri(&mapping_uri),
            |ctx| {
                let ends = Ends::resolve(ctx, record);
                let audit = ctx.version_audit(record);
                let source_version_ids = record.take_string_list("source_version_ids");
                let vo = &versioned_object;
                let mut mapping = Mapping {
                    mnemonic: vo.mnemonic.clone(),
                    version: record.require_str("mnemonic")?,
                    uri: mapping_uri.clone(),
                    parent: vo.parent,
                    versioned_object_id: vo.id,
                    is_latest_version: record.take_bool("is_latest_version").unwrap_or(false),
                    map_type: record
                        .take_str("map_type")
                        .unwrap_or_else(|| vo.map_type.clone()),
                    comment: record.take_str("update_comment"),
                    sources: member_sources(ctx.store.sources(), vo.parent, &source_version_ids),
                    internal_reference_id: record.take_oid("_id"),
                    audit,
                    ..Mapping::default()
                };
                describe(&mut mapping, record);

                let from = ends.from_concept.as_ref();
                mapping.from_concept = from.map(|c| c.id).or(vo.from_concept);
                mapping.from_source = from.map(|c| c.parent).or(vo.from_source);
                mapping.from_concept_code = from
                    .map(|c| c.mnemonic.clone())
                    .or(mapping.from_concept_code.take())
                    .or_else(|| vo.from_concept_code.clone());

                let to = ends.to_concept.as_ref();
                mapping.to_concept = to.map(|c| c.id).or(vo.to_concept);
                mapping.to_source = ends
                    .to_source
                    .as_ref()
                    .map(|s| s.id)
                    .or(to.map(|c| c.parent))
                    .or(vo.to_source);
                mapping.to_concept_code = mapping
                    .to_concept_code
                    .take()
                    .or_else(|| vo.to_concept_code.clone());
                mapping.to_concept_name = mapping
                    .to_concept_name
                    .take()
                    .or_else(|| vo.to_concept_name.clone());
                Ok(Draft::new(mapping))
            },
            |ctx, mapping| {
                if mapping.is_latest_version {
                    let mut latest = mapping.clone();
                    versioning::mark_latest(ctx.store.mappings(), &mut latest)?;
                }
                ctx.indexer.reindex(IndexKind::Mappings, vec![mapping.id]);
                Ok(())
            },
        )?;
        Ok(outcome.bucket())
    }
}

#[cfg(test)]
#[path = "mappings_tests.rs"]
mod tests;
