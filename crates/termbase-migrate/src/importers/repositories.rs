//! Source and collection importers, HEADs and versions.

use chrono::Utc;
use serde_json::Value;
use termbase_core::{
    uri, versioning, CollectionReference, IndexKind, Lookup, RepoKind, Repository,
};
use tracing::debug;

use super::upsert::{upsert, Draft};
use super::{ImportContext, ImporterKind, LineImporter, RecordResult};
use crate::error::RecordError;
use crate::legacy::LegacyRecord;

/// Legacy bookkeeping fields of repository versions with no counterpart.
const DISCARDED_VERSION_FIELDS: &[&str] = &[
    "active_concepts",
    "active_mappings",
    "last_child_update",
    "last_concept_update",
    "last_mapping_update",
    "parent_version_id",
    "previous_version_id",
    "versioned_object_type_id",
    "concepts",
    "mappings",
];

fn type_field(kind: RepoKind) -> &'static str {
    match kind {
        RepoKind::Source => "source_type",
        RepoKind::Collection => "collection_type",
    }
}

fn snapshot_field(kind: RepoKind) -> &'static str {
    match kind {
        RepoKind::Source => "source_snapshot",
        RepoKind::Collection => "collection_snapshot",
    }
}

/// Takes the descriptive fields shared by HEADs and versions.
fn describe(repo: &mut Repository, record: &mut LegacyRecord) {
    repo.name = record.take_str("name");
    repo.full_name = record.take_str("full_name");
    repo.description = record.take_str("description");
    repo.website = record.take_str("website");
    repo.public_access = record.take_str("public_access");
    repo.default_locale = record.take_str("default_locale");
    repo.supported_locales = record.take_string_list("supported_locales");
    repo.released = record.take_bool("released").unwrap_or(false);
    repo.retired = record.take_bool("retired").unwrap_or(false);
    repo.extras = record.take_object("extras");
}

/// Expressions of a legacy collection's embedded `references`.
fn embedded_expressions(record: &mut LegacyRecord) -> Vec<String> {
    record
        .take_array("references")
        .iter()
        .filter_map(|reference| reference.get("expression").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Resolves a new collection's embedded references by exact URI.
///
/// Resolved expressions become references and members of the collection,
/// and the members are reindexed in one batch. Unresolved ones are recorded
/// under the collection's URI in the report.
pub fn attach_embedded_references(
    ctx: &mut ImportContext,
    collection: &Repository,
    expressions: &[String],
) -> Result<(), RecordError> {
    let store = ctx.store.clone();
    let mut collection = store
        .collections()
        .get(collection.id)
        .unwrap_or_else(|| collection.clone());
    let mut concepts = Vec::new();
    let mut mappings = Vec::new();

    for expression in expressions {
        let found = if uri::is_concept_expression(expression) {
            store
                .concepts()
                .find(&Lookup::Uri(expression))
                .map(|concept| (IndexKind::Concepts, concept.id))
        } else {
            store
                .mappings()
                .find(&Lookup::Uri(expression))
                .map(|mapping| (IndexKind::Mappings, mapping.id))
        };
        let Some((member_kind, member_id)) = found else {
            ctx.report
                .add_not_found_expression(&collection.uri, expression);
            continue;
        };
        match member_kind {
            IndexKind::Concepts => concepts.push(member_id),
            _ => mappings.push(member_id),
        }
        let reference = store.references().insert(CollectionReference {
            expression: expression.clone(),
            collection: collection.id,
            created_at: Some(Utc::now()),
            ..CollectionReference::default()
        })?;
        collection.references.push(reference.id);
    }

    collection.concepts.extend(concepts.iter().copied());
    collection.mappings.extend(mappings.iter().copied());
    store.collections().update(&collection)?;
    debug!(
        uri = %collection.uri,
        concepts = concepts.len(),
        mappings = mappings.len(),
        "Attached embedded references"
    );
    ctx.indexer.reindex(IndexKind::Concepts, concepts);
    ctx.indexer.reindex(IndexKind::Mappings, mappings);
    Ok(())
}

/// Post-create linkage shared by HEADs and versions.
fn link_repository(
    ctx: &mut ImportContext,
    repo: &Repository,
    expressions: &[String],
) -> Result<(), RecordError> {
    match repo.kind {
        RepoKind::Source => {
            let relinked = versioning::relink_source_mappings(ctx.store.as_ref(), repo)?;
            if relinked > 0 {
                debug!(uri = %repo.uri, relinked, "Relinked mappings to source");
            }
            ctx.caches.sources.remember(repo);
        }
        RepoKind::Collection => {
            attach_embedded_references(ctx, repo, expressions)?;
            ctx.caches.collections.remember(repo);
        }
    }
    Ok(())
}

/// Imports source or collection HEADs, keyed by URI.
#[derive(Debug)]
pub struct RepositoryImporter {
    kind: RepoKind,
}

impl RepositoryImporter {
    /// Creates an importer for `kind` HEADs.
    #[must_use]
    pub fn new(kind: RepoKind) -> Self {
        Self { kind }
    }
}

impl LineImporter for RepositoryImporter {
    fn kind(&self) -> ImporterKind {
        match self.kind {
            RepoKind::Source => ImporterKind::Source,
            RepoKind::Collection => ImporterKind::Collection,
        }
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        let kind = self.kind;
        record.discard(&["parent_id", "parent_type_id", "concepts", "mappings"]);
        let repo_uri = record.require_str("uri")?;
        let expressions = embedded_expressions(record);
        let store = ctx.store.clone();

        let outcome = upsert(
            ctx,
            store.repositories(kind),
            Lookup::Uri(&repo_uri),
            |ctx| {
                let mnemonic = record.require_str("mnemonic")?;
                let owner = ctx.owner_of(&repo_uri)?;
                let mut repo = Repository::new(kind, mnemonic, repo_uri.as_str(), owner);
                repo.audit = ctx.audit(record);
                repo.internal_reference_id = record.take_oid("_id");
                repo.repo_type = record.take_str(type_field(kind));
                repo.external_id = record.take_str("external_id");
                describe(&mut repo, record);
                Ok(Draft::with_id_hook(repo, |repo, id| {
                    repo.versioned_object_id = id;
                }))
            },
            |ctx, repo| link_repository(ctx, repo, &expressions),
        )?;
        Ok(outcome.bucket())
    }
}

/// Imports source or collection versions, keyed by URI.
///
/// The version inherits owner, type and mnemonic from the HEAD named by the
/// legacy `versioned_object_id`; the legacy `mnemonic` is the version label.
#[derive(Debug)]
pub struct RepositoryVersionImporter {
    kind: RepoKind,
}

impl RepositoryVersionImporter {
    /// Creates an importer for `kind` versions.
    #[must_use]
    pub fn new(kind: RepoKind) -> Self {
        Self { kind }
    }
}

impl LineImporter for RepositoryVersionImporter {
    fn kind(&self) -> ImporterKind {
        match self.kind {
            RepoKind::Source => ImporterKind::SourceVersion,
            RepoKind::Collection => ImporterKind::CollectionVersion,
        }
    }

    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult {
        let kind = self.kind;
        record.discard(DISCARDED_VERSION_FIELDS);
        let head = record
            .take_oid("versioned_object_id")
            .and_then(|legacy_id| ctx.repository(kind, Lookup::InternalReferenceId(&legacy_id)))
            .ok_or_else(|| RecordError::unresolved("versioned_object"))?;
        let repo_uri = record.require_str("uri")?;
        let expressions = embedded_expressions(record);
        let store = ctx.store.clone();

        let outcome = upsert(
            ctx,
            store.repositories(kind),
            Lookup::Uri(&repo_uri),
            |ctx| {
                let version = record.require_str("mnemonic")?;
                let mut repo =
                    Repository::new(kind, head.mnemonic.as_str(), repo_uri.as_str(), head.owner);
                repo.version = version;
                repo.versioned_object_id = head.versioned_object_id;
                repo.repo_type = head.repo_type.clone();
                repo.audit = ctx.audit(record);
                repo.internal_reference_id = record.take_oid("_id");
                repo.snapshot = record.take(snapshot_field(kind));
                repo.external_id = record.take_str("version_external_id");
                repo.is_latest_version = record.take_bool("is_latest_version").unwrap_or(false);
                describe(&mut repo, record);
                repo.name = repo.name.take().or_else(|| head.name.clone());
                Ok(Draft::new(repo))
            },
            |ctx, repo| link_repository(ctx, repo, &expressions),
        )?;
        Ok(outcome.bucket())
    }
}

#[cfg(test)]
#[path = "repositories_tests.rs"]
mod tests;
