//! Collection reference importers.
//!
//! Input is one document mapping collection URIs to expression lists. Each
//! expression is resolved to a concept or mapping, pinned to its latest
//! version (synthesizing one when the target was never versioned) and added
//! to the collection as a reference and a member.
//!
//! The mapping-reference variant additionally asks the legacy API about
//! mapping expressions it cannot resolve locally, and matches the answer
//! against the imported mappings of the expression's source.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use termbase_core::{
    uri, versioning, CollectionReference, Concept, EntityId, IndexKind, Lookup, Mapping,
    MappingCriteria, RepoKind, Repository,
};
use tracing::{debug, info, warn};

use super::{ImportContext, ImporterKind};
use crate::error::{RecordError, Result};
use crate::legacy::with_errors;
use crate::legacy_api::LegacyApi;
use crate::report::Bucket;

/// A resolved expression target, pinned to its latest version.
enum Member {
    Concept(Concept),
    Mapping(Mapping),
}

impl Member {
    fn uri(&self) -> &str {
        match self {
            Self::Concept(concept) => &concept.uri,
            Self::Mapping(mapping) => &mapping.uri,
        }
    }
}

/// What happened to one expression.
enum Resolution {
    Resolved(Member),
    Classified(Bucket),
}

/// Members staged for one collection.
#[derive(Default)]
struct Staged {
    references: Vec<EntityId>,
    concepts: Vec<EntityId>,
    mappings: Vec<EntityId>,
}

/// Resolves reference documents into collection references.
pub struct ReferenceImporter {
    kind: ImporterKind,
    legacy_api: Option<Arc<dyn LegacyApi>>,
    reindex_concepts: Vec<EntityId>,
    reindex_mappings: Vec<EntityId>,
}

impl ReferenceImporter {
    /// Creates an importer for `kind`.
    ///
    /// `legacy_api` is consulted for mapping expressions only; without it a
    /// mapping-reference run resolves locally.
    #[must_use]
    pub fn new(kind: ImporterKind, legacy_api: Option<Arc<dyn LegacyApi>>) -> Self {
        Self {
            kind,
            legacy_api,
            reindex_concepts: Vec::new(),
            reindex_mappings: Vec::new(),
        }
    }

    /// The kind this importer was created for.
    #[must_use]
    pub fn kind(&self) -> ImporterKind {
        self.kind
    }

    fn remote(&self) -> Option<&Arc<dyn LegacyApi>> {
        match self.kind {
            ImporterKind::MappingReference => self.legacy_api.as_ref(),
            _ => None,
        }
    }

    /// Adds `expressions` to the collection at `collection_uri`.
    ///
    /// Expressions are reported by value in the run's buckets; a missing
    /// collection puts its URI in `not_found`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store fails for reasons unrelated to
    /// the expression at hand.
    pub async fn process(
        &mut self,
        ctx: &mut ImportContext,
        collection_uri: &str,
        expressions: &[String],
    ) -> Result<()> {
        let Some(mut collection) = ctx
            .repository(RepoKind::Collection, Lookup::Uri(collection_uri))
            .and_then(|cached| ctx.store.collections().get(cached.id))
        else {
            debug!(collection = %collection_uri, "Collection not found");
            ctx.report
                .push(Bucket::NotFound, Value::String(collection_uri.to_string()));
            return Ok(());
        };

        let collection_id = collection.id;
        let mut held: Vec<String> = ctx
            .store
            .references()
            .filter(&|r: &CollectionReference| r.collection == collection_id)
            .into_iter()
            .map(|r| r.expression)
            .collect();
        let mut staged = Staged::default();

        for expression in expressions {
            debug!(expression = %expression, "Processing expression");
            match self.add(ctx, &collection, &mut held, &mut staged, expression).await {
                Ok(bucket) => ctx.report.push(bucket, Value::String(expression.clone())),
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!(expression = %expression, error = %err, "Reference failed");
                    ctx.report.push(
                        Bucket::Failed,
                        with_errors(Value::String(expression.clone()), err.messages()),
                    );
                }
            }
        }

        if staged.references.is_empty() {
            return Ok(());
        }
        collection.references.extend(&staged.references);
        collection.concepts.extend(staged.concepts.iter().copied());
        collection.mappings.extend(staged.mappings.iter().copied());
        ctx.store.collections().update(&collection)?;
        ctx.caches.collections.remember(&collection);
        info!(
            collection = %collection.uri,
            references = staged.references.len(),
            "Added references"
        );
        self.reindex_concepts.extend(staged.concepts);
        self.reindex_mappings.extend(staged.mappings);
        Ok(())
    }

    /// Resolves one expression and, when new, stages it.
    async fn add(
        &self,
        ctx: &mut ImportContext,
        collection: &Repository,
        held: &mut Vec<String>,
        staged: &mut Staged,
        expression: &str,
    ) -> std::result::Result<Bucket, RecordError> {
        if holds(held, expression) {
            debug!(expression = %expression, "Already referenced");
            return Ok(Bucket::Existed);
        }

        let resolution = if uri::is_concept_expression(expression) {
            self.resolve_concept(ctx, expression)?
        } else if uri::is_mapping_expression(expression) {
            self.resolve_mapping(ctx, expression).await?
        } else {
            debug!(expression = %expression, "Neither a concept nor a mapping");
            Resolution::Classified(Bucket::NotFoundReferences)
        };
        let member = match resolution {
            Resolution::Resolved(member) => member,
            Resolution::Classified(bucket) => return Ok(bucket),
        };

        if holds(held, member.uri()) {
            debug!(expression = %expression, latest = %member.uri(), "Latest version already referenced");
            return Ok(Bucket::Existed);
        }
        let reference = ctx.store.references().insert(CollectionReference {
            expression: member.uri().to_string(),
            collection: collection.id,
            created_at: Some(Utc::now()),
            ..CollectionReference::default()
        })?;
        held.push(reference.expression);
        staged.references.push(reference.id);
        match member {
            Member::Concept(concept) => staged.concepts.push(concept.id),
            Member::Mapping(mapping) => staged.mappings.push(mapping.id),
        }
        Ok(Bucket::Created)
    }

    fn resolve_concept(
        &self,
        ctx: &mut ImportContext,
        expression: &str,
    ) -> std::result::Result<Resolution, RecordError> {
        let found = ctx.concept(Lookup::Uri(expression)).or_else(|| {
            ctx.options
                .drop_version_if_version_missing
                .then(|| uri::drop_version(expression))
                .and_then(|versionless| ctx.concept(Lookup::Uri(&versionless)))
        });
        let Some(concept) = found else {
            return Ok(Resolution::Classified(Bucket::NotFoundReferences));
        };
        let store = ctx.store.as_ref();
        let latest = match versioning::latest_version(store.concepts(), concept.versioned_object_id) {
            Some(latest) => latest,
            None => versioning::create_initial_concept_version(store, &concept)?,
        };
        Ok(Resolution::Resolved(Member::Concept(latest)))
    }

    async fn resolve_mapping(
        &self,
        ctx: &mut ImportContext,
        expression: &str,
    ) -> std::result::Result<Resolution, RecordError> {
        let local = ctx.mapping(Lookup::Uri(expression)).or_else(|| {
            ctx.options
                .drop_version_if_version_missing
                .then(|| uri::drop_version(expression))
                .and_then(|versionless| ctx.mapping(Lookup::Uri(&versionless)))
        });
        let mapping = match (local, self.remote()) {
            (Some(mapping), _) => mapping,
            (None, None) => return Ok(Resolution::Classified(Bucket::NotFoundReferences)),
            (None, Some(api)) => {
                let Some(legacy) = fetch_legacy(api.as_ref(), ctx, expression).await else {
                    return Ok(Resolution::Classified(Bucket::Failed));
                };
                let Some(mapping) = matching_mapping(ctx, expression, &legacy) else {
                    debug!(expression = %expression, "No matching mapping");
                    return Ok(Resolution::Classified(Bucket::NotFoundMatchingMapping));
                };
                mapping
            }
        };
        let store = ctx.store.as_ref();
        let latest = match versioning::latest_version(store.mappings(), mapping.versioned_object_id) {
            Some(latest) => latest,
            None => versioning::create_initial_mapping_version(store, &mapping)?,
        };
        Ok(Resolution::Resolved(Member::Mapping(latest)))
    }

    /// Reindexes every member added during the run.
    pub fn after_run(&mut self, ctx: &mut ImportContext) {
        ctx.indexer
            .reindex(IndexKind::Concepts, std::mem::take(&mut self.reindex_concepts));
        ctx.indexer
            .reindex(IndexKind::Mappings, std::mem::take(&mut self.reindex_mappings));
    }
}

/// Whether a held expression contains the versionless form of `expression`.
fn holds(held: &[String], expression: &str) -> bool {
    let versionless = uri::drop_version(expression);
    held.iter().any(|e| e.contains(&versionless))
}

/// Asks the legacy API about `expression`, retrying versionless when
/// configured. `None` when every attempt failed, whether by status or by
/// transport.
async fn fetch_legacy(api: &dyn LegacyApi, ctx: &ImportContext, expression: &str) -> Option<Value> {
    let mut attempts = vec![expression.to_string()];
    if ctx.options.drop_version_if_version_missing && uri::has_resource_version(expression) {
        attempts.push(uri::drop_version(expression));
    }
    for attempt in &attempts {
        match api.fetch(attempt).await {
            Ok(Some(body)) => return Some(body),
            Ok(None) => debug!(expression = %attempt, "Legacy API has no such expression"),
            Err(err) => warn!(expression = %attempt, error = %err, "Legacy API request failed"),
        }
    }
    None
}

/// The local mapping identity row the legacy answer describes.
fn matching_mapping(ctx: &ImportContext, expression: &str, legacy: &Value) -> Option<Mapping> {
    let field = |key: &str| legacy.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
    let parent_uri = uri::to_parent_uri(&uri::drop_version(expression))?;
    let criteria = MappingCriteria {
        map_type: field("map_type")?,
        parent_uri: &parent_uri,
        from_concept_uri: field("from_concept_url")?,
        to_concept_code: field("to_concept_code"),
        to_concept_uri: field("to_concept_url"),
    };
    versioning::find_matching_mapping(ctx.store.as_ref(), &criteria)
}

#[cfg(test)]
#[path = "references_tests.rs"]
mod tests;
