//! Version bookkeeping for repositories, concepts and mappings.
//!
//! A concept or mapping has one identity row (`id == versioned_object_id`)
//! and any number of version rows pointing back to it. At most one row per
//! versioned object is flagged `is_latest_version`; [`mark_latest`] keeps
//! that invariant.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Concept, EntityId, Lookup, Mapping, Repository, Versioned};
use crate::store::{Store, Table};
use crate::uri;

/// Returns the HEAD row of a repository's versioned object.
pub fn head_of(store: &dyn Store, repo: &Repository) -> Option<Repository> {
    if repo.is_head() {
        return Some(repo.clone());
    }
    let versioned_object_id = repo.versioned_object_id;
    store
        .repositories(repo.kind)
        .filter(&|r: &Repository| r.versioned_object_id == versioned_object_id && r.is_head())
        .into_iter()
        .next()
}

/// Every row sharing a versioned object, identity row included.
pub fn versions_of<R: Versioned>(table: &dyn Table<R>, versioned_object_id: EntityId) -> Vec<R> {
    table.filter(&|r: &R| r.versioned_object_id() == versioned_object_id)
}

/// The row flagged latest for a versioned object.
pub fn latest_version<R: Versioned>(table: &dyn Table<R>, versioned_object_id: EntityId) -> Option<R> {
    table
        .filter(&|r: &R| r.versioned_object_id() == versioned_object_id && r.is_latest_version())
        .pop()
}

/// Flags `version` latest and demotes every other row of its versioned
/// object. Returns the number of rows demoted.
pub fn mark_latest<R: Versioned>(table: &dyn Table<R>, version: &mut R) -> Result<usize> {
    version.set_latest_version(true);
    table.update(version)?;

    let (id, versioned_object_id) = (version.id(), version.versioned_object_id());
    let stale = table.filter(&|r: &R| {
        r.versioned_object_id() == versioned_object_id && r.id() != id && r.is_latest_version()
    });
    for mut row in stale.iter().cloned() {
        row.set_latest_version(false);
        table.update(&row)?;
    }
    if !stale.is_empty() {
        debug!(versioned_object_id, demoted = stale.len(), "Demoted previous latest versions");
    }
    Ok(stale.len())
}

/// Source membership of a new version: the parent source and its HEAD.
fn parent_sources(store: &dyn Store, parent: EntityId) -> Result<BTreeSet<EntityId>> {
    let source = store.sources().get(parent).ok_or_else(|| Error::NotFound {
        kind: "source",
        key: parent.to_string(),
    })?;
    let mut sources = BTreeSet::from([source.id]);
    if let Some(head) = head_of(store, &source) {
        sources.insert(head.id);
    }
    Ok(sources)
}

/// Copies localized texts into new rows and returns their ids.
fn clone_texts(store: &dyn Store, ids: &[EntityId]) -> Result<Vec<EntityId>> {
    let texts = store.localized_texts();
    ids.iter()
        .filter_map(|id| texts.get(*id))
        .map(|text| texts.insert(text.detached_clone()).map(|t| t.id))
        .collect()
}

/// Synthesizes the first version of a concept and marks it latest.
///
/// The version is an identity clone with freshly cloned names and
/// descriptions, labelled with its own id and a member of the parent source
/// and that source's HEAD.
pub fn create_initial_concept_version(store: &dyn Store, concept: &Concept) -> Result<Concept> {
    let names = clone_texts(store, &concept.names)?;
    let descriptions = clone_texts(store, &concept.descriptions)?;
    let sources = parent_sources(store, concept.parent)?;
    let versionless = uri::drop_version(&concept.uri);
    let now = Utc::now();

    let mut version = store.concepts().insert_with(&mut |id| {
        let mut version = Concept {
            id,
            version: id.to_string(),
            uri: uri::versioned_uri(&versionless, &id.to_string()),
            versioned_object_id: concept.versioned_object_id,
            is_latest_version: false,
            names: names.clone(),
            descriptions: descriptions.clone(),
            sources: sources.clone(),
            internal_reference_id: None,
            ..concept.clone()
        };
        version.audit.created_at = Some(now);
        version.audit.updated_at = Some(now);
        version
    })?;
    mark_latest(store.concepts(), &mut version)?;
    debug!(uri = %version.uri, "Created initial concept version");
    Ok(version)
}

/// Synthesizes the first version of a mapping and marks it latest.
pub fn create_initial_mapping_version(store: &dyn Store, mapping: &Mapping) -> Result<Mapping> {
    let sources = parent_sources(store, mapping.parent)?;
    let versionless = uri::drop_version(&mapping.uri);
    let now = Utc::now();

    let mut version = store.mappings().insert_with(&mut |id| {
        let mut version = Mapping {
            id,
            version: id.to_string(),
            uri: uri::versioned_uri(&versionless, &id.to_string()),
            versioned_object_id: mapping.versioned_object_id,
            is_latest_version: false,
            sources: sources.clone(),
            internal_reference_id: None,
            ..mapping.clone()
        };
        version.audit.created_at = Some(now);
        version.audit.updated_at = Some(now);
        version
    })?;
    mark_latest(store.mappings(), &mut version)?;
    debug!(uri = %version.uri, "Created initial mapping version");
    Ok(version)
}

/// Points unresolved mapping ends at `concept` when they name its code and
/// its source. Returns the number of mappings updated.
pub fn relink_concept_mappings(store: &dyn Store, concept: &Concept) -> Result<usize> {
    let Some(source) = store.sources().get(concept.parent) else {
        return Ok(0);
    };
    let in_source = |id: Option<EntityId>, url: Option<&str>| {
        id == Some(source.id) || url == Some(source.uri.as_str())
    };
    let names_from = |m: &Mapping| {
        m.from_concept.is_none()
            && m.from_concept_code.as_deref() == Some(concept.mnemonic.as_str())
            && in_source(m.from_source, m.from_source_url.as_deref())
    };
    let names_to = |m: &Mapping| {
        m.to_concept.is_none()
            && m.to_concept_code.as_deref() == Some(concept.mnemonic.as_str())
            && in_source(m.to_source, m.to_source_url.as_deref())
    };

    let matched = store.mappings().filter(&|m: &Mapping| names_from(m) || names_to(m));
    for mut mapping in matched.iter().cloned() {
        if names_from(&mapping) {
            mapping.from_concept = Some(concept.id);
            mapping.from_source = Some(source.id);
        }
        if names_to(&mapping) {
            mapping.to_concept = Some(concept.id);
            mapping.to_source = Some(source.id);
        }
        store.mappings().update(&mapping)?;
    }
    Ok(matched.len())
}

/// Points unresolved mapping source ends at `source` when their URL names
/// it. Returns the number of mappings updated.
pub fn relink_source_mappings(store: &dyn Store, source: &Repository) -> Result<usize> {
    let uri = source.uri.as_str();
    let names_from = |m: &Mapping| m.from_source.is_none() && m.from_source_url.as_deref() == Some(uri);
    let names_to = |m: &Mapping| m.to_source.is_none() && m.to_source_url.as_deref() == Some(uri);

    let matched = store.mappings().filter(&|m: &Mapping| names_from(m) || names_to(m));
    for mut mapping in matched.iter().cloned() {
        if names_from(&mapping) {
            mapping.from_source = Some(source.id);
        }
        if names_to(&mapping) {
            mapping.to_source = Some(source.id);
        }
        store.mappings().update(&mapping)?;
    }
    Ok(matched.len())
}

/// Attributes of a mapping as reported by another system.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingCriteria<'a> {
    /// Relationship type.
    pub map_type: &'a str,
    /// URI of the owning source.
    pub parent_uri: &'a str,
    /// URI of the from-concept (version is ignored).
    pub from_concept_uri: &'a str,
    /// Code of the to-concept.
    pub to_concept_code: Option<&'a str>,
    /// URI of the to-concept (version is ignored).
    pub to_concept_uri: Option<&'a str>,
}

/// Finds the local mapping identity row matching `criteria`.
///
/// The to-side matches on code or on concept URI; with neither given any
/// to-side is accepted.
pub fn find_matching_mapping(store: &dyn Store, criteria: &MappingCriteria<'_>) -> Option<Mapping> {
    let parent_uri = uri::drop_version(criteria.parent_uri);
    let parent = store.sources().find(&Lookup::Uri(&parent_uri))?;
    let from_uri = uri::drop_version(criteria.from_concept_uri);
    let to_uri = criteria.to_concept_uri.map(uri::drop_version);
    let concept_uri = |id: Option<EntityId>| {
        id.and_then(|id| store.concepts().get(id))
            .map(|c| uri::drop_version(&c.uri))
    };

    store
        .mappings()
        .filter(&|m: &Mapping| {
            m.id == m.versioned_object_id && m.parent == parent.id && m.map_type == criteria.map_type
        })
        .into_iter()
        .find(|m| {
            if concept_uri(m.from_concept).as_deref() != Some(from_uri.as_str()) {
                return false;
            }
            match (criteria.to_concept_code, to_uri.as_deref()) {
                (None, None) => true,
                (code, to) => {
                    (code.is_some() && m.to_concept_code.as_deref() == code)
                        || (to.is_some() && concept_uri(m.to_concept).as_deref() == to)
                }
            }
        })
}
