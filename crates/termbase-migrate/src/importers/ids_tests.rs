//! Tests for the id backfill importer.

use super::*;
use crate::importers::test_support::{Harness, CIEL_URI};
use serde_json::json;
use termbase_core::{Lookup, Store};

#[test]
fn test_backfills_source_ids() {
    // Arrange
    let mut h = Harness::new(ImporterKind::SourceIds);
    let (_, source) = h.ciel();
    let mut importer = IdsImporter::new(IdsTarget::Source);

    // Act
    let found = h.import(&mut importer, json!({"_id": {"$oid": "new-id"}, "uri": CIEL_URI}));
    let missing = h.import(
        &mut importer,
        json!({"_id": {"$oid": "x"}, "uri": "/orgs/CIEL/sources/NOPE/"}),
    );

    // Assert
    assert_eq!((found, missing), (Bucket::Updated, Bucket::NotFound));
    let source = h.store.sources().get(source.id).unwrap();
    assert_eq!(source.internal_reference_id.as_deref(), Some("new-id"));
    assert!(h
        .store
        .sources()
        .find(&Lookup::InternalReferenceId("new-id"))
        .is_some());
}

#[test]
fn test_backfills_concept_and_collection_ids() {
    let mut h = Harness::new(ImporterKind::ConceptIds);
    let (org, source) = h.ciel();
    let concept = h.concept(&source, "1", "old");
    let collection = h.collection(&org, "STARTER");

    let concept_bucket = h.import(
        &mut IdsImporter::new(IdsTarget::Concept),
        json!({"_id": {"$oid": "c-new"}, "uri": concept.uri}),
    );
    let collection_bucket = h.import(
        &mut IdsImporter::new(IdsTarget::Collection),
        json!({"_id": "col-new", "uri": collection.uri}),
    );

    assert_eq!((concept_bucket, collection_bucket), (Bucket::Updated, Bucket::Updated));
    assert_eq!(
        h.store.concepts().get(concept.id).unwrap().internal_reference_id.as_deref(),
        Some("c-new")
    );
    assert_eq!(
        h.store.collections().get(collection.id).unwrap().internal_reference_id.as_deref(),
        Some("col-new")
    );
}

#[test]
fn test_missing_legacy_id_fails() {
    let mut h = Harness::new(ImporterKind::SourceIds);
    h.ciel();
    let mut importer = IdsImporter::new(IdsTarget::Source);

    let bucket = h.import(&mut importer, json!({"uri": CIEL_URI}));

    assert_eq!(bucket, Bucket::Failed);
    assert_eq!(
        h.ctx.report.bucket(Bucket::Failed)[0]["errors"],
        json!(["Missing field '_id'"])
    );
}

#[test]
fn test_backfill_populates_no_index() {
    let mut h = Harness::new(ImporterKind::ConceptIds);
    let mut importer = IdsImporter::new(IdsTarget::Concept);

    importer.after_run(&mut h.ctx);

    assert!(h.indexer.tasks().is_empty());
}

#[test]
fn test_target_determines_kind() {
    assert_eq!(IdsImporter::new(IdsTarget::Source).kind(), ImporterKind::SourceIds);
    assert_eq!(
        IdsImporter::new(IdsTarget::Collection).kind(),
        ImporterKind::CollectionIds
    );
    assert_eq!(IdsImporter::new(IdsTarget::Concept).kind(), ImporterKind::ConceptIds);
}
