//! Tests for importer dispatch and the shared import context.

use super::*;
use crate::importers::test_support::{Harness, CIEL_URI};
use serde_json::json;

#[test]
fn test_dispatch_keys_are_case_insensitive() {
    assert_eq!("ORGS".parse::<ImporterKind>().unwrap(), ImporterKind::Organization);
    assert_eq!(" Organization ".parse::<ImporterKind>().unwrap(), ImporterKind::Organization);
    assert_eq!("users".parse::<ImporterKind>().unwrap(), ImporterKind::User);
    assert_eq!(
        "concept_version_id".parse::<ImporterKind>().unwrap(),
        ImporterKind::ConceptIds
    );
    assert_eq!(
        "source_version_ids".parse::<ImporterKind>().unwrap(),
        ImporterKind::SourceIds
    );
    assert_eq!("tokens".parse::<ImporterKind>().unwrap(), ImporterKind::Token);
    assert_eq!(
        "mapping_reference".parse::<ImporterKind>().unwrap(),
        ImporterKind::MappingReference
    );
}

#[test]
fn test_unknown_dispatch_key() {
    let err = "widgets".parse::<ImporterKind>().unwrap_err();
    assert!(matches!(err, Error::UnknownImporter(ref name) if name == "widgets"));
    assert_eq!(err.to_string(), "Unknown importer 'widgets'");
}

#[test]
fn test_every_alias_round_trips() {
    for kind in ImporterKind::ALL {
        for alias in kind.aliases() {
            assert_eq!(alias.parse::<ImporterKind>().unwrap(), kind, "alias {alias}");
        }
        assert_eq!(kind.to_string(), kind.name());
    }
}

#[test]
fn test_bucket_sets() {
    assert_eq!(
        ImporterKind::User.buckets(),
        &[Bucket::Created, Bucket::Updated, Bucket::Existed, Bucket::Failed]
    );
    assert_eq!(
        ImporterKind::Token.buckets(),
        &[Bucket::Updated, Bucket::NotFound, Bucket::OldUsers]
    );
    assert!(ImporterKind::MappingReference
        .buckets()
        .contains(&Bucket::NotFoundMatchingMapping));
    assert!(!ImporterKind::CollectionReference
        .buckets()
        .contains(&Bucket::Failed));
}

#[test]
fn test_input_format_and_expression_tracking() {
    assert_eq!(
        ImporterKind::CollectionReference.input_format(),
        InputFormat::ReferenceDocument
    );
    assert_eq!(ImporterKind::Concept.input_format(), InputFormat::Lines);
    assert!(ImporterKind::Collection.tracks_expressions());
    assert!(!ImporterKind::Source.tracks_expressions());
}

#[test]
fn test_create_importer_matches_kind() {
    for kind in ImporterKind::ALL {
        match create_importer(kind, None) {
            Importer::Lines(importer) => {
                assert_eq!(importer.kind(), kind);
                assert_eq!(kind.input_format(), InputFormat::Lines);
            }
            Importer::References(importer) => {
                assert_eq!(importer.kind(), kind);
                assert_eq!(kind.input_format(), InputFormat::ReferenceDocument);
            }
        }
    }
}

#[test]
fn test_after_run_populates_indexes() {
    let mut h = Harness::new(ImporterKind::User);
    let Importer::Lines(mut importer) = create_importer(ImporterKind::User, None) else {
        panic!("users import line by line");
    };

    importer.after_run(&mut h.ctx);

    assert_eq!(
        h.indexer.tasks(),
        vec![termbase_core::IndexTask::Populate(vec![IndexKind::Users, IndexKind::Orgs])]
    );
}

#[test]
fn test_version_audit_fallbacks() {
    let mut h = Harness::new(ImporterKind::ConceptVersion);
    let admin = h.user("ocladmin");
    let jdoe = h.user("jdoe");

    let mut record = LegacyRecord::from_value(json!({"version_created_by": "jdoe"})).unwrap();
    let audit = h.ctx.version_audit(&mut record);
    assert_eq!((audit.created_by, audit.updated_by), (Some(jdoe.id), Some(jdoe.id)));

    let mut record = LegacyRecord::from_value(json!({"updated_by": "jdoe"})).unwrap();
    let audit = h.ctx.version_audit(&mut record);
    assert_eq!((audit.created_by, audit.updated_by), (Some(admin.id), Some(jdoe.id)));
}

#[test]
fn test_owner_of_rejects_unparseable_uri() {
    let mut h = Harness::new(ImporterKind::Source);
    h.ciel();

    assert!(h.ctx.owner_of(CIEL_URI).is_ok());
    let err = h.ctx.owner_of("not-a-uri").unwrap_err();
    assert_eq!(err.to_string(), "Owner of 'not-a-uri' not found");
}
