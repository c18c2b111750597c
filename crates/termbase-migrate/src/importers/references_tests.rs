//! Tests for the reference importers.

use super::*;
use crate::config::ImportOptions;
use crate::importers::test_support::{Harness, CIEL_URI};
use crate::legacy_api::HttpLegacyApi;
use serde_json::json;
use std::time::Duration;
use termbase_core::{Organization, Store};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STARTER: &str = "/orgs/CIEL/collections/STARTER/";

fn drop_version_options() -> ImportOptions {
    ImportOptions {
        drop_version_if_version_missing: true,
        ..ImportOptions::default()
    }
}

/// CIEL source and org, plus an empty STARTER collection.
fn setup(h: &Harness) -> (Organization, Repository, Repository) {
    let (org, source) = h.ciel();
    let collection = h.collection(&org, "STARTER");
    (org, source, collection)
}

fn mapping(h: &Harness, source: &Repository, from: &Concept, to: &Concept, mnemonic: &str) -> Mapping {
    h.store
        .mappings()
        .insert_with(&mut |id| Mapping {
            mnemonic: mnemonic.to_string(),
            version: mnemonic.to_string(),
            uri: format!("{}mappings/{}/", source.uri, mnemonic),
            parent: source.id,
            versioned_object_id: id,
            map_type: "SAME-AS".into(),
            from_concept: Some(from.id),
            from_concept_code: Some(from.mnemonic.clone()),
            to_concept: Some(to.id),
            to_concept_code: Some(to.mnemonic.clone()),
            sources: [source.id].into(),
            ..Mapping::default()
        })
        .unwrap()
}

fn expressions(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn test_concept_reference_synthesizes_initial_version() {
    // Arrange
    let mut h = Harness::new(ImporterKind::CollectionReference);
    let (_, source, collection) = setup(&h);
    let concept = h.concept(&source, "1", "c-1");
    let head = h.store.sources().get(source.id).unwrap();
    let mut importer = ReferenceImporter::new(ImporterKind::CollectionReference, None);

    // Act
    importer
        .process(&mut h.ctx, STARTER, &[concept.uri.clone()])
        .await
        .unwrap();
    importer.after_run(&mut h.ctx);

    // Assert
    assert_eq!(h.ctx.report.count(Bucket::Created), 1);
    let versions = versioning::versions_of(h.store.concepts(), concept.id);
    assert_eq!(versions.len(), 2);
    let latest = versioning::latest_version(h.store.concepts(), concept.id).unwrap();
    assert_ne!(latest.id, concept.id);
    assert!(latest.sources.contains(&source.id));
    assert!(latest.sources.contains(&head.id));

    let collection = h.store.collections().get(collection.id).unwrap();
    assert_eq!(collection.concepts, [latest.id].into());
    assert_eq!(collection.references.len(), 1);
    let reference = h.store.references().get(collection.references[0]).unwrap();
    assert_eq!(reference.expression, latest.uri);
    assert_eq!(h.indexer.reindexed(IndexKind::Concepts), vec![latest.id]);
}

#[tokio::test]
async fn test_existing_latest_version_is_reused() {
    let mut h = Harness::new(ImporterKind::CollectionReference);
    let (_, source, _) = setup(&h);
    let concept = h.concept(&source, "1", "c-1");
    let latest = versioning::create_initial_concept_version(h.store.as_ref(), &concept).unwrap();
    let mut importer = ReferenceImporter::new(ImporterKind::CollectionReference, None);

    importer
        .process(&mut h.ctx, STARTER, &[concept.uri.clone()])
        .await
        .unwrap();

    assert_eq!(versioning::versions_of(h.store.concepts(), concept.id).len(), 2);
    let reference = h.store.references().filter(&|_: &CollectionReference| true).pop().unwrap();
    assert_eq!(reference.expression, latest.uri);
}

#[tokio::test]
async fn test_missing_collection_is_not_found() {
    // Arrange
    let mut h = Harness::new(ImporterKind::CollectionReference);
    let (_, source) = h.ciel();
    let concept = h.concept(&source, "1", "c-1");
    let mut importer = ReferenceImporter::new(ImporterKind::CollectionReference, None);

    // Act
    importer
        .process(&mut h.ctx, "/orgs/CIEL/collections/NOPE/", &[concept.uri.clone()])
        .await
        .unwrap();

    // Assert
    assert_eq!(
        h.ctx.report.bucket(Bucket::NotFound),
        &[json!("/orgs/CIEL/collections/NOPE/")]
    );
    assert!(h.store.references().is_empty());
    assert_eq!(versioning::versions_of(h.store.concepts(), concept.id).len(), 1);
}

#[tokio::test]
async fn test_unknown_expression_is_not_found_reference() {
    let mut h = Harness::new(ImporterKind::CollectionReference);
    setup(&h);
    let missing = format!("{CIEL_URI}concepts/404/");
    let mut importer = ReferenceImporter::new(ImporterKind::CollectionReference, None);

    importer
        .process(&mut h.ctx, STARTER, &[missing.clone()])
        .await
        .unwrap();

    assert_eq!(h.ctx.report.bucket(Bucket::NotFoundReferences), &[json!(missing)]);
}

#[tokio::test]
async fn test_versioned_expression_falls_back_to_versionless_when_enabled() {
    let versioned = format!("{CIEL_URI}concepts/1/v9/");
    for (options, expected) in [
        (ImportOptions::default(), Bucket::NotFoundReferences),
        (drop_version_options(), Bucket::Created),
    ] {
        let mut h = Harness::with_options(ImporterKind::CollectionReference, options);
        let (_, source, _) = setup(&h);
        h.concept(&source, "1", "c-1");
        let mut importer = ReferenceImporter::new(ImporterKind::CollectionReference, None);

        importer
            .process(&mut h.ctx, STARTER, &[versioned.clone()])
            .await
            .unwrap();

        assert_eq!(h.ctx.report.count(expected), 1);
    }
}

#[tokio::test]
async fn test_repeated_expressions_are_existed() {
    // Arrange
    let mut h = Harness::new(ImporterKind::CollectionReference);
    let (_, source, collection) = setup(&h);
    let from = h.concept(&source, "1", "c-1");
    let to = h.concept(&source, "2", "c-2");
    let m1 = mapping(&h, &source, &from, &to, "M1");
    let mut importer = ReferenceImporter::new(ImporterKind::CollectionReference, None);
    let batch = vec![from.uri.clone(), m1.uri.clone(), from.uri.clone()];

    // Act
    importer.process(&mut h.ctx, STARTER, &batch).await.unwrap();
    importer.process(&mut h.ctx, STARTER, &batch).await.unwrap();
    importer.after_run(&mut h.ctx);

    // Assert
    assert_eq!(h.ctx.report.count(Bucket::Created), 2);
    assert_eq!(h.ctx.report.count(Bucket::Existed), 4);
    let collection = h.store.collections().get(collection.id).unwrap();
    assert_eq!(collection.references.len(), 2);
    assert_eq!(collection.concepts.len(), 1);
    assert_eq!(collection.mappings.len(), 1);
    assert_eq!(h.indexer.reindexed(IndexKind::Mappings).len(), 1);
}

#[tokio::test]
async fn test_mapping_reference_matches_legacy_answer() {
    // Arrange
    let server = MockServer::start().await;
    let mut h = Harness::new(ImporterKind::MappingReference);
    let (_, source, collection) = setup(&h);
    let from = h.concept(&source, "1", "c-1");
    let to = h.concept(&source, "2", "c-2");
    let local = mapping(&h, &source, &from, &to, "LOCAL-7");
    let legacy_expression = format!("{CIEL_URI}mappings/OLD-7/");
    Mock::given(method("GET"))
        .and(path(legacy_expression.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "map_type": "SAME-AS",
            "from_concept_url": from.uri,
            "to_concept_url": to.uri,
            "to_concept_code": "2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let api: Arc<dyn LegacyApi> =
        Arc::new(HttpLegacyApi::new(&server.uri(), Duration::from_secs(5)).unwrap());
    let mut importer = ReferenceImporter::new(ImporterKind::MappingReference, Some(api));

    // Act
    importer
        .process(&mut h.ctx, STARTER, &[legacy_expression.clone()])
        .await
        .unwrap();

    // Assert
    assert_eq!(h.ctx.report.bucket(Bucket::Created), &[json!(legacy_expression)]);
    let latest = versioning::latest_version(h.store.mappings(), local.id).unwrap();
    let collection = h.store.collections().get(collection.id).unwrap();
    assert_eq!(collection.mappings, [latest.id].into());
}

#[tokio::test]
async fn test_mapping_reference_double_non_200_fails() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;
    let mut h = Harness::with_options(ImporterKind::MappingReference, drop_version_options());
    setup(&h);
    let api: Arc<dyn LegacyApi> =
        Arc::new(HttpLegacyApi::new(&server.uri(), Duration::from_secs(5)).unwrap());
    let mut importer = ReferenceImporter::new(ImporterKind::MappingReference, Some(api));
    let expression = format!("{CIEL_URI}mappings/M1/3/");

    // Act
    importer
        .process(&mut h.ctx, STARTER, &[expression.clone()])
        .await
        .unwrap();

    // Assert
    assert_eq!(h.ctx.report.bucket(Bucket::Failed), &[json!(expression)]);
    assert_eq!(h.ctx.report.count(Bucket::Created), 0);
    assert!(h.store.references().is_empty());
}

#[tokio::test]
async fn test_mapping_reference_without_local_match() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "map_type": "NARROWER-THAN",
            "from_concept_url": "/orgs/CIEL/sources/CIEL/concepts/1/"
        })))
        .mount(&server)
        .await;
    let mut h = Harness::new(ImporterKind::MappingReference);
    setup(&h);
    let api: Arc<dyn LegacyApi> =
        Arc::new(HttpLegacyApi::new(&server.uri(), Duration::from_secs(5)).unwrap());
    let mut importer = ReferenceImporter::new(ImporterKind::MappingReference, Some(api));

    importer
        .process(&mut h.ctx, STARTER, &expressions(&["/orgs/CIEL/sources/CIEL/mappings/X/"]))
        .await
        .unwrap();

    assert_eq!(h.ctx.report.count(Bucket::NotFoundMatchingMapping), 1);
}

/// Fails every versioned request at the transport level and answers the
/// versionless one with `answer`.
struct FlakyLegacyApi {
    answer: Value,
    calls: std::sync::Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl LegacyApi for FlakyLegacyApi {
    async fn fetch(&self, expression: &str) -> crate::error::Result<Option<Value>> {
        self.calls.lock().unwrap().push(expression.to_string());
        if uri::has_resource_version(expression) {
            return Err(crate::error::Error::LegacyApi("connection reset".to_string()));
        }
        Ok(Some(self.answer.clone()))
    }
}

#[tokio::test]
async fn test_transport_error_still_retries_versionless() {
    // Arrange
    let mut h = Harness::with_options(ImporterKind::MappingReference, drop_version_options());
    let (_, source, collection) = setup(&h);
    let from = h.concept(&source, "1", "c-1");
    let to = h.concept(&source, "2", "c-2");
    let local = mapping(&h, &source, &from, &to, "LOCAL-7");
    let api = Arc::new(FlakyLegacyApi {
        answer: json!({
            "map_type": "SAME-AS",
            "from_concept_url": from.uri,
            "to_concept_url": to.uri
        }),
        calls: std::sync::Mutex::new(Vec::new()),
    });
    let mut importer = ReferenceImporter::new(ImporterKind::MappingReference, Some(api.clone()));
    let expression = format!("{CIEL_URI}mappings/OLD-7/3/");

    // Act
    importer
        .process(&mut h.ctx, STARTER, &[expression.clone()])
        .await
        .unwrap();

    // Assert
    assert_eq!(
        *api.calls.lock().unwrap(),
        vec![expression.clone(), format!("{CIEL_URI}mappings/OLD-7/")]
    );
    assert_eq!(h.ctx.report.bucket(Bucket::Created), &[json!(expression)]);
    let latest = versioning::latest_version(h.store.mappings(), local.id).unwrap();
    let collection = h.store.collections().get(collection.id).unwrap();
    assert_eq!(collection.mappings, [latest.id].into());
}

#[tokio::test]
async fn test_expression_of_unknown_kind_is_not_found_reference() {
    let mut h = Harness::new(ImporterKind::CollectionReference);
    setup(&h);
    let mut importer = ReferenceImporter::new(ImporterKind::CollectionReference, None);

    importer
        .process(&mut h.ctx, STARTER, &expressions(&["/orgs/CIEL/sources/CIEL/"]))
        .await
        .unwrap();

    assert_eq!(h.ctx.report.count(Bucket::NotFoundReferences), 1);
    assert!(h.store.references().is_empty());
}
