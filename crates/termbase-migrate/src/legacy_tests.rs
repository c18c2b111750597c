//! Tests for legacy record helpers.

use super::*;
use serde_json::json;

#[test]
fn test_oid_unwraps_envelope() {
    assert_eq!(oid(&json!({"$oid": "5a1b"})).as_deref(), Some("5a1b"));
    assert_eq!(oid(&json!("5a1b")).as_deref(), Some("5a1b"));
    assert_eq!(oid(&json!("")), None);
    assert_eq!(oid(&json!(42)), None);
}

#[test]
fn test_date_accepts_string_millis_and_envelope() {
    let expected = "2017-03-04T10:20:30+00:00";

    let from_string = date(&json!("2017-03-04T10:20:30Z")).unwrap();
    let from_envelope = date(&json!({"$date": "2017-03-04T10:20:30.000Z"})).unwrap();
    let from_millis = date(&json!({"$date": 1_488_622_830_000_i64})).unwrap();

    assert_eq!(from_string.to_rfc3339(), expected);
    assert_eq!(from_envelope, from_string);
    assert_eq!(from_millis, from_string);
    assert_eq!(date(&json!("yesterday")), None);
}

#[test]
fn test_date_accepts_naive_timestamps_and_number_long() {
    let expected = date(&json!("2019-05-01T10:00:00Z")).unwrap();

    assert_eq!(date(&json!({"$date": "2019-05-01 10:00:00"})), Some(expected));
    assert_eq!(date(&json!("2019-05-01T10:00:00.000")), Some(expected));
    assert_eq!(
        date(&json!({"$date": {"$numberLong": "1556704800000"}})),
        Some(expected)
    );
}

#[test]
fn test_parse_rejects_non_objects() {
    assert!(matches!(
        LegacyRecord::parse("not json"),
        Err(RecordError::InvalidJson(_))
    ));
    assert!(matches!(
        LegacyRecord::parse("[1, 2]"),
        Err(RecordError::NotAnObject)
    ));
}

#[test]
fn test_take_consumes_fields_but_keeps_original() {
    // Arrange
    let mut record = LegacyRecord::parse(
        r#"{"_id": {"$oid": "abc"}, "mnemonic": "CIEL", "created_at": {"$date": "2017-01-01T00:00:00Z"}, "extras": null}"#,
    )
    .unwrap();

    // Act
    let legacy_id = record.take_oid("_id");
    let mnemonic = record.require_str("mnemonic").unwrap();
    let created_at = record.take_date("created_at");
    let extras = record.take_object("extras");

    // Assert
    assert_eq!(legacy_id.as_deref(), Some("abc"));
    assert_eq!(mnemonic, "CIEL");
    assert!(created_at.is_some());
    assert!(extras.is_empty());
    assert_eq!(record.take_str("mnemonic"), None);
    assert_eq!(record.original()["mnemonic"], "CIEL");
}

#[test]
fn test_require_str_reports_field_name() {
    let mut record = LegacyRecord::parse(r#"{"uri": ""}"#).unwrap();

    let err = record.require_str("uri").unwrap_err();

    assert_eq!(err.to_string(), "Missing field 'uri'");
}

#[test]
fn test_take_string_list_shapes() {
    let mut record = LegacyRecord::parse(
        r#"{"orgs": [{"$oid": "a"}, "b", 3], "locales": "en, fr,,es"}"#,
    )
    .unwrap();

    assert_eq!(record.take_string_list("orgs"), vec!["a", "b"]);
    assert_eq!(record.take_string_list("locales"), vec!["en", "fr", "es"]);
    assert!(record.take_string_list("missing").is_empty());
}

#[test]
fn test_label_prefers_uri() {
    let record = LegacyRecord::parse(r#"{"mnemonic": "M", "uri": "/orgs/M/"}"#).unwrap();
    let user = LegacyRecord::parse(r#"{"username": "jdoe"}"#).unwrap();

    assert_eq!(record.label(), "/orgs/M/");
    assert_eq!(user.label(), "jdoe");
}

#[test]
fn test_with_errors_appends_field() {
    let record = LegacyRecord::parse(r#"{"mnemonic": "M"}"#).unwrap();

    let failed = record.with_errors(json!(["boom"]));

    assert_eq!(failed, json!({"mnemonic": "M", "errors": ["boom"]}));
    assert_eq!(
        with_errors(json!("raw line"), json!([])),
        json!({"record": "raw line", "errors": []})
    );
}
