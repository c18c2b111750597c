//! Import result aggregation.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// Classification of a processed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// A new row was created.
    Created,
    /// An existing row was changed.
    Updated,
    /// The row already existed; nothing was written.
    Existed,
    /// The record could not be imported.
    Failed,
    /// The targeted row does not exist.
    NotFound,
    /// A reference expression names nothing in the store.
    NotFoundReferences,
    /// The user's last login predates the token cutoff.
    OldUsers,
    /// The legacy mapping has no local counterpart.
    NotFoundMatchingMapping,
}

impl Bucket {
    /// Field name in the report.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Existed => "existed",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
            Self::NotFoundReferences => "not_found_references",
            Self::OldUsers => "old_users",
            Self::NotFoundMatchingMapping => "not_found_matching_mapping",
        }
    }
}

/// Outcome of one importer run.
#[derive(Debug, Clone)]
pub struct ImportReport {
    /// Records (or collections) in the input.
    pub total: usize,
    /// Records processed, failures included.
    pub processed: usize,
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// Run duration.
    pub elapsed_seconds: f64,
    buckets: IndexMap<Bucket, Vec<Value>>,
    not_found_expressions: Option<IndexMap<String, Vec<String>>>,
}

impl ImportReport {
    /// Creates an empty report listing `buckets` (in that order).
    ///
    /// `tracks_expressions` adds the `not_found_expressions` field.
    #[must_use]
    pub fn new(buckets: &[Bucket], tracks_expressions: bool) -> Self {
        Self {
            total: 0,
            processed: 0,
            start_time: Utc::now(),
            elapsed_seconds: 0.0,
            buckets: buckets.iter().map(|b| (*b, Vec::new())).collect(),
            not_found_expressions: tracks_expressions.then(IndexMap::new),
        }
    }

    /// Appends an entry to a bucket.
    ///
    /// Buckets not declared up front are added on first use.
    pub fn push(&mut self, bucket: Bucket, entry: Value) {
        self.buckets.entry(bucket).or_default().push(entry);
    }

    /// Entries of a bucket.
    #[must_use]
    pub fn bucket(&self, bucket: Bucket) -> &[Value] {
        self.buckets.get(&bucket).map_or(&[][..], Vec::as_slice)
    }

    /// Number of entries in a bucket.
    #[must_use]
    pub fn count(&self, bucket: Bucket) -> usize {
        self.bucket(bucket).len()
    }

    /// Records an expression a collection could not resolve.
    pub fn add_not_found_expression(&mut self, collection_uri: &str, expression: &str) {
        self.not_found_expressions
            .get_or_insert_with(IndexMap::new)
            .entry(collection_uri.to_string())
            .or_default()
            .push(expression.to_string());
    }

    /// Unresolved expressions per collection URI.
    #[must_use]
    pub fn not_found_expressions(&self) -> Option<&IndexMap<String, Vec<String>>> {
        self.not_found_expressions.as_ref()
    }

    /// Counts per bucket.
    #[must_use]
    pub fn summary(&self) -> Value {
        self.to_json(false)
    }

    /// Full record lists per bucket.
    #[must_use]
    pub fn details(&self) -> Value {
        self.to_json(true)
    }

    /// Serializes the report; `detailed` selects lists over counts.
    #[must_use]
    pub fn to_json(&self, detailed: bool) -> Value {
        let mut map = Map::new();
        map.insert("total".to_string(), self.total.into());
        map.insert("processed".to_string(), self.processed.into());
        map.insert(
            "start_time".to_string(),
            Value::String(self.start_time.to_rfc3339()),
        );
        map.insert("elapsed_seconds".to_string(), self.elapsed_seconds.into());
        for (bucket, entries) in &self.buckets {
            let value = if detailed {
                Value::Array(entries.clone())
            } else {
                entries.len().into()
            };
            map.insert(bucket.name().to_string(), value);
        }
        if let Some(expressions) = &self.not_found_expressions {
            let value = if detailed {
                serde_json::to_value(expressions).unwrap_or(Value::Null)
            } else {
                expressions.len().into()
            };
            map.insert("not_found_expressions".to_string(), value);
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_counts_declared_buckets() {
        let mut report = ImportReport::new(&[Bucket::Created, Bucket::Existed, Bucket::Failed], false);
        report.total = 2;
        report.processed = 2;
        report.push(Bucket::Created, json!({"mnemonic": "A"}));

        let summary = report.summary();

        assert_eq!(summary["created"], 1);
        assert_eq!(summary["existed"], 0);
        assert_eq!(summary["failed"], 0);
        assert_eq!(summary["total"], 2);
        assert!(summary.get("not_found_expressions").is_none());
    }

    #[test]
    fn test_details_keep_records() {
        let mut report = ImportReport::new(&[Bucket::Created], false);
        report.push(Bucket::Created, json!({"mnemonic": "A"}));
        report.push(Bucket::Failed, json!({"mnemonic": "B", "errors": ["x"]}));

        let details = report.details();

        assert_eq!(details["created"], json!([{"mnemonic": "A"}]));
        assert_eq!(details["failed"][0]["errors"], json!(["x"]));
    }

    #[test]
    fn test_not_found_expressions_group_by_collection() {
        let mut report = ImportReport::new(&[Bucket::Created], true);
        report.add_not_found_expression("/orgs/A/collections/C/", "/x/");
        report.add_not_found_expression("/orgs/A/collections/C/", "/y/");

        assert_eq!(report.summary()["not_found_expressions"], 1);
        assert_eq!(
            report.details()["not_found_expressions"],
            json!({"/orgs/A/collections/C/": ["/x/", "/y/"]})
        );
    }

    #[test]
    fn test_bucket_names_match_serde() {
        for bucket in [Bucket::NotFoundMatchingMapping, Bucket::OldUsers] {
            assert_eq!(
                serde_json::to_value(bucket).unwrap(),
                Value::String(bucket.name().to_string())
            );
        }
    }
}
