//! Fixtures shared by importer tests.

use std::sync::Arc;

use serde_json::Value;
use termbase_core::{
    Concept, MemoryIndexer, MemoryStore, Organization, Owner, RepoKind, Repository, Store, User,
};

use super::{ImportContext, ImporterKind, LineImporter};
use crate::config::ImportOptions;
use crate::legacy::LegacyRecord;
use crate::report::Bucket;

pub(crate) const CIEL_URI: &str = "/orgs/CIEL/sources/CIEL/";

pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub indexer: Arc<MemoryIndexer>,
    pub ctx: ImportContext,
}

impl Harness {
    pub fn new(kind: ImporterKind) -> Self {
        Self::with_options(kind, ImportOptions::default())
    }

    pub fn with_options(kind: ImporterKind, options: ImportOptions) -> Self {
        let store = Arc::new(MemoryStore::new());
        let indexer = Arc::new(MemoryIndexer::new());
        let ctx = ImportContext::new(kind, store.clone(), indexer.clone(), options);
        Self {
            store,
            indexer,
            ctx,
        }
    }

    /// Runs one JSON line through `importer`, the way the pipeline does.
    pub fn import(&mut self, importer: &mut dyn LineImporter, line: Value) -> Bucket {
        let mut record = LegacyRecord::from_value(line).unwrap();
        self.ctx.report.processed += 1;
        match importer.process(&mut self.ctx, &mut record) {
            Ok(bucket) => {
                self.ctx.report.push(bucket, record.original().clone());
                bucket
            }
            Err(err) => {
                self.ctx
                    .report
                    .push(Bucket::Failed, record.with_errors(err.messages()));
                Bucket::Failed
            }
        }
    }

    pub fn org(&self, mnemonic: &str, legacy_id: &str) -> Organization {
        let mut org = Organization::new(mnemonic);
        org.internal_reference_id = Some(legacy_id.to_string());
        self.store.organizations().insert(org).unwrap()
    }

    pub fn user(&self, username: &str) -> User {
        self.store.users().insert(User::new(username)).unwrap()
    }

    pub fn source(&self, org: &Organization, mnemonic: &str, legacy_id: &str) -> Repository {
        self.store
            .sources()
            .insert_with(&mut |id| {
                let mut repo = Repository::new(
                    RepoKind::Source,
                    mnemonic,
                    format!("/orgs/{}/sources/{}/", org.mnemonic, mnemonic),
                    Owner::Organization(org.id),
                );
                repo.versioned_object_id = id;
                repo.internal_reference_id = Some(legacy_id.to_string());
                repo
            })
            .unwrap()
    }

    pub fn collection(&self, org: &Organization, mnemonic: &str) -> Repository {
        self.store
            .collections()
            .insert_with(&mut |id| {
                let mut repo = Repository::new(
                    RepoKind::Collection,
                    mnemonic,
                    format!("/orgs/{}/collections/{}/", org.mnemonic, mnemonic),
                    Owner::Organization(org.id),
                );
                repo.versioned_object_id = id;
                repo
            })
            .unwrap()
    }

    pub fn concept(&self, source: &Repository, code: &str, legacy_id: &str) -> Concept {
        self.store
            .concepts()
            .insert_with(&mut |id| Concept {
                mnemonic: code.to_string(),
                version: id.to_string(),
                uri: format!("{}concepts/{}/", source.uri, code),
                parent: source.id,
                versioned_object_id: id,
                sources: [source.id].into(),
                internal_reference_id: Some(legacy_id.to_string()),
                ..Concept::default()
            })
            .unwrap()
    }

    /// CIEL org with its CIEL source (legacy id `src-ciel`).
    pub fn ciel(&self) -> (Organization, Repository) {
        let org = self.org("CIEL", "org-ciel");
        let source = self.source(&org, "CIEL", "src-ciel");
        (org, source)
    }
}
