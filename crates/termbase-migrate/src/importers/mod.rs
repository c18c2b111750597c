//! Importers for each legacy resource type.
//!
//! Line importers handle one legacy document per input line. Reference
//! importers take a single document mapping collection URIs to expression
//! lists. [`create_importer`] picks the implementation for an
//! [`ImporterKind`].

pub mod concepts;
pub mod ids;
pub mod mappings;
pub mod organizations;
pub mod references;
pub mod repositories;
pub mod upsert;
pub mod users;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use termbase_core::{
    uri, Audit, Concept, EntityId, IndexKind, LocalizedText, Lookup, Mapping, Organization, Owner,
    Record, RepoKind, Repository, SearchIndexer, Store, User,
};
use serde_json::Value;

use crate::cache::Caches;
use crate::config::ImportOptions;
use crate::error::{Error, RecordError, Result};
use crate::legacy::LegacyRecord;
use crate::legacy_api::LegacyApi;
use crate::report::{Bucket, ImportReport};

pub use references::ReferenceImporter;

/// Every importer the dispatcher knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImporterKind {
    /// Organizations.
    Organization,
    /// User accounts and memberships.
    User,
    /// Source HEADs.
    Source,
    /// Source versions.
    SourceVersion,
    /// Legacy id backfill for sources.
    SourceIds,
    /// Collection HEADs.
    Collection,
    /// Collection versions.
    CollectionVersion,
    /// Legacy id backfill for collections.
    CollectionIds,
    /// Concepts.
    Concept,
    /// Concept versions.
    ConceptVersion,
    /// Legacy id backfill for concepts.
    ConceptIds,
    /// Mappings.
    Mapping,
    /// Mapping versions.
    MappingVersion,
    /// Passwords and last login.
    WebUserCredential,
    /// API tokens.
    Token,
    /// Collection references resolved locally.
    CollectionReference,
    /// Collection references with mappings resolved through the legacy API.
    MappingReference,
}

/// Shape of an importer's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// One JSON document per line.
    Lines,
    /// One JSON object of collection URI to expression list.
    ReferenceDocument,
}

impl ImporterKind {
    /// All kinds, in dispatch-table order.
    pub const ALL: [Self; 17] = [
        Self::Organization,
        Self::User,
        Self::Source,
        Self::SourceVersion,
        Self::SourceIds,
        Self::Collection,
        Self::CollectionVersion,
        Self::CollectionIds,
        Self::Concept,
        Self::ConceptVersion,
        Self::ConceptIds,
        Self::Mapping,
        Self::MappingVersion,
        Self::WebUserCredential,
        Self::Token,
        Self::CollectionReference,
        Self::MappingReference,
    ];

    /// Dispatch keys accepted for this kind; the first is canonical.
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Organization => &["orgs", "org", "organization", "organizations"],
            Self::User => &["users", "user"],
            Self::Source => &["sources", "source"],
            Self::SourceVersion => &["source_versions", "source_version"],
            Self::SourceIds => &[
                "source_ids",
                "source_id",
                "source_version_ids",
                "source_version_id",
            ],
            Self::Collection => &["collections", "collection"],
            Self::CollectionVersion => &["collection_versions", "collection_version"],
            Self::CollectionIds => &[
                "collection_ids",
                "collection_id",
                "collection_version_ids",
                "collection_version_id",
            ],
            Self::Concept => &["concepts", "concept"],
            Self::ConceptVersion => &["concept_versions", "concept_version"],
            Self::ConceptIds => &[
                "concept_ids",
                "concept_id",
                "concept_version_ids",
                "concept_version_id",
            ],
            Self::Mapping => &["mappings", "mapping"],
            Self::MappingVersion => &["mapping_versions", "mapping_version"],
            Self::WebUserCredential => &["web_user_credential", "web_user_credentials"],
            Self::Token => &["tokens", "token"],
            Self::CollectionReference => &["collection_reference", "collection_references"],
            Self::MappingReference => &["mapping_reference", "mapping_references"],
        }
    }

    /// Canonical dispatch key.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.aliases()[0]
    }

    /// Report buckets, in report order.
    #[must_use]
    pub const fn buckets(self) -> &'static [Bucket] {
        match self {
            Self::Organization
            | Self::Source
            | Self::SourceVersion
            | Self::Collection
            | Self::CollectionVersion
            | Self::Concept
            | Self::ConceptVersion
            | Self::Mapping
            | Self::MappingVersion => &[Bucket::Created, Bucket::Existed, Bucket::Failed],
            Self::User => &[
                Bucket::Created,
                Bucket::Updated,
                Bucket::Existed,
                Bucket::Failed,
            ],
            Self::SourceIds | Self::CollectionIds | Self::ConceptIds => {
                &[Bucket::Updated, Bucket::NotFound, Bucket::Failed]
            }
            Self::WebUserCredential => &[Bucket::Updated, Bucket::NotFound],
            Self::Token => &[Bucket::Updated, Bucket::NotFound, Bucket::OldUsers],
            Self::CollectionReference => &[
                Bucket::Created,
                Bucket::NotFound,
                Bucket::Existed,
                Bucket::NotFoundReferences,
            ],
            Self::MappingReference => &[
                Bucket::Created,
                Bucket::NotFound,
                Bucket::Existed,
                Bucket::NotFoundReferences,
                Bucket::NotFoundMatchingMapping,
                Bucket::Failed,
            ],
        }
    }

    /// Whether the report carries `not_found_expressions`.
    #[must_use]
    pub const fn tracks_expressions(self) -> bool {
        matches!(self, Self::Collection | Self::CollectionVersion)
    }

    /// Input shape.
    #[must_use]
    pub const fn input_format(self) -> InputFormat {
        match self {
            Self::CollectionReference | Self::MappingReference => InputFormat::ReferenceDocument,
            _ => InputFormat::Lines,
        }
    }

    /// Indexes populated once the run is over.
    #[must_use]
    pub const fn populates(self) -> &'static [IndexKind] {
        match self {
            Self::Organization => &[IndexKind::Orgs],
            Self::User => &[IndexKind::Users, IndexKind::Orgs],
            Self::Source | Self::SourceVersion => &[IndexKind::Sources],
            Self::Collection | Self::CollectionVersion => &[IndexKind::Collections],
            _ => &[],
        }
    }
}

impl fmt::Display for ImporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImporterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.aliases().contains(&wanted.as_str()))
            .ok_or_else(|| Error::UnknownImporter(s.to_string()))
    }
}

/// State shared by every record of one run.
pub struct ImportContext {
    /// Storage collaborator.
    pub store: Arc<dyn Store>,
    /// Search collaborator.
    pub indexer: Arc<dyn SearchIndexer>,
    /// Run options.
    pub options: ImportOptions,
    /// Lookup caches, fresh for each run.
    pub caches: Caches,
    /// Result being accumulated.
    pub report: ImportReport,
}

impl ImportContext {
    /// Creates the context for a run of `kind`.
    pub fn new(
        kind: ImporterKind,
        store: Arc<dyn Store>,
        indexer: Arc<dyn SearchIndexer>,
        options: ImportOptions,
    ) -> Self {
        Self {
            store,
            indexer,
            options,
            caches: Caches::default(),
            report: ImportReport::new(kind.buckets(), kind.tracks_expressions()),
        }
    }

    /// Cached user lookup.
    pub fn user(&mut self, lookup: Lookup<'_>) -> Option<User> {
        self.caches.users.resolve(self.store.users(), lookup)
    }

    /// Cached organization lookup.
    pub fn organization(&mut self, lookup: Lookup<'_>) -> Option<Organization> {
        self.caches
            .organizations
            .resolve(self.store.organizations(), lookup)
    }

    /// Cached source or collection lookup.
    pub fn repository(&mut self, kind: RepoKind, lookup: Lookup<'_>) -> Option<Repository> {
        let cache = match kind {
            RepoKind::Source => &mut self.caches.sources,
            RepoKind::Collection => &mut self.caches.collections,
        };
        cache.resolve(self.store.repositories(kind), lookup)
    }

    /// Cached concept lookup.
    pub fn concept(&mut self, lookup: Lookup<'_>) -> Option<Concept> {
        self.caches.concepts.resolve(self.store.concepts(), lookup)
    }

    /// Cached mapping lookup.
    pub fn mapping(&mut self, lookup: Lookup<'_>) -> Option<Mapping> {
        self.caches.mappings.resolve(self.store.mappings(), lookup)
    }

    /// Id of the user with this username, if any.
    pub fn user_id(&mut self, username: Option<&str>) -> Option<EntityId> {
        username
            .and_then(|name| self.user(Lookup::NaturalKey(name)))
            .map(|user| user.id)
    }

    /// Audit fields of a legacy record, with usernames resolved to users.
    pub fn audit(&mut self, record: &mut LegacyRecord) -> Audit {
        let created_by = record.take_str("created_by");
        let updated_by = record.take_str("updated_by");
        Audit {
            created_by: self.user_id(created_by.as_deref()),
            updated_by: self.user_id(updated_by.as_deref()),
            created_at: record.take_date("created_at"),
            updated_at: record.take_date("updated_at"),
        }
    }

    /// Audit fields of a legacy version record.
    ///
    /// The creator falls back to `version_created_by`, then to the default
    /// user; the updater falls back to the creator.
    pub fn version_audit(&mut self, record: &mut LegacyRecord) -> Audit {
        let version_created_by = record.take_str("version_created_by");
        let creator = record
            .take_str("created_by")
            .or(version_created_by)
            .unwrap_or_else(|| self.options.default_username.clone());
        let updater = record.take_str("updated_by").unwrap_or_else(|| creator.clone());
        Audit {
            created_by: self.user_id(Some(&creator)),
            updated_by: self.user_id(Some(&updater)),
            created_at: record.take_date("created_at"),
            updated_at: record.take_date("updated_at"),
        }
    }

    /// Resolves the owner encoded in a repository URI.
    pub fn owner_of(&mut self, repo_uri: &str) -> std::result::Result<Owner, RecordError> {
        let parsed = uri::ParsedUri::parse(repo_uri)
            .ok_or_else(|| RecordError::unresolved(format!("Owner of '{}'", repo_uri)))?;
        let owner_uri = parsed.owner_uri();
        let owner = match parsed.owner_type {
            uri::OwnerType::Organization => self
                .organization(Lookup::Uri(&owner_uri))
                .map(|org| Owner::Organization(org.id)),
            uri::OwnerType::User => self
                .user(Lookup::Uri(&owner_uri))
                .map(|user| Owner::User(user.id)),
        };
        owner.ok_or_else(|| RecordError::unresolved(format!("Owner '{}'", owner_uri)))
    }

    /// Stores localized texts, reusing rows already imported under the same
    /// legacy `uuid`. Returns their ids in input order.
    ///
    /// `text_key` names the field holding the text (`name` or
    /// `description`), `type_key` the field holding its type.
    pub fn localized_texts(
        &mut self,
        items: Vec<Value>,
        text_key: &str,
        type_key: &str,
    ) -> std::result::Result<Vec<EntityId>, RecordError> {
        let texts = self.store.localized_texts();
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let mut item = LegacyRecord::from_value(item)?;
            let legacy_id = item.take_str("uuid");
            if let Some(existing) = legacy_id
                .as_deref()
                .and_then(|id| texts.find(&Lookup::InternalReferenceId(id)))
            {
                ids.push(existing.id());
                continue;
            }
            let created = texts.insert(LocalizedText {
                internal_reference_id: legacy_id,
                name: item.take_str(text_key).unwrap_or_default(),
                locale: item.take_str("locale"),
                locale_preferred: item.take_bool("locale_preferred").unwrap_or(false),
                text_type: item.take_str(type_key).or_else(|| item.take_str("type")),
                created_at: item.take_date("created_at"),
                ..LocalizedText::default()
            })?;
            ids.push(created.id);
        }
        Ok(ids)
    }
}

/// Outcome of processing one line.
pub type RecordResult = std::result::Result<Bucket, RecordError>;

/// An importer fed one legacy document at a time.
pub trait LineImporter: Send {
    /// The kind this importer was created for.
    fn kind(&self) -> ImporterKind;

    /// Imports one record and classifies it.
    ///
    /// On success the original document goes into the returned bucket; on
    /// error it goes into `failed` with the error attached.
    fn process(&mut self, ctx: &mut ImportContext, record: &mut LegacyRecord) -> RecordResult;

    /// Runs once after the last record.
    fn after_run(&mut self, ctx: &mut ImportContext) {
        ctx.indexer.populate(self.kind().populates());
    }
}

/// An importer ready to run.
pub enum Importer {
    /// Line-delimited records.
    Lines(Box<dyn LineImporter>),
    /// A reference document.
    References(ReferenceImporter),
}

/// Create the importer for a kind.
///
/// `legacy_api` is only used by [`ImporterKind::MappingReference`].
pub fn create_importer(kind: ImporterKind, legacy_api: Option<Arc<dyn LegacyApi>>) -> Importer {
    match kind {
        ImporterKind::Organization => {
            Importer::Lines(Box::new(organizations::OrganizationImporter))
        }
        ImporterKind::User => Importer::Lines(Box::new(users::UserImporter)),
        ImporterKind::WebUserCredential => {
            Importer::Lines(Box::new(users::WebUserCredentialImporter))
        }
        ImporterKind::Token => Importer::Lines(Box::new(users::TokenImporter)),
        ImporterKind::Source => Importer::Lines(Box::new(repositories::RepositoryImporter::new(
            RepoKind::Source,
        ))),
        ImporterKind::Collection => Importer::Lines(Box::new(
            repositories::RepositoryImporter::new(RepoKind::Collection),
        )),
        ImporterKind::SourceVersion => Importer::Lines(Box::new(
            repositories::RepositoryVersionImporter::new(RepoKind::Source),
        )),
        ImporterKind::CollectionVersion => Importer::Lines(Box::new(
            repositories::RepositoryVersionImporter::new(RepoKind::Collection),
        )),
        ImporterKind::SourceIds => {
            Importer::Lines(Box::new(ids::IdsImporter::new(ids::IdsTarget::Source)))
        }
        ImporterKind::CollectionIds => {
            Importer::Lines(Box::new(ids::IdsImporter::new(ids::IdsTarget::Collection)))
        }
        ImporterKind::ConceptIds => {
            Importer::Lines(Box::new(ids::IdsImporter::new(ids::IdsTarget::Concept)))
        }
        ImporterKind::Concept => Importer::Lines(Box::new(concepts::ConceptImporter)),
        ImporterKind::ConceptVersion => {
            Importer::Lines(Box::new(concepts::ConceptVersionImporter))
        }
        ImporterKind::Mapping => Importer::Lines(Box::new(mappings::MappingImporter)),
        ImporterKind::MappingVersion => {
            Importer::Lines(Box::new(mappings::MappingVersionImporter))
        }
        ImporterKind::CollectionReference => {
            Importer::References(ReferenceImporter::new(kind, None))
        }
        ImporterKind::MappingReference => {
            Importer::References(ReferenceImporter::new(kind, legacy_api))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
