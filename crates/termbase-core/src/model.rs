//! Current-schema entity model.
//!
//! Every entity is a plain serializable struct with a store-assigned
//! [`EntityId`]. The [`Record`] trait exposes the keys the storage layer
//! indexes on (id, uri, natural key, legacy identifier); [`Versioned`]
//! exposes the version bookkeeping shared by concepts and mappings.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::uri;

/// Store-assigned identifier.
pub type EntityId = u64;

/// Version label of the mutable, always-current repository version.
pub const HEAD: &str = "HEAD";

/// Common behaviour of every stored entity.
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Entity kind used in error messages.
    const KIND: &'static str;

    /// Name of the natural key (used in conflict errors).
    const NATURAL_KEY: &'static str = "uri";

    /// Store-assigned id (`0` until inserted).
    fn id(&self) -> EntityId;

    /// Sets the store-assigned id.
    fn set_id(&mut self, id: EntityId);

    /// Canonical URI, if this entity has one.
    fn uri(&self) -> Option<&str>;

    /// Business key used for existence checks.
    fn natural_key(&self) -> Option<&str> {
        self.uri()
    }

    /// Identifier of the legacy record this entity was imported from.
    fn internal_reference_id(&self) -> Option<&str>;

    /// Replaces the legacy identifier.
    fn set_internal_reference_id(&mut self, value: Option<String>);

    /// Entity kind of this particular value.
    ///
    /// Differs from [`Record::KIND`] only for types shared by several tables.
    fn kind_name(&self) -> &'static str {
        Self::KIND
    }
}

/// Version bookkeeping shared by concepts and mappings.
pub trait Versioned: Record {
    /// Mnemonic shared by all versions.
    fn mnemonic(&self) -> &str;
    /// Version label.
    fn version(&self) -> &str;
    /// Id of the identity-bearing (unversioned) record.
    fn versioned_object_id(&self) -> EntityId;
    /// Whether this row is the latest version.
    fn is_latest_version(&self) -> bool;
    /// Flags this row as (not) latest.
    fn set_latest_version(&mut self, latest: bool);
    /// Id of the owning source.
    fn parent(&self) -> EntityId;
    /// Source (versions) this row is a member of.
    fn sources_mut(&mut self) -> &mut BTreeSet<EntityId>;
}

/// Lookup key accepted by store tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Store-assigned id.
    Id(EntityId),
    /// Canonical URI.
    Uri(&'a str),
    /// Natural key (username, mnemonic or uri depending on the kind).
    NaturalKey(&'a str),
    /// Legacy identifier.
    InternalReferenceId(&'a str),
}

/// Creation and modification audit fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    /// User who created the record.
    pub created_by: Option<EntityId>,
    /// User who last updated the record.
    pub updated_by: Option<EntityId>,
    /// Creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A user account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Store id.
    pub id: EntityId,
    /// Login name (natural key).
    pub username: String,
    /// `/users/{username}/`.
    pub uri: String,
    /// Legacy identifier.
    pub internal_reference_id: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Email address.
    pub email: Option<String>,
    /// Employer.
    pub company: Option<String>,
    /// Free-form location.
    pub location: Option<String>,
    /// Preferred locale code.
    pub preferred_locale: Option<String>,
    /// Personal website.
    pub website: Option<String>,
    /// Whether the email address was verified.
    pub verified: bool,
    /// Password hash carried over from the legacy system.
    pub password: Option<String>,
    /// API token.
    pub token: Option<String>,
    /// Registration timestamp.
    pub date_joined: Option<DateTime<Utc>>,
    /// Last login timestamp.
    pub last_login: Option<DateTime<Utc>>,
    /// Organizations this user belongs to.
    pub organizations: BTreeSet<EntityId>,
    /// Arbitrary extra attributes.
    pub extras: Map<String, Value>,
    /// Audit fields.
    pub audit: Audit,
}

impl User {
    /// Creates a user with its canonical URI.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            uri: uri::user_uri(&username),
            username,
            verified: true,
            ..Default::default()
        }
    }
}

impl Record for User {
    const KIND: &'static str = "user";
    const NATURAL_KEY: &'static str = "username";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn uri(&self) -> Option<&str> {
        Some(&self.uri)
    }

    fn natural_key(&self) -> Option<&str> {
        Some(&self.username)
    }

    fn internal_reference_id(&self) -> Option<&str> {
        self.internal_reference_id.as_deref()
    }

    fn set_internal_reference_id(&mut self, value: Option<String>) {
        self.internal_reference_id = value;
    }
}

/// An organization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Store id.
    pub id: EntityId,
    /// Short name (natural key).
    pub mnemonic: String,
    /// `/orgs/{mnemonic}/`.
    pub uri: String,
    /// Display name.
    pub name: Option<String>,
    /// Company name.
    pub company: Option<String>,
    /// Website.
    pub website: Option<String>,
    /// Free-form location.
    pub location: Option<String>,
    /// Public access level ("View", "Edit", "None").
    pub public_access: Option<String>,
    /// Legacy identifier.
    pub internal_reference_id: Option<String>,
    /// Arbitrary extra attributes.
    pub extras: Map<String, Value>,
    /// Audit fields.
    pub audit: Audit,
}

impl Organization {
    /// Creates an organization with its canonical URI.
    #[must_use]
    pub fn new(mnemonic: impl Into<String>) -> Self {
        let mnemonic = mnemonic.into();
        Self {
            uri: uri::org_uri(&mnemonic),
            mnemonic,
            ..Default::default()
        }
    }
}

impl Record for Organization {
    const KIND: &'static str = "organization";
    const NATURAL_KEY: &'static str = "mnemonic";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn uri(&self) -> Option<&str> {
        Some(&self.uri)
    }

    fn natural_key(&self) -> Option<&str> {
        Some(&self.mnemonic)
    }

    fn internal_reference_id(&self) -> Option<&str> {
        self.internal_reference_id.as_deref()
    }

    fn set_internal_reference_id(&mut self, value: Option<String>) {
        self.internal_reference_id = value;
    }
}

/// Owner of a source or collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Owner {
    /// Owned by an organization.
    Organization(EntityId),
    /// Owned by a user.
    User(EntityId),
}

/// Which kind of repository a [`Repository`] row is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoKind {
    /// A source: owns concepts and mappings.
    Source,
    /// A collection: references concepts and mappings of other sources.
    Collection,
}

impl RepoKind {
    /// URI path segment for this kind.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Source => "sources",
            Self::Collection => "collections",
        }
    }

    /// Singular name used in messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Collection => "collection",
        }
    }
}

/// A source or collection version (HEAD included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Store id.
    pub id: EntityId,
    /// Source or collection.
    pub kind: RepoKind,
    /// Short name shared by all versions.
    pub mnemonic: String,
    /// Version label, [`HEAD`] for the mutable version.
    pub version: String,
    /// Canonical URI.
    pub uri: String,
    /// Owning organization or user.
    pub owner: Owner,
    /// Display name.
    pub name: Option<String>,
    /// Full display name.
    pub full_name: Option<String>,
    /// `source_type` / `collection_type`.
    pub repo_type: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Website.
    pub website: Option<String>,
    /// Public access level.
    pub public_access: Option<String>,
    /// Default locale code.
    pub default_locale: Option<String>,
    /// Supported locale codes.
    pub supported_locales: Vec<String>,
    /// External identifier.
    pub external_id: Option<String>,
    /// Snapshot of the repository at version creation.
    pub snapshot: Option<Value>,
    /// Whether this version was released.
    pub released: bool,
    /// Whether this version is retired.
    pub retired: bool,
    /// Whether this version is the latest one.
    pub is_latest_version: bool,
    /// Id of the HEAD row all versions share.
    pub versioned_object_id: EntityId,
    /// Legacy identifier.
    pub internal_reference_id: Option<String>,
    /// Arbitrary extra attributes.
    pub extras: Map<String, Value>,
    /// Audit fields.
    pub audit: Audit,
    /// Collection references (collections only).
    pub references: Vec<EntityId>,
    /// Concept members (collections only).
    pub concepts: BTreeSet<EntityId>,
    /// Mapping members (collections only).
    pub mappings: BTreeSet<EntityId>,
}

impl Repository {
    /// Creates a HEAD repository row.
    #[must_use]
    pub fn new(kind: RepoKind, mnemonic: impl Into<String>, uri: impl Into<String>, owner: Owner) -> Self {
        Self {
            id: 0,
            kind,
            mnemonic: mnemonic.into(),
            version: HEAD.to_string(),
            uri: uri.into(),
            owner,
            name: None,
            full_name: None,
            repo_type: None,
            description: None,
            website: None,
            public_access: None,
            default_locale: None,
            supported_locales: Vec::new(),
            external_id: None,
            snapshot: None,
            released: false,
            retired: false,
            is_latest_version: false,
            versioned_object_id: 0,
            internal_reference_id: None,
            extras: Map::new(),
            audit: Audit::default(),
            references: Vec::new(),
            concepts: BTreeSet::new(),
            mappings: BTreeSet::new(),
        }
    }

    /// Whether this row is the HEAD version.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.version == HEAD
    }
}

impl Record for Repository {
    const KIND: &'static str = "repository";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn uri(&self) -> Option<&str> {
        Some(&self.uri)
    }

    fn internal_reference_id(&self) -> Option<&str> {
        self.internal_reference_id.as_deref()
    }

    fn set_internal_reference_id(&mut self, value: Option<String>) {
        self.internal_reference_id = value;
    }

    fn kind_name(&self) -> &'static str {
        self.kind.name()
    }
}

/// A localized name or description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizedText {
    /// Store id.
    pub id: EntityId,
    /// Legacy `uuid`.
    pub internal_reference_id: Option<String>,
    /// The text itself.
    pub name: String,
    /// Locale code.
    pub locale: Option<String>,
    /// Whether this is the preferred text for its locale.
    pub locale_preferred: bool,
    /// Name or description type (e.g. "FULLY_SPECIFIED").
    pub text_type: Option<String>,
    /// Creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
}

impl LocalizedText {
    /// Copies the text into a new unsaved row without the legacy identifier.
    #[must_use]
    pub fn detached_clone(&self) -> Self {
        Self {
            id: 0,
            internal_reference_id: None,
            ..self.clone()
        }
    }
}

impl Record for LocalizedText {
    const KIND: &'static str = "localized text";
    const NATURAL_KEY: &'static str = "uuid";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn uri(&self) -> Option<&str> {
        None
    }

    fn natural_key(&self) -> Option<&str> {
        None
    }

    fn internal_reference_id(&self) -> Option<&str> {
        self.internal_reference_id.as_deref()
    }

    fn set_internal_reference_id(&mut self, value: Option<String>) {
        self.internal_reference_id = value;
    }
}

/// A concept version (the unversioned identity row included).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    /// Store id.
    pub id: EntityId,
    /// Concept code.
    pub mnemonic: String,
    /// Version label.
    pub version: String,
    /// Canonical URI.
    pub uri: String,
    /// Owning source (HEAD).
    pub parent: EntityId,
    /// Id of the identity-bearing row.
    pub versioned_object_id: EntityId,
    /// Whether this row is the latest version.
    pub is_latest_version: bool,
    /// Concept class (e.g. "Diagnosis").
    pub concept_class: Option<String>,
    /// Datatype (e.g. "N/A", "Coded").
    pub datatype: Option<String>,
    /// Whether the concept is retired.
    pub retired: bool,
    /// External identifier.
    pub external_id: Option<String>,
    /// Version comment.
    pub comment: Option<String>,
    /// Localized names.
    pub names: Vec<EntityId>,
    /// Localized descriptions.
    pub descriptions: Vec<EntityId>,
    /// Source versions this row belongs to.
    pub sources: BTreeSet<EntityId>,
    /// Legacy identifier.
    pub internal_reference_id: Option<String>,
    /// Arbitrary extra attributes.
    pub extras: Map<String, Value>,
    /// Audit fields.
    pub audit: Audit,
}

impl Record for Concept {
    const KIND: &'static str = "concept";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn uri(&self) -> Option<&str> {
        Some(&self.uri)
    }

    fn internal_reference_id(&self) -> Option<&str> {
        self.internal_reference_id.as_deref()
    }

    fn set_internal_reference_id(&mut self, value: Option<String>) {
        self.internal_reference_id = value;
    }
}

impl Versioned for Concept {
    fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn versioned_object_id(&self) -> EntityId {
        self.versioned_object_id
    }

    fn is_latest_version(&self) -> bool {
        self.is_latest_version
    }

    fn set_latest_version(&mut self, latest: bool) {
        self.is_latest_version = latest;
    }

    fn parent(&self) -> EntityId {
        self.parent
    }

    fn sources_mut(&mut self) -> &mut BTreeSet<EntityId> {
        &mut self.sources
    }
}

/// A mapping version (the unversioned identity row included).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    /// Store id.
    pub id: EntityId,
    /// Mapping identifier within its source.
    pub mnemonic: String,
    /// Version label.
    pub version: String,
    /// Canonical URI.
    pub uri: String,
    /// Owning source (HEAD).
    pub parent: EntityId,
    /// Id of the identity-bearing row.
    pub versioned_object_id: EntityId,
    /// Whether this row is the latest version.
    pub is_latest_version: bool,
    /// Relationship type (e.g. "SAME-AS").
    pub map_type: String,
    /// Resolved from-concept.
    pub from_concept: Option<EntityId>,
    /// From-concept code.
    pub from_concept_code: Option<String>,
    /// From-concept display name.
    pub from_concept_name: Option<String>,
    /// Source of the from-concept.
    pub from_source: Option<EntityId>,
    /// Unresolved from-source URI.
    pub from_source_url: Option<String>,
    /// Resolved to-concept.
    pub to_concept: Option<EntityId>,
    /// To-concept code.
    pub to_concept_code: Option<String>,
    /// To-concept display name.
    pub to_concept_name: Option<String>,
    /// Source of the to-concept.
    pub to_source: Option<EntityId>,
    /// Unresolved to-source URI.
    pub to_source_url: Option<String>,
    /// Source versions this row belongs to.
    pub sources: BTreeSet<EntityId>,
    /// Whether the mapping is retired.
    pub retired: bool,
    /// External identifier.
    pub external_id: Option<String>,
    /// Version comment.
    pub comment: Option<String>,
    /// Legacy identifier.
    pub internal_reference_id: Option<String>,
    /// Arbitrary extra attributes.
    pub extras: Map<String, Value>,
    /// Audit fields.
    pub audit: Audit,
}

impl Record for Mapping {
    const KIND: &'static str = "mapping";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn uri(&self) -> Option<&str> {
        Some(&self.uri)
    }

    fn internal_reference_id(&self) -> Option<&str> {
        self.internal_reference_id.as_deref()
    }

    fn set_internal_reference_id(&mut self, value: Option<String>) {
        self.internal_reference_id = value;
    }
}

impl Versioned for Mapping {
    fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn versioned_object_id(&self) -> EntityId {
        self.versioned_object_id
    }

    fn is_latest_version(&self) -> bool {
        self.is_latest_version
    }

    fn set_latest_version(&mut self, latest: bool) {
        self.is_latest_version = latest;
    }

    fn parent(&self) -> EntityId {
        self.parent
    }

    fn sources_mut(&mut self) -> &mut BTreeSet<EntityId> {
        &mut self.sources
    }
}

/// An expression held by a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionReference {
    /// Store id.
    pub id: EntityId,
    /// Concept or mapping URI, with or without version.
    pub expression: String,
    /// Owning collection.
    pub collection: EntityId,
    /// Creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for CollectionReference {
    const KIND: &'static str = "collection reference";
    const NATURAL_KEY: &'static str = "expression";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn uri(&self) -> Option<&str> {
        None
    }

    fn natural_key(&self) -> Option<&str> {
        None
    }

    fn internal_reference_id(&self) -> Option<&str> {
        None
    }

    fn set_internal_reference_id(&mut self, _value: Option<String>) {}
}
