//! URI and expression helpers.
//!
//! Canonical URIs always start and end with `/`:
//!
//! ```text
//! /users/{username}/
//! /orgs/{mnemonic}/
//! /{orgs|users}/{owner}/{sources|collections}/{repo}/[{repo_version}/]
//!     [{concepts|mappings}/{resource}/[{resource_version}/]]
//! ```
//!
//! Collection expressions use the same shape; a versionless expression omits
//! the trailing resource version.

use crate::model::RepoKind;

/// Owner segment of a URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerType {
    /// `/orgs/...`
    Organization,
    /// `/users/...`
    User,
}

impl OwnerType {
    /// URI path segment.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Organization => "orgs",
            Self::User => "users",
        }
    }
}

/// Resource segment of a URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    /// `.../concepts/...`
    Concept,
    /// `.../mappings/...`
    Mapping,
}

impl ResourceType {
    /// URI path segment.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Concept => "concepts",
            Self::Mapping => "mappings",
        }
    }
}

/// A URI split into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri<'a> {
    /// Organization or user.
    pub owner_type: OwnerType,
    /// Owner mnemonic or username.
    pub owner: &'a str,
    /// Repository kind, when the URI names a repository.
    pub repo_kind: Option<RepoKind>,
    /// Repository mnemonic.
    pub repo: Option<&'a str>,
    /// Repository version label.
    pub repo_version: Option<&'a str>,
    /// Resource kind, when the URI names a concept or mapping.
    pub resource_type: Option<ResourceType>,
    /// Resource mnemonic.
    pub resource: Option<&'a str>,
    /// Resource version label.
    pub resource_version: Option<&'a str>,
}

impl<'a> ParsedUri<'a> {
    /// Parses a URI or expression. Returns `None` for anything not shaped
    /// like a canonical URI.
    #[must_use]
    pub fn parse(uri: &'a str) -> Option<Self> {
        let segments: Vec<&str> = uri.split('/').filter(|s| !s.is_empty()).collect();

        let owner_type = match *segments.first()? {
            "orgs" => OwnerType::Organization,
            "users" => OwnerType::User,
            _ => return None,
        };
        let mut parsed = Self {
            owner_type,
            owner: segments.get(1).copied()?,
            repo_kind: None,
            repo: None,
            repo_version: None,
            resource_type: None,
            resource: None,
            resource_version: None,
        };
        if segments.len() == 2 {
            return Some(parsed);
        }

        parsed.repo_kind = Some(match segments[2] {
            "sources" => RepoKind::Source,
            "collections" => RepoKind::Collection,
            _ => return None,
        });
        parsed.repo = Some(segments.get(3).copied()?);

        let mut cursor = 4;
        if let Some(&segment) = segments.get(cursor) {
            if resource_type(segment).is_none() {
                parsed.repo_version = Some(segment);
                cursor += 1;
            }
        }
        let Some(&segment) = segments.get(cursor) else {
            return Some(parsed);
        };
        parsed.resource_type = Some(resource_type(segment)?);
        parsed.resource = Some(segments.get(cursor + 1).copied()?);
        parsed.resource_version = segments.get(cursor + 2).copied();

        if segments.len() > cursor + 3 {
            return None;
        }
        Some(parsed)
    }

    /// URI of the owner.
    #[must_use]
    pub fn owner_uri(&self) -> String {
        format!("/{}/{}/", self.owner_type.segment(), self.owner)
    }

    /// URI of the repository HEAD, without any version.
    #[must_use]
    pub fn repo_uri(&self) -> Option<String> {
        Some(format!(
            "{}{}/{}/",
            self.owner_uri(),
            self.repo_kind?.segment(),
            self.repo?
        ))
    }

    /// Renders the URI back to its canonical form.
    #[must_use]
    pub fn to_uri(&self) -> String {
        let Some(mut uri) = self.repo_uri() else {
            return self.owner_uri();
        };
        if let Some(version) = self.repo_version {
            uri.push_str(version);
            uri.push('/');
        }
        if let (Some(kind), Some(resource)) = (self.resource_type, self.resource) {
            uri.push_str(kind.segment());
            uri.push('/');
            uri.push_str(resource);
            uri.push('/');
            if let Some(version) = self.resource_version {
                uri.push_str(version);
                uri.push('/');
            }
        }
        uri
    }
}

fn resource_type(segment: &str) -> Option<ResourceType> {
    match segment {
        "concepts" => Some(ResourceType::Concept),
        "mappings" => Some(ResourceType::Mapping),
        _ => None,
    }
}

/// `/users/{username}/`
#[must_use]
pub fn user_uri(username: &str) -> String {
    format!("/users/{username}/")
}

/// `/orgs/{mnemonic}/`
#[must_use]
pub fn org_uri(mnemonic: &str) -> String {
    format!("/orgs/{mnemonic}/")
}

/// Appends a version label to a versionless URI.
#[must_use]
pub fn versioned_uri(versionless: &str, version: &str) -> String {
    let base = versionless.trim_end_matches('/');
    format!("{base}/{version}/")
}

/// Strips the innermost version from an expression.
///
/// Resource URIs lose their resource version, repository URIs their
/// repository version. Anything unparseable is returned unchanged.
#[must_use]
pub fn drop_version(expression: &str) -> String {
    match ParsedUri::parse(expression) {
        Some(mut parsed) => {
            if parsed.resource.is_some() {
                parsed.resource_version = None;
            } else {
                parsed.repo_version = None;
            }
            parsed.to_uri()
        }
        None => expression.to_string(),
    }
}

/// Whether the expression carries a resource version.
#[must_use]
pub fn has_resource_version(expression: &str) -> bool {
    ParsedUri::parse(expression).is_some_and(|p| p.resource_version.is_some())
}

/// URI of the repository HEAD the expression lives in.
#[must_use]
pub fn to_parent_uri(expression: &str) -> Option<String> {
    ParsedUri::parse(expression)?.repo_uri()
}

/// URI of the owner encoded in a repository URI.
#[must_use]
pub fn owner_uri(uri: &str) -> Option<String> {
    ParsedUri::parse(uri).map(|p| p.owner_uri())
}

/// Whether the expression names a concept.
#[must_use]
pub fn is_concept_expression(expression: &str) -> bool {
    expression.contains("/concepts/")
}

/// Whether the expression names a mapping.
#[must_use]
pub fn is_mapping_expression(expression: &str) -> bool {
    expression.contains("/mappings/")
}
