//! Configuration types for termbase-migrate.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::http::validate_url;
use crate::importers::ImporterKind;

/// Main import configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Importer dispatch key (e.g. `concepts`, `collection_reference`).
    pub importer: String,
    /// Input file path or `http(s)://` URL.
    pub input: String,
    /// Store persistence.
    #[serde(default)]
    pub store: StoreConfig,
    /// Legacy API used by the mapping-reference importer.
    #[serde(default)]
    pub legacy_api: LegacyApiConfig,
    /// Import options.
    #[serde(default)]
    pub options: ImportOptions,
}

/// Store persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot loaded before and saved after the run.
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

/// Deployment of the legacy API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Production.
    Production,
    /// Staging.
    Staging,
    /// QA.
    Qa,
    /// Demo.
    Demo,
}

impl Environment {
    /// Base URL of the legacy API in this environment.
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Production => "https://api.v1.openconceptlab.org",
            Self::Staging => "https://api.staging.v1.openconceptlab.org",
            Self::Qa => "https://api.qa.v1.openconceptlab.org",
            Self::Demo => "https://api.demo.v1.openconceptlab.org",
        }
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "qa" => Ok(Self::Qa),
            "demo" => Ok(Self::Demo),
            other => Err(Error::Config(format!(
                "Unknown environment '{}'. Expected production, staging, qa or demo",
                other
            ))),
        }
    }
}

/// Legacy API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyApiConfig {
    /// Named environment.
    #[serde(default)]
    pub environment: Option<Environment>,
    /// Explicit base URL; wins over `environment`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LegacyApiConfig {
    fn default() -> Self {
        Self {
            environment: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LegacyApiConfig {
    /// The configured base URL, if any.
    #[must_use]
    pub fn resolve_base_url(&self) -> Option<String> {
        self.base_url
            .clone()
            .or_else(|| self.environment.map(|env| env.base_url().to_string()))
    }
}

/// Import options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOptions {
    /// Retry reference lookups without the version suffix.
    #[serde(default)]
    pub drop_version_if_version_missing: bool,
    /// Report full record lists instead of counts.
    #[serde(default)]
    pub verbose: bool,
    /// Users who last logged in before this are not given tokens.
    #[serde(default = "default_token_cutoff")]
    pub token_cutoff: DateTime<Utc>,
    /// Audit user for versions that name no creator.
    #[serde(default = "default_username")]
    pub default_username: String,
    /// Show a progress bar.
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            drop_version_if_version_missing: false,
            verbose: false,
            token_cutoff: default_token_cutoff(),
            default_username: default_username(),
            show_progress: true,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_token_cutoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 10, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn default_username() -> String {
    "ocladmin".to_string()
}

fn default_true() -> bool {
    true
}

impl ImportConfig {
    /// Creates a configuration with default sections.
    #[must_use]
    pub fn new(importer: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            importer: importer.into(),
            input: input.into(),
            store: StoreConfig::default(),
            legacy_api: LegacyApiConfig::default(),
            options: ImportOptions::default(),
        }
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// The importer selected by [`ImportConfig::importer`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownImporter`] for an unregistered name.
    pub fn importer_kind(&self) -> Result<ImporterKind> {
        self.importer.parse()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        self.importer_kind()?;
        if self.input.trim().is_empty() {
            return Err(Error::Config("input cannot be empty".to_string()));
        }
        if self.legacy_api.timeout_secs == 0 {
            return Err(Error::Config(
                "legacy_api.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if let Some(url) = &self.legacy_api.base_url {
            validate_url(url)?;
        }
        if self.options.default_username.is_empty() {
            return Err(Error::Config(
                "options.default_username cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let options = ImportOptions::default();
        assert!(!options.drop_version_if_version_missing);
        assert!(!options.verbose);
        assert!(options.show_progress);
        assert_eq!(options.default_username, "ocladmin");
        assert_eq!(options.token_cutoff.to_rfc3339(), "2020-10-01T00:00:00+00:00");
    }

    #[test]
    fn test_config_yaml_parse() {
        let yaml = r#"
importer: mapping_reference
input: ./exports/references.json
store:
  snapshot: ./data/store.json
legacy_api:
  environment: staging
options:
  drop_version_if_version_missing: true
  token_cutoff: "2021-01-01T00:00:00Z"
"#;
        let config: ImportConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.importer_kind().unwrap(), ImporterKind::MappingReference);
        assert_eq!(config.store.snapshot, Some(PathBuf::from("./data/store.json")));
        assert_eq!(config.legacy_api.timeout_secs, 30);
        assert_eq!(
            config.legacy_api.resolve_base_url().as_deref(),
            Some("https://api.staging.v1.openconceptlab.org")
        );
        assert!(config.options.drop_version_if_version_missing);
        assert!(config.options.show_progress);
        config.validate().unwrap();
    }

    #[test]
    fn test_base_url_wins_over_environment() {
        let config = LegacyApiConfig {
            environment: Some(Environment::Production),
            base_url: Some("http://localhost:8000".to_string()),
            timeout_secs: 5,
        };

        assert_eq!(
            config.resolve_base_url().as_deref(),
            Some("http://localhost:8000")
        );
        assert_eq!(LegacyApiConfig::default().resolve_base_url(), None);
    }

    #[test]
    fn test_config_validate_unknown_importer() {
        let config = ImportConfig::new("widgets", "input.json");

        assert!(matches!(
            config.validate(),
            Err(Error::UnknownImporter(name)) if name == "widgets"
        ));
    }

    #[test]
    fn test_config_validate_empty_input() {
        let config = ImportConfig::new("orgs", "  ");

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_bad_base_url() {
        let mut config = ImportConfig::new("orgs", "orgs.json");
        config.legacy_api.base_url = Some("ftp://legacy".to_string());

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("QA".parse::<Environment>().unwrap(), Environment::Qa);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert!("mars".parse::<Environment>().is_err());
    }
}
