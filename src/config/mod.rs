// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Run configuration: deployment environment and resolved settings.

pub mod credentials;

use std::path::PathBuf;

use clap::ValueEnum;

use crate::utils::sanitize_component;

pub use credentials::{ApiToken, TOKEN_ENV_VAR, load_token};

/// Which Zenodo deployment a run targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Sandbox,
    #[default]
    Production,
}

impl Environment {
    /// REST API root, without trailing slash.
    pub fn api_base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.zenodo.org/api",
            Self::Production => "https://zenodo.org/api",
        }
    }

    /// Concept record that groups every published version of the dataset.
    pub fn default_concept_id(&self) -> &'static str {
        match self {
            Self::Sandbox => "340647",
            Self::Production => "10553210",
        }
    }

    /// Deployment secrets file holding `ZENODOTOKEN=...`.
    pub fn default_token_file(&self) -> &'static str {
        match self {
            Self::Sandbox => "/blue/ewhite/hpc_maintenance/zenodosandboxtoken.txt",
            Self::Production => "/blue/ewhite/hpc_maintenance/githubdeploytoken.txt",
        }
    }

    pub fn doi_prefix(&self) -> &'static str {
        match self {
            Self::Sandbox => "10.5072",
            Self::Production => "10.5281",
        }
    }

    /// Public landing page for a published record.
    pub fn record_url(&self, record_id: &str) -> String {
        match self {
            Self::Sandbox => format!("https://sandbox.zenodo.org/record/{record_id}"),
            Self::Production => format!("https://zenodo.org/record/{record_id}"),
        }
    }

    /// DOI Zenodo mints for a record when the publish response omits one.
    pub fn fallback_doi(&self, record_id: &str) -> String {
        format!("{}/zenodo.{record_id}", self.doi_prefix())
    }

    /// Only the sandbox may bootstrap a fresh record when the concept lookup finds nothing.
    pub fn allows_record_bootstrap(&self) -> bool {
        matches!(self, Self::Sandbox)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

/// Everything a run needs, resolved from CLI flags, environment and defaults.
#[derive(Clone, Debug)]
pub struct Settings {
    pub environment: Environment,
    pub version: String,
    pub force_new_record: bool,
    pub concept_id: String,
    pub token_file: PathBuf,
    pub metadata_file: PathBuf,
    pub source_dir: PathBuf,
    pub archive_dir: PathBuf,
    /// Sanitized stem; the archive is named `<prefix>-<date>.zip`.
    pub archive_prefix: String,
}

/// Optional overrides collected by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub concept_id: Option<String>,
    pub token_file: Option<PathBuf>,
    pub metadata_file: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub archive_dir: Option<PathBuf>,
    pub archive_prefix: Option<String>,
}

pub const DEFAULT_METADATA_FILE: &str = ".zenodo.json";
pub const DEFAULT_ARCHIVE_PREFIX: &str = "portal-forecasts";
/// Deployment scratch space shared by scheduled publishing runs.
pub const DEFAULT_ARCHIVE_DIR: &str = "/orange/ewhite/PortalForecasts/archive_directory";

impl Settings {
    /// Fill every unset override with its per-environment default.
    pub fn resolve(
        environment: Environment,
        version: String,
        force_new_record: bool,
        overrides: Overrides,
    ) -> Self {
        let concept_id = overrides
            .concept_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| environment.default_concept_id().to_string());

        Self {
            environment,
            version: version.trim().to_string(),
            force_new_record,
            concept_id,
            token_file: overrides
                .token_file
                .unwrap_or_else(|| PathBuf::from(environment.default_token_file())),
            metadata_file: overrides
                .metadata_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_METADATA_FILE)),
            source_dir: overrides.source_dir.unwrap_or_else(|| PathBuf::from(".")),
            archive_dir: overrides
                .archive_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_DIR)),
            archive_prefix: sanitize_component(
                overrides
                    .archive_prefix
                    .as_deref()
                    .unwrap_or(DEFAULT_ARCHIVE_PREFIX),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{Environment, Overrides, Settings};

    #[test]
    fn environment_selects_endpoints_and_identifiers() {
        assert_eq!(
            Environment::Sandbox.api_base_url(),
            "https://sandbox.zenodo.org/api"
        );
        assert_eq!(Environment::Production.api_base_url(), "https://zenodo.org/api");
        assert_eq!(Environment::Sandbox.default_concept_id(), "340647");
        assert_eq!(Environment::Production.default_concept_id(), "10553210");
        assert_eq!(Environment::default(), Environment::Production);
    }

    #[test]
    fn fallback_doi_and_record_url_follow_environment() {
        assert_eq!(Environment::Sandbox.fallback_doi("12"), "10.5072/zenodo.12");
        assert_eq!(Environment::Production.fallback_doi("12"), "10.5281/zenodo.12");
        assert_eq!(
            Environment::Production.record_url("12"),
            "https://zenodo.org/record/12"
        );
    }

    #[test]
    fn only_sandbox_allows_record_bootstrap() {
        assert!(Environment::Sandbox.allows_record_bootstrap());
        assert!(!Environment::Production.allows_record_bootstrap());
    }

    #[test]
    fn resolve_applies_environment_defaults() {
        let settings = Settings::resolve(
            Environment::Sandbox,
            " v1.2.3 ".into(),
            false,
            Overrides::default(),
        );

        assert_eq!(settings.version, "v1.2.3");
        assert_eq!(settings.concept_id, "340647");
        assert_eq!(
            settings.token_file,
            PathBuf::from("/blue/ewhite/hpc_maintenance/zenodosandboxtoken.txt")
        );
        assert_eq!(settings.metadata_file, PathBuf::from(".zenodo.json"));
        assert_eq!(
            settings.archive_dir,
            PathBuf::from("/orange/ewhite/PortalForecasts/archive_directory")
        );
        assert_eq!(settings.archive_prefix, "portal-forecasts");
    }

    #[test]
    fn resolve_prefers_overrides_and_sanitizes_prefix() {
        let settings = Settings::resolve(
            Environment::Production,
            "v2".into(),
            true,
            Overrides {
                concept_id: Some("999".into()),
                archive_prefix: Some("My Data Set".into()),
                archive_dir: Some(PathBuf::from("/scratch")),
                ..Overrides::default()
            },
        );

        assert!(settings.force_new_record);
        assert_eq!(settings.concept_id, "999");
        assert_eq!(settings.archive_prefix, "my-data-set");
        assert_eq!(settings.archive_dir, PathBuf::from("/scratch"));
    }

    #[test]
    fn resolve_ignores_blank_concept_override() {
        let settings = Settings::resolve(
            Environment::Production,
            "v2".into(),
            false,
            Overrides {
                concept_id: Some("  ".into()),
                ..Overrides::default()
            },
        );
        assert_eq!(settings.concept_id, "10553210");
    }
}
