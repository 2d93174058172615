// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Deposition metadata: the static descriptor read from disk and the
//! per-release document pushed onto a draft.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use time::{Date, macros::format_description};
use url::Url;

use crate::models::keywords::Keywords;
use crate::utils::markdown_to_html;

const DEFAULT_TITLE: &str = "Portal Forecasts";
const DEFAULT_DESCRIPTION: &str = "Weekly forecasts for the Portal Project rodent population data";
const DEFAULT_COMMUNITY: &str = "weecology";

/// One author entry as Zenodo expects it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
}

/// Descriptive metadata that stays the same from release to release.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct StaticMetadata {
    /// Base title; the release version is appended.
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_upload_type")]
    pub upload_type: String,
    /// Markdown; rendered to HTML before upload.
    #[serde(default = "default_description")]
    pub description: String,
    pub creators: Vec<Creator>,
    #[serde(default = "default_access_right")]
    pub access_right: String,
    pub license: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Markdown; a generated release note is used when absent.
    #[serde(default)]
    pub notes: Option<String>,
    /// Source repository used to derive related identifiers.
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default = "default_communities")]
    pub communities: Vec<String>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_upload_type() -> String {
    "dataset".to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

fn default_access_right() -> String {
    "open".to_string()
}

fn default_communities() -> Vec<String> {
    vec![DEFAULT_COMMUNITY.to_string()]
}

/// DataCite relation types used for derived links.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Relation {
    IsSupplementTo,
    IsDerivedFrom,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelatedIdentifier {
    pub identifier: String,
    pub relation: Relation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Community {
    pub identifier: String,
}

/// Metadata document for one release, serialized under `{"metadata": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DepositionMetadata {
    pub title: String,
    pub upload_type: String,
    pub publication_date: String,
    pub description: String,
    pub creators: Vec<Creator>,
    pub access_right: String,
    pub license: String,
    pub keywords: Vec<String>,
    pub version: String,
    pub notes: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_identifiers: Vec<RelatedIdentifier>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub communities: Vec<Community>,
}

/// Request body for a metadata update.
#[derive(Serialize)]
pub struct MetadataEnvelope<'a> {
    pub metadata: &'a DepositionMetadata,
}

impl StaticMetadata {
    /// Read and validate the descriptor at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read metadata file {:?}", path))?;
        let metadata: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse metadata file {:?}", path))?;
        metadata.validate()?;
        Ok(metadata)
    }

    fn validate(&self) -> Result<()> {
        if self.creators.is_empty() {
            bail!("Metadata must list at least one creator");
        }
        if let Some(creator) = self.creators.iter().find(|c| c.name.trim().is_empty()) {
            bail!("Creator entry has an empty name: {:?}", creator);
        }
        if self.license.trim().is_empty() {
            bail!("Metadata license must not be empty");
        }
        if let Some(repo) = &self.repository {
            let url = Url::parse(repo)
                .with_context(|| format!("Repository is not a valid URL: {repo}"))?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                bail!("Repository must be an http(s) URL: {repo}");
            }
        }
        Ok(())
    }

    /// Merge static fields with the computed per-release ones.
    pub fn for_release(&self, version: &str, published_on: Date) -> Result<DepositionMetadata> {
        let version = version.trim();
        if version.is_empty() {
            bail!("Release version must not be empty");
        }

        let publication_date = published_on
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(|err| anyhow::anyhow!("Failed to format publication date: {}", err))?;

        let notes = match &self.notes {
            Some(notes) => markdown_to_html(notes),
            None => markdown_to_html(&format!(
                "Automated release {version} of {}, published {publication_date}.",
                self.title
            )),
        };

        Ok(DepositionMetadata {
            title: format!("{} {}", self.title.trim(), version),
            upload_type: self.upload_type.clone(),
            publication_date,
            description: markdown_to_html(&self.description),
            creators: self.creators.clone(),
            access_right: self.access_right.clone(),
            license: self.license.clone(),
            keywords: Keywords::new(self.keywords.clone()).into_vec(),
            version: version.to_string(),
            notes,
            related_identifiers: self.related_identifiers(version),
            communities: self
                .communities
                .iter()
                .filter(|c| !c.trim().is_empty())
                .map(|c| Community {
                    identifier: c.trim().to_string(),
                })
                .collect(),
        })
    }

    fn related_identifiers(&self, version: &str) -> Vec<RelatedIdentifier> {
        let Some(repo) = self.repository.as_deref() else {
            return Vec::new();
        };
        let repo = repo.trim_end_matches('/');
        vec![
            RelatedIdentifier {
                identifier: format!("{repo}/releases/tag/{version}"),
                relation: Relation::IsSupplementTo,
            },
            RelatedIdentifier {
                identifier: format!("{repo}/tree/{version}"),
                relation: Relation::IsDerivedFrom,
            },
        ]
    }
}
