// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Wire shapes returned by the deposit API, trimmed to the fields the pipeline reads.
//!
//! Zenodo is inconsistent about identifier types (`id` is a number, `conceptrecid`
//! a string), so every identifier is normalized to `String` on the way in.

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::Value;
use url::Url;

/// A draft or published deposition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Deposition {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub conceptrecid: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub record_id: Option<String>,
    #[serde(default)]
    pub submitted: bool,
    #[serde(default, deserialize_with = "opt_non_empty")]
    pub doi: Option<String>,
    #[serde(default)]
    pub links: DepositionLinks,
}

/// Hypermedia links attached to a deposition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DepositionLinks {
    #[serde(default, deserialize_with = "opt_non_empty")]
    pub bucket: Option<String>,
    #[serde(default, deserialize_with = "opt_non_empty")]
    pub latest_draft: Option<String>,
}

/// A file already attached to a draft.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DepositionFile {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub filesize: Option<u64>,
}

/// Bucket response to a raw `PUT` upload.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub key: String,
    pub size: u64,
    #[serde(default)]
    pub checksum: Option<String>,
}

/// A published record as returned by the records endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Record {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub conceptrecid: Option<String>,
    #[serde(default)]
    pub links: RecordLinks,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct RecordLinks {
    #[serde(default, deserialize_with = "opt_non_empty")]
    pub latest: Option<String>,
}

impl Deposition {
    /// Identifier of the draft created by a `newversion` action.
    ///
    /// The action answers with the *source* deposition; the new draft is only
    /// reachable through `links.latest_draft`.
    pub fn latest_draft_id(&self) -> String {
        self.links
            .latest_draft
            .as_deref()
            .and_then(last_path_segment)
            .unwrap_or_else(|| self.id.clone())
    }

    /// Identifier of the public record after publishing.
    pub fn published_record_id(&self) -> &str {
        self.record_id.as_deref().unwrap_or(&self.id)
    }
}

impl Record {
    /// Newest version id when `links.latest` names it directly (`.../records/<id>`).
    ///
    /// Newer deployments link `.../records/<id>/versions/latest` instead; that
    /// carries no id and yields `None`.
    pub fn latest_link_id(&self) -> Option<String> {
        self.links
            .latest
            .as_deref()
            .and_then(last_path_segment)
            .filter(|segment| segment.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Last non-empty path segment of a URL, e.g. the id in `.../records/123`.
pub fn last_path_segment(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    url.path_segments()?
        .rev()
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or numeric identifier, found {other}"
        ))),
    }
}

fn opt_id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "expected a string or numeric identifier, found {other}"
        ))),
    }
}

// Drafts report `"doi": ""` until publish.
fn opt_non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::{Deposition, DepositionFile, Record, last_path_segment};

    #[test]
    fn deposition_accepts_numeric_and_string_identifiers() {
        let json = r#"{
            "id": 1234,
            "conceptrecid": "1000",
            "record_id": 1234,
            "state": "unsubmitted",
            "submitted": false,
            "doi": "",
            "links": {"bucket": "https://zenodo.org/api/files/abc-def"}
        }"#;

        let dep: Deposition = serde_json::from_str(json).unwrap();

        assert_eq!(dep.id, "1234");
        assert_eq!(dep.conceptrecid.as_deref(), Some("1000"));
        assert_eq!(dep.record_id.as_deref(), Some("1234"));
        assert_eq!(dep.doi, None, "empty draft DOI is treated as absent");
        assert_eq!(
            dep.links.bucket.as_deref(),
            Some("https://zenodo.org/api/files/abc-def")
        );
        assert!(!dep.submitted);
    }

    #[test]
    fn deposition_file_accepts_string_identifier() {
        let file: DepositionFile = serde_json::from_str(
            r#"{"id": "eb78d50b-ecd4-407a-9520-dfc7a9d1ab2c", "filename": "old.zip", "filesize": 10, "checksum": "md5:00"}"#,
        )
        .unwrap();
        assert_eq!(file.id, "eb78d50b-ecd4-407a-9520-dfc7a9d1ab2c");
        assert_eq!(file.filesize, Some(10));
    }

    #[test]
    fn deposition_tolerates_missing_optional_fields() {
        let dep: Deposition = serde_json::from_str(r#"{"id": "77"}"#).unwrap();
        assert_eq!(dep.id, "77");
        assert!(dep.links.bucket.is_none());
        assert_eq!(dep.published_record_id(), "77");
    }

    #[test]
    fn deposition_rejects_missing_identifier() {
        assert!(serde_json::from_str::<Deposition>(r#"{"id": null}"#).is_err());
    }

    #[test]
    fn latest_draft_id_prefers_latest_draft_link() {
        let dep: Deposition = serde_json::from_str(
            r#"{"id": 10, "links": {"latest_draft": "https://zenodo.org/api/deposit/depositions/11"}}"#,
        )
        .unwrap();
        assert_eq!(dep.latest_draft_id(), "11");

        let plain: Deposition = serde_json::from_str(r#"{"id": 10}"#).unwrap();
        assert_eq!(plain.latest_draft_id(), "10");
    }

    #[test]
    fn record_latest_version_comes_from_latest_link() {
        let record: Record = serde_json::from_str(
            r#"{"id": 10553210, "links": {"latest": "https://zenodo.org/api/records/15000000"}}"#,
        )
        .unwrap();
        assert_eq!(record.latest_link_id().as_deref(), Some("15000000"));
    }

    #[test]
    fn record_versions_latest_link_carries_no_id() {
        let record: Record = serde_json::from_str(
            r#"{"id": "15000000", "conceptrecid": "10553210",
                "links": {"latest": "https://zenodo.org/api/records/15000000/versions/latest"}}"#,
        )
        .unwrap();
        assert_eq!(record.latest_link_id(), None);
        assert_eq!(record.conceptrecid.as_deref(), Some("10553210"));

        let bare: Record = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(bare.latest_link_id(), None);
    }

    #[test]
    fn last_path_segment_ignores_trailing_slash_and_rejects_garbage() {
        assert_eq!(
            last_path_segment("https://zenodo.org/api/records/42/").as_deref(),
            Some("42")
        );
        assert_eq!(last_path_segment("not a url"), None);
    }
}
