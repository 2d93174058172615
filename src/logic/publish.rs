// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! The publishing pipeline: resolve, archive, draft, describe, clean, upload, publish.
//!
//! Every step is a blocking call gated on the previous one; the first failure
//! aborts the run. Nothing is rolled back, so a failed run leaves its draft
//! behind and a re-run starts a fresh one.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use time::Date;
use tracing::{info, warn};

use crate::api::{ApiError, BackoffPolicy, DepositApi};
use crate::config::Settings;
use crate::logic::archive::{Archive, build_archive, default_excludes};
use crate::models::deposition::UploadedFile;
use crate::models::metadata::StaticMetadata;

/// Whether the run extends an existing concept or starts a new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishMode {
    NewVersion { record_id: String },
    NewRecord,
}

/// What a successful run produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishOutcome {
    pub mode: PublishMode,
    pub draft_id: String,
    pub record_id: String,
    pub concept_id: Option<String>,
    pub doi: String,
    pub url: String,
    pub archive: Archive,
}

/// Decide between a new version and a new record.
///
/// A forced new record skips the lookup. Without a published record only the
/// sandbox may fall back to a new record; production treats it as fatal.
pub fn select_mode<A: DepositApi + ?Sized>(api: &A, settings: &Settings) -> Result<PublishMode> {
    if settings.force_new_record {
        info!("New record requested; skipping version lookup");
        return Ok(PublishMode::NewRecord);
    }

    info!(
        "Getting latest record ID from concept record {}",
        settings.concept_id
    );
    let latest = api
        .latest_record(&settings.concept_id)
        .with_context(|| format!("Failed to look up concept record {}", settings.concept_id))?;

    match latest {
        Some(record_id) => {
            info!("Using latest {} record ID {}", settings.environment.as_str(), record_id);
            Ok(PublishMode::NewVersion { record_id })
        }
        None if settings.environment.allows_record_bootstrap() => {
            info!(
                "No published record for concept {}; creating a new record",
                settings.concept_id
            );
            Ok(PublishMode::NewRecord)
        }
        None => bail!(
            "No published record found for concept {} in {}",
            settings.concept_id,
            settings.environment.as_str()
        ),
    }
}

/// Remove every file a new-version draft inherited. Any failed deletion is fatal.
pub fn clean_draft_files<A: DepositApi + ?Sized>(api: &A, draft_id: &str) -> Result<usize> {
    let files = api
        .list_files(draft_id)
        .with_context(|| format!("Failed to list files on draft {draft_id}"))?;

    for file in &files {
        match file.filesize {
            Some(size) => info!("Removing inherited file {} ({} bytes)", file.filename, size),
            None => info!("Removing inherited file {}", file.filename),
        }
        api.delete_file(draft_id, &file.id)
            .with_context(|| format!("Failed to delete {} from draft {draft_id}", file.filename))?;
    }
    Ok(files.len())
}

/// Upload `archive` into the draft's bucket, retrying transient failures.
///
/// `sleep` is called between attempts with the delay from `policy`.
pub fn upload_with_retry<A: DepositApi + ?Sized>(
    api: &A,
    draft_id: &str,
    archive: &Archive,
    policy: BackoffPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> Result<UploadedFile> {
    let draft = api
        .get_deposition(draft_id)
        .with_context(|| format!("Failed to fetch bucket URL for draft {draft_id}"))?;
    let bucket = draft
        .links
        .bucket
        .ok_or_else(|| anyhow!("Draft {draft_id} has no bucket URL"))?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        info!(
            "Uploading {} ({} bytes), attempt {}/{}",
            archive.file_name, archive.size, attempt, policy.max_attempts
        );

        let result = api
            .upload_file(&bucket, &archive.file_name, &archive.path)
            .and_then(|uploaded| {
                if uploaded.size == archive.size {
                    Ok(uploaded)
                } else {
                    Err(ApiError::SizeMismatch {
                        expected: archive.size,
                        stored: uploaded.size,
                    })
                }
            });

        let err = match result {
            Ok(uploaded) => {
                info!(
                    "Upload completed: {}/{} (checksum {})",
                    bucket,
                    uploaded.key,
                    uploaded.checksum.as_deref().unwrap_or("unreported")
                );
                return Ok(uploaded);
            }
            Err(err) => err,
        };

        if !err.is_transient() {
            return Err(anyhow::Error::new(err).context("Upload failed"));
        }
        match policy.delay_after(attempt) {
            Some(delay) => {
                warn!(
                    "Upload attempt {} failed: {}; retrying in {}s",
                    attempt,
                    err,
                    delay.as_secs()
                );
                sleep(delay);
            }
            None => {
                return Err(anyhow::Error::new(err)
                    .context(format!("Upload failed after {attempt} attempts")));
            }
        }
    }
}

/// Run the whole pipeline against `api`.
pub fn run<A: DepositApi + ?Sized>(
    api: &A,
    settings: &Settings,
    metadata: &StaticMetadata,
    today: Date,
    policy: BackoffPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> Result<PublishOutcome> {
    let mode = select_mode(api, settings)?;

    info!("Testing token authentication");
    api.check_token().context("Token authentication failed")?;
    info!("Token authentication successful");

    let archive = build_archive(
        &settings.source_dir,
        &settings.archive_dir,
        &settings.archive_prefix,
        today,
        &default_excludes(),
    )
    .context("Archive creation failed")?;

    // Build the document before any draft exists so bad input costs nothing remote.
    let release = metadata.for_release(&settings.version, today)?;

    let draft = match &mode {
        PublishMode::NewVersion { record_id } => {
            info!("Creating new version of record {}", record_id);
            api.create_new_version(record_id)
                .with_context(|| format!("Failed to create new version of record {record_id}"))?
        }
        PublishMode::NewRecord => {
            info!("Creating new deposition");
            api.create_deposition()
                .context("Failed to create new deposition")?
        }
    };
    let draft_id = draft.id.clone();
    info!("Draft created with deposition ID {}", draft_id);
    if let Some(concept) = &draft.conceptrecid {
        info!("Concept record ID {}", concept);
    }

    info!("Updating deposition metadata for {}", release.title);
    api.update_metadata(&draft_id, &release)
        .with_context(|| format!("Metadata update failed for draft {draft_id}"))?;
    info!("Metadata updated successfully");

    if matches!(mode, PublishMode::NewVersion { .. }) {
        let removed = clean_draft_files(api, &draft_id)?;
        info!("Removed {} inherited file(s)", removed);
    }

    upload_with_retry(api, &draft_id, &archive, policy, sleep)?;
    ensure_single_file(api, &draft_id, &archive.file_name)?;

    info!("Publishing deposition {}", draft_id);
    let published = api
        .publish(&draft_id)
        .with_context(|| format!("Publish failed for draft {draft_id}"))?;
    let record_id = published.published_record_id().to_string();
    if !published.submitted {
        warn!("Service did not mark deposition {} as submitted", draft_id);
    }
    info!("Published successfully; record ID {}", record_id);

    let environment = settings.environment;
    Ok(PublishOutcome {
        doi: published
            .doi
            .clone()
            .unwrap_or_else(|| environment.fallback_doi(&record_id)),
        url: environment.record_url(&record_id),
        concept_id: published.conceptrecid.or(draft.conceptrecid),
        mode,
        draft_id,
        record_id,
        archive,
    })
}

/// Exactly one file, the archive, may be attached when publishing.
fn ensure_single_file<A: DepositApi + ?Sized>(
    api: &A,
    draft_id: &str,
    file_name: &str,
) -> Result<()> {
    let files = api
        .list_files(draft_id)
        .with_context(|| format!("Failed to list files on draft {draft_id}"))?;
    match files.as_slice() {
        [only] if only.filename == file_name => Ok(()),
        _ => bail!(
            "Draft {draft_id} must hold exactly {file_name}, found [{}]",
            files
                .iter()
                .map(|f| f.filename.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
