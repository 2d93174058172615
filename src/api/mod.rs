// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Deposit service boundary.
//!
//! The pipeline talks to the service only through [`DepositApi`], so the
//! HTTP client can be swapped for an in-memory fake in tests.

pub mod retry;
pub mod zenodo;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::deposition::{Deposition, DepositionFile, UploadedFile};
use crate::models::metadata::DepositionMetadata;

pub use retry::BackoffPolicy;
pub use zenodo::ZenodoClient;

/// Failures reported by the deposit service or the transport beneath it.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{operation}: request failed")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation}: unexpected status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("{operation}: malformed response: {reason}")]
    Malformed {
        operation: &'static str,
        reason: String,
    },
    #[error("{operation}: failed to read {path:?}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("upload: service stored {stored} bytes, expected {expected}")]
    SizeMismatch { expected: u64, stored: u64 },
}

impl ApiError {
    /// Whether retrying the same upload could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Malformed { .. })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Operations the publishing pipeline needs from the deposit service.
pub trait DepositApi {
    /// Confirm the token is accepted by listing the account's depositions.
    fn check_token(&self) -> ApiResult<()>;

    /// Latest published record id in `concept_id`, or `None` when the service
    /// reports the concept as not found or gone.
    fn latest_record(&self, concept_id: &str) -> ApiResult<Option<String>>;

    /// Start a new draft version of `record_id`; returns the new draft.
    fn create_new_version(&self, record_id: &str) -> ApiResult<Deposition>;

    /// Start an empty draft unrelated to any prior record.
    fn create_deposition(&self) -> ApiResult<Deposition>;

    fn update_metadata(&self, draft_id: &str, metadata: &DepositionMetadata)
    -> ApiResult<Deposition>;

    fn list_files(&self, draft_id: &str) -> ApiResult<Vec<DepositionFile>>;

    fn delete_file(&self, draft_id: &str, file_id: &str) -> ApiResult<()>;

    fn get_deposition(&self, draft_id: &str) -> ApiResult<Deposition>;

    /// Stream `archive` to `<bucket_url>/<file_name>`.
    fn upload_file(&self, bucket_url: &str, file_name: &str, archive: &Path)
    -> ApiResult<UploadedFile>;

    fn publish(&self, draft_id: &str) -> ApiResult<Deposition>;
}
