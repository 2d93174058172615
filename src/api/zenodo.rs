// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! Blocking HTTP client for the Zenodo deposit REST API.

use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::retry::StatusRetry;
use super::{ApiError, ApiResult, DepositApi};
use crate::config::ApiToken;
use crate::models::deposition::{Deposition, DepositionFile, Record, UploadedFile};
use crate::models::metadata::{DepositionMetadata, MetadataEnvelope};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const API_TIMEOUT: Duration = Duration::from_secs(60);
// Large archives over slow links need a generous budget.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(3600);
const MAX_ERROR_BODY: usize = 2048;

pub struct ZenodoClient {
    base_url: String,
    token: ApiToken,
    api: Client,
    transfer: Client,
    status_retry: StatusRetry,
    /// Pause between status-driven re-sends.
    sleep: fn(Duration),
}

impl ZenodoClient {
    pub fn new(base_url: impl Into<String>, token: ApiToken) -> Result<Self> {
        let user_agent = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        let api = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(API_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;
        let transfer = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TRANSFER_TIMEOUT)
            .build()
            .context("Failed to create upload HTTP client")?;
        Ok(Self::with_clients(base_url, token, api, transfer))
    }

    fn with_clients(
        base_url: impl Into<String>,
        token: ApiToken,
        api: Client,
        transfer: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            api,
            transfer,
            status_retry: StatusRetry::default(),
            sleep: thread::sleep,
        }
    }

    fn get_record(&self, operation: &'static str, record_id: &str) -> ApiResult<Response> {
        let request = self.api.get(self.url(&format!("records/{record_id}")));
        self.send(operation, request)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn send(&self, operation: &'static str, request: RequestBuilder) -> ApiResult<Response> {
        request
            .bearer_auth(self.token.expose())
            .send()
            .map_err(|source| ApiError::Transport { operation, source })
    }

    /// Send and require exactly `expected`.
    fn call(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        expected: StatusCode,
    ) -> ApiResult<Response> {
        let response = self.send(operation, request)?;
        debug!("{operation}: status {}", response.status());
        if response.status() == expected {
            Ok(response)
        } else {
            Err(status_error(operation, response))
        }
    }
}

impl DepositApi for ZenodoClient {
    fn check_token(&self) -> ApiResult<()> {
        let request = self
            .api
            .get(self.url("deposit/depositions"))
            .query(&[("size", "1")]);
        self.call("token check", request, StatusCode::OK)?;
        Ok(())
    }

    fn latest_record(&self, concept_id: &str) -> ApiResult<Option<String>> {
        const OP: &str = "version lookup";
        let response = self.get_record(OP, concept_id)?;
        let record: Record = match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                debug!("{OP}: concept {concept_id} has no published record");
                return Ok(None);
            }
            status if status.is_success() => read_json(OP, response)?,
            _ => return Err(status_error(OP, response)),
        };
        if let Some(latest) = record.latest_link_id() {
            return Ok(Some(latest));
        }

        // The concept id resolves to its newest version.
        let concept = record.conceptrecid.as_deref().unwrap_or(concept_id);
        debug!("{OP}: resolving newest version through concept {concept}");
        let response = self.get_record(OP, concept)?;
        if !response.status().is_success() {
            return Err(status_error(OP, response));
        }
        let latest: Record = read_json(OP, response)?;
        Ok(Some(latest.id))
    }

    fn create_new_version(&self, record_id: &str) -> ApiResult<Deposition> {
        const OP: &str = "new version";
        let request = self.api.post(self.url(&format!(
            "deposit/depositions/{record_id}/actions/newversion"
        )));
        let response = self.call(OP, request, StatusCode::CREATED)?;
        let source: Deposition = read_json(OP, response)?;

        // The action echoes the source deposition; the draft hangs off `latest_draft`.
        let draft_id = source.latest_draft_id();
        if draft_id == source.id {
            return Ok(source);
        }
        self.get_deposition(&draft_id)
    }

    fn create_deposition(&self) -> ApiResult<Deposition> {
        const OP: &str = "create deposition";
        let request = self
            .api
            .post(self.url("deposit/depositions"))
            .json(&serde_json::json!({}));
        let response = self.call(OP, request, StatusCode::CREATED)?;
        read_json(OP, response)
    }

    fn update_metadata(
        &self,
        draft_id: &str,
        metadata: &DepositionMetadata,
    ) -> ApiResult<Deposition> {
        const OP: &str = "metadata update";
        let request = self
            .api
            .put(self.url(&format!("deposit/depositions/{draft_id}")))
            .json(&MetadataEnvelope { metadata });
        let response = self.call(OP, request, StatusCode::OK)?;
        read_json(OP, response)
    }

    fn list_files(&self, draft_id: &str) -> ApiResult<Vec<DepositionFile>> {
        const OP: &str = "list files";
        let request = self
            .api
            .get(self.url(&format!("deposit/depositions/{draft_id}/files")));
        let response = self.call(OP, request, StatusCode::OK)?;
        read_json(OP, response)
    }

    fn delete_file(&self, draft_id: &str, file_id: &str) -> ApiResult<()> {
        let request = self.api.delete(self.url(&format!(
            "deposit/depositions/{draft_id}/files/{file_id}"
        )));
        self.call("delete file", request, StatusCode::NO_CONTENT)?;
        Ok(())
    }

    fn get_deposition(&self, draft_id: &str) -> ApiResult<Deposition> {
        const OP: &str = "fetch deposition";
        let request = self
            .api
            .get(self.url(&format!("deposit/depositions/{draft_id}")));
        let response = self.call(OP, request, StatusCode::OK)?;
        read_json(OP, response)
    }

    fn upload_file(
        &self,
        bucket_url: &str,
        file_name: &str,
        archive: &Path,
    ) -> ApiResult<UploadedFile> {
        const OP: &str = "upload";
        let url = upload_url(bucket_url, file_name)?;
        let content_type = mime_guess::from_path(archive).first_or_octet_stream();
        let mut retries = 0;

        loop {
            // Reopen per send; a consumed body cannot be replayed.
            let file = File::open(archive).map_err(|source| ApiError::Io {
                operation: OP,
                path: archive.to_path_buf(),
                source,
            })?;
            let len = file
                .metadata()
                .map_err(|source| ApiError::Io {
                    operation: OP,
                    path: archive.to_path_buf(),
                    source,
                })?
                .len();

            debug!("{OP}: PUT {url} ({len} bytes)");
            let request = self
                .transfer
                .put(url.clone())
                .header(CONTENT_TYPE, content_type.as_ref())
                .body(Body::sized(file, len));
            let response = self.send(OP, request)?;
            let status = response.status();

            if self.status_retry.should_retry(&Method::PUT, status, retries) {
                retries += 1;
                let delay = self.status_retry.delay(retries);
                warn!(
                    "{OP}: service answered {status}, re-sending in {}s (retry {retries}/{})",
                    delay.as_secs(),
                    self.status_retry.max_retries
                );
                (self.sleep)(delay);
                continue;
            }

            if !status.is_success() {
                return Err(status_error(OP, response));
            }
            return read_json(OP, response);
        }
    }

    fn publish(&self, draft_id: &str) -> ApiResult<Deposition> {
        const OP: &str = "publish";
        let request = self.api.post(self.url(&format!(
            "deposit/depositions/{draft_id}/actions/publish"
        )));
        let response = self.call(OP, request, StatusCode::ACCEPTED)?;
        read_json(OP, response)
    }
}

/// `<bucket>/<file_name>` with the file name percent-encoded as one segment.
fn upload_url(bucket_url: &str, file_name: &str) -> ApiResult<Url> {
    let malformed = |reason: String| ApiError::Malformed {
        operation: "upload",
        reason,
    };
    let mut url =
        Url::parse(bucket_url).map_err(|err| malformed(format!("bucket URL {bucket_url}: {err}")))?;
    url.path_segments_mut()
        .map_err(|_| malformed(format!("bucket URL {bucket_url} cannot take a path")))?
        .pop_if_empty()
        .push(file_name);
    Ok(url)
}

fn read_json<T: DeserializeOwned>(operation: &'static str, response: Response) -> ApiResult<T> {
    let body = response
        .text()
        .map_err(|source| ApiError::Transport { operation, source })?;
    serde_json::from_str(&body).map_err(|err| ApiError::Malformed {
        operation,
        reason: err.to_string(),
    })
}

fn status_error(operation: &'static str, response: Response) -> ApiError {
    let status = response.status().as_u16();
    let mut body = response.text().unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        body.truncate(cut);
        body.push_str("...");
    }
    ApiError::Status {
        operation,
        status,
        body,
    }
}
