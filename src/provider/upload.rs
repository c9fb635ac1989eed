//! Content-addressable file upload.
//!
//! Files are identified by the SHA-1 of their bytes, computed locally before
//! any network call. A conflict response means the content is already
//! stored and counts as success.

use futures::future::try_join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use sha1::{Digest, Sha1};
use std::sync::Arc;
use tracing::debug;

use crate::credentials::{CredentialManager, ProviderCredentials};
use crate::error::{ProviderError, Result};
use crate::http::ResilientClient;

use super::types::UploadedFile;

/// Header carrying the content digest.
pub const DIGEST_HEADER: &str = "x-vercel-digest";

/// Lowercase hex SHA-1 of `bytes`.
#[must_use]
pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Uploads files to the provider's content store.
#[derive(Debug, Clone)]
pub struct ContentUploader {
    /// HTTP client.
    http: ResilientClient,
    /// API base URL.
    base_url: String,
    /// Credential manager for this provider.
    credentials: Arc<CredentialManager>,
}

impl ContentUploader {
    /// Creates a new uploader.
    #[must_use]
    pub fn new(http: ResilientClient, base_url: &str, credentials: Arc<CredentialManager>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    async fn put(&self, creds: &ProviderCredentials, bytes: &[u8]) -> Result<String> {
        let sha = sha1_hex(bytes);
        let url = format!("{}/v2/files", self.base_url);

        let response = self
            .http
            .send("upload file", |c| {
                let mut request = c
                    .post(&url)
                    .bearer_auth(&creds.token)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .header(DIGEST_HEADER, &sha)
                    .body(bytes.to_vec());
                if !creds.account_id.is_empty() {
                    request = request.query(&[("teamId", creds.account_id.as_str())]);
                }
                request
            })
            .await?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            debug!("File {sha} already uploaded");
            return Ok(sha);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::upstream("upload file", status.as_u16(), body).into());
        }

        debug!("Uploaded file {sha} ({} bytes)", bytes.len());
        Ok(sha)
    }

    /// Uploads one file and returns its SHA-1.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are unavailable or the upload fails
    /// with anything other than a conflict.
    pub async fn upload_file(&self, bytes: &[u8]) -> Result<String> {
        let creds = self.credentials.get_credentials().await?;
        self.put(&creds, bytes).await
    }

    /// Uploads all `files` concurrently.
    ///
    /// The result preserves input order. Any single failure fails the batch.
    ///
    /// # Errors
    ///
    /// Returns the first upload error.
    pub async fn upload_files(&self, files: &[(String, Vec<u8>)]) -> Result<Vec<UploadedFile>> {
        let creds = self.credentials.get_credentials().await?;

        let uploads = files.iter().map(|(path, bytes)| {
            let creds = &creds;
            async move {
                let sha1 = self.put(creds, bytes).await?;
                Ok::<_, crate::error::EdgeplaneError>(UploadedFile {
                    path: path.clone(),
                    sha1,
                    size: bytes.len() as u64,
                })
            }
        });

        try_join_all(uploads).await
    }
}
