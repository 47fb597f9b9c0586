//! Object storage module
//!
//! Sends bytes straight to object storage through URLs and forms the backend
//! has already signed. No credentials or cookies are attached here.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::ETAG;
use std::time::Duration;
use thiserror::Error;

/// Object storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Storage responded with status {0}")]
    Status(u16),

    #[error("Response had no ETag header")]
    MissingEtag,
}

/// Direct-to-storage transfer operations
#[async_trait]
pub trait PartStore: Send + Sync {
    /// PUT `body` to a pre-signed part URL and return the raw `ETag` header
    async fn put_part(&self, url: &str, body: Bytes) -> Result<String, StorageError>;

    /// POST a pre-signed form with `file` appended after every signed field
    async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
        file_name: &str,
        body: Bytes,
    ) -> Result<(), StorageError>;
}

/// HTTP implementation of [`PartStore`]
pub struct ObjectStorageClient {
    http_client: reqwest::Client,
}

impl ObjectStorageClient {
    /// Create a storage client with an optional request timeout
    pub fn new(timeout: Option<Duration>) -> Result<Self, StorageError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl PartStore for ObjectStorageClient {
    #[tracing::instrument(
        name = "storage.put_part",
        skip(self, url, body),
        fields(
            http.method = "PUT",
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn put_part(&self, url: &str, body: Bytes) -> Result<String, StorageError> {
        let response = self.http_client.put(url).body(body).send().await?;

        let status = response.status();
        let span = tracing::Span::current();
        span.record("http.status_code", status.as_u16());

        if !status.is_success() {
            return Err(StorageError::Status(status.as_u16()));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(StorageError::MissingEtag)?;

        span.record("s3.etag", etag.as_str());
        Ok(etag)
    }

    #[tracing::instrument(
        name = "storage.post_form",
        skip(self, url, fields, body),
        fields(
            http.method = "POST",
            upload.bytes = body.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn post_form(
        &self,
        url: &str,
        fields: &[(String, String)],
        file_name: &str,
        body: Bytes,
    ) -> Result<(), StorageError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        // S3 ignores any field that follows the file
        let len = body.len() as u64;
        let file_part = reqwest::multipart::Part::stream_with_length(body, len)
            .file_name(file_name.to_string());
        form = form.part("file", file_part);

        let response = self.http_client.post(url).multipart(form).send().await?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            return Err(StorageError::Status(status.as_u16()));
        }
        Ok(())
    }
}
