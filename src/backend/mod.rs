//! Backend client module
//!
//! Talks to the media library's upload-authorization routes. The backend owns the
//! storage credentials; this client only asks it for sessions and pre-signed URLs
//! and reports the final outcome.
//!
//! # Example
//!
//! ```no_run
//! use skylibrary_uploadr::backend::{BackendClient, UploadBackend};
//! use skylibrary_uploadr::config::BackendConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BackendClient::new(&BackendConfig::default())?;
//! let session = client.create_session("clip.mp4").await?;
//! println!("upload {} -> {}", session.upload_id, session.file_key);
//! # Ok(())
//! # }
//! ```
//!
//! # Tracing
//!
//! | Operation | Span Name |
//! |-----------|-----------|
//! | Session initiation | `backend.create_session` |
//! | Part URL | `backend.presign_part` |
//! | Completion | `backend.complete` |
//! | Abort | `backend.abort` |
//! | Direct form | `backend.direct_form` |

pub mod endpoints;

use crate::config::BackendConfig;
use crate::upload::{PartResult, UploadSession};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER};
use serde::Deserialize;
use thiserror::Error;

pub use endpoints::Endpoints;

/// Form field carrying the CSRF token on state-changing requests
pub const CSRF_FIELD: &str = "csrfmiddlewaretoken";

/// Backend client errors
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Build the HTTP client used for backend and page requests.
///
/// Session and CSRF cookies are attached as default headers. They must never be
/// sent to object storage, so the storage client is built separately.
pub fn build_http_client(config: &BackendConfig) -> Result<reqwest::Client, BackendError> {
    let mut headers = HeaderMap::new();

    let mut cookies = Vec::new();
    if !config.csrf_token.is_empty() {
        cookies.push(format!("csrftoken={}", config.csrf_token));
    }
    if let Some(session_id) = config.session_id.as_deref().filter(|s| !s.is_empty()) {
        cookies.push(format!("sessionid={}", session_id));
    }
    if !cookies.is_empty() {
        let value = HeaderValue::from_str(&cookies.join("; "))
            .map_err(|e| BackendError::ConfigError(format!("invalid cookie value: {}", e)))?;
        headers.insert(COOKIE, value);
    }

    // Django rejects HTTPS form posts without a same-origin referer
    let referer = HeaderValue::from_str(&format!("{}/", config.base_url.trim_end_matches('/')))
        .map_err(|e| BackendError::ConfigError(format!("invalid base_url: {}", e)))?;
    headers.insert(REFERER, referer);

    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| BackendError::ConfigError(e.to_string()))
}

/// Pre-signed POST form for the single-request upload variant
#[derive(Debug, Clone, Deserialize)]
pub struct DirectUploadForm {
    pub url: String,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl DirectUploadForm {
    /// Form fields as strings, in server order
    pub fn field_pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect()
    }

    /// Object key the storage will use, with `${filename}` substituted
    pub fn object_key(&self, filename: &str) -> Option<String> {
        self.fields
            .get("key")
            .and_then(|v| v.as_str())
            .map(|key| key.replace("${filename}", filename))
            .filter(|key| !key.is_empty())
    }
}

#[derive(Deserialize)]
struct DirectUploadResponse {
    form_args: DirectUploadForm,
}

#[derive(Deserialize)]
struct PresignedUrlResponse {
    upload_url: String,
}

/// Upload-authorization operations offered by the backend
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Start a multipart upload for `filename`
    async fn create_session(&self, filename: &str) -> Result<UploadSession, BackendError>;

    /// Get a pre-signed PUT URL for one part
    async fn presign_part(
        &self,
        session: &UploadSession,
        part_number: u32,
    ) -> Result<String, BackendError>;

    /// Finalize the multipart upload with the parts in ascending order
    async fn complete(
        &self,
        session: &UploadSession,
        parts: &[PartResult],
    ) -> Result<(), BackendError>;

    /// Abandon the multipart upload
    async fn abort(&self, session: &UploadSession) -> Result<(), BackendError>;

    /// Get the pre-signed POST form for a direct upload
    async fn direct_form(&self, filename: &str) -> Result<DirectUploadForm, BackendError>;
}

/// HTTP implementation of [`UploadBackend`]
pub struct BackendClient {
    http_client: reqwest::Client,
    endpoints: Endpoints,
    csrf_token: String,
}

impl BackendClient {
    /// Create a new backend client
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            http_client: build_http_client(config)?,
            endpoints: Endpoints::new(&config.base_url, &config.language),
            csrf_token: config.csrf_token.clone(),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn post_form(&self, url: &str, extra: &[(&str, &str)]) -> Result<(), BackendError> {
        let mut form: Vec<(&str, &str)> = vec![(CSRF_FIELD, self.csrf_token.as_str())];
        form.extend_from_slice(extra);

        let response = self
            .http_client
            .post(url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;

        tracing::Span::current().record("http.status_code", response.status().as_u16());
        Ok(())
    }
}

#[async_trait]
impl UploadBackend for BackendClient {
    #[tracing::instrument(
        name = "backend.create_session",
        skip(self),
        fields(
            upload.file_name = %filename,
            upload_id = tracing::field::Empty,
            upload.chunk_size = tracing::field::Empty
        ),
        err
    )]
    async fn create_session(&self, filename: &str) -> Result<UploadSession, BackendError> {
        let session: UploadSession = self
            .http_client
            .get(self.endpoints.session(filename))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if session.chunk_size == 0 {
            return Err(BackendError::InvalidResponse(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if session.upload_id.is_empty() || session.file_key.is_empty() {
            return Err(BackendError::InvalidResponse(
                "upload_id and file_key must not be empty".into(),
            ));
        }

        let span = tracing::Span::current();
        span.record("upload_id", session.upload_id.as_str());
        span.record("upload.chunk_size", session.chunk_size);

        tracing::info!(
            upload_id = %session.upload_id,
            file_key = %session.file_key,
            chunk_size = session.chunk_size,
            "Created upload session"
        );

        Ok(session)
    }

    #[tracing::instrument(
        name = "backend.presign_part",
        skip(self, session),
        fields(upload_id = %session.upload_id, part_number = part_number),
        err
    )]
    async fn presign_part(
        &self,
        session: &UploadSession,
        part_number: u32,
    ) -> Result<String, BackendError> {
        let url = self
            .endpoints
            .presign_part(&session.upload_id, part_number, &session.file_key);

        let response: PresignedUrlResponse = self
            .http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.upload_url)
    }

    #[tracing::instrument(
        name = "backend.complete",
        skip(self, session, parts),
        fields(
            upload_id = %session.upload_id,
            parts_count = parts.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn complete(
        &self,
        session: &UploadSession,
        parts: &[PartResult],
    ) -> Result<(), BackendError> {
        let upload_parts = serde_json::to_string(parts)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        self.post_form(
            &self
                .endpoints
                .complete(&session.upload_id, &session.file_key),
            &[("upload_parts", upload_parts.as_str())],
        )
        .await?;

        tracing::info!(
            upload_id = %session.upload_id,
            parts = parts.len(),
            "Completed multipart upload"
        );
        Ok(())
    }

    #[tracing::instrument(
        name = "backend.abort",
        skip(self, session),
        fields(upload_id = %session.upload_id, http.status_code = tracing::field::Empty),
        err
    )]
    async fn abort(&self, session: &UploadSession) -> Result<(), BackendError> {
        self.post_form(
            &self.endpoints.abort(&session.upload_id, &session.file_key),
            &[],
        )
        .await?;

        tracing::info!(upload_id = %session.upload_id, "Aborted multipart upload");
        Ok(())
    }

    #[tracing::instrument(name = "backend.direct_form", skip(self), err)]
    async fn direct_form(&self, filename: &str) -> Result<DirectUploadForm, BackendError> {
        let response: DirectUploadResponse = self
            .http_client
            .get(self.endpoints.direct_form())
            .query(&[("file_name", filename)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.form_args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_client_creation() {
        let config = BackendConfig {
            csrf_token: "tok".into(),
            session_id: Some("sid".into()),
            timeout_seconds: Some(5),
            ..Default::default()
        };
        let client = BackendClient::new(&config).unwrap();
        assert!(client
            .endpoints()
            .direct_form()
            .starts_with("http://localhost:8000/en-us/"));
    }

    #[test]
    fn test_direct_form_object_key_substitutes_filename() {
        let form: DirectUploadForm = serde_json::from_value(serde_json::json!({
            "url": "https://bucket.s3.amazonaws.com/",
            "fields": {"key": "media/${filename}", "policy": "p", "x-amz-signature": "s"}
        }))
        .unwrap();

        assert_eq!(form.object_key("clip.mp4").as_deref(), Some("media/clip.mp4"));
        let names: Vec<String> = form.field_pairs().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["key", "policy", "x-amz-signature"]);
    }

    #[test]
    fn test_direct_form_without_key() {
        let form = DirectUploadForm {
            url: "https://bucket/".into(),
            fields: serde_json::Map::new(),
        };
        assert_eq!(form.object_key("a.txt"), None);
    }
}
