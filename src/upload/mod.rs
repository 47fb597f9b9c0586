//! Upload module
//!
//! Drives a file from selection to a stored object. Two strategies implement
//! [`Uploader`]:
//!
//! - [`chunked::ChunkedUploader`]: multipart upload, one pre-signed PUT per part
//! - [`direct::DirectUploader`]: a single pre-signed POST form
//!
//! Both report through an [`UploadPresenter`] and stop when their
//! [`CancellationToken`] fires.

use crate::backend::BackendError;
use crate::storage::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod chunked;
pub mod direct;
pub mod plan;
pub mod source;

pub use chunked::ChunkedUploader;
pub use direct::DirectUploader;
pub use plan::{Chunk, ChunkPlan, ProgressTracker};
pub use source::{ChunkSource, FileSource, MemorySource};

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to start upload session: {0}")]
    Session(#[source] BackendError),

    #[error("Failed to complete upload: {0}")]
    Finalize(#[source] BackendError),

    #[error("Invalid chunk size {0}")]
    InvalidChunkSize(u64),

    #[error("File needs {0} parts, more than part numbers allow")]
    TooManyParts(u64),
}

/// Why a single part did not make it to storage
#[derive(Error, Debug)]
pub enum PartError {
    #[error("Failed to read source: {0}")]
    Source(#[from] std::io::Error),

    #[error("Failed to get part URL: {0}")]
    Presign(#[from] BackendError),

    #[error("Failed to store part: {0}")]
    Store(#[from] StorageError),
}

/// Multipart session handed out by the backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadSession {
    pub upload_id: String,
    pub file_key: String,
    pub chunk_size: u64,
}

/// A stored part, serialized the way the completion route expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartResult {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

impl PartResult {
    /// Build a part result from the raw `ETag` header value
    pub fn new(part_number: u32, raw_etag: &str) -> Self {
        Self {
            part_number,
            etag: strip_etag_quotes(raw_etag),
        }
    }
}

/// Remove every double-quote character from an `ETag` header value
pub fn strip_etag_quotes(raw: &str) -> String {
    raw.replace('"', "")
}

/// Upload status shown next to the file input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Waiting,
    Uploading,
    Uploaded { file_key: String },
    Error,
}

impl UploadState {
    /// Status text for the form
    pub fn label(&self) -> &'static str {
        match self {
            UploadState::Waiting => "Waiting for file",
            UploadState::Uploading => "Uploading",
            UploadState::Uploaded { .. } => "Uploaded",
            UploadState::Error => "Error",
        }
    }

    /// Inputs stay disabled only while an upload is running
    pub fn is_busy(&self) -> bool {
        matches!(self, UploadState::Uploading)
    }
}

/// Terminal result of one upload run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Object stored and the backend notified
    Uploaded {
        file_key: String,
        parts: Vec<PartResult>,
    },
    /// A transfer failed; the multipart upload (if any) was aborted
    Failed {
        file_key: String,
        failed_part: Option<u32>,
        reason: String,
    },
    /// A newer selection replaced this run
    Cancelled,
}

/// Presentation adapter for an upload run
pub trait UploadPresenter: Send + Sync {
    fn on_progress(&self, percent: u8);
    fn on_state(&self, state: UploadState);
}

/// Presenter that ignores every update
pub struct NoopPresenter;

impl UploadPresenter for NoopPresenter {
    fn on_progress(&self, _percent: u8) {}
    fn on_state(&self, _state: UploadState) {}
}

/// Upload strategy
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Metric label for this strategy
    fn mode(&self) -> &'static str;

    /// Upload `source`, reporting to `presenter`, until done or `cancel` fires
    async fn upload(
        &self,
        source: &dyn ChunkSource,
        presenter: &dyn UploadPresenter,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_etag_quotes() {
        assert_eq!(strip_etag_quotes("\"abc123\""), "abc123");
        assert_eq!(strip_etag_quotes("W/\"a\"b\""), "W/ab");
        assert_eq!(strip_etag_quotes("plain"), "plain");
    }

    #[test]
    fn test_part_result_serializes_for_completion() {
        let parts = vec![PartResult::new(1, "\"e1\""), PartResult::new(2, "\"e2\"")];
        let json = serde_json::to_string(&parts).unwrap();
        assert_eq!(
            json,
            r#"[{"PartNumber":1,"ETag":"e1"},{"PartNumber":2,"ETag":"e2"}]"#
        );
    }

    #[test]
    fn test_session_deserializes() {
        let session: UploadSession = serde_json::from_str(
            r#"{"upload_id":"u-1","file_key":"media/a.mp4","chunk_size":5242880}"#,
        )
        .unwrap();
        assert_eq!(session.chunk_size, 5 * 1024 * 1024);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(UploadState::Waiting.label(), "Waiting for file");
        assert!(UploadState::Uploading.is_busy());
        assert!(!UploadState::Uploaded {
            file_key: "k".into()
        }
        .is_busy());
    }
}
