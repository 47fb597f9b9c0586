//! SkyLibrary Uploadr Library
//!
//! Client side of the SkyLibrary media upload flow. Files go straight to object
//! storage through URLs the backend has pre-signed; the backend only hands out
//! sessions and signatures.
//!
//! # Features
//!
//! - **Chunked Upload**: S3 multipart upload, one pre-signed PUT per part
//! - **Direct Upload**: single pre-signed POST form for small files
//! - **Form Adapter**: hidden file-key field, progress and stale-run protection
//! - **Page Actions**: search, rating, comments, reports, votes and downloads
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use skylibrary_uploadr::{
//!     backend::BackendClient, config::Config, storage::ObjectStorageClient,
//!     upload::{ChunkedUploader, FileSource, NoopPresenter, Uploader},
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let backend = Arc::new(BackendClient::new(&config.backend)?);
//!     let store = Arc::new(ObjectStorageClient::new(config.backend.timeout())?);
//!
//!     let uploader = ChunkedUploader::new(backend, store);
//!     let source = FileSource::open("clip.mp4").await?;
//!     uploader
//!         .upload(&source, &NoopPresenter, &CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod form;
pub mod metrics;
pub mod page;
pub mod storage;
pub mod telemetry;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use form::UploadForm;
pub use upload::{UploadOutcome, UploadState, Uploader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
