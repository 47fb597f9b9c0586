//! Chunked multipart upload
//!
//! Parts go out strictly one after another: part N+1 is not requested until
//! part N's PUT has resolved.
//!
//! # Flow
//!
//! 1. Ask the backend for a session (`upload_id`, `file_key`, `chunk_size`)
//! 2. For each part: get a pre-signed URL, PUT the bytes, keep the ETag
//! 3. All parts stored: complete. Any part failed: abort.
//!
//! Cancellation is checked between steps. A session request that is already
//! in flight is allowed to finish and the new session is then aborted.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use skylibrary_uploadr::backend::BackendClient;
//! use skylibrary_uploadr::config::BackendConfig;
//! use skylibrary_uploadr::storage::ObjectStorageClient;
//! use skylibrary_uploadr::upload::{ChunkedUploader, FileSource, NoopPresenter, Uploader};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(BackendClient::new(&BackendConfig::default())?);
//! let store = Arc::new(ObjectStorageClient::new(None)?);
//! let uploader = ChunkedUploader::new(backend, store);
//!
//! let source = FileSource::open("clip.mp4").await?;
//! let outcome = uploader
//!     .upload(&source, &NoopPresenter, &CancellationToken::new())
//!     .await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

use super::{
    ChunkPlan, ChunkSource, PartError, PartResult, ProgressTracker, UploadError, UploadOutcome,
    UploadPresenter, UploadSession, UploadState, Uploader,
};
use crate::backend::UploadBackend;
use crate::metrics;
use crate::storage::PartStore;
use crate::upload::plan::Chunk;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const MODE: &str = "chunked";

/// Multipart upload orchestrator
pub struct ChunkedUploader {
    backend: Arc<dyn UploadBackend>,
    store: Arc<dyn PartStore>,
}

impl ChunkedUploader {
    pub fn new(backend: Arc<dyn UploadBackend>, store: Arc<dyn PartStore>) -> Self {
        Self { backend, store }
    }

    /// Presign and store one part
    #[tracing::instrument(
        name = "upload.chunked.part",
        skip(self, session, source),
        fields(
            upload_id = %session.upload_id,
            part_number = chunk.part_number,
            upload.bytes = chunk.len()
        ),
        err
    )]
    async fn upload_part(
        &self,
        session: &UploadSession,
        source: &dyn ChunkSource,
        chunk: Chunk,
    ) -> Result<PartResult, PartError> {
        let body = source.read_range(chunk.start, chunk.end).await?;
        let url = self.backend.presign_part(session, chunk.part_number).await?;
        let etag = self.store.put_part(&url, body).await?;

        Ok(PartResult::new(chunk.part_number, &etag))
    }

    /// Release a session a newer selection replaced. Presenter is left alone.
    async fn abandon(&self, session: &UploadSession) -> UploadOutcome {
        tracing::info!(upload_id = %session.upload_id, "Upload cancelled, aborting session");
        metrics::record_upload_cancelled(MODE);
        metrics::record_abort();

        if let Err(e) = self.backend.abort(session).await {
            tracing::warn!(upload_id = %session.upload_id, error = %e, "Abort after cancel failed");
        }
        UploadOutcome::Cancelled
    }
}

#[async_trait]
impl Uploader for ChunkedUploader {
    fn mode(&self) -> &'static str {
        MODE
    }

    #[tracing::instrument(
        name = "upload.chunked",
        skip(self, source, presenter, cancel),
        fields(
            upload.file_name = %source.name(),
            upload.size = source.size(),
            upload_id = tracing::field::Empty,
            parts_count = tracing::field::Empty
        ),
        err
    )]
    async fn upload(
        &self,
        source: &dyn ChunkSource,
        presenter: &dyn UploadPresenter,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        let start_time = Instant::now();

        if cancel.is_cancelled() {
            return Ok(UploadOutcome::Cancelled);
        }

        // Not raced against cancel; a session opened after cancel is aborted
        let session = match self.backend.create_session(source.name()).await {
            Ok(session) => session,
            Err(_) if cancel.is_cancelled() => {
                metrics::record_upload_cancelled(MODE);
                return Ok(UploadOutcome::Cancelled);
            }
            Err(e) => {
                metrics::record_upload_failure(MODE);
                presenter.on_state(UploadState::Error);
                return Err(UploadError::Session(e));
            }
        };
        if cancel.is_cancelled() {
            return Ok(self.abandon(&session).await);
        }

        let span = tracing::Span::current();
        span.record("upload_id", session.upload_id.as_str());

        let plan = match ChunkPlan::new(source.size(), session.chunk_size) {
            Ok(plan) => plan,
            Err(e) => {
                metrics::record_upload_failure(MODE);
                metrics::record_abort();
                if let Err(abort_err) = self.backend.abort(&session).await {
                    tracing::warn!(error = %abort_err, "Abort of unusable session failed");
                }
                presenter.on_state(UploadState::Error);
                return Err(e);
            }
        };
        span.record("parts_count", plan.total_parts());

        let mut progress = ProgressTracker::new(plan.total_parts());
        presenter.on_state(UploadState::Uploading);
        presenter.on_progress(progress.percent());

        let mut parts = Vec::with_capacity(plan.total_parts() as usize);
        let mut failure: Option<(u32, PartError)> = None;

        for chunk in plan.chunks() {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(self.abandon(&session).await),
                result = self.upload_part(&session, source, chunk) => result,
            };

            match result {
                Ok(part) => {
                    metrics::record_part(true);
                    parts.push(part);
                    presenter.on_progress(progress.advance());
                }
                Err(e) => {
                    metrics::record_part(false);
                    failure = Some((chunk.part_number, e));
                    break;
                }
            }
        }

        if cancel.is_cancelled() {
            return Ok(self.abandon(&session).await);
        }

        presenter.on_progress(progress.finish());
        metrics::record_upload_duration(MODE, start_time.elapsed().as_secs_f64());

        match failure {
            None => {
                if let Err(e) = self.backend.complete(&session, &parts).await {
                    metrics::record_upload_failure(MODE);
                    presenter.on_state(UploadState::Error);
                    return Err(UploadError::Finalize(e));
                }

                metrics::record_upload_success(MODE, plan.size());
                presenter.on_state(UploadState::Uploaded {
                    file_key: session.file_key.clone(),
                });

                tracing::info!(
                    upload_id = %session.upload_id,
                    file_key = %session.file_key,
                    parts = parts.len(),
                    duration_ms = start_time.elapsed().as_millis(),
                    "Chunked upload completed"
                );

                Ok(UploadOutcome::Uploaded {
                    file_key: session.file_key,
                    parts,
                })
            }
            Some((part_number, e)) => {
                metrics::record_upload_failure(MODE);
                presenter.on_state(UploadState::Error);

                tracing::error!(
                    upload_id = %session.upload_id,
                    part_number = part_number,
                    error = %e,
                    "Part upload failed, aborting"
                );

                metrics::record_abort();
                if let Err(abort_err) = self.backend.abort(&session).await {
                    tracing::warn!(
                        upload_id = %session.upload_id,
                        error = %abort_err,
                        "Abort request failed"
                    );
                }

                Ok(UploadOutcome::Failed {
                    file_key: session.file_key,
                    failed_part: Some(part_number),
                    reason: e.to_string(),
                })
            }
        }
    }
}
