//! Direct upload through a pre-signed POST form
//!
//! The whole file goes to storage in one request. On success the object key is
//! taken from the signed `key` field.

use super::{
    ChunkSource, PartError, UploadError, UploadOutcome, UploadPresenter, UploadState, Uploader,
};
use crate::backend::UploadBackend;
use crate::metrics;
use crate::storage::PartStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const MODE: &str = "direct";

/// Single-request uploader
pub struct DirectUploader {
    backend: Arc<dyn UploadBackend>,
    store: Arc<dyn PartStore>,
}

impl DirectUploader {
    pub fn new(backend: Arc<dyn UploadBackend>, store: Arc<dyn PartStore>) -> Self {
        Self { backend, store }
    }

    fn fail(
        &self,
        presenter: &dyn UploadPresenter,
        file_key: String,
        reason: String,
    ) -> UploadOutcome {
        metrics::record_upload_failure(MODE);
        presenter.on_progress(100);
        presenter.on_state(UploadState::Error);
        tracing::error!(reason = %reason, "Direct upload failed");

        UploadOutcome::Failed {
            file_key,
            failed_part: None,
            reason,
        }
    }
}

#[async_trait]
impl Uploader for DirectUploader {
    fn mode(&self) -> &'static str {
        MODE
    }

    #[tracing::instrument(
        name = "upload.direct",
        skip(self, source, presenter, cancel),
        fields(upload.file_name = %source.name(), upload.size = source.size()),
        err
    )]
    async fn upload(
        &self,
        source: &dyn ChunkSource,
        presenter: &dyn UploadPresenter,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError> {
        let start_time = Instant::now();

        let form = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(UploadOutcome::Cancelled),
            result = self.backend.direct_form(source.name()) => match result {
                Ok(form) => form,
                Err(e) => {
                    metrics::record_upload_failure(MODE);
                    presenter.on_state(UploadState::Error);
                    return Err(UploadError::Session(e));
                }
            },
        };

        presenter.on_state(UploadState::Uploading);
        presenter.on_progress(0);

        let Some(file_key) = form.object_key(source.name()) else {
            return Ok(self.fail(
                presenter,
                String::new(),
                "signed form has no object key".into(),
            ));
        };

        let transfer = async {
            let body = source.read_range(0, source.size()).await?;
            self.store
                .post_form(&form.url, &form.field_pairs(), source.name(), body)
                .await?;
            Ok::<(), PartError>(())
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                metrics::record_upload_cancelled(MODE);
                return Ok(UploadOutcome::Cancelled);
            }
            result = transfer => result,
        };

        metrics::record_upload_duration(MODE, start_time.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                metrics::record_upload_success(MODE, source.size());
                presenter.on_progress(100);
                presenter.on_state(UploadState::Uploaded {
                    file_key: file_key.clone(),
                });

                tracing::info!(
                    file_key = %file_key,
                    duration_ms = start_time.elapsed().as_millis(),
                    "Direct upload completed"
                );

                Ok(UploadOutcome::Uploaded {
                    file_key,
                    parts: Vec::new(),
                })
            }
            Err(e) => Ok(self.fail(presenter, file_key, e.to_string())),
        }
    }
}
