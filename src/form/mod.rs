//! Upload form adapter
//!
//! Models the create/update media form around an [`Uploader`]: the raw file
//! input, the hidden file-key field, the "clear previous file" checkbox and the
//! disabled state of the inputs.
//!
//! Every file selection starts a new generation. The previous run is cancelled
//! and any update it still emits is dropped, so only the newest selection can
//! touch the form.

use crate::upload::{
    ChunkSource, UploadError, UploadOutcome, UploadPresenter, UploadState, Uploader,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Visible and hidden form values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFields {
    pub status: UploadState,
    /// `None` until the first progress report of a run
    pub percent: Option<u8>,
    /// Name of the file held by the raw file input
    pub selected_file: Option<String>,
    /// Hidden field read by the form submission
    pub file_key: String,
    pub clear_previous: bool,
    /// File input and submit button disabled
    pub inputs_disabled: bool,
}

impl Default for FormFields {
    fn default() -> Self {
        Self {
            status: UploadState::Waiting,
            percent: None,
            selected_file: None,
            file_key: String::new(),
            clear_previous: false,
            inputs_disabled: false,
        }
    }
}

/// Values the form submits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub file_key: String,
    pub clear_previous: bool,
}

struct FormInner {
    fields: FormFields,
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl FormInner {
    fn apply_state(&mut self, state: &UploadState) {
        match state {
            UploadState::Waiting => {
                self.fields.percent = None;
                self.fields.inputs_disabled = false;
            }
            UploadState::Uploading => {
                self.fields.file_key.clear();
                self.fields.inputs_disabled = true;
            }
            UploadState::Uploaded { file_key } => {
                self.fields.file_key = file_key.clone();
                self.fields.inputs_disabled = false;
            }
            UploadState::Error => {
                self.fields.selected_file = None;
                self.fields.file_key.clear();
                self.fields.inputs_disabled = false;
            }
        }
        self.fields.status = state.clone();
    }
}

/// Presenter handed to one run; writes only while its generation is current.
///
/// The observer must not call back into the form.
struct GenerationPresenter {
    inner: Arc<Mutex<FormInner>>,
    generation: u64,
    observer: Arc<dyn UploadPresenter>,
}

impl UploadPresenter for GenerationPresenter {
    fn on_progress(&self, percent: u8) {
        let mut inner = self.inner.lock();
        if inner.generation != self.generation {
            tracing::debug!(generation = self.generation, "Dropping stale progress");
            return;
        }
        inner.fields.percent = Some(percent);
        // Observer runs under the lock so a newer selection cannot interleave
        self.observer.on_progress(percent);
    }

    fn on_state(&self, state: UploadState) {
        let mut inner = self.inner.lock();
        if inner.generation != self.generation {
            tracing::debug!(generation = self.generation, "Dropping stale state");
            return;
        }
        inner.apply_state(&state);
        self.observer.on_state(state);
    }
}

/// Upload form bound to an uploader
pub struct UploadForm {
    inner: Arc<Mutex<FormInner>>,
    uploader: Arc<dyn Uploader>,
    observer: Arc<dyn UploadPresenter>,
}

impl UploadForm {
    /// `observer` receives the same updates the form applies to itself
    pub fn new(uploader: Arc<dyn Uploader>, observer: Arc<dyn UploadPresenter>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FormInner {
                fields: FormFields::default(),
                generation: 0,
                cancel: None,
            })),
            uploader,
            observer,
        }
    }

    /// Snapshot of the current form values
    pub fn fields(&self) -> FormFields {
        self.inner.lock().fields.clone()
    }

    /// Tick or untick the "clear previous file" checkbox
    pub fn set_clear_previous(&self, checked: bool) {
        self.inner.lock().fields.clear_previous = checked;
    }

    /// Handle a change of the file input.
    ///
    /// Cancels any running upload. An empty selection resets the form and
    /// returns `None`; otherwise the first file is uploaded on a new task.
    pub fn select(
        &self,
        files: Vec<Arc<dyn ChunkSource>>,
    ) -> Option<JoinHandle<Result<UploadOutcome, UploadError>>> {
        let mut inner = self.inner.lock();

        if let Some(previous) = inner.cancel.take() {
            previous.cancel();
        }
        inner.generation += 1;
        let generation = inner.generation;

        inner.fields.file_key.clear();
        inner.fields.percent = None;

        let Some(source) = files.into_iter().next() else {
            inner.fields.selected_file = None;
            inner.apply_state(&UploadState::Waiting);
            drop(inner);

            tracing::debug!("File selection cleared");
            self.observer.on_state(UploadState::Waiting);
            return None;
        };

        inner.fields.selected_file = Some(source.name().to_string());
        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());
        drop(inner);

        tracing::info!(
            generation = generation,
            file = %source.name(),
            mode = self.uploader.mode(),
            "Starting upload"
        );

        let presenter = GenerationPresenter {
            inner: self.inner.clone(),
            generation,
            observer: self.observer.clone(),
        };
        let uploader = self.uploader.clone();

        Some(tokio::spawn(async move {
            uploader
                .upload(source.as_ref(), &presenter, &cancel)
                .await
        }))
    }

    /// Cancel the running upload, if any, without touching the fields
    pub fn cancel(&self) {
        if let Some(cancel) = self.inner.lock().cancel.take() {
            cancel.cancel();
        }
    }

    /// Cancel the running upload and wait for its task to finish, so the
    /// abort request has been sent before this returns.
    pub async fn cancel_and_wait(&self, handle: JoinHandle<Result<UploadOutcome, UploadError>>) {
        self.cancel();
        match handle.await {
            Ok(Ok(outcome)) => tracing::debug!(?outcome, "Upload task stopped"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Upload task stopped with error"),
            Err(e) => tracing::warn!(error = %e, "Upload task did not finish cleanly"),
        }
    }

    /// Values to submit with the form.
    ///
    /// A non-empty file key forces "clear previous file" on so the backend
    /// replaces the stored file. The raw file input is always emptied.
    pub fn prepare_submit(&self) -> Submission {
        let mut inner = self.inner.lock();

        if !inner.fields.file_key.is_empty() {
            inner.fields.clear_previous = true;
        }
        inner.fields.selected_file = None;

        Submission {
            file_key: inner.fields.file_key.clone(),
            clear_previous: inner.fields.clear_previous,
        }
    }
}

impl Drop for UploadForm {
    fn drop(&mut self) {
        self.cancel();
    }
}
