//! Shared fakes for upload tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use skylibrary_uploadr::backend::{BackendError, DirectUploadForm, UploadBackend};
use skylibrary_uploadr::storage::{PartStore, StorageError};
use skylibrary_uploadr::upload::{PartResult, UploadPresenter, UploadSession, UploadState};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Everything the orchestrator asked of the backend and storage, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Session(String),
    Presign(u32),
    Put { part_number: u32, len: usize },
    Complete(Vec<PartResult>),
    Abort(String),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// In-memory backend
pub struct FakeBackend {
    pub calls: CallLog,
    pub chunk_size: u64,
    pub fail_session: bool,
    pub fail_presign: Option<u32>,
    pub fail_complete: bool,
    /// Abort is recorded only after this delay
    pub abort_delay: Option<Duration>,
    /// Cancelled while the session request is in flight
    pub cancel_on_session: Option<CancellationToken>,
    sessions: AtomicU32,
}

impl FakeBackend {
    pub fn new(calls: CallLog, chunk_size: u64) -> Self {
        Self {
            calls,
            chunk_size,
            fail_session: false,
            fail_presign: None,
            fail_complete: false,
            abort_delay: None,
            cancel_on_session: None,
            sessions: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl UploadBackend for FakeBackend {
    async fn create_session(&self, filename: &str) -> Result<UploadSession, BackendError> {
        self.calls.lock().push(Call::Session(filename.to_string()));
        if let Some(cancel) = &self.cancel_on_session {
            cancel.cancel();
            tokio::task::yield_now().await;
        }
        if self.fail_session {
            return Err(BackendError::InvalidResponse("session refused".into()));
        }
        let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(UploadSession {
            upload_id: format!("upload-{}", n),
            file_key: format!("media/{}", filename),
            chunk_size: self.chunk_size,
        })
    }

    async fn presign_part(
        &self,
        session: &UploadSession,
        part_number: u32,
    ) -> Result<String, BackendError> {
        self.calls.lock().push(Call::Presign(part_number));
        if self.fail_presign == Some(part_number) {
            return Err(BackendError::InvalidResponse("presign refused".into()));
        }
        Ok(format!("mem://{}/{}", session.upload_id, part_number))
    }

    async fn complete(
        &self,
        _session: &UploadSession,
        parts: &[PartResult],
    ) -> Result<(), BackendError> {
        self.calls.lock().push(Call::Complete(parts.to_vec()));
        if self.fail_complete {
            return Err(BackendError::InvalidResponse("complete refused".into()));
        }
        Ok(())
    }

    async fn abort(&self, session: &UploadSession) -> Result<(), BackendError> {
        if let Some(delay) = self.abort_delay {
            tokio::time::sleep(delay).await;
        }
        self.calls
            .lock()
            .push(Call::Abort(session.upload_id.clone()));
        Ok(())
    }

    async fn direct_form(&self, filename: &str) -> Result<DirectUploadForm, BackendError> {
        self.calls.lock().push(Call::Session(filename.to_string()));
        let mut fields = serde_json::Map::new();
        fields.insert("key".into(), "media/${filename}".into());
        Ok(DirectUploadForm {
            url: "mem://bucket/".into(),
            fields,
        })
    }
}

/// In-memory storage; part URLs end in the part number
pub struct FakeStore {
    pub calls: CallLog,
    pub fail_parts: HashSet<u32>,
    /// Part that waits for `release` before answering
    pub block_part: Option<u32>,
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl FakeStore {
    pub fn new(calls: CallLog) -> Self {
        Self {
            calls,
            fail_parts: HashSet::new(),
            block_part: None,
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

fn part_number_of(url: &str) -> u32 {
    url.rsplit('/')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl PartStore for FakeStore {
    async fn put_part(&self, url: &str, body: Bytes) -> Result<String, StorageError> {
        let part_number = part_number_of(url);
        self.calls.lock().push(Call::Put {
            part_number,
            len: body.len(),
        });

        if self.block_part == Some(part_number) {
            self.started.notify_one();
            self.release.notified().await;
        }
        if self.fail_parts.contains(&part_number) {
            return Err(StorageError::Status(500));
        }
        Ok(format!("\"etag-{}\"", part_number))
    }

    async fn post_form(
        &self,
        _url: &str,
        _fields: &[(String, String)],
        _file_name: &str,
        body: Bytes,
    ) -> Result<(), StorageError> {
        self.calls.lock().push(Call::Put {
            part_number: 0,
            len: body.len(),
        });
        if self.fail_parts.contains(&0) {
            return Err(StorageError::Status(403));
        }
        Ok(())
    }
}

/// Presenter event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Progress(u8),
    State(UploadState),
}

/// Presenter that records every update
#[derive(Default)]
pub struct RecordingPresenter {
    pub events: Mutex<Vec<Event>>,
}

impl RecordingPresenter {
    pub fn progress(&self) -> Vec<u8> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<UploadState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::State(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }
}

impl UploadPresenter for RecordingPresenter {
    fn on_progress(&self, percent: u8) {
        self.events.lock().push(Event::Progress(percent));
    }

    fn on_state(&self, state: UploadState) {
        self.events.lock().push(Event::State(state));
    }
}
