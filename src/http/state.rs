use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bridge::HostBridge;
use crate::environment::BackendResolver;
use crate::session::{DictationHandle, FinishedTranscript, Generation, SessionNotice};

/// Number of finished transcripts kept for `GET /dictation/transcripts`
pub const HISTORY_CAPACITY: usize = 50;

/// Last error surfaced to the user
#[derive(Debug, Clone, Serialize)]
pub struct SurfacedError {
    pub generation: Generation,
    pub code: &'static str,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Finished transcripts, most recent first
#[derive(Debug, Default)]
pub struct TranscriptHistory {
    entries: VecDeque<FinishedTranscript>,
    last_error: Option<SurfacedError>,
}

impl TranscriptHistory {
    pub fn record(&mut self, notice: SessionNotice) {
        match notice {
            SessionNotice::Finished(transcript) => {
                self.entries.push_front(transcript);
                self.entries.truncate(HISTORY_CAPACITY);
            }
            SessionNotice::Failed { generation, error } => {
                self.last_error = Some(SurfacedError {
                    generation,
                    code: error.code(),
                    message: error.to_string(),
                    at: Utc::now(),
                });
            }
        }
    }

    pub fn entries(&self) -> Vec<FinishedTranscript> {
        self.entries.iter().cloned().collect()
    }

    pub fn last_error(&self) -> Option<SurfacedError> {
        self.last_error.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub dictation: DictationHandle,

    pub history: Arc<RwLock<TranscriptHistory>>,

    /// Held across the probe so concurrent preference changes serialize
    pub resolver: Arc<Mutex<BackendResolver>>,

    /// Host to notify when the environment preference changes
    pub host: Option<Arc<dyn HostBridge>>,
}

impl AppState {
    pub fn new(dictation: DictationHandle, resolver: BackendResolver) -> Self {
        Self {
            dictation,
            history: Arc::new(RwLock::new(TranscriptHistory::default())),
            resolver: Arc::new(Mutex::new(resolver)),
            host: None,
        }
    }

    pub fn with_host(mut self, host: Arc<dyn HostBridge>) -> Self {
        self.host = Some(host);
        self
    }

    /// Drain session notices into the history until the controller exits.
    pub fn collect_notices(&self, mut notices: mpsc::UnboundedReceiver<SessionNotice>) -> JoinHandle<()> {
        let history = Arc::clone(&self.history);
        tokio::spawn(async move {
            while let Some(notice) = notices.recv().await {
                history.write().await.record(notice);
            }
            debug!("Session notice stream closed");
        })
    }
}
