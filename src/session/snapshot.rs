use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stale::Generation;
use super::transcript::SessionStatus;
use crate::error::DictationError;
use crate::speech::{BackendKind, Language};

/// Live view of the transcript session, published after every change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSnapshot {
    pub status: SessionStatus,

    pub generation: Generation,

    /// Finalized text for the current generation
    pub final_text: String,

    /// Best-effort text not yet finalized
    pub interim_text: String,

    /// Backend in use for the current generation
    pub backend: Option<BackendKind>,

    /// Number of stale events dropped so far
    pub stale_discarded: u64,
}

impl TranscriptSnapshot {
    /// Text as it should be rendered live
    pub fn display_text(&self) -> String {
        format!("{}{}", self.final_text, self.interim_text)
    }
}

/// A completed dictation, delivered exactly once per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedTranscript {
    pub id: Uuid,

    pub generation: Generation,

    pub text: String,

    pub backend: Option<BackendKind>,

    pub language: Language,

    pub finished_at: DateTime<Utc>,
}

impl FinishedTranscript {
    pub fn new(
        generation: Generation,
        text: String,
        backend: Option<BackendKind>,
        language: Language,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            text,
            backend,
            language,
            finished_at: Utc::now(),
        }
    }
}

/// Outcome of a session, sent to the caller at most once per generation
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Finished(FinishedTranscript),
    Failed {
        generation: Generation,
        error: DictationError,
    },
}
