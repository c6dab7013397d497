//! Transcript state machine.
//!
//! Lifecycle per capture cycle:
//! - Idle -> Listening (backend started)
//! - Listening -> Finalizing (stop requested, grace window running)
//! - Finalizing -> Idle (grace window elapsed or end of stream)
//! - Listening -> Idle (end of stream or hard error)
//!
//! Events tagged with any generation other than the current one are
//! discarded without touching the text buffers, and nothing mutates the
//! buffers once the session is back to Idle.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::snapshot::TranscriptSnapshot;
use super::stale::{Generation, StaleGuard};
use crate::error::DictationError;
use crate::speech::{BackendKind, SpeechEvent, SpeechEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Listening,
    Finalizing,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::Listening => write!(f, "Listening"),
            SessionStatus::Finalizing => write!(f, "Finalizing"),
        }
    }
}

impl SessionStatus {
    pub fn can_transition_to(&self, target: &SessionStatus) -> bool {
        matches!(
            (self, target),
            (SessionStatus::Idle, SessionStatus::Listening)
                | (SessionStatus::Listening, SessionStatus::Finalizing)
                | (SessionStatus::Finalizing, SessionStatus::Idle)
                | (SessionStatus::Listening, SessionStatus::Idle)
        )
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, SessionStatus::Idle)
    }
}

/// Result of feeding one backend event into the session
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// State changed (or the event was an accepted no-op such as `Started`)
    Applied,
    /// Event belongs to a superseded generation
    Stale,
    /// Current generation, but not acceptable in the current status
    Ignored,
    /// The backend finished; the session should finalize now
    EndOfStream,
    /// Hard error for the current generation
    Failed(DictationError),
}

#[derive(Debug, Default)]
pub struct TranscriptSession {
    status: SessionStatus,
    final_text: String,
    interim_text: String,
    guard: StaleGuard,
    active_backend: Option<BackendKind>,
    stale_discarded: u64,
}

impl TranscriptSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn generation(&self) -> Generation {
        self.guard.current()
    }

    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    pub fn interim_text(&self) -> &str {
        &self.interim_text
    }

    pub fn active_backend(&self) -> Option<BackendKind> {
        self.active_backend
    }

    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded
    }

    /// Open a new generation and clear both buffers. Returns `None` (and
    /// changes nothing) unless the session is Idle.
    pub fn begin(&mut self) -> Option<Generation> {
        if self.status != SessionStatus::Idle {
            return None;
        }

        let generation = self.guard.advance();
        self.final_text.clear();
        self.interim_text.clear();
        self.active_backend = None;
        Some(generation)
    }

    /// The backend for the current generation started.
    pub fn listening(&mut self, backend: BackendKind) -> bool {
        if !self.transition(SessionStatus::Listening) {
            return false;
        }
        self.active_backend = Some(backend);
        true
    }

    /// Stop was requested; only a trailing final event is admitted from now on.
    pub fn begin_finalizing(&mut self) -> bool {
        self.transition(SessionStatus::Finalizing)
    }

    pub fn apply(&mut self, event: &SpeechEvent) -> EventOutcome {
        if !self.guard.is_current(event.generation) {
            self.stale_discarded += 1;
            debug!(
                event_generation = %event.generation,
                current = %self.guard.current(),
                "Discarding stale speech event"
            );
            return EventOutcome::Stale;
        }

        if self.status == SessionStatus::Idle {
            return EventOutcome::Ignored;
        }

        match &event.kind {
            SpeechEventKind::Started => EventOutcome::Applied,
            SpeechEventKind::Partial(text) => {
                if self.status != SessionStatus::Listening {
                    return EventOutcome::Ignored;
                }
                self.interim_text.clone_from(text);
                EventOutcome::Applied
            }
            SpeechEventKind::Final(text) => {
                self.final_text.push_str(text);
                self.interim_text.clear();
                EventOutcome::Applied
            }
            SpeechEventKind::Error(error) => EventOutcome::Failed(error.clone()),
            SpeechEventKind::Ended => EventOutcome::EndOfStream,
        }
    }

    /// Close the cycle and return the assembled transcript, if non-empty.
    ///
    /// Trailing interim text is appended once; the interim buffer is cleared.
    pub fn finish(&mut self) -> Option<String> {
        if !self.status.is_active() {
            return None;
        }

        let mut text = self.final_text.clone();
        text.push_str(&self.interim_text);
        self.interim_text.clear();
        self.status = SessionStatus::Idle;

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Hard error: back to Idle without producing a transcript.
    pub fn abort(&mut self) {
        self.interim_text.clear();
        self.status = SessionStatus::Idle;
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            status: self.status,
            generation: self.guard.current(),
            final_text: self.final_text.clone(),
            interim_text: self.interim_text.clone(),
            backend: self.active_backend,
            stale_discarded: self.stale_discarded,
        }
    }

    fn transition(&mut self, target: SessionStatus) -> bool {
        if self.status.can_transition_to(&target) {
            debug!("Transcript session: {} -> {}", self.status, target);
            self.status = target;
            true
        } else {
            false
        }
    }
}
