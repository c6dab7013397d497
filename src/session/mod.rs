//! Dictation session management
//!
//! This module provides the dictation capture state machine:
//! - `StaleGuard` generation counter discarding late events
//! - `TranscriptSession` merging partial and final text
//! - `DictationController` driving backends from a single event queue
//! - Grace window before finalization and exactly-once delivery

mod config;
mod controller;
mod snapshot;
mod stale;
mod transcript;

pub use config::SessionConfig;
pub use controller::{DictationController, DictationHandle, StartOutcome, StopOutcome};
pub use snapshot::{FinishedTranscript, SessionNotice, TranscriptSnapshot};
pub use stale::{Generation, StaleGuard};
pub use transcript::{EventOutcome, SessionStatus, TranscriptSession};
