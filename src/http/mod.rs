//! HTTP API server for external control
//!
//! This module provides a REST API for the dictation session:
//! - POST /dictation/start - Start a capture session
//! - POST /dictation/stop - Stop capture and finalize after the grace window
//! - GET /dictation/status - Live transcript snapshot
//! - GET /dictation/transcripts - Finished transcripts and last error
//! - GET /environment - Resolved dev/prod endpoint
//! - PUT /environment - Change the environment preference
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, SurfacedError, TranscriptHistory, HISTORY_CAPACITY};
