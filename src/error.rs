//! Error taxonomy for dictation sessions.

use std::time::Duration;

/// Errors surfaced by speech backends and the dictation controller.
///
/// Every variant terminates the session it belongs to. Nothing is retried
/// within the same generation; the caller starts a fresh session instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DictationError {
    /// No usable recognition capability on this platform.
    #[error("speech backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The user has to grant microphone / speech access first.
    #[error("speech permission denied: {0}")]
    PermissionDenied(String),

    /// The engine failed mid-session.
    #[error("recognition failed: {0}")]
    TransientRecognition(String),

    /// The host bridge never confirmed the start request.
    #[error("host bridge did not confirm start within {}ms", .0.as_millis())]
    StartTimeout(Duration),

    /// The controller task has shut down.
    #[error("dictation session is closed")]
    SessionClosed,
}

impl DictationError {
    /// Classify an error message or code reported by a recognizer or by the
    /// host platform.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();

        const PERMISSION: [&str; 5] = [
            "not-allowed",
            "service-not-allowed",
            "denied",
            "not authorized",
            "permission",
        ];
        const UNAVAILABLE: [&str; 4] = [
            "audio-capture",
            "unavailable",
            "not available",
            "not supported",
        ];

        if PERMISSION.iter().any(|needle| lower.contains(needle)) {
            DictationError::PermissionDenied(message.to_string())
        } else if UNAVAILABLE.iter().any(|needle| lower.contains(needle)) {
            DictationError::BackendUnavailable(message.to_string())
        } else {
            DictationError::TransientRecognition(message.to_string())
        }
    }

    /// Short machine-readable label, used in API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            DictationError::BackendUnavailable(_) => "backend_unavailable",
            DictationError::PermissionDenied(_) => "permission_denied",
            DictationError::TransientRecognition(_) => "transient_recognition",
            DictationError::StartTimeout(_) => "start_timeout",
            DictationError::SessionClosed => "session_closed",
        }
    }
}
