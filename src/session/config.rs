use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::speech::Language;

/// Configuration for the dictation controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Language used when a start request does not name one
    pub language: Language,

    /// How long to wait after stop for a last in-flight final result
    /// Default: 500ms
    pub grace_window: Duration,

    /// Capacity of the controller's event queue
    pub inbox_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            language: Language::Mixed,
            grace_window: Duration::from_millis(500),
            inbox_capacity: 128,
        }
    }
}
