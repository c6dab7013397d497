use serde::{Deserialize, Serialize};

use crate::environment::EnvironmentPreference;

/// Request sent from this process to the host platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BridgeRequest {
    /// `{"action":"start","language":"en-US"}`
    Start { language: String },
    /// `{"action":"stop"}`
    Stop,
    /// `{"action":"setEnvironmentPreference","preference":"auto"}`
    SetEnvironmentPreference { preference: EnvironmentPreference },
}

/// Callback invoked by the host platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BridgeCallback {
    /// Host confirmed capture started (`onStarted()`)
    Started,
    /// Recognition result (`onResult({transcript, isFinal})`)
    Result {
        transcript: String,
        #[serde(rename = "isFinal")]
        is_final: bool,
    },
    /// Host-side failure (`onError(message)`)
    Error { message: String },
}
