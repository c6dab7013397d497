use super::state::{AppState, SurfacedError};
use crate::bridge::BridgeRequest;
use crate::environment::{EnvironmentPreference, ResolutionStatus, ResolvedEnvironment};
use crate::error::DictationError;
use crate::session::{
    FinishedTranscript, Generation, SessionStatus, StartOutcome, StopOutcome, TranscriptSnapshot,
};
use crate::speech::{BackendKind, Language};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartDictationRequest {
    /// Language for this session (default: configured language)
    pub language: Option<Language>,
}

#[derive(Debug, Serialize)]
pub struct StartDictationResponse {
    pub generation: Generation,
    pub backend: BackendKind,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct StopDictationResponse {
    pub generation: Generation,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct TranscriptsResponse {
    pub transcripts: Vec<FinishedTranscript>,
    pub last_error: Option<SurfacedError>,
}

#[derive(Debug, Deserialize)]
pub struct SetEnvironmentRequest {
    pub preference: EnvironmentPreference,
}

#[derive(Debug, Serialize)]
pub struct EnvironmentResponse {
    pub preference: EnvironmentPreference,
    pub status: ResolutionStatus,
    pub resolved: Option<ResolvedEnvironment>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
}

fn conflict(message: String, status: SessionStatus) -> Response {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: message,
            code: None,
            status: Some(status),
        }),
    )
        .into_response()
}

fn dictation_error(error: DictationError) -> Response {
    let status = match &error {
        DictationError::BackendUnavailable(_) | DictationError::SessionClosed => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        DictationError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        DictationError::StartTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        DictationError::TransientRecognition(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: Some(error.code()),
            status: None,
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /dictation/start
/// Start a capture session
pub async fn start_dictation(
    State(state): State<AppState>,
    body: Option<Json<StartDictationRequest>>,
) -> Response {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    match state.dictation.start(req.language).await {
        Ok(StartOutcome::Started {
            generation,
            backend,
        }) => {
            info!(%generation, %backend, "Dictation started via HTTP");
            (
                StatusCode::OK,
                Json(StartDictationResponse {
                    generation,
                    backend,
                    status: SessionStatus::Listening,
                }),
            )
                .into_response()
        }
        Ok(StartOutcome::AlreadyActive { status }) => {
            conflict(format!("Dictation session is already {}", status), status)
        }
        Err(e) => {
            warn!("Failed to start dictation: {}", e);
            dictation_error(e)
        }
    }
}

/// POST /dictation/stop
/// Stop capture; the transcript is delivered after the grace window
pub async fn stop_dictation(State(state): State<AppState>) -> Response {
    match state.dictation.stop().await {
        Ok(StopOutcome::Finalizing { generation }) => {
            info!(%generation, "Dictation stopped via HTTP");
            (
                StatusCode::OK,
                Json(StopDictationResponse {
                    generation,
                    status: SessionStatus::Finalizing,
                }),
            )
                .into_response()
        }
        Ok(StopOutcome::NotListening { status }) => {
            conflict(format!("Dictation session is {}, not listening", status), status)
        }
        Err(e) => dictation_error(e),
    }
}

/// GET /dictation/status
/// Live transcript snapshot
pub async fn get_dictation_status(State(state): State<AppState>) -> Json<TranscriptSnapshot> {
    Json(state.dictation.snapshot())
}

/// GET /dictation/transcripts
/// Finished transcripts, most recent first
pub async fn get_transcripts(State(state): State<AppState>) -> Json<TranscriptsResponse> {
    let history = state.history.read().await;
    Json(TranscriptsResponse {
        transcripts: history.entries(),
        last_error: history.last_error(),
    })
}

/// GET /environment
/// Current preference and resolution
pub async fn get_environment(State(state): State<AppState>) -> Json<EnvironmentResponse> {
    let resolver = state.resolver.lock().await;
    Json(EnvironmentResponse {
        preference: resolver.preference(),
        status: resolver.status(),
        resolved: resolver.resolved().cloned(),
    })
}

/// PUT /environment
/// Change the preference and resolve again immediately
pub async fn set_environment(
    State(state): State<AppState>,
    Json(req): Json<SetEnvironmentRequest>,
) -> Json<EnvironmentResponse> {
    let resolved = {
        let mut resolver = state.resolver.lock().await;
        resolver.set_preference(req.preference).await
    };

    if let Some(host) = &state.host {
        let request = BridgeRequest::SetEnvironmentPreference {
            preference: req.preference,
        };
        if let Err(e) = host.post(request).await {
            warn!(host = host.name(), "Failed to forward environment preference: {:#}", e);
        }
    }

    Json(EnvironmentResponse {
        preference: req.preference,
        status: resolved.status,
        resolved: Some(resolved),
    })
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
