use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Dictation control
        .route("/dictation/start", post(handlers::start_dictation))
        .route("/dictation/stop", post(handlers::stop_dictation))
        // Dictation queries
        .route("/dictation/status", get(handlers::get_dictation_status))
        .route("/dictation/transcripts", get(handlers::get_transcripts))
        // Environment
        .route(
            "/environment",
            get(handlers::get_environment).put(handlers::set_environment),
        )
        // Request logging, and CORS for the web UI served from the dev endpoint
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
