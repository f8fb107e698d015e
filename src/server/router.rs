//! Route table

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// Builds the service router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/verify/:subject_id", get(handlers::start_verification))
        .route("/callback", get(handlers::discord_callback))
        .route("/callback/github-callback", get(handlers::github_callback))
        .route("/submit-quiz", post(handlers::submit_quiz))
        .route("/success", get(handlers::success_page))
        .route("/failure", get(handlers::failure_page))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
