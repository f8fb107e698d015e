//! HTTP handlers for the verification flow

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use url::Url;

use super::state::AppState;
use crate::error::VerificationError;
use crate::verification::QuizSubmission;
use crate::views;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: &'static str,
}

/// Query string of an OAuth redirect back to us.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code
    pub code: Option<String>,
    /// Verification token
    pub state: Option<String>,
    /// Set by the provider when the user declined or the request was bad
    pub error: Option<String>,
}

impl CallbackQuery {
    fn denied(&self, provider: &str) -> Option<VerificationError> {
        self.error.as_ref().map(|reason| {
            tracing::warn!(
                provider,
                reason = %reason,
                state_present = self.state.is_some(),
                "Provider reported authorization error"
            );
            VerificationError::AuthorizationDenied {
                provider: provider.to_string(),
                reason: reason.clone(),
            }
        })
    }
}

/// 302 to `url`.
fn found(url: &Url) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, url.as_str())]).into_response()
}

/// `GET /health`
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /verify/:subject_id`: issue a token and send the user to Discord.
pub async fn start_verification(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Response, VerificationError> {
    let url = state.orchestrator.start(&subject_id)?;
    Ok(found(&url))
}

/// `GET /callback`: Discord redirect; on success continue to GitHub.
pub async fn discord_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, VerificationError> {
    if let Some(err) = query.denied("discord") {
        return Err(err);
    }
    let url = state
        .orchestrator
        .complete_chat_login(query.code.as_deref(), query.state.as_deref())
        .await?;
    Ok(found(&url))
}

/// `GET /callback/github-callback`: GitHub redirect; on success render the quiz.
pub async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Html<String>, VerificationError> {
    if let Some(err) = query.denied("github") {
        return Err(err);
    }
    let view = state
        .orchestrator
        .complete_code_host_login(query.code.as_deref(), query.state.as_deref())
        .await?;
    Ok(Html(view.html))
}

/// `POST /submit-quiz`
pub async fn submit_quiz(
    State(state): State<AppState>,
    body: Result<Json<QuizSubmission>, JsonRejection>,
) -> Result<&'static str, VerificationError> {
    let Json(submission) = body.map_err(|rejection| {
        tracing::warn!(error = %rejection, "Unreadable quiz submission");
        VerificationError::MalformedSubmission(rejection.body_text())
    })?;

    state.orchestrator.submit_quiz(&submission).await?;
    Ok("Verification successful")
}

/// `GET /success`
pub async fn success_page() -> Html<String> {
    Html(views::success_page())
}

/// `GET /failure`
pub async fn failure_page() -> Html<String> {
    Html(views::failure_page())
}
