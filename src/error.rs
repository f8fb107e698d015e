//! Error types for Guildgate
//!
//! This module defines the error types used throughout the service,
//! using `thiserror` for ergonomic error handling.
//!
//! Two layers exist:
//!
//! - [`GuildgateError`] covers startup concerns (configuration, binding the
//!   listener, connecting to the gateway). It flows through the crate-wide
//!   [`Result`] alias backed by `anyhow`.
//! - [`VerificationError`] is the request-boundary taxonomy of the
//!   verification flow. Each variant maps to an HTTP status and a plain-text
//!   body via [`IntoResponse`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::discord::roles::GrantError;
use crate::oauth::ExchangeError;

/// Main error type for Guildgate startup and wiring
#[derive(Error, Debug)]
pub enum GuildgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors (bind, serve)
    #[error("Server error: {0}")]
    Server(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Guildgate startup operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Failures of the verification flow, surfaced at the HTTP boundary.
///
/// None of these are retried. The handler logs the error and converts it to
/// a status code plus a human-readable body.
#[derive(Error, Debug)]
pub enum VerificationError {
    /// The `state` is unknown, expired, or not valid for this stage.
    #[error("invalid or expired verification request")]
    InvalidOrExpiredRequest,

    /// The Discord account that logged in is not the one the link was issued for.
    #[error("identity mismatch: expected {expected}, authenticated as {actual}")]
    IdentityMismatch {
        /// Subject id bound to the token
        expected: String,
        /// Id reported by the provider profile
        actual: String,
    },

    /// The provider redirected back with an `error` instead of a code.
    #[error("authorization denied by {provider}: {reason}")]
    AuthorizationDenied {
        /// Provider display name
        provider: String,
        /// The `error` query value
        reason: String,
    },

    /// A required query or body parameter was absent.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// Token exchange or profile fetch failed.
    #[error(transparent)]
    ProviderExchange(#[from] ExchangeError),

    /// The submission scored below the passing threshold.
    #[error("quiz not passed: {correct} correct, {required} required")]
    QuizFailed {
        /// Number of correct answers counted
        correct: usize,
        /// Passing threshold
        required: usize,
    },

    /// The submission body could not be scored.
    #[error("malformed quiz submission: {0}")]
    MalformedSubmission(String),

    /// Guild, member, or role lookup failed at grant time.
    #[error("guild resource not found: {0}")]
    GuildResourceNotFound(GrantError),

    /// Discord rejected the role application.
    #[error("role grant failed: {0}")]
    GrantFailed(GrantError),
}

impl From<GrantError> for VerificationError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::ApplyFailed { .. } => Self::GrantFailed(err),
            _ => Self::GuildResourceNotFound(err),
        }
    }
}

impl VerificationError {
    /// Returns the HTTP status code for this error.
    ///
    /// - Client-side problems (bad state, mismatch, denied, failed quiz): 400
    /// - Provider and guild failures: 500
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidOrExpiredRequest
            | Self::IdentityMismatch { .. }
            | Self::AuthorizationDenied { .. }
            | Self::MissingParameter(_)
            | Self::QuizFailed { .. }
            | Self::MalformedSubmission(_) => StatusCode::BAD_REQUEST,
            Self::ProviderExchange(_)
            | Self::GuildResourceNotFound(_)
            | Self::GrantFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body shown to the end user. Never includes provider payloads.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidOrExpiredRequest => "Invalid or expired verification request",
            Self::IdentityMismatch { .. } => "Discord account verification failed",
            Self::AuthorizationDenied { .. } => "Authorization was denied",
            Self::MissingParameter(_) => "Missing required parameter",
            Self::ProviderExchange(_) => "Authentication failed",
            Self::QuizFailed { .. } => "Quiz not passed",
            Self::MalformedSubmission(_) => "Invalid quiz submission",
            Self::GuildResourceNotFound(GrantError::RoleNotFound(_)) => "Verified role not found",
            Self::GuildResourceNotFound(_) | Self::GrantFailed(_) => "Verification failed",
        }
    }
}

impl IntoResponse for VerificationError {
    fn into_response(self) -> Response {
        (self.status_code(), self.public_message()).into_response()
    }
}
