//! Verification state machine
//!
//! One verification attempt moves through these stages:
//!
//! ```text
//! START ──issue──▶ AwaitingChatLogin ──Discord callback──▶ AwaitingCodeHostLogin
//!       ──GitHub callback──▶ Quiz ──submission──▶ PASSED (role granted) | FAILED
//! ```
//!
//! The stage lives on the token record and each hop advances it with a
//! compare-and-set, so a `state` value can drive each transition once. A
//! replayed callback finds the token in a later stage and is rejected the
//! same way as an unknown or expired token.
//!
//! The GitHub hop only proves the user could complete a GitHub login; the
//! identity behind the GitHub token is not inspected.

use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::discord::roles::RoleGrantGateway;
use crate::error::VerificationError;
use crate::oauth::{OAuthExchange, ProviderProfile};
use crate::quiz::QuizBank;
use crate::store::{Stage, TokenStore, VerificationToken};
use crate::views;

/// Providers and guild targets the orchestrator works against.
#[derive(Debug, Clone)]
pub struct VerificationSettings {
    /// Discord OAuth application (Provider A)
    pub chat_provider: ProviderProfile,
    /// GitHub OAuth application (Provider B)
    pub code_host_provider: ProviderProfile,
    /// Guild the role is granted in
    pub guild_id: String,
    /// Role granted on success
    pub role_id: String,
}

/// Body of `POST /submit-quiz`.
///
/// Field names follow the browser page (`subjectId`, `correctCount`); the
/// older `discordId` / `correctAnswers` names are accepted too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    /// Discord account id being verified
    #[serde(alias = "discordId")]
    pub subject_id: String,
    /// Correct answers as counted by the browser
    #[serde(default, alias = "correctAnswers")]
    pub correct_count: Option<usize>,
    /// Chosen option per question; scored here when present
    #[serde(default)]
    pub answers: Option<Vec<usize>>,
    /// Verification token from the quiz page; consumed on submission
    #[serde(default)]
    pub state: Option<String>,
}

/// The quiz page for a subject who finished both logins.
#[derive(Debug, Clone)]
pub struct QuizView {
    /// Subject the quiz is bound to
    pub subject_id: String,
    /// Rendered HTML
    pub html: String,
}

/// Result of a passing submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    /// Subject that was granted the role
    pub subject_id: String,
    /// Correct answers counted
    pub correct: usize,
}

/// Drives a subject from link visit to role grant.
pub struct VerificationOrchestrator {
    tokens: Arc<dyn TokenStore>,
    oauth: Arc<dyn OAuthExchange>,
    roles: Arc<dyn RoleGrantGateway>,
    quiz: Arc<QuizBank>,
    settings: VerificationSettings,
}

impl VerificationOrchestrator {
    /// Wires the orchestrator to its collaborators.
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        oauth: Arc<dyn OAuthExchange>,
        roles: Arc<dyn RoleGrantGateway>,
        quiz: Arc<QuizBank>,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            tokens,
            oauth,
            roles,
            quiz,
            settings,
        }
    }

    /// Question bank in use.
    pub fn quiz(&self) -> &QuizBank {
        &self.quiz
    }

    /// `START`: issues a token and returns the Discord consent URL.
    pub fn start(&self, subject_id: &str) -> Result<Url, VerificationError> {
        let token = self.tokens.issue(subject_id);
        tracing::info!(subject_id, "Verification started");
        Ok(self.settings.chat_provider.authorize_url(&token.token)?)
    }

    /// `AwaitingChatLogin → AwaitingCodeHostLogin`.
    ///
    /// Redeems the Discord code, checks the Discord account is the one the
    /// link was issued for, and returns the GitHub consent URL carrying the
    /// same `state`.
    pub async fn complete_chat_login(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<Url, VerificationError> {
        let provider = &self.settings.chat_provider;
        let token = self.require_stage(state, Stage::AwaitingChatLogin, provider)?;
        let code = require_code(code, provider, &token)?;

        let access = self
            .oauth
            .exchange_code(provider, code, &provider.redirect_uri)
            .await
            .map_err(|e| log_exchange_failure(e, &token))?;

        let profile = self
            .oauth
            .fetch_profile(provider, &access)
            .await
            .map_err(|e| log_exchange_failure(e, &token))?;

        if profile.id != token.subject_id {
            tracing::warn!(
                subject_id = %token.subject_id,
                authenticated_as = %profile.id,
                "Discord account does not match verification link"
            );
            return Err(VerificationError::IdentityMismatch {
                expected: token.subject_id,
                actual: profile.id,
            });
        }

        self.advance(&token, Stage::AwaitingChatLogin, Stage::AwaitingCodeHostLogin)?;
        tracing::info!(subject_id = %token.subject_id, "Discord login verified");

        Ok(self.settings.code_host_provider.authorize_url(&token.token)?)
    }

    /// `AwaitingCodeHostLogin → Quiz`.
    ///
    /// Redeems the GitHub code and renders the quiz bound to the subject.
    pub async fn complete_code_host_login(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<QuizView, VerificationError> {
        let provider = &self.settings.code_host_provider;
        let token = self.require_stage(state, Stage::AwaitingCodeHostLogin, provider)?;
        let code = require_code(code, provider, &token)?;

        self.oauth
            .exchange_code(provider, code, &provider.redirect_uri)
            .await
            .map_err(|e| log_exchange_failure(e, &token))?;

        self.advance(&token, Stage::AwaitingCodeHostLogin, Stage::Quiz)?;
        tracing::info!(subject_id = %token.subject_id, "GitHub login verified, serving quiz");

        Ok(QuizView {
            html: views::quiz_page(&token.subject_id, &token.token, &self.quiz),
            subject_id: token.subject_id,
        })
    }

    /// `Quiz → PASSED | FAILED`.
    ///
    /// A passing score grants the role. Every passing submission issues a
    /// grant; there is no per-subject dedup.
    pub async fn submit_quiz(
        &self,
        submission: &QuizSubmission,
    ) -> Result<QuizOutcome, VerificationError> {
        let subject_id = submission.subject_id.as_str();
        if subject_id.is_empty() {
            return Err(malformed(subject_id, "subjectId is empty".to_string()));
        }

        let correct = match (&submission.answers, submission.correct_count) {
            (Some(answers), _) => self.quiz.score(answers).ok_or_else(|| {
                malformed(
                    subject_id,
                    format!(
                        "expected {} answers, got {}",
                        self.quiz.len(),
                        answers.len()
                    ),
                )
            })?,
            (None, Some(count)) => count,
            (None, None) => {
                return Err(malformed(
                    subject_id,
                    "correctCount or answers is required".to_string(),
                ))
            }
        };

        if let Some(state) = submission.state.as_deref() {
            self.tokens.invalidate(state);
        }

        if !self.quiz.passes(correct) {
            tracing::info!(subject_id, correct, "Quiz not passed");
            return Err(VerificationError::QuizFailed {
                correct,
                required: self.quiz.passing_score,
            });
        }

        self.roles
            .grant(&self.settings.guild_id, subject_id, &self.settings.role_id)
            .await
            .map_err(|e| {
                tracing::error!(subject_id, error = %e, "Verification error");
                VerificationError::from(e)
            })?;

        tracing::info!(subject_id, correct, "Verification successful");
        Ok(QuizOutcome {
            subject_id: subject_id.to_string(),
            correct,
        })
    }

    /// Looks up `state` and checks it is in `expected`.
    fn require_stage(
        &self,
        state: Option<&str>,
        expected: Stage,
        provider: &ProviderProfile,
    ) -> Result<VerificationToken, VerificationError> {
        let Some(state) = state.filter(|s| !s.is_empty()) else {
            tracing::warn!(provider = %provider.name, state_present = false, "Callback without state");
            return Err(VerificationError::InvalidOrExpiredRequest);
        };

        match self.tokens.validate(state) {
            Some(token) if token.stage == expected => Ok(token),
            Some(token) => {
                tracing::warn!(
                    provider = %provider.name,
                    subject_id = %token.subject_id,
                    stage = %token.stage,
                    expected = %expected,
                    "Callback replayed or out of order"
                );
                Err(VerificationError::InvalidOrExpiredRequest)
            }
            None => {
                tracing::warn!(provider = %provider.name, state_present = true, "Unknown or expired state");
                Err(VerificationError::InvalidOrExpiredRequest)
            }
        }
    }

    fn advance(
        &self,
        token: &VerificationToken,
        from: Stage,
        to: Stage,
    ) -> Result<(), VerificationError> {
        self.tokens
            .advance(&token.token, from, to)
            .map(|_| ())
            .ok_or_else(|| {
                tracing::warn!(subject_id = %token.subject_id, %from, %to, "Lost stage transition race");
                VerificationError::InvalidOrExpiredRequest
            })
    }
}

fn require_code<'a>(
    code: Option<&'a str>,
    provider: &ProviderProfile,
    token: &VerificationToken,
) -> Result<&'a str, VerificationError> {
    code.filter(|c| !c.is_empty()).ok_or_else(|| {
        tracing::warn!(
            provider = %provider.name,
            subject_id = %token.subject_id,
            state_present = true,
            "Callback without code"
        );
        VerificationError::MissingParameter("code")
    })
}

fn malformed(subject_id: &str, reason: String) -> VerificationError {
    tracing::warn!(subject_id, %reason, "Malformed quiz submission");
    VerificationError::MalformedSubmission(reason)
}

fn log_exchange_failure(err: crate::oauth::ExchangeError, token: &VerificationToken) -> VerificationError {
    tracing::error!(
        provider = %err.provider(),
        subject_id = %token.subject_id,
        error = %err,
        "OAuth exchange failed"
    );
    VerificationError::ProviderExchange(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_accepts_current_field_names() {
        let s: QuizSubmission =
            serde_json::from_str(r#"{"subjectId":"U1","correctCount":4,"state":"t"}"#).unwrap();
        assert_eq!(s.subject_id, "U1");
        assert_eq!(s.correct_count, Some(4));
        assert_eq!(s.state.as_deref(), Some("t"));
        assert!(s.answers.is_none());
    }

    #[test]
    fn test_submission_accepts_legacy_field_names() {
        let s: QuizSubmission =
            serde_json::from_str(r#"{"discordId":"U1","correctAnswers":5}"#).unwrap();
        assert_eq!(s.subject_id, "U1");
        assert_eq!(s.correct_count, Some(5));
    }

    #[test]
    fn test_submission_with_answers() {
        let s: QuizSubmission =
            serde_json::from_str(r#"{"subjectId":"U1","answers":[1,1,1,0,0]}"#).unwrap();
        assert_eq!(s.answers, Some(vec![1, 1, 1, 0, 0]));
        assert_eq!(s.correct_count, None);
    }
}
