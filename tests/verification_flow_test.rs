//! End-to-end verification flow against in-memory doubles
//!
//! Drives the orchestrator through both OAuth hops and the quiz, covering
//! identity mismatch, replayed callbacks, expiry, and grant failures.

mod common;

use common::{query_param, Harness, LogCapture, RecordingGateway, GUILD, ROLE};

use guildgate::discord::roles::GrantError;
use guildgate::error::VerificationError;
use guildgate::store::{Stage, TokenStore};
use guildgate::verification::QuizSubmission;

fn submission(subject: &str, correct: usize) -> QuizSubmission {
    QuizSubmission {
        subject_id: subject.to_string(),
        correct_count: Some(correct),
        ..Default::default()
    }
}

/// Runs `start` and returns the state token carried in the Discord URL.
fn start(h: &Harness, subject: &str) -> String {
    let url = h.orchestrator.start(subject).unwrap();
    query_param(&url, "state").expect("state in authorize URL")
}

#[tokio::test]
async fn test_start_builds_discord_authorize_url() {
    let h = Harness::new("U1");
    let url = h.orchestrator.start("U1").unwrap();

    assert!(url.as_str().starts_with("https://discord.test/oauth2/authorize?"));
    assert_eq!(query_param(&url, "client_id").as_deref(), Some("discord-client"));
    assert_eq!(query_param(&url, "response_type").as_deref(), Some("code"));
    assert_eq!(query_param(&url, "scope").as_deref(), Some("identify"));
    assert_eq!(
        query_param(&url, "redirect_uri").as_deref(),
        Some("https://gate.example.com/callback")
    );

    let state = query_param(&url, "state").unwrap();
    let record = h.tokens.validate(&state).unwrap();
    assert_eq!(record.subject_id, "U1");
    assert_eq!(record.stage, Stage::AwaitingChatLogin);
}

#[tokio::test]
async fn test_matching_identity_redirects_to_github_with_same_state() {
    let h = Harness::new("U1");
    let state = start(&h, "U1");

    let url = h
        .orchestrator
        .complete_chat_login(Some("code-a"), Some(&state))
        .await
        .unwrap();

    assert!(url
        .as_str()
        .starts_with("https://github.test/login/oauth/authorize?"));
    assert_eq!(query_param(&url, "state"), Some(state.clone()));
    assert_eq!(
        query_param(&url, "redirect_uri").as_deref(),
        Some("https://gate.example.com/callback/github-callback")
    );
    assert_eq!(query_param(&url, "client_id").as_deref(), Some("github-client"));
    assert_eq!(
        h.tokens.validate(&state).unwrap().stage,
        Stage::AwaitingCodeHostLogin
    );
    assert_eq!(
        h.oauth.exchanges(),
        vec![("discord".to_string(), "code-a".to_string())]
    );
}

#[tokio::test]
async fn test_identity_mismatch_is_rejected() {
    let h = Harness::new("U2");
    let state = start(&h, "U1");

    let err = h
        .orchestrator
        .complete_chat_login(Some("code-a"), Some(&state))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VerificationError::IdentityMismatch { ref expected, ref actual }
            if expected == "U1" && actual == "U2"
    ));
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(
        h.tokens.validate(&state).unwrap().stage,
        Stage::AwaitingChatLogin
    );
}

#[tokio::test]
async fn test_unknown_state_is_rejected_regardless_of_code() {
    let h = Harness::new("U1");

    for code in [Some("code-a"), None] {
        let err = h
            .orchestrator
            .complete_chat_login(code, Some("not-a-token"))
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::InvalidOrExpiredRequest));
    }

    let err = h
        .orchestrator
        .complete_code_host_login(Some("code-b"), Some("not-a-token"))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::InvalidOrExpiredRequest));
    assert!(h.oauth.exchanges().is_empty());
}

#[tokio::test]
async fn test_missing_state_is_rejected() {
    let h = Harness::new("U1");
    let err = h
        .orchestrator
        .complete_chat_login(Some("code-a"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::InvalidOrExpiredRequest));
}

#[tokio::test]
async fn test_missing_code_is_rejected() {
    let h = Harness::new("U1");
    let state = start(&h, "U1");
    let err = h
        .orchestrator
        .complete_chat_login(None, Some(&state))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::MissingParameter("code")));
}

#[tokio::test]
async fn test_missing_code_is_logged_with_subject() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let h = Harness::new("U1");
    let state = start(&h, "U1");
    let err = h
        .orchestrator
        .complete_chat_login(Some(""), Some(&state))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::MissingParameter("code")));
    assert!(h.oauth.exchanges().is_empty());

    let output = logs.contents();
    assert!(output.contains("Callback without code"));
    assert!(output.contains("subject_id=U1"));
    assert!(output.contains("state_present=true"));
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let h = Harness::new("U1");
    let state = start(&h, "U1");

    h.clock.advance(chrono::Duration::minutes(11));

    let err = h
        .orchestrator
        .complete_chat_login(Some("code-a"), Some(&state))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::InvalidOrExpiredRequest));
    assert!(h.oauth.exchanges().is_empty());
}

#[tokio::test]
async fn test_replayed_discord_callback_is_rejected() {
    let h = Harness::new("U1");
    let state = start(&h, "U1");

    h.orchestrator
        .complete_chat_login(Some("code-a"), Some(&state))
        .await
        .unwrap();

    let err = h
        .orchestrator
        .complete_chat_login(Some("code-a"), Some(&state))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::InvalidOrExpiredRequest));
    assert_eq!(h.oauth.exchanges().len(), 1);
}

#[tokio::test]
async fn test_github_callback_before_discord_is_rejected() {
    let h = Harness::new("U1");
    let state = start(&h, "U1");

    let err = h
        .orchestrator
        .complete_code_host_login(Some("code-b"), Some(&state))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::InvalidOrExpiredRequest));
}

#[tokio::test]
async fn test_github_callback_renders_quiz_bound_to_subject() {
    let h = Harness::new("U1");
    let state = start(&h, "U1");
    h.orchestrator
        .complete_chat_login(Some("code-a"), Some(&state))
        .await
        .unwrap();

    let view = h
        .orchestrator
        .complete_code_host_login(Some("code-b"), Some(&state))
        .await
        .unwrap();

    assert_eq!(view.subject_id, "U1");
    assert!(view.html.contains("U1"));
    assert!(view.html.contains("/submit-quiz"));
    assert_eq!(h.tokens.validate(&state).unwrap().stage, Stage::Quiz);
    assert_eq!(
        h.oauth.exchanges().last(),
        Some(&("github".to_string(), "code-b".to_string()))
    );
}

#[tokio::test]
async fn test_github_exchange_failure_is_provider_error() {
    let h = Harness::new("U1");
    let state = start(&h, "U1");
    h.orchestrator
        .complete_chat_login(Some("code-a"), Some(&state))
        .await
        .unwrap();

    h.oauth.fail_exchanges();
    let err = h
        .orchestrator
        .complete_code_host_login(Some("code-b"), Some(&state))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::ProviderExchange(_)));
    assert_eq!(
        err.status_code(),
        axum::http::StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        h.tokens.validate(&state).unwrap().stage,
        Stage::AwaitingCodeHostLogin
    );
}

#[tokio::test]
async fn test_passing_submission_grants_role() {
    let h = Harness::new("U1");

    let outcome = h.orchestrator.submit_quiz(&submission("U1", 4)).await.unwrap();

    assert_eq!(outcome.subject_id, "U1");
    assert_eq!(outcome.correct, 4);
    assert_eq!(
        h.gateway.calls(),
        vec![(GUILD.to_string(), "U1".to_string(), ROLE.to_string())]
    );
}

#[tokio::test]
async fn test_failing_submission_never_calls_gateway() {
    let h = Harness::new("U1");

    let err = h
        .orchestrator
        .submit_quiz(&submission("U1", 3))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        VerificationError::QuizFailed {
            correct: 3,
            required: 4
        }
    ));
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_two_passing_submissions_issue_two_grants() {
    let h = Harness::new("U1");

    h.orchestrator.submit_quiz(&submission("U1", 5)).await.unwrap();
    h.orchestrator.submit_quiz(&submission("U1", 5)).await.unwrap();

    assert_eq!(h.gateway.calls().len(), 2);
}

#[tokio::test]
async fn test_submitted_answers_are_scored_server_side() {
    let h = Harness::new("U1");

    let mut s = submission("U1", 5);
    s.answers = Some(vec![1, 1, 1, 0, 0]);
    let err = h.orchestrator.submit_quiz(&s).await.unwrap_err();
    assert!(matches!(err, VerificationError::QuizFailed { correct: 3, .. }));

    s.answers = Some(vec![1, 1, 1, 1, 0]);
    let outcome = h.orchestrator.submit_quiz(&s).await.unwrap();
    assert_eq!(outcome.correct, 4);
    assert_eq!(h.gateway.calls().len(), 1);
}

#[tokio::test]
async fn test_wrong_number_of_answers_is_malformed() {
    let h = Harness::new("U1");
    let s = QuizSubmission {
        subject_id: "U1".to_string(),
        answers: Some(vec![1, 1]),
        ..Default::default()
    };
    let err = h.orchestrator.submit_quiz(&s).await.unwrap_err();
    assert!(matches!(err, VerificationError::MalformedSubmission(_)));
}

#[tokio::test]
async fn test_submission_without_score_is_malformed() {
    let h = Harness::new("U1");
    let s = QuizSubmission {
        subject_id: "U1".to_string(),
        ..Default::default()
    };
    let err = h.orchestrator.submit_quiz(&s).await.unwrap_err();
    assert!(matches!(err, VerificationError::MalformedSubmission(_)));
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_submission_is_logged() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let h = Harness::new("U1");
    let s = QuizSubmission {
        subject_id: "U1".to_string(),
        answers: Some(vec![1]),
        ..Default::default()
    };
    let err = h.orchestrator.submit_quiz(&s).await.unwrap_err();
    assert!(matches!(err, VerificationError::MalformedSubmission(_)));

    let output = logs.contents();
    assert!(output.contains("WARN"));
    assert!(output.contains("Malformed quiz submission"));
    assert!(output.contains("subject_id=\"U1\"") || output.contains("subject_id=U1"));
}

#[tokio::test]
async fn test_submission_consumes_state() {
    let h = Harness::new("U1");
    let state = start(&h, "U1");

    let mut s = submission("U1", 5);
    s.state = Some(state.clone());
    h.orchestrator.submit_quiz(&s).await.unwrap();

    assert!(h.tokens.validate(&state).is_none());
}

#[tokio::test]
async fn test_missing_role_maps_to_guild_resource_not_found() {
    let h = Harness::with_gateway(
        "U1",
        RecordingGateway::failing_with(GrantError::RoleNotFound(ROLE.to_string())),
    );

    let err = h
        .orchestrator
        .submit_quiz(&submission("U1", 5))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::GuildResourceNotFound(_)));
    assert_eq!(err.public_message(), "Verified role not found");
}

#[tokio::test]
async fn test_rejected_grant_maps_to_grant_failed() {
    let h = Harness::with_gateway(
        "U1",
        RecordingGateway::failing_with(GrantError::ApplyFailed {
            cause: "403 Forbidden".to_string(),
        }),
    );

    let err = h
        .orchestrator
        .submit_quiz(&submission("U1", 5))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::GrantFailed(_)));
    assert_eq!(
        err.status_code(),
        axum::http::StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn test_full_flow_end_to_end() {
    let h = Harness::new("U1");
    let state = start(&h, "U1");

    h.orchestrator
        .complete_chat_login(Some("code-a"), Some(&state))
        .await
        .unwrap();
    h.orchestrator
        .complete_code_host_login(Some("code-b"), Some(&state))
        .await
        .unwrap();

    let mut s = submission("U1", 5);
    s.state = Some(state.clone());
    h.orchestrator.submit_quiz(&s).await.unwrap();

    assert_eq!(h.gateway.calls().len(), 1);
    assert!(h.tokens.validate(&state).is_none());
}
