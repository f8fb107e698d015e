//! Verification token storage
//!
//! Tokens are the anti-forgery `state` value threaded through both OAuth
//! hops. Each record carries the subject it was issued for, when it was
//! issued, and which stage of the verification flow it has reached. A token
//! older than the TTL is treated as absent on every read.
//!
//! [`InMemoryTokenStore`] keeps records in a mutex-guarded map. Every
//! operation takes the lock once, so `issue`, `validate`, `advance` and
//! eviction cannot interleave on the same record.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;

/// Default token lifetime in seconds: long enough to cover both OAuth round trips.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 600;

/// Characters per random half of a token.
const TOKEN_HALF_LEN: usize = 20;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Where a live token sits in the verification flow.
///
/// Issuing a token is the `START` transition; `PASSED` and `FAILED` are
/// terminal and are not stored, the token is invalidated instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting for the Discord OAuth callback.
    AwaitingChatLogin,
    /// Waiting for the GitHub OAuth callback.
    AwaitingCodeHostLogin,
    /// Both logins done; the quiz has been rendered.
    Quiz,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::AwaitingChatLogin => "awaiting_chat_login",
            Stage::AwaitingCodeHostLogin => "awaiting_code_host_login",
            Stage::Quiz => "quiz",
        };
        f.write_str(name)
    }
}

/// A single verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken {
    /// Opaque random value, also used as the OAuth `state`.
    pub token: String,
    /// Discord account id the attempt is bound to.
    pub subject_id: String,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// Current stage of the attempt.
    pub stage: Stage,
}

/// Storage for verification tokens.
pub trait TokenStore: Send + Sync {
    /// Issues a fresh token for `subject_id` in [`Stage::AwaitingChatLogin`].
    fn issue(&self, subject_id: &str) -> VerificationToken;

    /// Returns the record if it exists and has not expired.
    ///
    /// Unknown and expired tokens are indistinguishable to the caller.
    fn validate(&self, token: &str) -> Option<VerificationToken>;

    /// Moves a live token from stage `from` to stage `to`.
    ///
    /// Returns the updated record, or `None` if the token is unknown,
    /// expired, or not in `from`.
    fn advance(&self, token: &str, from: Stage, to: Stage) -> Option<VerificationToken>;

    /// Removes a token. Returns whether it was present.
    fn invalidate(&self, token: &str) -> bool;

    /// Drops every expired record and returns how many were removed.
    fn purge_expired(&self) -> usize;

    /// Number of records currently held, expired or not.
    fn len(&self) -> usize;

    /// Whether the store holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local token store with lazy expiry on read.
pub struct InMemoryTokenStore {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    tokens: Mutex<HashMap<String, VerificationToken>>,
}

impl InMemoryTokenStore {
    /// Creates an empty store.
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Configured token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, record: &VerificationToken, now: DateTime<Utc>) -> bool {
        now - record.issued_at > self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VerificationToken>> {
        self.tokens.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl TokenStore for InMemoryTokenStore {
    fn issue(&self, subject_id: &str) -> VerificationToken {
        let now = self.clock.now();
        let mut tokens = self.lock();

        let mut value = generate_token();
        while tokens.contains_key(&value) {
            value = generate_token();
        }

        let record = VerificationToken {
            token: value.clone(),
            subject_id: subject_id.to_string(),
            issued_at: now,
            stage: Stage::AwaitingChatLogin,
        };
        tokens.insert(value, record.clone());
        record
    }

    fn validate(&self, token: &str) -> Option<VerificationToken> {
        let now = self.clock.now();
        let mut tokens = self.lock();
        let expired = self.is_expired(tokens.get(token)?, now);
        if expired {
            tokens.remove(token);
            return None;
        }
        tokens.get(token).cloned()
    }

    fn advance(&self, token: &str, from: Stage, to: Stage) -> Option<VerificationToken> {
        let now = self.clock.now();
        let mut tokens = self.lock();
        if self.is_expired(tokens.get(token)?, now) {
            tokens.remove(token);
            return None;
        }
        let record = tokens.get_mut(token)?;
        if record.stage != from {
            return None;
        }
        record.stage = to;
        Some(record.clone())
    }

    fn invalidate(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut tokens = self.lock();
        let before = tokens.len();
        tokens.retain(|_, record| now - record.issued_at <= self.ttl);
        before - tokens.len()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Two independent runs of base-36 characters, concatenated.
fn generate_token() -> String {
    let mut rng = rand::rng();
    (0..TOKEN_HALF_LEN * 2)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}
