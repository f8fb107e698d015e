//! Join-event deduplication
//!
//! Discord may deliver `GUILD_MEMBER_ADD` more than once. The deduplicator
//! remembers who was welcomed recently so the welcome message goes out at
//! most once per window. It is best-effort: a join after the window
//! notifies again.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;

/// Default suppression window in seconds.
pub const DEFAULT_JOIN_WINDOW_SECS: i64 = 60;

/// Gate for welcome notifications.
pub trait JoinDeduplicator: Send + Sync {
    /// Returns `true` and marks the subject if it was not marked within the
    /// window; returns `false` otherwise. Check and mark are atomic.
    fn should_notify(&self, subject_id: &str) -> bool;

    /// Whether the subject is currently suppressed.
    fn is_marked(&self, subject_id: &str) -> bool;

    /// Drops entries older than the window and returns how many were removed.
    fn purge_expired(&self) -> usize;
}

/// Mutex-guarded map of subject id to the time it was marked.
pub struct InMemoryJoinDeduplicator {
    clock: Arc<dyn Clock>,
    window: Duration,
    marked: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryJoinDeduplicator {
    /// Creates an empty deduplicator with the given window.
    pub fn new(clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            clock,
            window,
            marked: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.marked.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn within_window(&self, marked_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - marked_at < self.window
    }
}

impl JoinDeduplicator for InMemoryJoinDeduplicator {
    fn should_notify(&self, subject_id: &str) -> bool {
        let now = self.clock.now();
        let mut marked = self.lock();
        if let Some(&at) = marked.get(subject_id) {
            if self.within_window(at, now) {
                return false;
            }
        }
        marked.insert(subject_id.to_string(), now);
        true
    }

    fn is_marked(&self, subject_id: &str) -> bool {
        let now = self.clock.now();
        self.lock()
            .get(subject_id)
            .is_some_and(|&at| self.within_window(at, now))
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut marked = self.lock();
        let before = marked.len();
        marked.retain(|_, at| now - *at < self.window);
        before - marked.len()
    }
}
