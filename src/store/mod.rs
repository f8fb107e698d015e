//! In-memory verification state
//!
//! - `token_store`: anti-forgery tokens with TTL and stage
//! - `join_dedup`: trailing-window suppression of duplicate join events
//! - `sweeper`: background eviction for both
//!
//! Nothing here survives a restart; a user simply follows a fresh link.

pub mod join_dedup;
pub mod sweeper;
pub mod token_store;

pub use join_dedup::{InMemoryJoinDeduplicator, JoinDeduplicator, DEFAULT_JOIN_WINDOW_SECS};
pub use sweeper::spawn_sweeper;
pub use token_store::{
    InMemoryTokenStore, Stage, TokenStore, VerificationToken, DEFAULT_TOKEN_TTL_SECS,
};
