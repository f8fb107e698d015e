//! Guildgate - Discord verification gate library
//!
//! New guild members receive a personal verification link. Following it
//! walks them through a Discord login, a GitHub login, and a short quiz;
//! passing grants the configured role.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `store`: short-lived verification tokens and join suppression
//! - `oauth`: authorization-code exchange and profile lookup
//! - `verification`: the state machine tying the steps together
//! - `discord`: REST client, role grants, channel messages, gateway
//! - `notify`: welcome messages for new members
//! - `server`: axum routes
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use guildgate::{cli::Cli, Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/guildgate.yaml", &Cli::default())?;
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod discord;
pub mod error;
pub mod logging;
pub mod notify;
pub mod oauth;
pub mod quiz;
pub mod server;
pub mod store;
pub mod verification;
pub mod views;

// Re-export commonly used types
pub use config::Config;
pub use error::{GuildgateError, Result, VerificationError};
pub use notify::NotificationDispatcher;
pub use quiz::QuizBank;
pub use verification::{QuizSubmission, VerificationOrchestrator};
