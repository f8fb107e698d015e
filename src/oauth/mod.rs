//! OAuth 2.0 authorization-code support for Discord and GitHub
//!
//! - `provider`: per-provider endpoints, credentials, and authorize URLs
//! - `exchange`: code redemption and profile lookup

pub mod exchange;
pub mod provider;

pub use exchange::{AccessToken, ExchangeError, HttpOAuthClient, OAuthExchange, Profile};
pub use provider::{ProviderProfile, TokenRequestEncoding};
