//! Minimal Discord REST client
//!
//! Only the handful of endpoints the gate needs: guild, member and role
//! lookups, role assignment, and channel message create/delete. Requests
//! authenticate with the bot token (`Authorization: Bot <token>`).

use reqwest::{Method, RequestBuilder};

/// Public Discord API base (v10).
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Bot-authenticated client for the Discord HTTP API.
#[derive(Clone)]
pub struct DiscordRestClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl DiscordRestClient {
    /// Creates a client rooted at `api_base` (no trailing slash needed).
    ///
    /// # Examples
    ///
    /// ```
    /// use guildgate::discord::DiscordRestClient;
    ///
    /// let client = DiscordRestClient::new(
    ///     reqwest::Client::new(),
    ///     "https://discord.com/api/v10/",
    ///     "bot-token",
    /// );
    /// assert_eq!(client.url("/guilds/1"), "https://discord.com/api/v10/guilds/1");
    /// ```
    pub fn new(http: reqwest::Client, api_base: &str, bot_token: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        }
    }

    /// Absolute URL for an API path starting with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Starts an authenticated request.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bot {}", self.bot_token),
            )
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

impl std::fmt::Debug for DiscordRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordRestClient")
            .field("api_base", &self.api_base)
            .field("bot_token", &"<redacted>")
            .finish()
    }
}
