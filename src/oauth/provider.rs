//! OAuth provider descriptors
//!
//! A [`ProviderProfile`] holds everything needed to send a user to a
//! provider's consent screen and to redeem the code it hands back. Discord
//! (`Provider A`) and GitHub (`Provider B`) differ in how the token request
//! is encoded and in whether an identity endpoint is consulted.

use url::Url;

use super::ExchangeError;

/// Body encoding expected by a provider's token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequestEncoding {
    /// `application/x-www-form-urlencoded` (RFC 6749; Discord)
    Form,
    /// JSON body with `Accept: application/json` (GitHub)
    Json,
}

/// Static configuration for one OAuth provider.
#[derive(Clone)]
pub struct ProviderProfile {
    /// Short name used in logs and errors ("discord", "github").
    pub name: String,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Consent screen URL
    pub authorize_url: String,
    /// Code redemption URL
    pub token_endpoint: String,
    /// Identity URL, when the flow checks who logged in
    pub profile_endpoint: Option<String>,
    /// Where the provider sends the user back
    pub redirect_uri: String,
    /// Requested scope, if any
    pub scope: Option<String>,
    /// Token request body encoding
    pub token_request: TokenRequestEncoding,
}

impl ProviderProfile {
    /// Builds the consent-screen URL carrying `state`.
    ///
    /// # Examples
    ///
    /// ```
    /// use guildgate::oauth::{ProviderProfile, TokenRequestEncoding};
    ///
    /// let discord = ProviderProfile {
    ///     name: "discord".to_string(),
    ///     client_id: "123".to_string(),
    ///     client_secret: "secret".to_string(),
    ///     authorize_url: "https://discord.com/api/oauth2/authorize".to_string(),
    ///     token_endpoint: "https://discord.com/api/oauth2/token".to_string(),
    ///     profile_endpoint: Some("https://discord.com/api/users/@me".to_string()),
    ///     redirect_uri: "https://gate.example.com/callback".to_string(),
    ///     scope: Some("identify".to_string()),
    ///     token_request: TokenRequestEncoding::Form,
    /// };
    ///
    /// let url = discord.authorize_url("abc").unwrap();
    /// assert!(url.as_str().contains("state=abc"));
    /// assert!(url.as_str().contains("scope=identify"));
    /// ```
    pub fn authorize_url(&self, state: &str) -> Result<Url, ExchangeError> {
        let mut url = Url::parse(&self.authorize_url).map_err(|e| ExchangeError::InvalidUrl {
            provider: self.name.clone(),
            reason: e.to_string(),
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.client_id);
            query.append_pair("redirect_uri", &self.redirect_uri);
            query.append_pair("response_type", "code");
            if let Some(scope) = &self.scope {
                query.append_pair("scope", scope);
            }
            query.append_pair("state", state);
        }

        Ok(url)
    }
}

impl std::fmt::Debug for ProviderProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderProfile")
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorize_url", &self.authorize_url)
            .field("token_endpoint", &self.token_endpoint)
            .field("profile_endpoint", &self.profile_endpoint)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("token_request", &self.token_request)
            .finish()
    }
}
