//! Authorization-code exchange and identity lookup
//!
//! [`HttpOAuthClient`] performs the two outbound calls of each OAuth hop:
//! redeeming the code at the token endpoint, and (for Discord) asking who
//! the resulting access token belongs to. It holds no state besides the
//! shared HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

use super::provider::{ProviderProfile, TokenRequestEncoding};

/// Longest provider error body kept in an [`ExchangeError`].
const MAX_ERROR_BODY: usize = 256;

/// Failure talking to an OAuth provider.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The request never produced a response.
    #[error("{provider} request failed: {source}")]
    Transport {
        /// Provider name
        provider: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success status.
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// The provider answered 2xx but reported an OAuth error.
    #[error("{provider} rejected the code: {error}")]
    Rejected {
        /// Provider name
        provider: String,
        /// OAuth `error` value
        error: String,
    },

    /// The response body did not have the expected shape.
    #[error("{provider} returned a malformed response: {reason}")]
    Malformed {
        /// Provider name
        provider: String,
        /// What was wrong
        reason: String,
    },

    /// `fetch_profile` was called for a provider without an identity endpoint.
    #[error("{provider} has no profile endpoint configured")]
    NoProfileEndpoint {
        /// Provider name
        provider: String,
    },

    /// A configured provider URL could not be parsed.
    #[error("invalid {provider} URL: {reason}")]
    InvalidUrl {
        /// Provider name
        provider: String,
        /// Parse error
        reason: String,
    },
}

impl ExchangeError {
    /// Provider the error came from.
    pub fn provider(&self) -> &str {
        match self {
            Self::Transport { provider, .. }
            | Self::Status { provider, .. }
            | Self::Rejected { provider, .. }
            | Self::Malformed { provider, .. }
            | Self::NoProfileEndpoint { provider }
            | Self::InvalidUrl { provider, .. } => provider,
        }
    }
}

/// Access token returned by a provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Bearer credential
    pub access_token: String,
    /// Usually `"Bearer"`
    pub token_type: Option<String>,
    /// Granted scope, if reported
    pub scope: Option<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Identity reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    /// Account id. Numeric ids are normalized to strings.
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    /// Display handle (`username` on Discord, `login` on GitHub)
    #[serde(default, alias = "login")]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
}

fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// Round trips against an OAuth provider.
#[async_trait]
pub trait OAuthExchange: Send + Sync {
    /// Redeems an authorization code for an access token.
    async fn exchange_code(
        &self,
        provider: &ProviderProfile,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, ExchangeError>;

    /// Fetches the identity behind `token`.
    async fn fetch_profile(
        &self,
        provider: &ProviderProfile,
        token: &AccessToken,
    ) -> Result<Profile, ExchangeError>;
}

/// [`OAuthExchange`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpOAuthClient {
    http: reqwest::Client,
}

impl HttpOAuthClient {
    /// Wraps a shared HTTP client.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl OAuthExchange for HttpOAuthClient {
    async fn exchange_code(
        &self,
        provider: &ProviderProfile,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, ExchangeError> {
        let mut params: HashMap<&str, &str> = HashMap::new();
        params.insert("client_id", &provider.client_id);
        params.insert("client_secret", &provider.client_secret);
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri);

        let request = self
            .http
            .post(&provider.token_endpoint)
            .header(reqwest::header::ACCEPT, "application/json");
        let request = match provider.token_request {
            TokenRequestEncoding::Form => request.form(&params),
            TokenRequestEncoding::Json => request.json(&params),
        };

        tracing::debug!(provider = %provider.name, "Exchanging authorization code");

        let resp = request.send().await.map_err(|source| ExchangeError::Transport {
            provider: provider.name.clone(),
            source,
        })?;

        let raw: TokenResponse = read_json(provider, resp).await?;

        if let Some(error) = raw.error {
            return Err(ExchangeError::Rejected {
                provider: provider.name.clone(),
                error,
            });
        }

        let access_token = raw
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExchangeError::Malformed {
                provider: provider.name.clone(),
                reason: "missing access_token".to_string(),
            })?;

        Ok(AccessToken {
            access_token,
            token_type: raw.token_type,
            scope: raw.scope,
        })
    }

    async fn fetch_profile(
        &self,
        provider: &ProviderProfile,
        token: &AccessToken,
    ) -> Result<Profile, ExchangeError> {
        let endpoint =
            provider
                .profile_endpoint
                .as_deref()
                .ok_or_else(|| ExchangeError::NoProfileEndpoint {
                    provider: provider.name.clone(),
                })?;

        let resp = self
            .http
            .get(endpoint)
            .bearer_auth(&token.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ExchangeError::Transport {
                provider: provider.name.clone(),
                source,
            })?;

        read_json(provider, resp).await
    }
}

/// Checks the status and decodes the body, mapping failures to [`ExchangeError`].
async fn read_json<T>(provider: &ProviderProfile, resp: reqwest::Response) -> Result<T, ExchangeError>
where
    T: serde::de::DeserializeOwned,
{
    let status = resp.status();
    if !status.is_success() {
        let mut body = resp.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(ExchangeError::Status {
            provider: provider.name.clone(),
            status: status.as_u16(),
            body,
        });
    }

    resp.json::<T>().await.map_err(|e| ExchangeError::Malformed {
        provider: provider.name.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_accepts_string_id() {
        let profile: Profile =
            serde_json::from_str(r#"{"id":"80351110224678912","username":"nelly"}"#).unwrap();
        assert_eq!(profile.id, "80351110224678912");
        assert_eq!(profile.username.as_deref(), Some("nelly"));
    }

    #[test]
    fn test_profile_accepts_numeric_id_and_login_alias() {
        let profile: Profile = serde_json::from_str(r#"{"id":583231,"login":"octocat"}"#).unwrap();
        assert_eq!(profile.id, "583231");
        assert_eq!(profile.username.as_deref(), Some("octocat"));
    }

    #[test]
    fn test_profile_rejects_missing_id() {
        assert!(serde_json::from_str::<Profile>(r#"{"username":"x"}"#).is_err());
        assert!(serde_json::from_str::<Profile>(r#"{"id":null}"#).is_err());
    }

    #[test]
    fn test_access_token_debug_redacts() {
        let token = AccessToken {
            access_token: "very-secret".to_string(),
            token_type: Some("Bearer".to_string()),
            scope: None,
        };
        assert!(!format!("{token:?}").contains("very-secret"));
    }

    #[test]
    fn test_exchange_error_reports_provider() {
        let err = ExchangeError::Rejected {
            provider: "github".to_string(),
            error: "bad_verification_code".to_string(),
        };
        assert_eq!(err.provider(), "github");
        assert_eq!(
            err.to_string(),
            "github rejected the code: bad_verification_code"
        );
    }
}
