//! Role grant gateway
//!
//! Resolves the guild, the member inside it, and the role, then applies the
//! role. Re-applying a role the member already holds is a no-op on Discord's
//! side, so repeated grants are harmless; no local bookkeeping is kept.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use super::rest::DiscordRestClient;

/// Why a grant did not happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantError {
    /// The configured guild does not exist or the bot is not in it.
    #[error("guild {0} not found")]
    GuildNotFound(String),

    /// The subject is not a member of the guild.
    #[error("member {0} not found")]
    MemberNotFound(String),

    /// The configured role does not exist in the guild.
    #[error("role {0} not found")]
    RoleNotFound(String),

    /// Discord refused the assignment, or a lookup failed unexpectedly.
    #[error("could not apply role: {cause}")]
    ApplyFailed {
        /// Status line or transport error
        cause: String,
    },
}

/// Applies the verified role to a member.
#[async_trait]
pub trait RoleGrantGateway: Send + Sync {
    /// Grants `role_id` to `subject_id` in `guild_id`.
    async fn grant(&self, guild_id: &str, subject_id: &str, role_id: &str)
        -> Result<(), GrantError>;
}

#[derive(Debug, Deserialize)]
struct RoleRef {
    id: String,
}

impl DiscordRestClient {
    /// GETs `path`, mapping 404 to `not_found` and other failures to `ApplyFailed`.
    async fn lookup(
        &self,
        path: &str,
        not_found: GrantError,
    ) -> Result<reqwest::Response, GrantError> {
        let resp = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(|e| GrantError::ApplyFailed {
                cause: format!("GET {path}: {e}"),
            })?;

        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::NOT_FOUND => Err(not_found),
            s => Err(GrantError::ApplyFailed {
                cause: format!("GET {path} returned {s}"),
            }),
        }
    }
}

#[async_trait]
impl RoleGrantGateway for DiscordRestClient {
    async fn grant(
        &self,
        guild_id: &str,
        subject_id: &str,
        role_id: &str,
    ) -> Result<(), GrantError> {
        self.lookup(
            &format!("/guilds/{guild_id}"),
            GrantError::GuildNotFound(guild_id.to_string()),
        )
        .await?;

        self.lookup(
            &format!("/guilds/{guild_id}/members/{subject_id}"),
            GrantError::MemberNotFound(subject_id.to_string()),
        )
        .await?;

        let roles: Vec<RoleRef> = self
            .lookup(
                &format!("/guilds/{guild_id}/roles"),
                GrantError::GuildNotFound(guild_id.to_string()),
            )
            .await?
            .json()
            .await
            .map_err(|e| GrantError::ApplyFailed {
                cause: format!("unreadable role list: {e}"),
            })?;

        if !roles.iter().any(|r| r.id == role_id) {
            return Err(GrantError::RoleNotFound(role_id.to_string()));
        }

        let path = format!("/guilds/{guild_id}/members/{subject_id}/roles/{role_id}");
        let resp = self
            .request(Method::PUT, &path)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await
            .map_err(|e| GrantError::ApplyFailed {
                cause: format!("PUT {path}: {e}"),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GrantError::ApplyFailed {
                cause: format!("PUT {path} returned {status}: {body}"),
            });
        }

        tracing::info!(guild_id, subject_id, role_id, "Role granted");
        Ok(())
    }
}
