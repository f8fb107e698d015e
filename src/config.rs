//! Configuration management for Guildgate
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! Precedence, lowest first: built-in defaults, the YAML file, environment
//! variables, CLI flags. The environment variable names match the ones the
//! service has always been deployed with (`DISCORD_BOT_TOKEN`, `GUILD_ID`, ...).

use crate::error::{GuildgateError, Result};
use crate::notify::{LinkStyle, NotificationSettings, DEFAULT_DELETE_AFTER_SECS};
use crate::oauth::{ProviderProfile, TokenRequestEncoding};
use crate::quiz::{QuizBank, QuizQuestion};
use crate::store::{DEFAULT_JOIN_WINDOW_SECS, DEFAULT_TOKEN_TTL_SECS};
use crate::verification::VerificationSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Minimum length accepted for `SESSION_SECRET`
pub const MIN_SESSION_SECRET_LEN: usize = 16;

/// Upper bound for every `verification.*_seconds` value (one year)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Main configuration structure for Guildgate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Discord bot and OAuth application
    #[serde(default)]
    pub discord: DiscordConfig,
    /// GitHub OAuth application
    #[serde(default)]
    pub github: GithubConfig,
    /// Session signing secret; checked at startup
    #[serde(default)]
    pub session_secret: String,
    /// Timing and presentation of the verification flow
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Replacement question bank; the built-in bank is used when absent
    #[serde(default)]
    pub quiz: Option<QuizConfig>,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public origin used in verification links
    ///
    /// When unset, the origin of the Discord redirect URI is used.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: None,
        }
    }
}

/// Discord configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token for REST and gateway calls
    #[serde(default)]
    pub bot_token: String,

    /// OAuth client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,

    /// OAuth redirect URI (points at `/callback`)
    #[serde(default)]
    pub redirect_uri: String,

    /// Guild the gate protects
    #[serde(default)]
    pub guild_id: String,

    /// Role granted after verification
    #[serde(default)]
    pub verified_role_id: String,

    /// Channel that receives welcome messages
    #[serde(default)]
    pub verification_channel_id: String,

    /// REST API base (useful for tests and local mocks)
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,

    /// Gateway websocket URL
    #[serde(default = "default_discord_gateway_url")]
    pub gateway_url: String,

    /// OAuth consent screen
    #[serde(default = "default_discord_authorize_url")]
    pub authorize_url: String,

    /// OAuth token endpoint
    #[serde(default = "default_discord_token_url")]
    pub token_url: String,

    /// Identity endpoint
    #[serde(default = "default_discord_profile_url")]
    pub profile_url: String,
}

fn default_discord_api_base() -> String {
    crate::discord::DEFAULT_API_BASE.to_string()
}

fn default_discord_gateway_url() -> String {
    crate::discord::DEFAULT_GATEWAY_URL.to_string()
}

fn default_discord_authorize_url() -> String {
    "https://discord.com/api/oauth2/authorize".to_string()
}

fn default_discord_token_url() -> String {
    "https://discord.com/api/oauth2/token".to_string()
}

fn default_discord_profile_url() -> String {
    "https://discord.com/api/users/@me".to_string()
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            guild_id: String::new(),
            verified_role_id: String::new(),
            verification_channel_id: String::new(),
            api_base: default_discord_api_base(),
            gateway_url: default_discord_gateway_url(),
            authorize_url: default_discord_authorize_url(),
            token_url: default_discord_token_url(),
            profile_url: default_discord_profile_url(),
        }
    }
}

/// GitHub OAuth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// OAuth client id
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,

    /// OAuth redirect URI (points at `/callback/github-callback`)
    #[serde(default)]
    pub redirect_uri: String,

    /// OAuth consent screen
    #[serde(default = "default_github_authorize_url")]
    pub authorize_url: String,

    /// OAuth token endpoint
    #[serde(default = "default_github_token_url")]
    pub token_url: String,
}

fn default_github_authorize_url() -> String {
    "https://github.com/login/oauth/authorize".to_string()
}

fn default_github_token_url() -> String {
    "https://github.com/login/oauth/access_token".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            authorize_url: default_github_authorize_url(),
            token_url: default_github_token_url(),
        }
    }
}

/// Verification flow timing and presentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Lifetime of a verification token (seconds)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,

    /// Window in which repeat joins are not welcomed again (seconds)
    #[serde(default = "default_join_window")]
    pub join_window_seconds: u64,

    /// Delay before a welcome message is deleted (seconds)
    #[serde(default = "default_delete_after")]
    pub delete_after_seconds: u64,

    /// How often expired records are swept (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,

    /// Link presentation in the welcome message
    #[serde(default)]
    pub link_style: LinkStyle,
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_SECS as u64
}

fn default_join_window() -> u64 {
    DEFAULT_JOIN_WINDOW_SECS as u64
}

fn default_delete_after() -> u64 {
    DEFAULT_DELETE_AFTER_SECS
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            token_ttl_seconds: default_token_ttl(),
            join_window_seconds: default_join_window(),
            delete_after_seconds: default_delete_after(),
            sweep_interval_seconds: default_sweep_interval(),
            link_style: LinkStyle::default(),
        }
    }
}

impl VerificationConfig {
    /// Token lifetime as a chrono duration.
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_ttl_seconds.min(MAX_DURATION_SECS) as i64)
    }

    /// Join suppression window as a chrono duration.
    pub fn join_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.join_window_seconds.min(MAX_DURATION_SECS) as i64)
    }

    /// Sweep interval.
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Also append logs to this file
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "guildgate=info,tower_http=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

/// Question bank override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizConfig {
    /// Minimum correct answers to pass
    #[serde(default = "default_passing_score")]
    pub passing_score: usize,

    /// Questions in presentation order
    pub questions: Vec<QuizQuestion>,
}

fn default_passing_score() -> usize {
    crate::quiz::DEFAULT_PASSING_SCORE
}

impl Config {
    /// Load configuration from file, environment, and CLI
    ///
    /// A missing file is not an error; defaults are used and the
    /// environment is expected to supply the required values.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed command-line arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(GuildgateError::from)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(GuildgateError::from)?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        let strings: [(&str, &mut String); 11] = [
            ("DISCORD_BOT_TOKEN", &mut self.discord.bot_token),
            ("DISCORD_CLIENT_ID", &mut self.discord.client_id),
            ("DISCORD_CLIENT_SECRET", &mut self.discord.client_secret),
            ("REDIRECT_URI", &mut self.discord.redirect_uri),
            ("GUILD_ID", &mut self.discord.guild_id),
            ("VERIFIED_ROLE_ID", &mut self.discord.verified_role_id),
            ("VERIFICATION_CHANNEL_ID", &mut self.discord.verification_channel_id),
            ("GITHUB_CLIENT_ID", &mut self.github.client_id),
            ("GITHUB_CLIENT_SECRET", &mut self.github.client_secret),
            ("GITHUB_REDIRECT_URI", &mut self.github.redirect_uri),
            ("SESSION_SECRET", &mut self.session_secret),
        ];
        for (name, field) in strings {
            if let Ok(value) = std::env::var(name) {
                *field = value;
            }
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(value) = port.parse() {
                self.server.port = value;
            } else {
                tracing::warn!("Invalid PORT: {}", port);
            }
        }

        if let Ok(url) = std::env::var("PUBLIC_BASE_URL") {
            self.server.public_base_url = Some(url);
        }

        if let Ok(api_base) = std::env::var("GUILDGATE_DISCORD_API_BASE") {
            self.discord.api_base = api_base;
        }

        if let Ok(style) = std::env::var("GUILDGATE_LINK_STYLE") {
            match style.to_lowercase().as_str() {
                "text" => self.verification.link_style = LinkStyle::Text,
                "button" => self.verification.link_style = LinkStyle::Button,
                _ => tracing::warn!("Invalid GUILDGATE_LINK_STYLE: {}, keeping current", style),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(port) = cli.port_override() {
            self.server.port = port;
        }

        if cli.json_logs {
            self.logging.json_format = true;
        }

        if cli.verbose {
            self.logging.level = "guildgate=debug,tower_http=debug".to_string();
        }
    }

    /// Validate configuration
    ///
    /// Every missing required value is reported in one error so a
    /// deployment can be fixed in a single pass.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for missing values, a weak session
    /// secret, zero durations, or a malformed quiz bank.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("DISCORD_BOT_TOKEN", &self.discord.bot_token),
            ("DISCORD_CLIENT_ID", &self.discord.client_id),
            ("DISCORD_CLIENT_SECRET", &self.discord.client_secret),
            ("REDIRECT_URI", &self.discord.redirect_uri),
            ("GUILD_ID", &self.discord.guild_id),
            ("VERIFIED_ROLE_ID", &self.discord.verified_role_id),
            ("VERIFICATION_CHANNEL_ID", &self.discord.verification_channel_id),
            ("GITHUB_CLIENT_ID", &self.github.client_id),
            ("GITHUB_CLIENT_SECRET", &self.github.client_secret),
            ("GITHUB_REDIRECT_URI", &self.github.redirect_uri),
            ("SESSION_SECRET", &self.session_secret),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(GuildgateError::Config(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            ))
            .into());
        }

        if self.session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(GuildgateError::Config(format!(
                "SESSION_SECRET must be at least {} characters",
                MIN_SESSION_SECRET_LEN
            ))
            .into());
        }

        if self.server.port == 0 {
            return Err(GuildgateError::Config("port must be greater than 0".to_string()).into());
        }

        let durations = [
            ("token_ttl_seconds", self.verification.token_ttl_seconds),
            ("join_window_seconds", self.verification.join_window_seconds),
            ("delete_after_seconds", self.verification.delete_after_seconds),
            ("sweep_interval_seconds", self.verification.sweep_interval_seconds),
        ];
        for (name, value) in durations {
            if value == 0 || value > MAX_DURATION_SECS {
                return Err(GuildgateError::Config(format!(
                    "verification.{} must be between 1 and {}",
                    name, MAX_DURATION_SECS
                ))
                .into());
            }
        }

        let public_base_url = self.public_base_url().ok_or_else(|| {
            GuildgateError::Config(
                "PUBLIC_BASE_URL is not set and REDIRECT_URI has no usable origin".to_string(),
            )
        })?;

        for (name, value) in [
            ("public_base_url", public_base_url),
            ("discord.api_base", self.discord.api_base.clone()),
            ("discord.gateway_url", self.discord.gateway_url.clone()),
        ] {
            url::Url::parse(&value).map_err(|e| {
                GuildgateError::Config(format!("{} is not a valid URL ({}): {}", name, value, e))
            })?;
        }

        self.quiz_bank()?;

        Ok(())
    }

    /// Public origin for verification links, with no trailing slash.
    ///
    /// `PUBLIC_BASE_URL` wins when set; otherwise the scheme and host of
    /// `REDIRECT_URI` are used, since the OAuth callback is served by this
    /// same listener. `None` when neither yields an origin.
    pub fn public_base_url(&self) -> Option<String> {
        if let Some(url) = self
            .server
            .public_base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        {
            return Some(url.trim_end_matches('/').to_string());
        }

        let redirect = url::Url::parse(&self.discord.redirect_uri).ok()?;
        match redirect.origin() {
            origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
            url::Origin::Opaque(_) => None,
        }
    }

    /// The question bank to serve.
    pub fn quiz_bank(&self) -> Result<QuizBank> {
        match &self.quiz {
            Some(quiz) => QuizBank::new(quiz.questions.clone(), quiz.passing_score),
            None => Ok(QuizBank::default()),
        }
    }

    /// Discord OAuth profile (form-encoded token request, identity checked).
    pub fn discord_provider(&self) -> ProviderProfile {
        ProviderProfile {
            name: "discord".to_string(),
            client_id: self.discord.client_id.clone(),
            client_secret: self.discord.client_secret.clone(),
            authorize_url: self.discord.authorize_url.clone(),
            token_endpoint: self.discord.token_url.clone(),
            profile_endpoint: Some(self.discord.profile_url.clone()),
            redirect_uri: self.discord.redirect_uri.clone(),
            scope: Some("identify".to_string()),
            token_request: TokenRequestEncoding::Form,
        }
    }

    /// GitHub OAuth profile (JSON token request, identity not fetched).
    pub fn github_provider(&self) -> ProviderProfile {
        ProviderProfile {
            name: "github".to_string(),
            client_id: self.github.client_id.clone(),
            client_secret: self.github.client_secret.clone(),
            authorize_url: self.github.authorize_url.clone(),
            token_endpoint: self.github.token_url.clone(),
            profile_endpoint: None,
            redirect_uri: self.github.redirect_uri.clone(),
            scope: None,
            token_request: TokenRequestEncoding::Json,
        }
    }

    /// Settings for the verification orchestrator.
    pub fn verification_settings(&self) -> VerificationSettings {
        VerificationSettings {
            chat_provider: self.discord_provider(),
            code_host_provider: self.github_provider(),
            guild_id: self.discord.guild_id.clone(),
            role_id: self.discord.verified_role_id.clone(),
        }
    }

    /// Settings for the welcome-message dispatcher.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no public origin can be determined.
    pub fn notification_settings(&self) -> Result<NotificationSettings> {
        let public_base_url = self.public_base_url().ok_or_else(|| {
            GuildgateError::Config("no public origin for verification links".to_string())
        })?;
        Ok(NotificationSettings {
            channel_id: self.discord.verification_channel_id.clone(),
            public_base_url,
            link_style: self.verification.link_style,
            delete_after: std::time::Duration::from_secs(
                self.verification.delete_after_seconds.min(MAX_DURATION_SECS),
            ),
        })
    }
}
