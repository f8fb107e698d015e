#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use guildgate::clock::{Clock, ManualClock};
use guildgate::discord::messages::{
    ChannelMessenger, MessageError, OutgoingMessage, SentMessage,
};
use guildgate::discord::roles::{GrantError, RoleGrantGateway};
use guildgate::oauth::{
    AccessToken, ExchangeError, OAuthExchange, Profile, ProviderProfile, TokenRequestEncoding,
};
use guildgate::quiz::QuizBank;
use guildgate::store::InMemoryTokenStore;
use guildgate::verification::{VerificationOrchestrator, VerificationSettings};

pub const GUILD: &str = "guild";
pub const ROLE: &str = "role";

pub fn discord_profile(base: &str) -> ProviderProfile {
    ProviderProfile {
        name: "discord".to_string(),
        client_id: "discord-client".to_string(),
        client_secret: "discord-secret".to_string(),
        authorize_url: format!("{}/oauth2/authorize", base),
        token_endpoint: format!("{}/oauth2/token", base),
        profile_endpoint: Some(format!("{}/users/@me", base)),
        redirect_uri: "https://gate.example.com/callback".to_string(),
        scope: Some("identify".to_string()),
        token_request: TokenRequestEncoding::Form,
    }
}

pub fn github_profile(base: &str) -> ProviderProfile {
    ProviderProfile {
        name: "github".to_string(),
        client_id: "github-client".to_string(),
        client_secret: "github-secret".to_string(),
        authorize_url: format!("{}/login/oauth/authorize", base),
        token_endpoint: format!("{}/login/oauth/access_token", base),
        profile_endpoint: None,
        redirect_uri: "https://gate.example.com/callback/github-callback".to_string(),
        scope: None,
        token_request: TokenRequestEncoding::Json,
    }
}

pub fn settings() -> VerificationSettings {
    VerificationSettings {
        chat_provider: discord_profile("https://discord.test"),
        code_host_provider: github_profile("https://github.test"),
        guild_id: GUILD.to_string(),
        role_id: ROLE.to_string(),
    }
}

/// OAuth double: every code redeems, Discord reports `discord_id`.
#[derive(Default)]
pub struct FakeOAuth {
    pub discord_id: Mutex<String>,
    pub fail_exchange: Mutex<bool>,
    pub exchanged: Mutex<Vec<(String, String)>>,
}

impl FakeOAuth {
    pub fn reporting(discord_id: &str) -> Self {
        Self {
            discord_id: Mutex::new(discord_id.to_string()),
            ..Default::default()
        }
    }

    pub fn set_discord_id(&self, id: &str) {
        *self.discord_id.lock().unwrap() = id.to_string();
    }

    pub fn fail_exchanges(&self) {
        *self.fail_exchange.lock().unwrap() = true;
    }

    pub fn exchanges(&self) -> Vec<(String, String)> {
        self.exchanged.lock().unwrap().clone()
    }
}

#[async_trait]
impl OAuthExchange for FakeOAuth {
    async fn exchange_code(
        &self,
        provider: &ProviderProfile,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<AccessToken, ExchangeError> {
        self.exchanged
            .lock()
            .unwrap()
            .push((provider.name.clone(), code.to_string()));
        if *self.fail_exchange.lock().unwrap() {
            return Err(ExchangeError::Status {
                provider: provider.name.clone(),
                status: 401,
                body: "invalid_client".to_string(),
            });
        }
        Ok(AccessToken {
            access_token: format!("{}-token", provider.name),
            token_type: Some("Bearer".to_string()),
            scope: None,
        })
    }

    async fn fetch_profile(
        &self,
        provider: &ProviderProfile,
        _token: &AccessToken,
    ) -> Result<Profile, ExchangeError> {
        if provider.profile_endpoint.is_none() {
            return Err(ExchangeError::NoProfileEndpoint {
                provider: provider.name.clone(),
            });
        }
        Ok(Profile {
            id: self.discord_id.lock().unwrap().clone(),
            username: Some("tester".to_string()),
        })
    }
}

/// Role gateway double that records every grant.
#[derive(Default)]
pub struct RecordingGateway {
    pub grants: Mutex<Vec<(String, String, String)>>,
    pub failure: Mutex<Option<GrantError>>,
}

impl RecordingGateway {
    pub fn failing_with(err: GrantError) -> Self {
        Self {
            failure: Mutex::new(Some(err)),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.grants.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoleGrantGateway for RecordingGateway {
    async fn grant(
        &self,
        guild_id: &str,
        subject_id: &str,
        role_id: &str,
    ) -> Result<(), GrantError> {
        self.grants.lock().unwrap().push((
            guild_id.to_string(),
            subject_id.to_string(),
            role_id.to_string(),
        ));
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Channel double that records sends and deletions.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, OutgoingMessage)>>,
    pub deleted: Mutex<Vec<(String, String)>>,
    next_id: AtomicUsize,
}

impl RecordingMessenger {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelMessenger for RecordingMessenger {
    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<SentMessage, MessageError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), message.clone()));
        Ok(SentMessage {
            id: format!("m{}", id),
            channel_id: channel_id.to_string(),
        })
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), MessageError> {
        self.deleted
            .lock()
            .unwrap()
            .push((channel_id.to_string(), message_id.to_string()));
        Ok(())
    }
}

/// Orchestrator wired to in-memory doubles and a manual clock.
pub struct Harness {
    pub orchestrator: Arc<VerificationOrchestrator>,
    pub tokens: Arc<InMemoryTokenStore>,
    pub oauth: Arc<FakeOAuth>,
    pub gateway: Arc<RecordingGateway>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(discord_id: &str) -> Self {
        Self::with_gateway(discord_id, RecordingGateway::default())
    }

    pub fn with_gateway(discord_id: &str, gateway: RecordingGateway) -> Self {
        let clock = Arc::new(ManualClock::default());
        let tokens = Arc::new(InMemoryTokenStore::new(
            clock.clone() as Arc<dyn Clock>,
            chrono::Duration::minutes(10),
        ));
        let oauth = Arc::new(FakeOAuth::reporting(discord_id));
        let gateway = Arc::new(gateway);
        let orchestrator = Arc::new(VerificationOrchestrator::new(
            tokens.clone(),
            oauth.clone(),
            gateway.clone(),
            Arc::new(QuizBank::default()),
            settings(),
        ));
        Self {
            orchestrator,
            tokens,
            oauth,
            gateway,
            clock,
        }
    }
}

/// Reads a query parameter from a URL.
pub fn query_param(url: &url::Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Collects formatted log lines emitted on the current thread.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Routes this thread's events into the capture until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
