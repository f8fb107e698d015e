//! Guildgate - Discord verification gate
//!
//! Main entry point for the Guildgate service.

use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use guildgate::cli::{Cli, Commands, DEFAULT_CONFIG_PATH};
use guildgate::clock::{Clock, SystemClock};
use guildgate::config::Config;
use guildgate::discord::{DiscordRestClient, GatewayClient};
use guildgate::error::GuildgateError;
use guildgate::logging::init_logging;
use guildgate::notify::NotificationDispatcher;
use guildgate::oauth::HttpOAuthClient;
use guildgate::server::{self, AppState};
use guildgate::store::{
    spawn_sweeper, InMemoryJoinDeduplicator, InMemoryTokenStore, JoinDeduplicator, TokenStore,
};
use guildgate::verification::VerificationOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;

    config.validate()?;

    match cli.command {
        Commands::CheckConfig => {
            let bank = config.quiz_bank()?;
            tracing::info!(
                port = config.server.port,
                public_base_url = %config.public_base_url().unwrap_or_default(),
                guild_id = %config.discord.guild_id,
                questions = bank.len(),
                passing_score = bank.passing_score,
                "Configuration is valid"
            );
            Ok(())
        }
        Commands::Serve { no_gateway, .. } => run_server(config, no_gateway).await,
    }
}

async fn run_server(config: Config, no_gateway: bool) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let http = reqwest::Client::builder()
        .user_agent(concat!("guildgate/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(GuildgateError::from)?;

    let tokens = Arc::new(InMemoryTokenStore::new(
        Arc::clone(&clock),
        config.verification.token_ttl(),
    ));
    let joins = Arc::new(InMemoryJoinDeduplicator::new(
        Arc::clone(&clock),
        config.verification.join_window(),
    ));
    let discord = Arc::new(DiscordRestClient::new(
        http.clone(),
        &config.discord.api_base,
        &config.discord.bot_token,
    ));

    let orchestrator = Arc::new(VerificationOrchestrator::new(
        tokens.clone(),
        Arc::new(HttpOAuthClient::new(http)),
        discord.clone(),
        Arc::new(config.quiz_bank()?),
        config.verification_settings(),
    ));

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    let sweep_every = config.verification.sweep_interval();
    tasks.push(spawn_sweeper("tokens", sweep_every, cancel.clone(), {
        let tokens = tokens.clone();
        move || tokens.purge_expired()
    }));
    tasks.push(spawn_sweeper("joins", sweep_every, cancel.clone(), {
        let joins = joins.clone();
        move || joins.purge_expired()
    }));

    if no_gateway {
        tracing::warn!("Gateway disabled; new members will not be welcomed");
    } else {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            joins,
            discord,
            config.notification_settings()?,
        ));
        let gateway = GatewayClient::new(
            config.discord.gateway_url.clone(),
            config.discord.bot_token.clone(),
            config.discord.guild_id.clone(),
            dispatcher,
        );
        tasks.push(tokio::spawn(gateway.run(cancel.clone())));
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| GuildgateError::Server(format!("failed to bind {}: {}", addr, e)))?;

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        server::shutdown_signal().await;
        signal_cancel.cancel();
    });

    let result = server::serve(listener, AppState::new(orchestrator), cancel.clone()).await;

    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }
    tracing::info!("Guildgate shut down");

    result
}
