//! Discord real-time gateway client
//!
//! Keeps a websocket session open so the bot hears `GUILD_MEMBER_ADD`.
//! The session identifies with the guild, guild-members and guild-messages
//! intents, heartbeats at the interval from `HELLO`, and hands join events
//! for the configured guild to the [`NotificationDispatcher`]. Any session
//! error ends the session; [`GatewayClient::run`] reconnects with backoff
//! until cancelled.

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::notify::NotificationDispatcher;

/// Default gateway endpoint.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// GUILDS | GUILD_MEMBERS | GUILD_MESSAGES
pub const INTENTS: u64 = (1 << 0) | (1 << 1) | (1 << 9);

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Why a gateway session ended.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Websocket transport failure
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The server closed the connection.
    #[error("connection closed: {0}")]
    Closed(String),

    /// A frame could not be decoded.
    #[error("invalid gateway payload: {0}")]
    Payload(String),

    /// No heartbeat ACK arrived before the next heartbeat was due.
    #[error("heartbeat not acknowledged")]
    MissedHeartbeat,

    /// Discord rejected the session.
    #[error("session invalidated")]
    InvalidSession,
}

/// A decoded gateway frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// First frame of a session
    Hello {
        /// Heartbeat period in milliseconds
        heartbeat_interval: u64,
    },
    /// Identify accepted
    Ready {
        /// Bot user name
        username: String,
    },
    /// `GUILD_MEMBER_ADD`
    MemberJoined {
        /// Guild the member joined
        guild_id: String,
        /// The new member
        user_id: String,
    },
    /// Server asks for an immediate heartbeat
    HeartbeatRequest,
    /// Heartbeat acknowledged
    HeartbeatAck,
    /// Server asks the client to reconnect
    Reconnect,
    /// Identify or resume rejected
    InvalidSession,
    /// Any dispatch this client does not act on
    Other(String),
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    s: Option<u64>,
    t: Option<String>,
}

/// Decodes a text frame into its sequence number and event.
pub fn parse_event(text: &str) -> Result<(Option<u64>, GatewayEvent), GatewayError> {
    let raw: RawPayload =
        serde_json::from_str(text).map_err(|e| GatewayError::Payload(e.to_string()))?;

    let str_at = |pointer: &str| -> Result<String, GatewayError> {
        raw.d
            .pointer(pointer)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Payload(format!("missing {pointer}")))
    };

    let event = match raw.op {
        opcode::HELLO => GatewayEvent::Hello {
            heartbeat_interval: raw
                .d
                .get("heartbeat_interval")
                .and_then(Value::as_u64)
                .filter(|ms| *ms > 0)
                .ok_or_else(|| {
                    GatewayError::Payload("missing or zero heartbeat_interval".to_string())
                })?,
        },
        opcode::HEARTBEAT => GatewayEvent::HeartbeatRequest,
        opcode::HEARTBEAT_ACK => GatewayEvent::HeartbeatAck,
        opcode::RECONNECT => GatewayEvent::Reconnect,
        opcode::INVALID_SESSION => GatewayEvent::InvalidSession,
        opcode::DISPATCH => match raw.t.as_deref() {
            Some("READY") => GatewayEvent::Ready {
                username: str_at("/user/username")?,
            },
            Some("GUILD_MEMBER_ADD") => GatewayEvent::MemberJoined {
                guild_id: str_at("/guild_id")?,
                user_id: str_at("/user/id")?,
            },
            other => GatewayEvent::Other(other.unwrap_or_default().to_string()),
        },
        op => GatewayEvent::Other(format!("op {op}")),
    };

    Ok((raw.s, event))
}

/// Reconnect delay, doubling after each unhealthy session up to one minute.
#[derive(Debug)]
struct Backoff {
    next: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            next: INITIAL_BACKOFF,
        }
    }

    fn reset(&mut self) {
        self.next = INITIAL_BACKOFF;
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(MAX_BACKOFF);
        delay
    }
}

/// Long-running gateway connection.
pub struct GatewayClient {
    url: String,
    bot_token: String,
    guild_id: String,
    dispatcher: Arc<NotificationDispatcher>,
}

impl GatewayClient {
    /// Creates a client that forwards joins for `guild_id` to `dispatcher`.
    pub fn new(
        url: impl Into<String>,
        bot_token: impl Into<String>,
        guild_id: impl Into<String>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            url: url.into(),
            bot_token: bot_token.into(),
            guild_id: guild_id.into(),
            dispatcher,
        }
    }

    /// Runs sessions back to back until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut backoff = Backoff::new();

        loop {
            let mut reached_ready = false;
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.run_session(&mut reached_ready) => outcome,
            };

            // A session that got as far as READY was healthy.
            if outcome.is_ok() || reached_ready {
                backoff.reset();
            }
            let delay = backoff.next_delay();

            match outcome {
                Ok(()) => tracing::info!(retry_in = ?delay, "Gateway requested reconnect"),
                Err(e) => tracing::warn!(error = %e, retry_in = ?delay, "Gateway session ended"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Gateway client stopped");
    }

    /// One websocket session. `Ok(())` means Discord asked for a reconnect.
    ///
    /// Sets `reached_ready` once Discord accepts the identify.
    async fn run_session(&self, reached_ready: &mut bool) -> Result<(), GatewayError> {
        let (socket, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| GatewayError::WebSocket(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let heartbeat_interval = loop {
            match next_event(&mut stream).await? {
                (_, GatewayEvent::Hello { heartbeat_interval }) => break heartbeat_interval,
                (_, other) => tracing::debug!(?other, "Ignoring frame before HELLO"),
            }
        };

        let identify = json!({
            "op": opcode::IDENTIFY,
            "d": {
                "token": self.bot_token,
                "intents": INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "guildgate",
                    "device": "guildgate",
                },
            },
        });
        send_json(&mut sink, &identify).await?;

        let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_interval));
        let mut sequence: Option<u64> = None;
        let mut acknowledged = true;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !acknowledged {
                        return Err(GatewayError::MissedHeartbeat);
                    }
                    acknowledged = false;
                    send_json(&mut sink, &json!({ "op": opcode::HEARTBEAT, "d": sequence })).await?;
                }
                frame = next_event(&mut stream) => {
                    let (seq, event) = frame?;
                    if seq.is_some() {
                        sequence = seq;
                    }
                    match event {
                        GatewayEvent::Ready { username } => {
                            *reached_ready = true;
                            tracing::info!(%username, "Logged in to Discord gateway");
                        }
                        GatewayEvent::MemberJoined { guild_id, user_id } => {
                            self.handle_join(guild_id, user_id);
                        }
                        GatewayEvent::HeartbeatAck => acknowledged = true,
                        GatewayEvent::HeartbeatRequest => {
                            send_json(&mut sink, &json!({ "op": opcode::HEARTBEAT, "d": sequence })).await?;
                        }
                        GatewayEvent::Reconnect => return Ok(()),
                        GatewayEvent::InvalidSession => return Err(GatewayError::InvalidSession),
                        GatewayEvent::Hello { .. } | GatewayEvent::Other(_) => {}
                    }
                }
            }
        }
    }

    fn handle_join(&self, guild_id: String, user_id: String) {
        if guild_id != self.guild_id {
            tracing::debug!(%guild_id, "Ignoring join for another guild");
            return;
        }
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            if let Err(e) = dispatcher.welcome(&user_id).await {
                tracing::error!(subject_id = %user_id, error = %e, "Error handling new member");
            }
        });
    }
}

async fn next_event<S>(stream: &mut S) -> Result<(Option<u64>, GatewayEvent), GatewayError>
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match stream.next().await {
            None => return Err(GatewayError::Closed("stream ended".to_string())),
            Some(Err(e)) => return Err(GatewayError::WebSocket(e.to_string())),
            Some(Ok(Message::Text(text))) => return parse_event(&text),
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                    .unwrap_or_else(|| "no close frame".to_string());
                return Err(GatewayError::Closed(reason));
            }
            Some(Ok(_)) => continue,
        }
    }
}

async fn send_json<S>(sink: &mut S, value: &Value) -> Result<(), GatewayError>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    sink.send(Message::Text(value.to_string()))
        .await
        .map_err(|e| GatewayError::WebSocket(e.to_string()))
}
