//! Discord integration
//!
//! - [`rest`]: authenticated REST client shared by the pieces below
//! - [`roles`]: resolves guild, member, and role, then applies the role
//! - [`messages`]: posts and deletes channel messages
//! - [`gateway`]: websocket session that surfaces member-join events

pub mod gateway;
pub mod messages;
pub mod rest;
pub mod roles;

pub use gateway::{GatewayClient, GatewayError, GatewayEvent, DEFAULT_GATEWAY_URL};
pub use messages::{ChannelMessenger, MessageError, OutgoingMessage, SentMessage};
pub use rest::{DiscordRestClient, DEFAULT_API_BASE};
pub use roles::{GrantError, RoleGrantGateway};
