//! Welcome notifications for new members
//!
//! When someone joins, the dispatcher posts a call-to-action with their
//! personal verification link to the verification channel, then deletes the
//! message after a delay to keep the channel tidy. Duplicate join events
//! inside the suppression window are dropped.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::discord::messages::{
    ActionRow, AllowedMentions, ChannelMessenger, LinkButton, MessageError, OutgoingMessage,
};
use crate::store::JoinDeduplicator;

/// Default delay before a welcome message is removed (5 minutes).
pub const DEFAULT_DELETE_AFTER_SECS: u64 = 300;

/// How the verification link is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
    /// Link in the message text
    #[default]
    Text,
    /// Link button below the message
    Button,
}

/// Static settings for the dispatcher.
#[derive(Debug, Clone)]
pub struct NotificationSettings {
    /// Channel that receives welcome messages
    pub channel_id: String,
    /// Public origin of this service, used to build links
    pub public_base_url: String,
    /// Link presentation
    pub link_style: LinkStyle,
    /// Delay before the welcome message is deleted
    pub delete_after: Duration,
}

/// Handle to a pending message deletion.
#[derive(Debug)]
pub struct ScheduledDeletion {
    handle: JoinHandle<()>,
}

impl ScheduledDeletion {
    /// Cancels the deletion if it has not run yet.
    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Whether the deletion task has completed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the deletion to run.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}

/// Posts welcome messages for join events.
pub struct NotificationDispatcher {
    dedup: Arc<dyn JoinDeduplicator>,
    messenger: Arc<dyn ChannelMessenger>,
    settings: NotificationSettings,
}

impl NotificationDispatcher {
    /// Creates a dispatcher.
    pub fn new(
        dedup: Arc<dyn JoinDeduplicator>,
        messenger: Arc<dyn ChannelMessenger>,
        settings: NotificationSettings,
    ) -> Self {
        Self {
            dedup,
            messenger,
            settings,
        }
    }

    /// The `/verify/{subject_id}` link for this deployment.
    pub fn verification_link(&self, subject_id: &str) -> String {
        format!(
            "{}/verify/{}",
            self.settings.public_base_url.trim_end_matches('/'),
            subject_id
        )
    }

    /// Welcomes `subject_id` with their own verification link.
    pub async fn welcome(
        &self,
        subject_id: &str,
    ) -> Result<Option<ScheduledDeletion>, MessageError> {
        let link = self.verification_link(subject_id);
        self.on_join(subject_id, &link).await
    }

    /// Sends the welcome message unless the subject was welcomed recently.
    ///
    /// Returns `None` when suppressed, otherwise a handle to the scheduled
    /// deletion of the message.
    pub async fn on_join(
        &self,
        subject_id: &str,
        verification_link: &str,
    ) -> Result<Option<ScheduledDeletion>, MessageError> {
        if !self.dedup.should_notify(subject_id) {
            tracing::debug!(subject_id, "Duplicate join suppressed");
            return Ok(None);
        }

        let message = welcome_message(subject_id, verification_link, self.settings.link_style);
        let sent = self
            .messenger
            .send_message(&self.settings.channel_id, &message)
            .await
            .map_err(|e| {
                tracing::error!(
                    subject_id,
                    channel_id = %self.settings.channel_id,
                    error = %e,
                    "Failed to send verification message"
                );
                e
            })?;

        tracing::info!(subject_id, message_id = %sent.id, "Verification message sent");

        Ok(Some(self.schedule_deletion(sent.channel_id, sent.id)))
    }

    fn schedule_deletion(&self, channel_id: String, message_id: String) -> ScheduledDeletion {
        let messenger = Arc::clone(&self.messenger);
        let delay = self.settings.delete_after;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match messenger.delete_message(&channel_id, &message_id).await {
                Ok(()) => tracing::debug!(%message_id, "Verification message deleted"),
                Err(e) => {
                    tracing::warn!(%message_id, error = %e, "Failed to delete verification message")
                }
            }
        });
        ScheduledDeletion { handle }
    }
}

/// Builds the welcome message for `subject_id`.
pub fn welcome_message(subject_id: &str, link: &str, style: LinkStyle) -> OutgoingMessage {
    let call_to_action = match style {
        LinkStyle::Text => format!("Click this link to start verification: {link}"),
        LinkStyle::Button => "Click the button below to start verification.".to_string(),
    };

    let content = format!(
        "Welcome <@{subject_id}>!\n\n\
         To access the server, please complete the verification process:\n\
         {call_to_action}\n\n\
         Verification steps:\n\
         1. Login with Discord\n\
         2. Authenticate your GitHub account\n\
         3. Complete a short technical quiz\n\
         4. Get access to the server channels"
    );

    let components = match style {
        LinkStyle::Text => Vec::new(),
        LinkStyle::Button => vec![ActionRow::new(vec![LinkButton::new(
            "Start Verification",
            link,
        )])],
    };

    OutgoingMessage {
        content,
        allowed_mentions: AllowedMentions {
            parse: Vec::new(),
            users: vec![subject_id.to_string()],
        },
        components,
    }
}
