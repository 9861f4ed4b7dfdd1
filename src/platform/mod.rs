use async_trait::async_trait;

use crate::error::Result;

pub mod discord;
mod permissions;

pub use discord::DiscordClient;
pub use permissions::Permissions;

/// A text channel as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u64,
    pub server: Option<u64>,
    pub name: Option<String>,
    /// Effective permissions of the bot user in this channel.
    pub bot_permissions: Permissions,
}

/// The chat service messages are delivered through.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Looks a channel up. `None` when it does not exist or the bot cannot
    /// see it.
    async fn channel(&self, channel_id: u64) -> Result<Option<ChannelInfo>>;

    /// Posts a message and returns its id. Only the roles in
    /// `mention_roles` may be pinged; any other mention in `content` stays
    /// inert.
    ///
    /// A message the service will never accept (too long, malformed) fails
    /// with `MessageRejected`, a missing or unpostable channel with
    /// `ChannelNotFound`.
    async fn send_message(
        &self,
        channel_id: u64,
        content: &str,
        mention_roles: &[u64],
    ) -> Result<u64>;
}

#[cfg(test)]
pub mod fake;
