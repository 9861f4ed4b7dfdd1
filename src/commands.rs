//! Subscription commands. Every mutating command checks the invoker's
//! permissions before touching anything else.

use std::sync::Arc;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::{FeedFetcher, FeedSource};
use crate::models::{NewSubscription, Subscription};
use crate::notifier::Notifier;
use crate::platform::Permissions;
use crate::templates;

/// Who issued a command, and where.
#[derive(Debug, Clone, Copy)]
pub struct Invoker {
    pub user: u64,
    pub server: u64,
    pub permissions: Permissions,
}

impl Invoker {
    fn authorize(&self) -> Result<()> {
        if self.permissions.can_manage_feeds() {
            Ok(())
        } else {
            tracing::debug!("User {} denied on server {}", self.user, self.server);
            Err(AppError::MissingPermissions)
        }
    }
}

pub struct Commands {
    repo: Arc<Repository>,
    fetcher: Arc<FeedFetcher>,
    notifier: Arc<Notifier>,
}

impl Commands {
    pub fn new(repo: Arc<Repository>, fetcher: Arc<FeedFetcher>, notifier: Arc<Notifier>) -> Self {
        Self {
            repo,
            fetcher,
            notifier,
        }
    }

    /// Subscribes `channel` to a ScribbleHub feed. The newest entry's date
    /// becomes the last-seen mark, so only later chapters are announced.
    pub async fn register(
        &self,
        invoker: &Invoker,
        source: FeedSource,
        channel: u64,
        name: &str,
    ) -> Result<String> {
        invoker.authorize()?;
        let info = self.notifier.ensure_postable(channel).await?;
        // Direct messages belong to no server and never qualify.
        if info.server != Some(invoker.server) {
            return Err(AppError::ChannelNotFound(channel));
        }

        let feed_url = source.feed_url()?.to_string();
        let entries = self.fetcher.cached(&feed_url).await?;
        let latest = entries.first().ok_or(AppError::FeedEmpty)?;

        let subscription = self
            .repo
            .upsert_subscription(NewSubscription {
                id: source.id(),
                feed_url,
                channel,
                server: invoker.server,
                user: invoker.user,
                name: name.to_string(),
                date: latest.published,
            })
            .await?;

        tracing::info!(
            "Registered {} ({}) in channel {} as #{}",
            name,
            source,
            channel,
            subscription.unique
        );
        Ok(templates::registered(&subscription.name, channel))
    }

    pub async fn unregister(&self, invoker: &Invoker, unique: i64) -> Result<String> {
        invoker.authorize()?;
        let subscription = self.find(invoker, unique).await?;

        if !self.repo.delete_subscription(subscription.unique).await? {
            return Err(AppError::FeedNotFound(unique));
        }

        tracing::info!("Unregistered #{} ({})", unique, subscription.name);
        Ok(templates::unregistered(&subscription.name))
    }

    /// Lists the server's subscriptions. Read-only, so no permission check.
    pub async fn list(&self, invoker: &Invoker) -> Result<String> {
        let subscriptions = self.repo.get_subscriptions_by_server(invoker.server).await?;
        if subscriptions.is_empty() {
            return Ok(templates::NO_SUBSCRIPTIONS.to_string());
        }

        let lines = subscriptions
            .iter()
            .map(|s| {
                let paused = if s.accessible { "" } else { " (paused: channel unavailable)" };
                format!(
                    "`{}` {} → <#{}> (added by <@{}>){}",
                    s.unique, s.name, s.channel, s.user, paused
                )
            })
            .collect::<Vec<_>>();
        Ok(lines.join("\n"))
    }

    pub async fn add_mention(&self, invoker: &Invoker, unique: i64, role: u64) -> Result<String> {
        invoker.authorize()?;
        let subscription = self.find(invoker, unique).await?;

        let mut mentions = subscription.mentions.clone();
        if !mentions.contains(&role) {
            mentions.push(role);
        }
        self.repo.set_mentions(unique, mentions).await?;
        Ok(templates::mentions_updated(&subscription.name))
    }

    pub async fn remove_mention(
        &self,
        invoker: &Invoker,
        unique: i64,
        role: u64,
    ) -> Result<String> {
        invoker.authorize()?;
        let subscription = self.find(invoker, unique).await?;

        let mentions = subscription
            .mentions
            .iter()
            .copied()
            .filter(|m| *m != role)
            .collect();
        self.repo.set_mentions(unique, mentions).await?;
        Ok(templates::mentions_updated(&subscription.name))
    }

    /// Channel-deletion hook: drops every subscription of `channel`.
    pub async fn forget_channel(&self, channel: u64) -> Result<usize> {
        let deleted = self.repo.delete_by_channel(channel).await?;
        if deleted > 0 {
            tracing::info!("Removed {} subscriptions of deleted channel {}", deleted, channel);
        }
        Ok(deleted)
    }

    async fn find(&self, invoker: &Invoker, unique: i64) -> Result<Subscription> {
        self.repo
            .get_subscription(unique)
            .await?
            .filter(|s| s.server == invoker.server)
            .ok_or(AppError::FeedNotFound(unique))
    }
}

/// Renders a command outcome as the single string shown to the user.
pub fn respond(result: Result<String>) -> String {
    match result {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!("Command failed: {}", e);
            e.user_message().to_string()
        }
    }
}
