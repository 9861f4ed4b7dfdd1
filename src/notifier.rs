use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{FeedEntry, Subscription};
use crate::platform::{ChannelInfo, ChatPlatform, Permissions};

pub struct Notifier {
    platform: Arc<dyn ChatPlatform>,
}

impl Notifier {
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self { platform }
    }

    /// Fails with `ChannelNotFound` unless the channel exists and the bot can
    /// see, read and write in it.
    pub async fn ensure_postable(&self, channel: u64) -> Result<ChannelInfo> {
        let info = self
            .platform
            .channel(channel)
            .await?
            .ok_or(AppError::ChannelNotFound(channel))?;

        if !info.bot_permissions.has_permission(Permissions::postable()) {
            tracing::debug!(
                "Bot lacks view/read/write on channel {} ({}): {:?}",
                info.id,
                info.name.as_deref().unwrap_or("unnamed"),
                info.bot_permissions
            );
            return Err(AppError::ChannelNotFound(channel));
        }

        Ok(info)
    }

    /// Sends `content` without pinging anyone.
    pub async fn send(&self, channel: u64, content: &str) -> Result<u64> {
        self.deliver(channel, content, &[]).await
    }

    /// Announces `entry`, pinging only the subscription's mention roles.
    pub async fn notify(&self, subscription: &Subscription, entry: &FeedEntry) -> Result<u64> {
        let content = format_update(subscription, entry);
        self.deliver(subscription.channel, &content, &subscription.mentions)
            .await
    }

    async fn deliver(&self, channel: u64, content: &str, mention_roles: &[u64]) -> Result<u64> {
        self.ensure_postable(channel).await?;
        self.platform
            .send_message(channel, content, mention_roles)
            .await
    }
}

/// Discord refuses message content longer than this.
pub const MAX_MESSAGE_CHARS: usize = 2000;
const EXCERPT_CHARS: usize = 200;
const TITLE_CHARS: usize = 256;
const NAME_CHARS: usize = 100;

/// Builds the announcement for `entry`, never longer than
/// [`MAX_MESSAGE_CHARS`].
///
/// Title and name are shortened first. Mentions that no longer fit are
/// dropped, then the excerpt shrinks. The link is always kept whole.
pub fn format_update(subscription: &Subscription, entry: &FeedEntry) -> String {
    let headline = format!(
        "📖 **{}** was published for {}!",
        shorten(&entry.title, TITLE_CHARS),
        shorten(&subscription.name, NAME_CHARS)
    );
    let mut budget = MAX_MESSAGE_CHARS
        .saturating_sub(headline.chars().count() + 1 + entry.link.chars().count());

    let mut mentions = String::new();
    for role in &subscription.mentions {
        let mention = format!("<@&{role}>");
        // One separator or the trailing newline per mention.
        let cost = mention.len() + 1;
        if cost > budget {
            tracing::warn!(
                "Update for #{} is too long, dropping mentions from role {} on",
                subscription.unique,
                role
            );
            break;
        }
        if !mentions.is_empty() {
            mentions.push(' ');
        }
        mentions.push_str(&mention);
        budget -= cost;
    }

    let mut content = String::new();
    if !mentions.is_empty() {
        content.push_str(&mentions);
        content.push('\n');
    }
    content.push_str(&headline);
    if let Some(description) = &entry.description {
        // "\n> " and the ellipsis
        let room = budget.saturating_sub(4).min(EXCERPT_CHARS);
        if room > 0 {
            let excerpt: String = description.chars().take(room).collect();
            let ellipsis = if excerpt.len() < description.len() { "…" } else { "" };
            content.push_str(&format!("\n> {}{}", excerpt.replace('\n', " "), ellipsis));
        }
    }
    content.push('\n');
    content.push_str(&entry.link);
    shorten(&content, MAX_MESSAGE_CHARS)
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;
    use chrono::{TimeZone, Utc};

    fn subscription(channel: u64, mentions: Vec<u64>) -> Subscription {
        Subscription {
            unique: 1,
            id: 42,
            feed_url: "https://www.rssscribblehub.com/rssfeed.php?type=author&uid=42".into(),
            channel,
            server: 10,
            user: 20,
            name: "Alice's stories".into(),
            date: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            mentions,
            accessible: true,
        }
    }

    fn entry() -> FeedEntry {
        FeedEntry {
            title: "Chapter 3".into(),
            link: "https://www.scribblehub.com/read/1/chapter/3/".into(),
            published: Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
            description: None,
        }
    }

    #[test]
    fn update_message_lists_role_mentions_first() {
        let text = format_update(&subscription(1, vec![5, 6]), &entry());
        assert_eq!(
            text,
            "<@&5> <@&6>\n📖 **Chapter 3** was published for Alice's stories!\nhttps://www.scribblehub.com/read/1/chapter/3/"
        );
        let plain = format_update(&subscription(1, vec![]), &entry());
        assert!(plain.starts_with("📖"));
    }

    #[test]
    fn long_descriptions_are_quoted_and_cut() {
        let mut with_summary = entry();
        with_summary.description = Some(format!("Line one\n{}", "x".repeat(300)));

        let text = format_update(&subscription(1, vec![]), &with_summary);
        let quote = text.lines().nth(1).unwrap();
        assert!(quote.starts_with("> Line one x"));
        assert!(quote.ends_with('…'));
        assert_eq!(quote.chars().count(), 2 + EXCERPT_CHARS + 1);
        assert!(text.ends_with("/chapter/3/"));
    }

    #[test]
    fn oversized_fields_are_shortened_but_the_link_survives() {
        let mut long = entry();
        long.title = "T".repeat(2100);
        long.description = Some("d".repeat(5000));
        let mut sub = subscription(1, (1..=150).map(|n| 1_000_000_000_000_000_000 + n).collect());
        sub.name = "N".repeat(500);

        let text = format_update(&sub, &long);
        assert!(text.chars().count() <= MAX_MESSAGE_CHARS, "{}", text.chars().count());
        assert!(text.ends_with("\nhttps://www.scribblehub.com/read/1/chapter/3/"));
        assert!(text.starts_with("<@&1000000000000000001> "));
        assert!(text.contains(&format!("**{}…**", "T".repeat(TITLE_CHARS - 1))));
        assert!(text.contains(&format!("for {}…!", "N".repeat(NAME_CHARS - 1))));
    }

    #[test]
    fn title_alone_over_the_limit_still_fits() {
        let mut long = entry();
        long.title = "x".repeat(2100);

        let text = format_update(&subscription(1, vec![]), &long);
        assert!(text.chars().count() <= MAX_MESSAGE_CHARS);
        assert!(text.ends_with("/chapter/3/"));
    }

    #[tokio::test]
    async fn missing_channel_fails_before_sending() {
        let platform = Arc::new(FakePlatform::default());
        let notifier = Notifier::new(platform.clone());

        let err = notifier.notify(&subscription(1, vec![]), &entry()).await.unwrap_err();
        assert!(matches!(err, AppError::ChannelNotFound(1)));
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn each_missing_capability_blocks_delivery() {
        for missing in [
            Permissions::ViewChannel,
            Permissions::SendMessages,
            Permissions::ReadMessageHistory,
        ] {
            let perms = Permissions::postable() & !missing;
            let platform = Arc::new(FakePlatform::default().with_channel(1, perms));
            let notifier = Notifier::new(platform.clone());

            let err = notifier.send(1, "hi").await.unwrap_err();
            assert!(matches!(err, AppError::ChannelNotFound(1)));
            assert!(platform.sent().is_empty());
        }
    }

    #[tokio::test]
    async fn postable_channel_receives_message() {
        let platform = Arc::new(FakePlatform::default().with_channel(1, Permissions::postable()));
        let notifier = Notifier::new(platform.clone());

        tokio_test::assert_ok!(notifier.notify(&subscription(1, vec![]), &entry()).await);
        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
        assert!(sent[0].1.contains("Chapter 3"));
    }

    #[tokio::test]
    async fn only_subscription_roles_are_allowed_to_ping() {
        let platform = Arc::new(FakePlatform::default().with_channel(1, Permissions::postable()));
        let notifier = Notifier::new(platform.clone());

        let mut hostile = entry();
        hostile.title = "<@123> @everyone".into();
        notifier.notify(&subscription(1, vec![5, 6]), &hostile).await.unwrap();
        notifier.send(1, "plain").await.unwrap();

        assert_eq!(platform.mention_roles(), vec![vec![5, 6], vec![]]);
    }
}
