use std::path::Path;
use std::sync::Arc;

use crate::commands::{Commands, Invoker};
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::FeedFetcher;
use crate::notifier::Notifier;
use crate::platform::{ChatPlatform, DiscordClient, Permissions};
use crate::poller::Poller;

pub struct App {
    pub commands: Commands,
    pub poller: Poller,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let platform = Arc::new(DiscordClient::new(config.discord_token()?.to_string())?);
        Self::with_platform(config, platform).await
    }

    pub async fn with_platform(config: &Config, platform: Arc<dyn ChatPlatform>) -> Result<Self> {
        if let Some(parent) = Path::new(&config.database_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let repo = Arc::new(Repository::new(&config.database_path).await?);
        let fetcher = Arc::new(FeedFetcher::new(
            &config.user_agent,
            config.feed_cache_ttl(),
        )?);
        let notifier = Arc::new(Notifier::new(platform));

        Ok(Self {
            commands: Commands::new(repo.clone(), fetcher.clone(), notifier.clone()),
            poller: Poller::new(repo, fetcher, notifier, config.max_concurrent_fetches),
        })
    }

    /// The CLI operator acts with every permission on the given server.
    pub fn operator(server: u64) -> Invoker {
        Invoker {
            user: 0,
            server,
            permissions: Permissions::all_bits(),
        }
    }
}
