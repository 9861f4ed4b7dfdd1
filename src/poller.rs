use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::FeedFetcher;
use crate::notifier::Notifier;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub delivered: usize,
    /// Entries Discord refused outright; they are not retried.
    pub skipped: usize,
    pub failed_feeds: usize,
    pub paused: usize,
}

pub struct Poller {
    repo: Arc<Repository>,
    fetcher: Arc<FeedFetcher>,
    notifier: Arc<Notifier>,
    max_concurrent: usize,
}

impl Poller {
    pub fn new(
        repo: Arc<Repository>,
        fetcher: Arc<FeedFetcher>,
        notifier: Arc<Notifier>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            repo,
            fetcher,
            notifier,
            max_concurrent,
        }
    }

    /// One pass over every accessible subscription.
    ///
    /// Each feed URL is fetched once. Entries newer than a subscription's
    /// last-seen date are posted oldest first, and the date is advanced
    /// after every successful post. An entry Discord will never accept is
    /// skipped past; any other delivery failure leaves the date alone so the
    /// entry is retried on the next pass.
    pub async fn poll_once(&self) -> Result<PollReport> {
        let subscriptions = self.repo.get_accessible_subscriptions().await?;
        let urls: BTreeSet<String> = subscriptions.iter().map(|s| s.feed_url.clone()).collect();

        let feeds: HashMap<_, _> = self
            .fetcher
            .refresh_all(urls.into_iter().collect(), self.max_concurrent)
            .await
            .into_iter()
            .collect();

        let mut report = PollReport {
            failed_feeds: feeds.values().filter(|r| r.is_err()).count(),
            ..PollReport::default()
        };

        for subscription in subscriptions {
            let Some(Ok(entries)) = feeds.get(&subscription.feed_url) else {
                continue;
            };

            let unseen = entries
                .iter()
                .rev()
                .filter(|entry| entry.published > subscription.date);

            for entry in unseen {
                match self.notifier.notify(&subscription, entry).await {
                    Ok(_) => {
                        self.repo
                            .update_subscription_date(subscription.unique, entry.published)
                            .await?;
                        report.delivered += 1;
                    }
                    Err(AppError::ChannelNotFound(channel)) => {
                        tracing::warn!(
                            "Channel {} is gone or unpostable, pausing subscription #{}",
                            channel,
                            subscription.unique
                        );
                        self.repo.set_accessible(subscription.unique, false).await?;
                        report.paused += 1;
                        break;
                    }
                    Err(AppError::MessageRejected(reason)) => {
                        tracing::warn!(
                            "Discord rejected {} for #{}, skipping it: {}",
                            entry.link,
                            subscription.unique,
                            reason
                        );
                        self.repo
                            .update_subscription_date(subscription.unique, entry.published)
                            .await?;
                        report.skipped += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to deliver {} for #{}: {}",
                            entry.link,
                            subscription.unique,
                            e
                        );
                        break;
                    }
                }
            }
        }

        if report.delivered > 0 || report.skipped > 0 || report.paused > 0 {
            tracing::info!(
                "Poll finished: {} delivered, {} skipped, {} feeds failed, {} paused",
                report.delivered,
                report.skipped,
                report.failed_feeds,
                report.paused
            );
        }
        Ok(report)
    }

    /// Polls every `interval` until `shutdown` resolves.
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutting down poller");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::error!("Poll failed: {}", e);
                    }
                }
            }
        }
    }
}
