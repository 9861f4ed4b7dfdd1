use std::collections::HashMap;
use std::time::{Duration, Instant};

use feed_rs::parser;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::FeedEntry;

struct CachedFeed {
    fetched_at: Instant,
    entries: Vec<FeedEntry>,
}

pub struct FeedFetcher {
    client: Client,
    cache_ttl: Duration,
    cache: Mutex<HashMap<String, CachedFeed>>,
}

impl FeedFetcher {
    pub fn new(user_agent: &str, cache_ttl: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            cache_ttl,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Fetches and parses the feed, newest entry first.
    ///
    /// An empty feed is `Ok(vec![])`; transport and parse failures are
    /// reported as errors so the two are never confused.
    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::FeedUnreachable(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let bytes = response.bytes().await?;
        parse_entries(&bytes[..])
    }

    /// Like [`fetch_feed`](Self::fetch_feed), but reuses a result fetched
    /// within the cache TTL. Failures are never cached.
    pub async fn cached(&self, url: &str) -> Result<Vec<FeedEntry>> {
        {
            let cache = self.cache.lock().await;
            if let Some(hit) = cache.get(url) {
                if hit.fetched_at.elapsed() < self.cache_ttl {
                    tracing::trace!("feed cache hit for {}", url);
                    return Ok(hit.entries.clone());
                }
            }
        }

        let entries = self.fetch_feed(url).await?;
        self.cache.lock().await.insert(
            url.to_string(),
            CachedFeed {
                fetched_at: Instant::now(),
                entries: entries.clone(),
            },
        );
        Ok(entries)
    }

    #[cfg(test)]
    pub async fn prime(&self, url: &str, entries: Vec<FeedEntry>) {
        self.cache.lock().await.insert(
            url.to_string(),
            CachedFeed {
                fetched_at: Instant::now(),
                entries,
            },
        );
    }

    /// Fetch a set of feeds concurrently with rate limiting
    pub async fn refresh_all(
        &self,
        urls: Vec<String>,
        max_concurrent: usize,
    ) -> Vec<(String, Result<Vec<FeedEntry>>)> {
        stream::iter(urls)
            .map(|url| async move {
                let result = self.cached(&url).await;
                match &result {
                    Ok(entries) => tracing::debug!("Fetched {} entries from {}", entries.len(), url),
                    Err(e) => tracing::warn!("Failed to fetch {}: {}", url, e),
                }
                (url, result)
            })
            .buffer_unordered(max_concurrent.max(1))
            .collect()
            .await
    }
}

/// Parses an RSS/Atom document into entries sorted newest first.
///
/// Every entry must carry a publish (or updated) date.
pub fn parse_entries(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(bytes)?;

    let mut entries = feed
        .entries
        .into_iter()
        .map(|entry| -> Result<FeedEntry> {
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            let published = entry
                .published
                .or(entry.updated)
                .ok_or_else(|| AppError::DateNotFound(title.clone()))?;

            let description = entry
                .summary
                .as_ref()
                .and_then(|s| html2text::from_read(s.content.as_bytes(), 80).ok())
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());

            Ok(FeedEntry {
                link: entry
                    .links
                    .first()
                    .map(|l| l.href.clone())
                    .unwrap_or_default(),
                title,
                published,
                description,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    entries.sort_by(|a, b| b.published.cmp(&a.published));
    Ok(entries)
}
