use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{NewSubscription, Subscription};

use super::schema::SCHEMA;

const SUBSCRIPTION_COLUMNS: &str =
    "uniq, source_id, feed_url, channel, server, user, name, date, mentions, accessible";

/// Subscription store. Every call runs on the single background connection
/// owned by `tokio_rusqlite`, so writes are serialized.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            // Set busy timeout to 5 seconds to handle concurrent access
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Inserts the subscription, or refreshes the existing one for the same
    /// channel and feed. Mentions of an existing record are preserved and it
    /// becomes accessible again.
    pub async fn upsert_subscription(&self, sub: NewSubscription) -> Result<Subscription> {
        let subscription = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO subscriptions (source_id, feed_url, channel, server, user, name, date)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                       ON CONFLICT(channel, feed_url) DO UPDATE SET
                           source_id = excluded.source_id,
                           server = excluded.server,
                           user = excluded.user,
                           name = excluded.name,
                           date = excluded.date,
                           accessible = 1"#,
                    params![
                        sub.id,
                        sub.feed_url,
                        sub.channel,
                        sub.server,
                        sub.user,
                        sub.name,
                        sub.date.to_rfc3339(),
                    ],
                )?;
                let subscription = conn.query_row(
                    &format!(
                        "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE channel = ?1 AND feed_url = ?2"
                    ),
                    params![sub.channel, sub.feed_url],
                    subscription_from_row,
                )?;
                Ok(subscription)
            })
            .await?;
        Ok(subscription)
    }

    pub async fn get_subscription(&self, unique: i64) -> Result<Option<Subscription>> {
        let subscription = self
            .conn
            .call(move |conn| {
                let subscription = conn
                    .query_row(
                        &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE uniq = ?1"),
                        params![unique],
                        subscription_from_row,
                    )
                    .optional()?;
                Ok(subscription)
            })
            .await?;
        Ok(subscription)
    }

    pub async fn get_subscriptions_by_server(&self, server: u64) -> Result<Vec<Subscription>> {
        let subscriptions = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE server = ?1 ORDER BY uniq"
                ))?;
                let subscriptions = stmt
                    .query_map(params![server], subscription_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(subscriptions)
            })
            .await?;
        Ok(subscriptions)
    }

    pub async fn get_accessible_subscriptions(&self) -> Result<Vec<Subscription>> {
        let subscriptions = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE accessible = 1 ORDER BY uniq"
                ))?;
                let subscriptions = stmt
                    .query_map([], subscription_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(subscriptions)
            })
            .await?;
        Ok(subscriptions)
    }

    pub async fn update_subscription_date(&self, unique: i64, date: DateTime<Utc>) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE subscriptions SET date = ?1 WHERE uniq = ?2",
                    params![date.to_rfc3339(), unique],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_accessible(&self, unique: i64, accessible: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE subscriptions SET accessible = ?1 WHERE uniq = ?2",
                    params![accessible, unique],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_mentions(&self, unique: i64, mentions: Vec<u64>) -> Result<()> {
        let mentions_json = serde_json::to_string(&mentions)?;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE subscriptions SET mentions = ?1 WHERE uniq = ?2",
                    params![mentions_json, unique],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub async fn delete_subscription(&self, unique: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted =
                    conn.execute("DELETE FROM subscriptions WHERE uniq = ?1", params![unique])?;
                Ok(deleted > 0)
            })
            .await?;
        Ok(deleted)
    }

    /// Drops every subscription pointing at a deleted channel.
    pub async fn delete_by_channel(&self, channel: u64) -> Result<usize> {
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM subscriptions WHERE channel = ?1",
                    params![channel],
                )?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn subscription_from_row(row: &Row) -> rusqlite::Result<Subscription> {
    // The last-seen mark decides what gets posted; never guess it.
    let raw_date: String = row.get(7)?;
    let date = parse_datetime(&raw_date).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            Type::Text,
            format!("invalid subscription date {raw_date:?}").into(),
        )
    })?;

    Ok(Subscription {
        unique: row.get(0)?,
        id: row.get(1)?,
        feed_url: row.get(2)?,
        channel: row.get(3)?,
        server: row.get(4)?,
        user: row.get(5)?,
        name: row.get(6)?,
        date,
        mentions: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        accessible: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::templates;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    struct TestRepo {
        repo: Repository,
        _tmpdir: TempDir,
    }

    async fn test_repo() -> TestRepo {
        let tmpdir = tempfile::tempdir().unwrap();
        let db_path = tmpdir.path().join("test.db");
        let repo = Repository::new(db_path.to_string_lossy().as_ref())
            .await
            .unwrap();
        TestRepo {
            repo,
            _tmpdir: tmpdir,
        }
    }

    fn new_sub(channel: u64, feed_url: &str) -> NewSubscription {
        NewSubscription {
            id: 42,
            feed_url: feed_url.into(),
            channel,
            server: 10,
            user: 20,
            name: "Alice's stories".into(),
            date: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn upsert_same_channel_and_feed_keeps_one_row() {
        let test = test_repo().await;
        let repo = &test.repo;

        let first = repo
            .upsert_subscription(new_sub(1, "https://example.com/a"))
            .await
            .unwrap();
        repo.set_mentions(first.unique, vec![99]).await.unwrap();
        repo.set_accessible(first.unique, false).await.unwrap();

        let mut again = new_sub(1, "https://example.com/a");
        again.name = "Renamed".into();
        let second = repo.upsert_subscription(again).await.unwrap();

        assert_eq!(first.unique, second.unique);
        assert_eq!(second.name, "Renamed");
        assert_eq!(second.mentions, vec![99]);
        assert!(second.accessible);
        assert_eq!(repo.get_subscriptions_by_server(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_feed_in_two_channels_is_two_subscriptions() {
        let test = test_repo().await;
        let repo = &test.repo;

        let a = repo
            .upsert_subscription(new_sub(1, "https://example.com/a"))
            .await
            .unwrap();
        let b = repo
            .upsert_subscription(new_sub(2, "https://example.com/a"))
            .await
            .unwrap();

        assert_ne!(a.unique, b.unique);
        assert_eq!(repo.get_accessible_subscriptions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lookup_by_unique_and_server() {
        let test = test_repo().await;
        let repo = &test.repo;

        let sub = repo
            .upsert_subscription(new_sub(1, "https://example.com/a"))
            .await
            .unwrap();

        assert_eq!(repo.get_subscription(sub.unique).await.unwrap(), Some(sub.clone()));
        assert!(repo.get_subscription(sub.unique + 1).await.unwrap().is_none());
        assert!(repo.get_subscriptions_by_server(11).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn date_update_round_trips_and_inaccessible_are_skipped() {
        let test = test_repo().await;
        let repo = &test.repo;

        let sub = repo
            .upsert_subscription(new_sub(1, "https://example.com/a"))
            .await
            .unwrap();
        let later = sub.date + Duration::hours(3);
        repo.update_subscription_date(sub.unique, later).await.unwrap();

        let stored = repo.get_subscription(sub.unique).await.unwrap().unwrap();
        assert_eq!(stored.date, later);

        repo.set_accessible(sub.unique, false).await.unwrap();
        assert!(repo.get_accessible_subscriptions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_by_channel_removes_all_feeds_of_that_channel() {
        let test = test_repo().await;
        let repo = &test.repo;

        repo.upsert_subscription(new_sub(1, "https://example.com/a"))
            .await
            .unwrap();
        repo.upsert_subscription(new_sub(1, "https://example.com/b"))
            .await
            .unwrap();
        let kept = repo
            .upsert_subscription(new_sub(2, "https://example.com/a"))
            .await
            .unwrap();

        assert_eq!(repo.delete_by_channel(1).await.unwrap(), 2);
        let remaining = repo.get_subscriptions_by_server(10).await.unwrap();
        assert_eq!(remaining, vec![kept.clone()]);

        assert!(repo.delete_subscription(kept.unique).await.unwrap());
        assert!(!repo.delete_subscription(kept.unique).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_date_surfaces_as_database_error() {
        let test = test_repo().await;
        let repo = &test.repo;

        let sub = repo
            .upsert_subscription(new_sub(1, "https://example.com/a"))
            .await
            .unwrap();
        let unique = sub.unique;

        repo.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE subscriptions SET mentions = 'oops' WHERE uniq = ?1",
                    params![unique],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        // Mentions are cosmetic and fall back to none.
        let stored = repo.get_subscription(unique).await.unwrap().unwrap();
        assert!(stored.mentions.is_empty());
        assert_eq!(stored.date, sub.date);

        repo.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE subscriptions SET date = 'not-a-datetime' WHERE uniq = ?1",
                    params![unique],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = repo.get_subscription(unique).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)), "{err:?}");
        assert_eq!(err.user_message(), templates::ERROR_DATABASE_FAILED);

        let err = repo.get_accessible_subscriptions().await.unwrap_err();
        assert_eq!(err.user_message(), templates::ERROR_DATABASE_FAILED);
    }
}
