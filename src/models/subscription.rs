use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub unique: i64,
    /// ScribbleHub author uid or series sid.
    pub id: i64,
    pub feed_url: String,
    pub channel: u64,
    pub server: u64,
    pub user: u64,
    pub name: String,
    /// Publish date of the last delivered entry.
    pub date: DateTime<Utc>,
    pub mentions: Vec<u64>,
    pub accessible: bool,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub id: i64,
    pub feed_url: String,
    pub channel: u64,
    pub server: u64,
    pub user: u64,
    pub name: String,
    pub date: DateTime<Utc>,
}
