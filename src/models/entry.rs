use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single item of a ScribbleHub feed, usually one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
    pub description: Option<String>,
}
