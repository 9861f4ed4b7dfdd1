use thiserror::Error;

use crate::templates;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing failed: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("Feed is unreachable: {0}")]
    FeedUnreachable(String),

    #[error("Feed has no entries")]
    FeedEmpty,

    #[error("Feed entry has no publish date: {0}")]
    DateNotFound(String),

    #[error("Subscription {0} not found")]
    FeedNotFound(i64),

    #[error("Channel {0} is missing or not postable")]
    ChannelNotFound(u64),

    #[error("Invoker lacks Manage Server or Manage Channels")]
    MissingPermissions,

    #[error("Discord API error: {0}")]
    DiscordApi(String),

    #[error("Discord rejected the message: {0}")]
    MessageRejected(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// The message shown to the Discord user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Sqlite(_) => templates::ERROR_DATABASE_FAILED,
            AppError::Http(_) | AppError::FeedParse(_) | AppError::FeedUnreachable(_) => {
                templates::ERROR_SCRIBBLEHUB_UNREACHABLE
            }
            AppError::FeedEmpty => templates::ERROR_SCRIBBLEHUB_NOT_ACCESSIBLE,
            AppError::DateNotFound(_) => templates::ERROR_DATE_NOT_FOUND,
            AppError::FeedNotFound(_) => templates::ERROR_FEED_NOT_FOUND,
            AppError::ChannelNotFound(_) => templates::ERROR_CHANNEL_NOT_FOUND,
            AppError::MissingPermissions => templates::ERROR_MISSING_PERMISSIONS,
            _ => templates::ERROR_FAILED_TO_PERFORM_ACTION,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
