use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const TOKEN_ENV: &str = "AMELIA_DISCORD_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discord_token: Option<String>,
    pub database_path: String,
    pub poll_interval_secs: u64,
    /// Keep below `poll_interval_secs`, or passes will see stale feeds.
    pub feed_cache_secs: u64,
    pub max_concurrent_fetches: usize,
    pub user_agent: String,
    pub log_file: Option<String>,
    /// Set when this load wrote the default file. Loading happens before
    /// logging is up, so the caller reports it.
    #[serde(skip)]
    pub created_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let database_path = dirs::data_dir()
            .map(|dir| dir.join("amelia").join("amelia.db"))
            .unwrap_or_else(|| PathBuf::from("amelia.db"));

        Self {
            discord_token: None,
            database_path: database_path.to_string_lossy().into_owned(),
            poll_interval_secs: 300,
            feed_cache_secs: 60,
            max_concurrent_fetches: 5,
            user_agent: "amelia/0.1".to_string(),
            log_file: Some("/tmp/amelia.log".to_string()),
            created_file: None,
        }
    }
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("amelia").join("config.toml"))
    }

    /// Loads the config file, writing a default one on first run. The token
    /// can always be overridden through `AMELIA_DISCORD_TOKEN`.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };

        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.discord_token = Some(token);
            }
        }

        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, toml::to_string_pretty(&config)?)?;
            return Ok(Self {
                created_file: Some(path.to_path_buf()),
                ..config
            });
        }

        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn discord_token(&self) -> Result<&str> {
        self.discord_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                AppError::Other(anyhow::anyhow!(
                    "no Discord token configured; set discord_token or {TOKEN_ENV}"
                ))
            })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn feed_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.feed_cache_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.poll_interval_secs, 300);
        assert_eq!(config.created_file.as_deref(), Some(path.as_path()));

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.database_path, config.database_path);
        assert_eq!(reloaded.created_file, None);
        assert!(!std::fs::read_to_string(&path).unwrap().contains("created_file"));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_secs = 30\ndiscord_token = \"abc\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.max_concurrent_fetches, 5);
        assert_eq!(config.discord_token().unwrap(), "abc");
    }

    #[test]
    fn blank_token_is_rejected() {
        let config = Config {
            discord_token: Some("  ".into()),
            ..Config::default()
        };
        assert!(config.discord_token().is_err());
    }

    #[test]
    fn malformed_file_is_a_toml_error() {
        let tmpdir = tempfile::tempdir().unwrap();
        let path = tmpdir.path().join("config.toml");
        std::fs::write(&path, "poll_interval_secs = \"soon\"").unwrap();

        assert!(matches!(Config::load_from(&path), Err(AppError::Toml(_))));
    }
}
