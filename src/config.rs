//! Configuration for the sync service.
//!
//! Settings come from an optional TOML file plus `PODSYNC_*` environment
//! variables; env vars take precedence over the file. A missing file yields
//! `Config::default()` so the binary can run from env vars alone, which is
//! how it is deployed.

use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid feed URL '{url}': {reason}")]
    InvalidFeedUrl { url: String, reason: String },

    #[error("Invalid value for {var}: {reason}")]
    InvalidEnv { var: String, reason: String },
}

/// Top-level service configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified
/// in the file. The custom `Debug` impl masks `sync_token` so the bearer
/// credential never lands in logs or panic messages.
#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL of the podcast RSS feed to sync from. Required at runtime;
    /// fixed per deployment, never taken from request input.
    pub feed_url: String,

    /// Path to the SQLite database file.
    pub database_path: String,

    /// Address the HTTP server binds to.
    pub bind_host: String,
    pub bind_port: u16,

    /// Bearer token protecting the sync trigger endpoint. When unset the
    /// endpoint is open, which is only acceptable for local development.
    #[serde(deserialize_with = "deserialize_secret")]
    pub sync_token: Option<SecretString>,

    /// Minutes between scheduled sync runs. 0 = manual trigger only.
    pub sync_interval_minutes: u64,

    /// Cover image URL used for episodes whose feed item carries none.
    pub default_cover_image: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: String::new(),
            database_path: "podsync.db".to_string(),
            bind_host: "127.0.0.1".to_string(),
            bind_port: 8787,
            sync_token: None,
            sync_interval_minutes: 0,
            default_cover_image:
                "https://images.unsplash.com/photo-1520975916090-3105956dac38?q=80&w=600&auto=format&fit=crop"
                    .to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("feed_url", &self.feed_url)
            .field("database_path", &self.database_path)
            .field("bind_host", &self.bind_host)
            .field("bind_port", &self.bind_port)
            .field("sync_token", &self.sync_token.as_ref().map(|_| "[REDACTED]"))
            .field("sync_interval_minutes", &self.sync_interval_minutes)
            .field("default_cover_image", &self.default_cover_image)
            .finish()
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply env overrides.
    ///
    /// - Missing file → defaults + env
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line info
    /// - Unknown keys → accepted, logged as a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => {
                tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
                Self::default()
            }
            Ok(content) => {
                warn_unknown_keys(&content);
                toml::from_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        config.apply_env()?;
        Ok(config)
    }

    /// Apply `PODSYNC_*` environment variables over the file values.
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("PODSYNC_FEED_URL") {
            self.feed_url = v;
        }
        if let Ok(v) = std::env::var("PODSYNC_DATABASE_PATH") {
            self.database_path = v;
        }
        if let Ok(v) = std::env::var("PODSYNC_BIND_HOST") {
            self.bind_host = v;
        }
        if let Ok(v) = std::env::var("PODSYNC_BIND_PORT") {
            self.bind_port = v.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "PODSYNC_BIND_PORT".to_string(),
                reason: format!("'{}' is not a port number", v),
            })?;
        }
        if let Ok(v) = std::env::var("PODSYNC_SYNC_TOKEN") {
            self.sync_token = Some(SecretString::from(v));
        }
        if let Ok(v) = std::env::var("PODSYNC_SYNC_INTERVAL_MINUTES") {
            self.sync_interval_minutes = v.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "PODSYNC_SYNC_INTERVAL_MINUTES".to_string(),
                reason: format!("'{}' is not a number of minutes", v),
            })?;
        }
        Ok(())
    }

    /// Check that the configuration is usable for a sync run.
    ///
    /// The feed URL must be present and be an absolute http(s) URL; the job
    /// must never be pointed at arbitrary schemes or relative paths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.feed_url).map_err(|e| ConfigError::InvalidFeedUrl {
            url: self.feed_url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(ConfigError::InvalidFeedUrl {
                url: self.feed_url.clone(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }

    /// The socket address string the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn warn_unknown_keys(content: &str) {
    let known_keys = [
        "feed_url",
        "database_path",
        "bind_host",
        "bind_port",
        "sync_token",
        "sync_interval_minutes",
        "default_cover_image",
    ];
    if let Ok(raw) = content.parse::<toml::Table>() {
        for key in raw.keys() {
            if !known_keys.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.feed_url, "");
        assert_eq!(config.database_path, "podsync.db");
        assert_eq!(config.bind_port, 8787);
        assert!(config.sync_token.is_none());
        assert_eq!(config.sync_interval_minutes, 0);
        assert!(config.default_cover_image.starts_with("https://"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/podsync_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.database_path, "podsync.db");
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("podsync_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "feed_url = \"https://example.com/rss\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.feed_url, "https://example.com/rss");
        assert_eq!(config.bind_port, 8787); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("podsync_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
feed_url = "https://anchor.fm/s/example/podcast/rss"
database_path = "/var/lib/podsync/episodes.db"
bind_host = "0.0.0.0"
bind_port = 9000
sync_token = "trigger-secret"
sync_interval_minutes = 60
default_cover_image = "https://cdn.example.com/cover.jpg"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.feed_url, "https://anchor.fm/s/example/podcast/rss");
        assert_eq!(config.database_path, "/var/lib/podsync/episodes.db");
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
        assert_eq!(
            config.sync_token.as_ref().unwrap().expose_secret(),
            "trigger-secret"
        );
        assert_eq!(config.sync_interval_minutes, 60);
        assert_eq!(config.default_cover_image, "https://cdn.example.com/cover.jpg");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("podsync_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_rejects_missing_feed_url() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFeedUrl { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let config = Config {
            feed_url: "file:///etc/passwd".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFeedUrl { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_https() {
        let config = Config {
            feed_url: "https://example.com/podcast/rss".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_masks_sync_token() {
        let config = Config {
            sync_token: Some(SecretString::from("super-secret-token".to_string())),
            ..Config::default()
        };

        let debug_output = format!("{:?}", config);
        assert!(
            !debug_output.contains("super-secret-token"),
            "Debug output should not contain the token"
        );
        assert!(debug_output.contains("[REDACTED]"));
    }
}
