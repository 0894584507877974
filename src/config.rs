use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::core::error::SyncError;

/// Which upstream data environment to poll. Production serves live National
/// Hurricane Center data; development serves mock or replayed data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
}

/// Typed application configuration, loaded once at startup and passed by
/// reference to each component. Range validation happens here, never in
/// business logic.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub environment: Environment,
    /// Explicit upstream base URL. Overrides the environment-derived host;
    /// used by local runs and tests.
    pub api_base: Option<String>,
    /// How frequently (in minutes) to poll the summary API for updates.
    pub poll_frequency_minutes: u32,
    /// How many hours before cached summary data is considered stale.
    pub stale_hours: u32,
    /// Whether detected changes may automatically republish a summary post.
    pub automate_reposts: bool,
    /// Repost on a timer every N hours even without changes. 0 disables the
    /// timer and reposts only on detected changes.
    pub repost_cadence_hours: u32,
    /// How long (in minutes) an identical alert is silenced.
    pub notification_silence_minutes: u32,
    /// Webhook URL alerts are dispatched to. Alerting is disabled when unset.
    pub webhook_url: Option<String>,
    /// Endpoint of the publisher service that creates summary posts.
    /// Republish actions fail with a configuration error when unset.
    pub publish_url: Option<String>,
    /// Path of the sqlite database backing the key-value store.
    pub database_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            api_base: None,
            poll_frequency_minutes: 1,
            stale_hours: 12,
            automate_reposts: false,
            repost_cadence_hours: 0,
            notification_silence_minutes: 30,
            webhook_url: None,
            publish_url: None,
            database_path: "stormwatch.db".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&raw)
            .map_err(|e| SyncError::configuration(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.poll_frequency_minutes < 1 || self.poll_frequency_minutes > 60 {
            return Err(SyncError::configuration(
                "poll_frequency_minutes must be between 1 and 60",
            ));
        }
        if self.stale_hours < 1 {
            return Err(SyncError::configuration("stale_hours must be at least 1"));
        }
        if self.repost_cadence_hours != 0 && self.repost_cadence_hours < 6 {
            return Err(SyncError::configuration(
                "repost_cadence_hours must be 0 (change-triggered only) or at least 6",
            ));
        }
        for (name, value) in [
            ("webhook_url", &self.webhook_url),
            ("publish_url", &self.publish_url),
            ("api_base", &self.api_base),
        ] {
            if let Some(value) = value
                && Url::parse(value).is_err()
            {
                return Err(SyncError::configuration(format!(
                    "{name} is not a valid URL: {value}"
                )));
            }
        }
        Ok(())
    }

    /// Base URL of the summary API for the configured environment.
    pub fn summary_api_url(&self) -> String {
        if let Some(base) = &self.api_base {
            return base.clone();
        }
        match self.environment {
            Environment::Production => "https://stormwatch.net/api/v1/".to_string(),
            Environment::Development => "https://dev.stormwatch.net/api/v1/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_frequency_minutes, 1);
        assert_eq!(config.stale_hours, 12);
        assert!(!config.automate_reposts);
        assert_eq!(config.repost_cadence_hours, 0);
        assert_eq!(config.notification_silence_minutes, 30);
    }

    #[test]
    fn poll_frequency_bounds_are_enforced() {
        let mut config = AppConfig {
            poll_frequency_minutes: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
        config.poll_frequency_minutes = 61;
        assert!(config.validate().is_err());
        config.poll_frequency_minutes = 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cadence_must_be_zero_or_at_least_six() {
        let mut config = AppConfig {
            repost_cadence_hours: 3,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
        config.repost_cadence_hours = 0;
        assert!(config.validate().is_ok());
        config.repost_cadence_hours = 6;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn webhook_url_must_parse() {
        let config = AppConfig {
            webhook_url: Some("not a url".into()),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn api_base_override_wins_over_environment() {
        let config = AppConfig {
            environment: Environment::Development,
            api_base: Some("http://127.0.0.1:9000/api/v1/".into()),
            ..AppConfig::default()
        };
        assert_eq!(config.summary_api_url(), "http://127.0.0.1:9000/api/v1/");
    }

    #[test]
    fn environment_selects_upstream_host() {
        let mut config = AppConfig::default();
        assert!(!config.summary_api_url().contains("dev."));
        config.environment = Environment::Development;
        assert!(config.summary_api_url().contains("dev."));
    }

    #[test]
    fn parses_minimal_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            environment = "development"
            poll_frequency_minutes = 5
            automate_reposts = true
            repost_cadence_hours = 12
            "#,
        )
        .expect("parse");
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.poll_frequency_minutes, 5);
        assert!(config.automate_reposts);
        assert_eq!(config.repost_cadence_hours, 12);
        // untouched fields keep their defaults
        assert_eq!(config.stale_hours, 12);
    }
}
