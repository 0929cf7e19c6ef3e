//! Application configuration structures
//!
//! Loading (env vars, config files) lives in the infra crate; this module only
//! defines the shape, defaults and validation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_GENOMICS_BATCH_SIZE, DEFAULT_IGNORED_FIELDS, DEFAULT_MAX_RETRY, DEFAULT_SWEEP_LIMIT,
};
use crate::{CohortSyncError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub partner: PartnerConfig,
    pub genomics: GenomicsConfig,
    pub retry: RetryConfig,
    pub change_detection: ChangeDetectionConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values that would make a job misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.partner.base_url.trim().is_empty() {
            return Err(CohortSyncError::Config("partner.base_url must not be empty".into()));
        }
        if self.genomics.batch_size == 0 {
            return Err(CohortSyncError::Config("genomics.batch_size must be at least 1".into()));
        }
        if self.retry.max_retry <= 0 {
            return Err(CohortSyncError::Config("retry.max_retry must be at least 1".into()));
        }
        if self.dispatch.partitions == 0 {
            return Err(CohortSyncError::Config("dispatch.partitions must be at least 1".into()));
        }
        for (name, expr) in [
            ("genomics.fetch_cron", &self.genomics.fetch_cron),
            ("genomics.publish_cron", &self.genomics.publish_cron),
            ("retry.sweep_cron", &self.retry.sweep_cron),
        ] {
            let fields = expr.split_whitespace().count();
            if !(6..=7).contains(&fields) {
                return Err(CohortSyncError::Config(format!(
                    "{name} must be a 6 or 7 field cron expression, got '{expr}'"
                )));
            }
        }
        Ok(())
    }
}

/// SQLite database settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("cohortsync.db"), pool_size: 8 }
    }
}

/// Partner registry API settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartnerConfig {
    pub base_url: String,
    pub feed_path: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub api_token: Option<String>,
}

impl std::fmt::Debug for PartnerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartnerConfig")
            .field("base_url", &self.base_url)
            .field("feed_path", &self.feed_path)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for PartnerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            feed_path: "genomics/status".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            api_token: None,
        }
    }
}

/// Genomics fetch/publish pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenomicsConfig {
    pub batch_size: usize,
    pub fetch_cron: String,
    pub publish_cron: String,
}

impl Default for GenomicsConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_GENOMICS_BATCH_SIZE,
            fetch_cron: "0 */15 * * * *".to_string(),
            publish_cron: "30 */5 * * * *".to_string(),
        }
    }
}

/// Retry queue sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retry: i32,
    pub sweep_cron: String,
    pub sweep_limit: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry: DEFAULT_MAX_RETRY,
            sweep_cron: "0 0 * * * *".to_string(),
            sweep_limit: DEFAULT_SWEEP_LIMIT,
        }
    }
}

/// Change-detection gate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeDetectionConfig {
    pub ignored_fields: Vec<String>,
}

impl Default for ChangeDetectionConfig {
    fn default() -> Self {
        Self { ignored_fields: DEFAULT_IGNORED_FIELDS.iter().map(|s| (*s).to_string()).collect() }
    }
}

/// Inbound event dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub partitions: usize,
    pub channel_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { partitions: 4, channel_capacity: 256 }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_batch_size_rejected() {
        let mut config = Config::default();
        config.genomics.batch_size = 0;
        assert!(matches!(config.validate(), Err(CohortSyncError::Config(_))));
    }

    #[test]
    fn five_field_cron_rejected() {
        let mut config = Config::default();
        config.retry.sweep_cron = "*/5 * * * *".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retry.sweep_cron"));
    }

    #[test]
    fn api_token_is_redacted_in_debug() {
        let partner =
            PartnerConfig { api_token: Some("s3cret".into()), ..PartnerConfig::default() };
        let rendered = format!("{partner:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn partial_toml_like_input_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"genomics": {"batch_size": 25}}"#).unwrap();
        assert_eq!(config.genomics.batch_size, 25);
        assert_eq!(config.genomics.fetch_cron, GenomicsConfig::default().fetch_cron);
        assert_eq!(config.retry.max_retry, DEFAULT_MAX_RETRY);
    }
}
