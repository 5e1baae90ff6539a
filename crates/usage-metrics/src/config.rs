//! Usage metrics configuration.
//!
//! Loaded from a TOML file such as:
//!
//! ```toml
//! db_path = "/var/lib/usage/usage.redb"
//! refresh_interval = 60
//! cache_capacity = 1024
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, MetricsResult};

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageMetricsConfig {
    /// Path of the usage ledger database file.
    pub db_path: PathBuf,
    /// Seconds between refresh cycles.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Maximum tracked keys per counter family.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl UsageMetricsConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: UsageMetricsConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn with_refresh_interval(mut self, secs: u64) -> Self {
        self.refresh_interval = secs;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }

    /// Reject values the refresh loop cannot run with.
    pub fn validate(&self) -> MetricsResult<()> {
        if self.refresh_interval == 0 {
            return Err(MetricsError::InvalidConfig(
                "refresh_interval must be positive".to_string(),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(MetricsError::InvalidConfig(
                "cache_capacity must be positive".to_string(),
            ));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(MetricsError::InvalidConfig(
                "db_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_uses_defaults() {
        let toml_str = r#"
db_path = "/tmp/usage.redb"
"#;
        let config: UsageMetricsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/usage.redb"));
        assert_eq!(config.refresh_interval, 60);
        assert_eq!(config.cache_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full() {
        let toml_str = r#"
db_path = "usage.redb"
refresh_interval = 5
cache_capacity = 16
"#;
        let config: UsageMetricsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(config.cache_capacity, 16);
    }

    #[test]
    fn missing_db_path_fails_to_parse() {
        assert!(toml::from_str::<UsageMetricsConfig>("refresh_interval = 5").is_err());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usage.toml");
        std::fs::write(&path, "db_path = \"ledger.redb\"\nrefresh_interval = 30\n").unwrap();

        let config = UsageMetricsConfig::from_file(&path).unwrap();
        assert_eq!(config, UsageMetricsConfig::new("ledger.redb").with_refresh_interval(30));
    }

    #[test]
    fn zero_interval_rejected() {
        let config = UsageMetricsConfig::new("usage.redb").with_refresh_interval(0);
        assert!(matches!(
            config.validate(),
            Err(MetricsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = UsageMetricsConfig::new("usage.redb").with_cache_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_path_rejected() {
        assert!(UsageMetricsConfig::new("").validate().is_err());
    }
}
