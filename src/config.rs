use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub scraper: ScraperConfig,

    pub scheduler: SchedulerConfig,

    pub lifecycle: LifecycleConfig,

    pub server: ServerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Emit logs as JSON lines instead of the human readable format.
    pub json_logs: bool,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/jobfeed.db".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Job board search endpoint returning HTML job cards.
    pub base_url: String,

    /// Number of job cards the board returns per page.
    pub page_size: u32,

    pub request_timeout_seconds: u64,

    pub user_agent: String,

    /// Total requests issued for a single page before giving up.
    pub max_attempts: u32,

    pub backoff_base_ms: u64,

    pub backoff_max_ms: u64,

    /// Time window used for a query that has never completed a cycle.
    pub default_window_days: u32,

    /// Status codes treated as transient.
    pub retryable_status_codes: Vec<u16>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search"
                .to_string(),
            page_size: 10,
            request_timeout_seconds: 10,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0"
                .to_string(),
            max_attempts: 5,
            backoff_base_ms: 1000,
            backoff_max_ms: 30_000,
            default_window_days: 7,
            retryable_status_codes: vec![408, 425, 429, 500, 502, 503, 504],
        }
    }
}

impl ScraperConfig {
    #[must_use]
    pub fn retryable_set(&self) -> HashSet<u16> {
        self.retryable_status_codes.iter().copied().collect()
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    /// How long `create_and_schedule` waits for the first run of a new query.
    pub first_run_timeout_seconds: u64,

    /// Delay before a one-off retry after a transient scrape failure.
    pub retry_delay_seconds: u64,

    /// How long shutdown waits for in-flight runs.
    pub shutdown_grace_seconds: u64,

    /// Cron expression (with seconds) for the daily retention sweep.
    pub retention_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            first_run_timeout_seconds: 10,
            retry_delay_seconds: 5 * 60,
            shutdown_grace_seconds: 30,
            retention_cron: "0 0 4 * * *".to_string(),
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub const fn first_run_timeout(&self) -> Duration {
        Duration::from_secs(self.first_run_timeout_seconds)
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Queries unread for longer than this are deleted on their next run.
    pub expiry_days: i64,

    /// Offers posted before this many days ago are removed by the daily sweep.
    pub retention_days: i64,

    /// Feeds only list offers posted within this many days.
    pub feed_window_days: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            expiry_days: 7,
            retention_days: 7,
            feed_window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub port: u16,

    /// Base URL used when handing out feed links. Falls back to the request host.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("jobfeed").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".jobfeed").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            Self::default().save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.scraper.base_url.is_empty() {
            anyhow::bail!("Scraper base URL cannot be empty");
        }
        url::Url::parse(&self.scraper.base_url).context("Scraper base URL is invalid")?;

        if self.scraper.page_size == 0 {
            anyhow::bail!("Scraper page size must be > 0");
        }

        if self.scraper.max_attempts == 0 {
            anyhow::bail!("Scraper max attempts must be > 0");
        }

        if self.lifecycle.expiry_days <= 0 || self.lifecycle.retention_days <= 0 {
            anyhow::bail!("Expiry and retention windows must be at least one day");
        }

        if self.lifecycle.feed_window_days <= 0 {
            anyhow::bail!("Feed window must be at least one day");
        }

        // Offers older than the retention window are gone by the time a feed asks for them.
        if self.lifecycle.feed_window_days > self.lifecycle.retention_days {
            anyhow::bail!(
                "Feed window ({} days) cannot exceed offer retention ({} days)",
                self.lifecycle.feed_window_days,
                self.lifecycle.retention_days
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scraper.page_size, 10);
        assert_eq!(config.scheduler.first_run_timeout_seconds, 10);
        assert_eq!(config.scheduler.retry_delay_seconds, 300);
        assert_eq!(config.lifecycle.expiry_days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retryable_set() {
        let set = ScraperConfig::default().retryable_set();
        for code in [408, 425, 429, 500, 502, 503, 504] {
            assert!(set.contains(&code), "{code} should be retryable");
        }
        assert!(!set.contains(&404));
        assert!(!set.contains(&200));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[scraper]"));
        assert!(toml_str.contains("[scheduler]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [scraper]
            page_size = 25
            retryable_status_codes = [429]
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.scraper.page_size, 25);
        assert_eq!(config.scraper.retryable_status_codes, vec![429]);

        assert_eq!(config.scraper.max_attempts, 5);
        assert_eq!(config.lifecycle.retention_days, 7);
    }

    #[test]
    fn test_validate_rejects_feed_window_beyond_retention() {
        let mut config = Config::default();
        config.lifecycle.retention_days = 7;
        config.lifecycle.feed_window_days = 7;
        assert!(config.validate().is_ok());

        config.lifecycle.feed_window_days = 14;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Feed window"));

        config.lifecycle.feed_window_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = Config::default();
        config.scraper.page_size = 0;
        assert!(config.validate().is_err());
    }
}
