//! Configuration for forge access, budgets and retrieval pacing

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ForgeIngestConfig {
    pub api: ApiConfig,
    pub budget: IngestionBudget,
    pub retrieval: RetrievalConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    #[serde(with = "duration_string")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            user_agent: concat!("forge-ingest/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Hard ceilings for a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionBudget {
    pub max_files: usize,
    /// Files whose size is at or above this are skipped
    pub max_file_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for IngestionBudget {
    fn default() -> Self {
        Self {
            max_files: 1000,
            max_file_bytes: 1024 * 1024,          // 1MB
            max_total_bytes: 100 * 1024 * 1024, // 100MB
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Concurrent fetches per batch
    pub batch_size: usize,
    #[serde(with = "duration_string")]
    pub inter_batch_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            batch_size: 4,
            inter_batch_delay: Duration::from_millis(300),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Regexes appended to the built-in ignore list
    pub extra_ignore_patterns: Vec<String>,
    /// Extensions (without the dot) accepted in addition to the built-in set
    pub extra_extensions: Vec<String>,
}

impl ForgeIngestConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: ForgeIngestConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("FORGE_INGEST_API_URL") {
            config.api.base_url = url;
        }
        if let Ok(timeout) = std::env::var("FORGE_INGEST_TIMEOUT") {
            config.api.request_timeout = duration_string::parse(&timeout)
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid FORGE_INGEST_TIMEOUT '{}'", timeout))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.budget.max_files == 0 {
            bail!("budget.max_files must be greater than zero");
        }
        if self.budget.max_file_bytes == 0 || self.budget.max_total_bytes == 0 {
            bail!("budget byte limits must be greater than zero");
        }
        if self.retrieval.batch_size == 0 {
            bail!("retrieval.batch_size must be greater than zero");
        }
        if self.retrieval.retry.max_attempts == 0 {
            bail!("retrieval.retry.max_attempts must be greater than zero");
        }
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url must not be empty");
        }
        for pattern in &self.filter.extra_ignore_patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid ignore pattern '{}'", pattern))?;
        }
        Ok(())
    }
}

// Durations are written as "250ms" or "15s"
pub mod duration_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn parse(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            let millis: u64 = ms.trim().parse().map_err(|e| format!("{}", e))?;
            Ok(Duration::from_millis(millis))
        } else if let Some(secs) = s.strip_suffix('s') {
            let secs: u64 = secs.trim().parse().map_err(|e| format!("{}", e))?;
            Ok(Duration::from_secs(secs))
        } else {
            Err(format!(
                "Expected duration string ending with 'ms' or 's', got '{}'",
                s
            ))
        }
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = if duration.subsec_millis() == 0 {
            format!("{}s", duration.as_secs())
        } else {
            format!("{}ms", duration.as_millis())
        };
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}
