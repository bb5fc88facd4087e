//! Serializable pipeline configuration.
//!
//! Loaded from TOML; every table and field is optional and falls back to the
//! production defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tickerfunnel_core::data::nasdaq::DEFAULT_LISTING_BASE_URL;
use tickerfunnel_core::data::yahoo::{DEFAULT_CHART_BASE_URL, DEFAULT_SUMMARY_BASE_URL};
use tickerfunnel_core::data::BackoffConfig;
use tickerfunnel_core::store::PriceFilter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration for one pipeline invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub filter: FilterConfig,
    pub batching: BatchingConfig,
    pub backoff: BackoffSettings,
    pub endpoints: EndpointsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub db_path: PathBuf,
    /// Directory receiving `trie.json` and `metadata.json`.
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/tickers.db"),
            output_dir: PathBuf::from("public/data"),
        }
    }
}

/// Pass 1 survivor thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub min_price: f64,
    pub min_volume: i64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let f = PriceFilter::default();
        Self {
            min_price: f.min_price,
            min_volume: f.min_volume,
        }
    }
}

impl FilterConfig {
    pub fn price_filter(&self) -> PriceFilter {
        PriceFilter {
            min_price: self.min_price,
            min_volume: self.min_volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    pub price_batch_size: usize,
    pub metadata_batch_size: usize,
    /// Pause between consecutive batches of one stage.
    pub inter_batch_delay_ms: u64,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            price_batch_size: 100,
            metadata_batch_size: 50,
            inter_batch_delay_ms: 1_000,
        }
    }
}

impl BatchingConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 300_000,
            multiplier: 2.0,
        }
    }
}

impl BackoffSettings {
    pub fn to_backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            initial: Duration::from_millis(self.initial_delay_ms),
            ceiling: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
        }
    }
}

/// Upstream endpoints and network tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub listing_base_url: String,
    pub quote_base_url: String,
    pub summary_base_url: String,
    pub listing_probe_host: String,
    pub market_probe_host: String,
    pub probe_port: u16,
    pub probe_timeout_ms: u64,
    pub http_timeout_ms: u64,
    /// Worker threads used by the bulk quote call.
    pub quote_workers: usize,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            listing_base_url: DEFAULT_LISTING_BASE_URL.to_string(),
            quote_base_url: DEFAULT_CHART_BASE_URL.to_string(),
            summary_base_url: DEFAULT_SUMMARY_BASE_URL.to_string(),
            listing_probe_host: "www.nasdaqtrader.com".to_string(),
            market_probe_host: "query1.finance.yahoo.com".to_string(),
            probe_port: 443,
            probe_timeout_ms: 5_000,
            http_timeout_ms: 30_000,
            quote_workers: 8,
        }
    }
}

impl EndpointsConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.batching.price_batch_size == 0 {
            return invalid("batching.price_batch_size must be > 0".into());
        }
        if self.batching.metadata_batch_size == 0 {
            return invalid("batching.metadata_batch_size must be > 0".into());
        }
        if !self.filter.min_price.is_finite() || self.filter.min_price < 0.0 {
            return invalid(format!("filter.min_price must be >= 0, got {}", self.filter.min_price));
        }
        if self.filter.min_volume < 0 {
            return invalid(format!("filter.min_volume must be >= 0, got {}", self.filter.min_volume));
        }
        if !(self.backoff.multiplier > 1.0) {
            return invalid(format!(
                "backoff.multiplier must be > 1, got {}",
                self.backoff.multiplier
            ));
        }
        if self.backoff.initial_delay_ms == 0 {
            return invalid("backoff.initial_delay_ms must be > 0".into());
        }
        if self.backoff.max_delay_ms < self.backoff.initial_delay_ms {
            return invalid(format!(
                "backoff.max_delay_ms ({}) is below initial_delay_ms ({})",
                self.backoff.max_delay_ms, self.backoff.initial_delay_ms
            ));
        }
        if self.endpoints.quote_workers == 0 {
            return invalid("endpoints.quote_workers must be > 0".into());
        }
        Ok(())
    }
}
