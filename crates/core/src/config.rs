//! Configuration types
//!
//! Every knob has a named default. Values can be overridden from an optional
//! config file and from `TOKENFEED_*` environment variables, with `__`
//! separating nested keys (e.g. `TOKENFEED_FEED__RECONNECT_DELAY_MS=2000`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{CategoryThresholds, ConfigError, ConfigResult};

pub const DEFAULT_FEED_URL: &str = "wss://pumpportal.fun/api/data";
pub const SUBSCRIBE_NEW_TOKEN: &str = "subscribeNewToken";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5_000;
/// Wait before normalizing an event so companion upstream data can land
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;
pub const RAW_TRAIL_CAPACITY: usize = 20;

pub const STORE_CAPACITY: usize = 150;

pub const DEFAULT_METRIC_ENDPOINT: &str = "https://api.mevx.io/api/v1/pools/search";
pub const METRIC_BATCH_SIZE: usize = 3;
pub const METRIC_REQUEST_SPACING_MS: u64 = 100;
pub const METRIC_BATCH_PAUSE_MS: u64 = 2_000;

pub const DEFAULT_DEX_ORDERS_ENDPOINT: &str = "https://api.dexscreener.com/orders/v1/solana";

pub const ENV_PREFIX: &str = "TOKENFEED";

/// Streaming feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    pub subscribe_method: String,
    pub reconnect_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub raw_trail_capacity: usize,
    pub frame_buffer: usize,
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn subscribe_message(&self) -> serde_json::Value {
        serde_json::json!({ "method": self.subscribe_method })
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            subscribe_method: SUBSCRIBE_NEW_TOKEN.to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            raw_trail_capacity: RAW_TRAIL_CAPACITY,
            frame_buffer: 1_024,
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub capacity: usize,
    pub thresholds: CategoryThresholds,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: STORE_CAPACITY,
            thresholds: CategoryThresholds::default(),
        }
    }
}

/// Price enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnricherConfig {
    pub endpoint: String,
    pub batch_size: usize,
    pub request_spacing_ms: u64,
    pub batch_pause_ms: u64,
}

impl EnricherConfig {
    pub fn request_spacing(&self) -> Duration {
        Duration::from_millis(self.request_spacing_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_METRIC_ENDPOINT.to_string(),
            batch_size: METRIC_BATCH_SIZE,
            request_spacing_ms: METRIC_REQUEST_SPACING_MS,
            batch_pause_ms: METRIC_BATCH_PAUSE_MS,
        }
    }
}

/// Listing-order ("DEX paid") check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DexPaidConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub poll_interval_ms: u64,
}

impl DexPaidConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for DexPaidConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_DEX_ORDERS_ENDPOINT.to_string(),
            poll_interval_ms: 30_000,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub store: StoreConfig,
    pub enricher: EnricherConfig,
    pub dex_paid: DexPaidConfig,
    pub status_log_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            store: StoreConfig::default(),
            enricher: EnricherConfig::default(),
            dex_paid: DexPaidConfig::default(),
            status_log_interval_ms: 60_000,
        }
    }
}

impl AppConfig {
    /// Load from an optional file, then environment overrides
    pub fn load(path: Option<&str>) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path).required(false));
        }

        let loaded: AppConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.feed.url.is_empty() {
            return Err(ConfigError::Invalid("feed.url must not be empty".into()));
        }
        if self.feed.raw_trail_capacity == 0 || self.feed.frame_buffer == 0 {
            return Err(ConfigError::Invalid(
                "feed.raw_trail_capacity and feed.frame_buffer must be positive".into(),
            ));
        }
        if self.store.capacity == 0 {
            return Err(ConfigError::Invalid("store.capacity must be positive".into()));
        }
        if !self.store.thresholds.is_ordered() {
            return Err(ConfigError::Invalid(format!(
                "bonding threshold {} exceeds graduated threshold {}",
                self.store.thresholds.bonding_usd, self.store.thresholds.graduated_usd
            )));
        }
        if self.enricher.batch_size == 0 {
            return Err(ConfigError::Invalid("enricher.batch_size must be positive".into()));
        }
        Ok(())
    }
}
