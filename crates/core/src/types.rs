//! Core type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of a launched token, derived from its market cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    New,
    Bonding,
    Graduated,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::New, Category::Bonding, Category::Graduated];

    pub fn name(&self) -> &'static str {
        match self {
            Category::New => "new",
            Category::Bonding => "bonding",
            Category::Graduated => "graduated",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Market metrics resolved for one mint by the enrichment service.
///
/// Every field defaults to `0.0` when the upstream response is partial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceMetric {
    pub price: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub price_change_24h: f64,
    pub liquidity: f64,
    pub curve_percent: f64,
}

impl PriceMetric {
    /// A metric with no market cap carries nothing worth merging
    pub fn has_market_cap(&self) -> bool {
        self.market_cap != 0.0
    }
}

/// One inbound feed frame kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawFrame {
    pub received_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl RawFrame {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            received_at: Utc::now(),
            payload,
        }
    }
}
