//! Market-cap tiering
//!
//! Category is a pure function of market cap. Lower bounds are inclusive:
//! - `>= graduated` → Graduated
//! - `>= bonding`   → Bonding
//! - otherwise      → New

use serde::{Deserialize, Serialize};

use crate::Category;

/// Market cap (USD) at which a token enters the bonding tier
pub const BONDING_THRESHOLD_USD: f64 = 10_000.0;

/// Market cap (USD) at which a token counts as graduated
pub const GRADUATED_THRESHOLD_USD: f64 = 50_000.0;

/// Tier boundaries used by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryThresholds {
    pub bonding_usd: f64,
    pub graduated_usd: f64,
}

impl CategoryThresholds {
    pub fn classify(&self, market_cap_value: f64) -> Category {
        if market_cap_value >= self.graduated_usd {
            Category::Graduated
        } else if market_cap_value >= self.bonding_usd {
            Category::Bonding
        } else {
            Category::New
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.bonding_usd <= self.graduated_usd
    }
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            bonding_usd: BONDING_THRESHOLD_USD,
            graduated_usd: GRADUATED_THRESHOLD_USD,
        }
    }
}

/// Classify with the default thresholds
pub fn classify(market_cap_value: f64) -> Category {
    CategoryThresholds::default().classify(market_cap_value)
}
