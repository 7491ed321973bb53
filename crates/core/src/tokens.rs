//! Token records
//!
//! A [`NormalizedToken`] is what the normalizer produces from one feed event.
//! It becomes a [`TokenRecord`] only by passing through the classifier, and
//! the record keeps its market cap and category private so the two can never
//! drift apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::{format_grouped, format_price};
use crate::{Category, CategoryThresholds, PriceMetric};

pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg?height=48&width=48";
pub const UNKNOWN_NAME: &str = "Unknown Token";
pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";
pub const UNKNOWN_CREATOR: &str = "Unknown";

/// Canonical token fields, not yet classified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedToken {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
    pub metadata_uri: Option<String>,
    pub creator: String,
    pub signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub price: Option<String>,
    pub market_cap: Option<String>,
    pub market_cap_value: f64,
    pub liquidity: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
}

impl NormalizedToken {
    /// Bare record for a mint with every display field at its placeholder
    pub fn placeholder(mint: impl Into<String>) -> Self {
        Self {
            mint: mint.into(),
            name: UNKNOWN_NAME.to_string(),
            symbol: UNKNOWN_SYMBOL.to_string(),
            description: String::new(),
            image: PLACEHOLDER_IMAGE.to_string(),
            metadata_uri: None,
            creator: UNKNOWN_CREATOR.to_string(),
            signature: None,
            created_at: Utc::now(),
            price: None,
            market_cap: None,
            market_cap_value: 0.0,
            liquidity: None,
            twitter: None,
            telegram: None,
            website: None,
        }
    }
}

/// A classified token as held by the record store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenRecord {
    pub mint: String,
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
    pub metadata_uri: Option<String>,
    pub creator: String,
    pub signature: Option<String>,
    pub created_at: DateTime<Utc>,
    pub price: Option<String>,
    pub market_cap: Option<String>,
    pub liquidity: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
    market_cap_value: f64,
    category: Category,
}

impl TokenRecord {
    pub fn classify(token: NormalizedToken, thresholds: &CategoryThresholds) -> Self {
        let category = thresholds.classify(token.market_cap_value);
        Self {
            mint: token.mint,
            name: token.name,
            symbol: token.symbol,
            description: token.description,
            image: token.image,
            metadata_uri: token.metadata_uri,
            creator: token.creator,
            signature: token.signature,
            created_at: token.created_at,
            price: token.price,
            market_cap: token.market_cap,
            liquidity: token.liquidity,
            twitter: token.twitter,
            telegram: token.telegram,
            website: token.website,
            market_cap_value: token.market_cap_value,
            category,
        }
    }

    pub fn market_cap_value(&self) -> f64 {
        self.market_cap_value
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Overwrite market data from an enrichment result and reclassify.
    ///
    /// Liquidity is only replaced when the metric carries a non-zero value.
    /// Returns whether anything changed.
    pub fn apply_metric(&mut self, metric: &PriceMetric, thresholds: &CategoryThresholds) -> bool {
        let before = self.clone();

        self.market_cap_value = metric.market_cap;
        self.market_cap = Some(format_grouped(metric.market_cap));
        self.price = Some(format_price(metric.price));
        if metric.liquidity != 0.0 {
            self.liquidity = Some(format_grouped(metric.liquidity));
        }
        self.category = thresholds.classify(self.market_cap_value);

        *self != before
    }
}
