//! Ordered field extractors
//!
//! Each canonical field has a [`FieldChain`]: the upstream spellings for that
//! field in priority order. The first key holding a truthy scalar wins. No
//! match is a normal outcome, never an error.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use tokenfeed_core::format::coerce_number;

use crate::frames::is_truthy;

/// Epoch values below this are seconds, at or above it milliseconds
const EPOCH_MILLIS_CUTOFF: f64 = 1e11;

/// A named, ordered list of upstream keys for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldChain {
    pub field: &'static str,
    pub keys: &'static [&'static str],
}

/// The key that satisfied a chain and its value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldMatch<'a> {
    pub key: &'static str,
    pub value: &'a Value,
}

impl FieldChain {
    pub const fn new(field: &'static str, keys: &'static [&'static str]) -> Self {
        Self { field, keys }
    }

    /// First key holding a truthy string or number
    pub fn first<'a>(&self, obj: &'a Map<String, Value>) -> Option<FieldMatch<'a>> {
        self.keys.iter().find_map(|key| {
            obj.get(*key)
                .filter(|v| (v.is_string() || v.is_number()) && is_truthy(v))
                .map(|value| FieldMatch { key: *key, value })
        })
    }

    /// First key holding non-blank text (numbers are rendered as text)
    pub fn text(&self, obj: &Map<String, Value>) -> Option<String> {
        self.keys.iter().find_map(|key| match obj.get(*key)? {
            Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
            Value::Number(n) if n.as_f64().map_or(false, |v| v != 0.0) => Some(n.to_string()),
            _ => None,
        })
    }

    /// First match coerced to a number; formatted strings are cleaned first
    pub fn number(&self, obj: &Map<String, Value>) -> Option<f64> {
        self.first(obj).map(|m| coerce_number(m.value))
    }

    /// First numeric (not string) match read as an epoch timestamp
    pub fn timestamp(&self, obj: &Map<String, Value>) -> Option<DateTime<Utc>> {
        self.keys.iter().find_map(|key| {
            obj.get(*key)
                .and_then(Value::as_f64)
                .filter(|v| *v > 0.0)
                .and_then(epoch_to_datetime)
        })
    }
}

fn epoch_to_datetime(value: f64) -> Option<DateTime<Utc>> {
    if value < EPOCH_MILLIS_CUTOFF {
        let secs = value.trunc() as i64;
        let nanos = (value.fract() * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    } else {
        DateTime::from_timestamp_millis(value as i64)
    }
}

pub mod chains {
    use super::FieldChain;

    pub const MINT: FieldChain = FieldChain::new("mint", &["mint", "token", "address", "ca"]);
    pub const NAME: FieldChain = FieldChain::new("name", &["name", "tokenName"]);
    pub const SYMBOL: FieldChain = FieldChain::new("symbol", &["symbol", "tokenSymbol"]);
    pub const DESCRIPTION: FieldChain = FieldChain::new("description", &["description"]);
    pub const CREATOR: FieldChain = FieldChain::new(
        "creator",
        &[
            "traderpublickey",
            "traderPublicKey",
            "trader_public_key",
            "creator",
            "user",
            "deployer",
            "authority",
        ],
    );
    pub const METADATA_URI: FieldChain =
        FieldChain::new("metadata_uri", &["uri", "metadata_uri", "metadataUri"]);
    pub const SIGNATURE: FieldChain =
        FieldChain::new("signature", &["signature", "txId", "transaction"]);
    pub const PRICE: FieldChain = FieldChain::new("price", &["price", "initialPrice", "sol_amount"]);
    pub const MARKET_CAP: FieldChain = FieldChain::new(
        "market_cap",
        &["market_cap", "marketCap", "fdv", "usd_market_cap"],
    );
    pub const LIQUIDITY: FieldChain = FieldChain::new("liquidity", &["liquidity", "liquidityPool"]);
    pub const CREATED_AT: FieldChain = FieldChain::new(
        "created_at",
        &["timestamp", "blockTime", "created_timestamp"],
    );
}
