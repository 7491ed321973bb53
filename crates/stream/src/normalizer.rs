//! Creation event normalization
//!
//! Turns the selected token payload of a creation frame into a
//! [`NormalizedToken`]. Field resolution is pure ([`Normalizer::extract`]);
//! metadata resolution is the only asynchronous step and it degrades to the
//! raw fields on failure.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use tokenfeed_core::format::{format_amount, format_grouped, format_price};
use tokenfeed_core::{
    NormalizedToken, PLACEHOLDER_IMAGE, UNKNOWN_CREATOR, UNKNOWN_NAME, UNKNOWN_SYMBOL,
};

use crate::extract::chains;
use crate::metadata::MetadataSource;

pub struct Normalizer {
    metadata: Arc<dyn MetadataSource>,
}

impl Normalizer {
    pub fn new(metadata: Arc<dyn MetadataSource>) -> Self {
        Self { metadata }
    }

    /// Resolve canonical fields from a token payload.
    ///
    /// Returns `None` when no identifier can be resolved; such events are
    /// dropped without error.
    pub fn extract(payload: &Map<String, Value>, ingested_at: DateTime<Utc>) -> Option<NormalizedToken> {
        let mint = chains::MINT.text(payload)?;

        let market_cap = chains::MARKET_CAP.number(payload);
        let market_cap_value = market_cap.unwrap_or(0.0);

        Some(NormalizedToken {
            mint,
            name: chains::NAME.text(payload).unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            symbol: chains::SYMBOL.text(payload).unwrap_or_else(|| UNKNOWN_SYMBOL.to_string()),
            description: chains::DESCRIPTION.text(payload).unwrap_or_default(),
            image: PLACEHOLDER_IMAGE.to_string(),
            metadata_uri: chains::METADATA_URI.text(payload),
            creator: chains::CREATOR.text(payload).unwrap_or_else(|| UNKNOWN_CREATOR.to_string()),
            signature: chains::SIGNATURE.text(payload),
            created_at: chains::CREATED_AT.timestamp(payload).unwrap_or(ingested_at),
            price: chains::PRICE.number(payload).map(format_price),
            market_cap: market_cap.map(|_| format_grouped(market_cap_value)),
            market_cap_value,
            liquidity: chains::LIQUIDITY.number(payload).map(format_amount),
            twitter: None,
            telegram: None,
            website: None,
        })
    }

    /// Extract fields, then overlay off-band metadata when a URI is present
    pub async fn normalize(&self, payload: &Map<String, Value>) -> Option<NormalizedToken> {
        let Some(mut token) = Self::extract(payload, Utc::now()) else {
            debug!(
                "No mint address found in token data, skipping (fields: {:?})",
                payload.keys().collect::<Vec<_>>()
            );
            return None;
        };

        if let Some(uri) = token.metadata_uri.clone() {
            match self.metadata.fetch(&uri).await {
                Ok(metadata) => metadata.apply_to(&mut token),
                Err(e) => warn!("Metadata fetch for {} failed, using raw fields: {}", token.mint, e),
            }
        }

        Some(token)
    }
}
