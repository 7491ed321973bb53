//! Per-token market metric source
//!
//! The pool search endpoint returns every pool matching a mint. The first
//! pool is taken as authoritative; its 24h report (if any) supplies volume
//! and price change.

use serde_json::Value;
use tracing::debug;

use tokenfeed_core::format::coerce_number;
use tokenfeed_core::{FetchError, FetchResult, PriceMetric};

const REPORT_INTERVAL_24H: &str = "24h";

/// Something that can resolve a [`PriceMetric`] for a mint
#[async_trait::async_trait]
pub trait MetricSource: Send + Sync {
    async fn fetch(&self, mint: &str) -> FetchResult<PriceMetric>;
}

/// Pool-search HTTP source
#[derive(Debug, Clone)]
pub struct PoolSearchSource {
    client: reqwest::Client,
    endpoint: String,
}

impl PoolSearchSource {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl MetricSource for PoolSearchSource {
    async fn fetch(&self, mint: &str) -> FetchResult<PriceMetric> {
        debug!("Fetching metrics for {}", mint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", mint)])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        parse_pool_search(mint, &body)
    }
}

/// Build a metric from a pool search response body
pub fn parse_pool_search(mint: &str, body: &Value) -> FetchResult<PriceMetric> {
    let pool = body
        .get("pools")
        .and_then(Value::as_array)
        .and_then(|pools| pools.first())
        .ok_or_else(|| FetchError::NoData(mint.to_string()))?;

    let field = |v: &Value, key: &str| v.get(key).map(coerce_number).unwrap_or(0.0);

    let report = pool
        .get("poolReports")
        .and_then(Value::as_array)
        .and_then(|reports| {
            reports
                .iter()
                .find(|r| r.get("interval").and_then(Value::as_str) == Some(REPORT_INTERVAL_24H))
        });

    let (volume_24h, price_change_24h) = match report {
        Some(r) => (
            field(r, "buyVolume") + field(r, "sellVolume"),
            field(r, "priceChangePercent"),
        ),
        None => (0.0, 0.0),
    };

    Ok(PriceMetric {
        price: field(pool, "priceUsd"),
        market_cap: field(pool, "marketCap"),
        volume_24h,
        price_change_24h,
        liquidity: field(pool, "liquidUsd"),
        curve_percent: pool
            .get("metadata")
            .map(|m| field(m, "curvePercent"))
            .unwrap_or(0.0),
    })
}
