//! Listing-order ("DEX paid") status for bonding tokens
//!
//! A token counts as paid when the orders endpoint returns a non-empty array
//! whose first entry is approved. Only tokens in the bonding partition are
//! checked, once each time they enter it. Results live in the checker and
//! never touch the store.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use tokenfeed_core::{Category, FetchError, FetchResult};
use tokenfeed_stream::StoreSnapshot;

const APPROVED: &str = "approved";

#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    async fn is_paid(&self, mint: &str) -> FetchResult<bool>;
}

/// Queries the public orders endpoint (`{endpoint}/{mint}`)
#[derive(Debug, Clone)]
pub struct OrdersHttpSource {
    client: reqwest::Client,
    endpoint: String,
}

impl OrdersHttpSource {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait::async_trait]
impl ListingSource for OrdersHttpSource {
    async fn is_paid(&self, mint: &str) -> FetchResult<bool> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), mint);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        // no order on file
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(is_approved(&body))
    }
}

pub fn is_approved(body: &Value) -> bool {
    body.as_array()
        .and_then(|orders| orders.first())
        .and_then(|order| order.get("status"))
        .and_then(Value::as_str)
        == Some(APPROVED)
}

pub struct DexPaidChecker {
    source: Arc<dyn ListingSource>,
    status: DashMap<String, bool>,
}

impl DexPaidChecker {
    pub fn new(source: Arc<dyn ListingSource>) -> Self {
        Self {
            source,
            status: DashMap::new(),
        }
    }

    /// Check bonding tokens not seen before and forget tokens that have left
    /// the bonding partition. A token is queried once per entry into bonding.
    /// Returns the number of paid tokens.
    pub async fn refresh(&self, snapshot: &StoreSnapshot) -> usize {
        let bonding: HashSet<&str> = snapshot
            .partition(Category::Bonding)
            .iter()
            .map(|t| t.mint.as_str())
            .collect();
        self.status.retain(|mint, _| bonding.contains(mint.as_str()));

        let unchecked: Vec<&str> = bonding
            .iter()
            .copied()
            .filter(|mint| !self.status.contains_key(*mint))
            .collect();

        for mint in &unchecked {
            let paid = match self.source.is_paid(mint).await {
                Ok(paid) => paid,
                Err(e) => {
                    warn!("DEX paid check for {} failed: {}", mint, e);
                    false
                }
            };
            self.status.insert(mint.to_string(), paid);
        }

        let paid = self.paid_count();
        debug!(
            "Checked {} new bonding tokens, {} of {} paid",
            unchecked.len(),
            paid,
            bonding.len()
        );
        paid
    }

    /// Paid status for a mint; anything unchecked or outside bonding is unpaid
    pub fn is_paid(&self, mint: &str) -> bool {
        self.status.get(mint).map_or(false, |paid| *paid)
    }

    pub fn paid_count(&self) -> usize {
        self.status.iter().filter(|entry| *entry.value()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokenfeed_core::{NormalizedToken, TokenRecord};
    use tokenfeed_stream::TokenStore;

    #[derive(Default)]
    struct FakeListings {
        paid: HashSet<String>,
        broken: HashSet<String>,
        asked: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ListingSource for FakeListings {
        async fn is_paid(&self, mint: &str) -> FetchResult<bool> {
            self.asked.lock().push(mint.to_string());
            if self.broken.contains(mint) {
                return Err(FetchError::Http("timeout".into()));
            }
            Ok(self.paid.contains(mint))
        }
    }

    fn store_with(caps: &[(&str, f64)]) -> Arc<TokenStore> {
        let store = Arc::new(TokenStore::default());
        for (mint, cap) in caps {
            store.append(TokenRecord::classify(
                NormalizedToken {
                    market_cap_value: *cap,
                    ..NormalizedToken::placeholder(*mint)
                },
                store.thresholds(),
            ));
        }
        store
    }

    #[test]
    fn test_approved_response() {
        assert!(is_approved(&json!([{ "status": "approved", "type": "tokenProfile" }])));
        assert!(!is_approved(&json!([{ "status": "processing" }, { "status": "approved" }])));
        assert!(!is_approved(&json!([])));
        assert!(!is_approved(&json!({ "status": "approved" })));
    }

    #[tokio::test]
    async fn test_only_bonding_tokens_checked() {
        let store = store_with(&[("new", 500.0), ("bond-a", 12_000.0), ("bond-b", 30_000.0), ("grad", 80_000.0)]);
        let source = Arc::new(FakeListings {
            paid: ["bond-a".to_string(), "grad".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let checker = DexPaidChecker::new(source.clone());

        assert_eq!(checker.refresh(&store.snapshot()).await, 1);

        let mut asked = source.asked.lock().clone();
        asked.sort();
        assert_eq!(asked, vec!["bond-a", "bond-b"]);
        assert!(checker.is_paid("bond-a"));
        assert!(!checker.is_paid("bond-b"));
        assert!(!checker.is_paid("grad"));
    }

    #[tokio::test]
    async fn test_failure_means_unpaid() {
        let store = store_with(&[("bond", 20_000.0)]);
        let checker = DexPaidChecker::new(Arc::new(FakeListings {
            paid: ["bond".to_string()].into_iter().collect(),
            broken: ["bond".to_string()].into_iter().collect(),
            ..Default::default()
        }));

        checker.refresh(&store.snapshot()).await;
        assert!(!checker.is_paid("bond"));
    }

    #[tokio::test]
    async fn test_unchanged_bonding_token_checked_once() {
        let store = store_with(&[("bond", 20_000.0)]);
        let source = Arc::new(FakeListings::default());
        let checker = DexPaidChecker::new(source.clone());

        for _ in 0..5 {
            checker.refresh(&store.snapshot()).await;
        }
        assert_eq!(*source.asked.lock(), vec!["bond"]);

        // a newcomer is checked on the next poll, the known one is not
        store.append(TokenRecord::classify(
            NormalizedToken {
                market_cap_value: 15_000.0,
                ..NormalizedToken::placeholder("late")
            },
            store.thresholds(),
        ));
        checker.refresh(&store.snapshot()).await;
        assert_eq!(*source.asked.lock(), vec!["bond", "late"]);
    }

    #[tokio::test]
    async fn test_reentering_bonding_is_checked_again() {
        let store = store_with(&[("bond", 20_000.0)]);
        let source = Arc::new(FakeListings::default());
        let checker = DexPaidChecker::new(source.clone());
        checker.refresh(&store.snapshot()).await;

        let cap = |v: f64| tokenfeed_core::PriceMetric {
            market_cap: v,
            ..Default::default()
        };
        store.merge_metric("bond", &cap(90_000.0));
        checker.refresh(&store.snapshot()).await;
        store.merge_metric("bond", &cap(25_000.0));
        checker.refresh(&store.snapshot()).await;

        assert_eq!(source.asked.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_graduation_clears_status() {
        let store = store_with(&[("bond", 20_000.0)]);
        let checker = DexPaidChecker::new(Arc::new(FakeListings {
            paid: ["bond".to_string()].into_iter().collect(),
            ..Default::default()
        }));

        checker.refresh(&store.snapshot()).await;
        assert!(checker.is_paid("bond"));

        store.merge_metric(
            "bond",
            &tokenfeed_core::PriceMetric {
                market_cap: 90_000.0,
                ..Default::default()
            },
        );
        checker.refresh(&store.snapshot()).await;
        assert!(!checker.is_paid("bond"));
        assert_eq!(checker.paid_count(), 0);
    }
}
