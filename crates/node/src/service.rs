//! Service wiring
//!
//! Connects the ingest side (feed, normalizer, store) to the enrichment side:
//! every store change triggers a diffed enrichment pass, and bonding tokens
//! are polled for listing-order status on a fixed interval.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use tokenfeed_core::format::format_compact;
use tokenfeed_core::{AppConfig, PriceMetric, RawFrame, TokenRecord};
use tokenfeed_enricher::{
    DexPaidChecker, EnrichmentReport, ListingSource, MetricSource, OrdersHttpSource, PoolSearchSource,
    PriceEnricher,
};
use tokenfeed_stream::{HttpMetadataSource, MetadataSource, TokenAggregator, TokenStore};

/// Everything a consumer can read, captured at one point in time
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub version: u64,
    pub tokens: Vec<TokenRecord>,
    pub new_tokens: Vec<TokenRecord>,
    pub bonding_tokens: Vec<TokenRecord>,
    pub graduated_tokens: Vec<TokenRecord>,
    pub connected: bool,
    pub last_error: Option<String>,
    pub raw_trail: Vec<RawFrame>,
    pub price_data: HashMap<String, PriceMetric>,
    pub is_price_loading: bool,
    pub dex_paid: Vec<String>,
}

pub struct TokenService {
    config: AppConfig,
    store: Arc<TokenStore>,
    aggregator: Arc<TokenAggregator>,
    enricher: Arc<PriceEnricher>,
    dex_paid: Option<Arc<DexPaidChecker>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    start_time: Instant,
}

impl TokenService {
    /// Build the service with the HTTP-backed sources
    pub fn new(config: AppConfig) -> Self {
        let client = reqwest::Client::new();
        let metadata = Arc::new(HttpMetadataSource::new(client.clone()));
        let metrics = Arc::new(PoolSearchSource::new(client.clone(), config.enricher.endpoint.clone()));
        let listings: Option<Arc<dyn ListingSource>> = if config.dex_paid.enabled {
            Some(Arc::new(OrdersHttpSource::new(client, config.dex_paid.endpoint.clone())))
        } else {
            None
        };

        Self::with_sources(config, metadata, metrics, listings)
    }

    pub fn with_sources(
        config: AppConfig,
        metadata: Arc<dyn MetadataSource>,
        metrics: Arc<dyn MetricSource>,
        listings: Option<Arc<dyn ListingSource>>,
    ) -> Self {
        let store = Arc::new(TokenStore::new(config.store.clone()));
        let aggregator = Arc::new(TokenAggregator::new(config.feed.clone(), Arc::clone(&store), metadata));
        let enricher = Arc::new(PriceEnricher::new(config.enricher.clone(), metrics, &store));
        let dex_paid = listings.map(|source| Arc::new(DexPaidChecker::new(source)));

        Self {
            config,
            store,
            aggregator,
            enricher,
            dex_paid,
            handles: Mutex::new(Vec::new()),
            start_time: Instant::now(),
        }
    }

    pub fn store(&self) -> Arc<TokenStore> {
        Arc::clone(&self.store)
    }

    pub fn enricher(&self) -> Arc<PriceEnricher> {
        Arc::clone(&self.enricher)
    }

    /// Start ingestion and the background loops
    pub fn start(&self) -> anyhow::Result<()> {
        if !self.aggregator.start() {
            anyhow::bail!("token service already running");
        }

        let mut handles = self.handles.lock();
        handles.push(self.spawn_enrichment());
        if let Some(checker) = &self.dex_paid {
            handles.push(self.spawn_dex_paid(Arc::clone(checker)));
        }
        handles.push(self.spawn_status_log());

        info!("Token service started");
        Ok(())
    }

    pub async fn stop(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in &handles {
            handle.abort();
        }
        futures::future::join_all(handles).await;

        self.aggregator.stop().await;
        info!("Token service stopped");
    }

    /// Re-fetch metrics for every tracked mint
    pub async fn refetch_prices(&self) -> EnrichmentReport {
        self.enricher.refetch_all(&self.store.mints()).await
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        let store = self.store.snapshot();
        let feed = self.aggregator.feed_status();

        let dex_paid = match &self.dex_paid {
            Some(checker) => store
                .bonding
                .iter()
                .filter(|t| checker.is_paid(&t.mint))
                .map(|t| t.mint.clone())
                .collect(),
            None => Vec::new(),
        };

        ServiceSnapshot {
            version: store.version,
            tokens: store.tokens.clone(),
            new_tokens: store.new.clone(),
            bonding_tokens: store.bonding.clone(),
            graduated_tokens: store.graduated.clone(),
            connected: feed.is_connected(),
            last_error: feed.last_error(),
            raw_trail: feed.raw_trail(),
            price_data: self.enricher.metrics(),
            is_price_loading: self.enricher.is_loading(),
            dex_paid,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Run a diffed enrichment pass whenever the store changes
    fn spawn_enrichment(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let enricher = Arc::clone(&self.enricher);
        let mut versions = WatchStream::new(store.subscribe());

        tokio::spawn(async move {
            while let Some(version) = versions.next().await {
                debug!("Store version {}, checking for novel mints", version);
                enricher.enrich_novel(&store.mints()).await;
            }
        })
    }

    fn spawn_dex_paid(&self, checker: Arc<DexPaidChecker>) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let poll_interval = self.config.dex_paid.poll_interval();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            loop {
                interval.tick().await;
                checker.refresh(&store.snapshot()).await;
            }
        })
    }

    fn spawn_status_log(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let aggregator = Arc::clone(&self.aggregator);
        let enricher = Arc::clone(&self.enricher);
        let dex_paid = self.dex_paid.clone();
        let period = Duration::from_millis(self.config.status_log_interval_ms.max(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;

            loop {
                interval.tick().await;

                let ingest = aggregator.stats();
                let stats = store.stats();
                let tracked_cap: f64 = store.snapshot().tokens.iter().map(|t| t.market_cap_value()).sum();

                info!(
                    "Feed: connected={} frames={} reconnects={} creations={}",
                    ingest.feed.connected,
                    ingest.feed.frames_received,
                    ingest.feed.reconnects,
                    ingest.creations
                );
                info!(
                    "Store: {} tokens ({} new, {} bonding, {} graduated), {} merges, {} evicted, {} tracked",
                    stats.token_count,
                    stats.new_count,
                    stats.bonding_count,
                    stats.graduated_count,
                    stats.merged,
                    stats.evicted,
                    format_compact(tracked_cap)
                );
                info!(
                    "Enricher: {} cached metrics, loading={}, {} paid listings",
                    enricher.metrics().len(),
                    enricher.is_loading(),
                    dex_paid.as_ref().map_or(0, |c| c.paid_count())
                );
            }
        })
    }
}
