//! Rate-limited price enrichment
//!
//! The enricher is driven with the store's current mint list. Each pass:
//! 1. Diffs against the list seen on the previous call (unless refetching all)
//! 2. Splits the mints into batches of `batch_size`
//! 3. Fetches sequentially within a batch, sleeping `request_spacing` before
//!    every request
//! 4. Sleeps `batch_pause` between batches (not after the last)
//!
//! Failures are logged and skipped; a skipped mint is picked up again by the
//! next full refetch.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use tokenfeed_core::{EnricherConfig, PriceMetric};
use tokenfeed_stream::{MergeOutcome, TokenStore};

use crate::source::MetricSource;

/// Outcome of one enrichment pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Size of each batch, in order
    pub batches: Vec<usize>,
    pub fetched: usize,
    pub failed: usize,
    /// Fetches that changed a store record
    pub merged: usize,
}

pub struct PriceEnricher {
    config: EnricherConfig,
    source: Arc<dyn MetricSource>,
    store: Weak<TokenStore>,
    previous: Mutex<HashSet<String>>,
    metrics: DashMap<String, PriceMetric>,
    passes_in_flight: AtomicUsize,
}

impl PriceEnricher {
    pub fn new(config: EnricherConfig, source: Arc<dyn MetricSource>, store: &Arc<TokenStore>) -> Self {
        Self {
            config,
            source,
            store: Arc::downgrade(store),
            previous: Mutex::new(HashSet::new()),
            metrics: DashMap::new(),
            passes_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fetch metrics only for mints absent from the previous call's list
    pub async fn enrich_novel(&self, mints: &[String]) -> EnrichmentReport {
        let novel: Vec<String> = {
            let mut previous = self.previous.lock();
            let novel = mints
                .iter()
                .filter(|mint| !previous.contains(*mint))
                .cloned()
                .collect();
            *previous = mints.iter().cloned().collect();
            novel
        };

        if novel.is_empty() {
            return EnrichmentReport::default();
        }

        debug!("{} novel mints to enrich", novel.len());
        self.fetch_batches(&novel).await
    }

    /// Fetch metrics for every mint, bypassing the diff
    pub async fn refetch_all(&self, mints: &[String]) -> EnrichmentReport {
        info!("Refetching metrics for {} mints", mints.len());
        self.fetch_batches(mints).await
    }

    async fn fetch_batches(&self, mints: &[String]) -> EnrichmentReport {
        let mut report = EnrichmentReport::default();
        if mints.is_empty() {
            return report;
        }

        let _pass = PassGuard::enter(&self.passes_in_flight);
        let batch_size = self.config.batch_size.max(1);
        let batch_count = mints.len().div_ceil(batch_size);

        for (index, batch) in mints.chunks(batch_size).enumerate() {
            report.batches.push(batch.len());

            for mint in batch {
                tokio::time::sleep(self.config.request_spacing()).await;

                match self.source.fetch(mint).await {
                    Ok(metric) => {
                        report.fetched += 1;
                        self.metrics.insert(mint.clone(), metric);
                        if self.merge(mint, &metric) {
                            report.merged += 1;
                        }
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!("Skipping metrics for {}: {}", mint, e);
                    }
                }
            }

            if index + 1 < batch_count {
                tokio::time::sleep(self.config.batch_pause()).await;
            }
        }

        info!(
            "Enrichment pass done: {} fetched, {} failed, {} merged",
            report.fetched, report.failed, report.merged
        );
        report
    }

    fn merge(&self, mint: &str, metric: &PriceMetric) -> bool {
        let Some(store) = self.store.upgrade() else {
            debug!("Store dropped, discarding metrics for {}", mint);
            return false;
        };

        match store.merge_metric(mint, metric) {
            MergeOutcome::Applied => true,
            MergeOutcome::Skipped => {
                debug!("No market cap for {}, not merged", mint);
                false
            }
            MergeOutcome::Unchanged | MergeOutcome::UnknownMint => false,
        }
    }

    /// Latest metric fetched for a mint
    pub fn metric(&self, mint: &str) -> Option<PriceMetric> {
        self.metrics.get(mint).map(|m| *m)
    }

    pub fn metrics(&self) -> HashMap<String, PriceMetric> {
        self.metrics
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Whether a pass is currently running
    pub fn is_loading(&self) -> bool {
        self.passes_in_flight.load(Ordering::Acquire) > 0
    }
}

struct PassGuard<'a>(&'a AtomicUsize);

impl<'a> PassGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
