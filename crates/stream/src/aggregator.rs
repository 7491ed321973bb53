//! Token aggregator - feeds creation events into the record store

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use tokenfeed_core::{FeedConfig, RawFrame, TokenRecord};

use crate::feeds::TokenFeed;
use crate::frames::{classify_frame, FrameKind};
use crate::metadata::MetadataSource;
use crate::normalizer::Normalizer;
use crate::schedule::DeferredScheduler;
use crate::state::{AppendOutcome, TokenStore};
use crate::status::{FeedStats, FeedStatus};

/// Routes parsed frames to deferred normalization and the store.
///
/// Holds only a weak store reference: work that completes after the store
/// is gone is dropped.
#[derive(Clone)]
pub struct IngestPipeline {
    store: Weak<TokenStore>,
    normalizer: Arc<Normalizer>,
    scheduler: DeferredScheduler,
    creations: Arc<AtomicU64>,
}

impl IngestPipeline {
    pub fn new(store: &Arc<TokenStore>, normalizer: Arc<Normalizer>, scheduler: DeferredScheduler) -> Self {
        Self {
            store: Arc::downgrade(store),
            normalizer,
            scheduler,
            creations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creation events seen so far
    pub fn creations(&self) -> u64 {
        self.creations.load(Ordering::Relaxed)
    }

    /// Handle one frame. Creation events return the handle of their deferred
    /// normalization task.
    pub fn dispatch(&self, frame: &RawFrame) -> Option<JoinHandle<()>> {
        let payload = match classify_frame(&frame.payload) {
            FrameKind::Creation(fields) => fields.clone(),
            FrameKind::Acknowledgement(message) => {
                info!("Feed acknowledgement: {}", message);
                return None;
            }
            FrameKind::Other => {
                debug!("Ignoring non-creation frame");
                return None;
            }
        };

        self.creations.fetch_add(1, Ordering::Relaxed);

        let store = self.store.clone();
        let normalizer = Arc::clone(&self.normalizer);
        Some(self.scheduler.schedule(async move {
            let Some(token) = normalizer.normalize(&payload).await else {
                return;
            };

            let Some(store) = store.upgrade() else {
                debug!("Store dropped, discarding token {}", token.mint);
                return;
            };

            let record = TokenRecord::classify(token, store.thresholds());
            let (mint, name, category) = (record.mint.clone(), record.name.clone(), record.category());
            match store.append(record) {
                AppendOutcome::Inserted { .. } => {
                    info!("New token {} ({}) classified as {}", name, mint, category)
                }
                AppendOutcome::Replaced => debug!("Updated token {} in place", mint),
            }
        }))
    }
}

/// Owns the feed and the ingest loop
pub struct TokenAggregator {
    feed: TokenFeed,
    store: Arc<TokenStore>,
    pipeline: IngestPipeline,
    frame_buffer: usize,
    handles: Mutex<Vec<JoinHandle<()>>>,
    running: AtomicBool,
}

impl TokenAggregator {
    pub fn new(config: FeedConfig, store: Arc<TokenStore>, metadata: Arc<dyn MetadataSource>) -> Self {
        let scheduler = DeferredScheduler::new(config.settle_delay());
        let pipeline = IngestPipeline::new(&store, Arc::new(Normalizer::new(metadata)), scheduler);

        Self {
            frame_buffer: config.frame_buffer,
            feed: TokenFeed::new(config),
            store,
            pipeline,
            handles: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Get shared store reference
    pub fn store(&self) -> Arc<TokenStore> {
        Arc::clone(&self.store)
    }

    pub fn feed_status(&self) -> Arc<FeedStatus> {
        self.feed.status()
    }

    /// Start the feed and the ingest loop. No-op if already running.
    pub fn start(&self) -> bool {
        if self.running.swap(true, Ordering::AcqRel) {
            return false;
        }

        info!("Starting token aggregator");
        let (frames_tx, mut frames_rx) = mpsc::channel::<RawFrame>(self.frame_buffer);
        self.feed.start(frames_tx);

        let pipeline = self.pipeline.clone();
        let ingest = tokio::spawn(async move {
            while let Some(frame) = frames_rx.recv().await {
                // deferred tasks run detached
                let _ = pipeline.dispatch(&frame);
            }
            debug!("Frame channel closed, ingest loop exiting");
        });

        self.handles.lock().push(ingest);
        true
    }

    /// Stop the feed and the ingest loop. In-flight normalizations finish on
    /// their own.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        info!("Stopping token aggregator");
        self.feed.stop().await;

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> AggregatorStats {
        AggregatorStats {
            feed: self.feed.status().stats(),
            creations: self.pipeline.creations(),
            token_count: self.store.snapshot().len(),
        }
    }
}

/// Aggregator statistics
#[derive(Debug, Clone)]
pub struct AggregatorStats {
    pub feed: FeedStats,
    pub creations: u64,
    pub token_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokenfeed_core::{Category, FetchError, FetchResult};

    use crate::metadata::TokenMetadata;

    struct NoMetadata;

    #[async_trait::async_trait]
    impl MetadataSource for NoMetadata {
        async fn fetch(&self, uri: &str) -> FetchResult<TokenMetadata> {
            Err(FetchError::Status {
                status: 404,
                url: uri.to_string(),
            })
        }
    }

    fn pipeline(store: &Arc<TokenStore>, delay: Duration) -> IngestPipeline {
        IngestPipeline::new(
            store,
            Arc::new(Normalizer::new(Arc::new(NoMetadata))),
            DeferredScheduler::new(delay),
        )
    }

    #[tokio::test]
    async fn test_creation_frame_reaches_store() {
        let store = Arc::new(TokenStore::default());
        let pipeline = pipeline(&store, Duration::ZERO);

        let frame = RawFrame::new(json!({
            "txType": "create",
            "mint": "Mint1",
            "name": "Moon",
            "marketCap": 25_000,
        }));
        pipeline.dispatch(&frame).unwrap().await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.tokens[0].name, "Moon");
        assert_eq!(snapshot.tokens[0].category(), Category::Bonding);
        assert_eq!(snapshot.bonding.len(), 1);
    }

    #[tokio::test]
    async fn test_frame_without_mint_produces_no_record() {
        let store = Arc::new(TokenStore::default());
        let pipeline = pipeline(&store, Duration::ZERO);

        let frame = RawFrame::new(json!({ "type": "create", "name": "Nameless" }));
        pipeline.dispatch(&frame).unwrap().await.unwrap();

        assert!(store.snapshot().is_empty());
        assert_eq!(store.snapshot().version, 0);
    }

    #[tokio::test]
    async fn test_non_creation_frames_are_not_scheduled() {
        let store = Arc::new(TokenStore::default());
        let pipeline = pipeline(&store, Duration::ZERO);

        assert!(pipeline.dispatch(&RawFrame::new(json!({ "message": "subscribed" }))).is_none());
        assert!(pipeline.dispatch(&RawFrame::new(json!({ "txType": "buy", "mint": "M" }))).is_none());
        assert_eq!(pipeline.creations(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_keeps_most_recent_creations() {
        let store = Arc::new(TokenStore::default());
        let pipeline = pipeline(&store, Duration::ZERO);

        for i in 0..151 {
            let frame = RawFrame::new(json!({ "txType": "create", "mint": format!("mint-{}", i) }));
            pipeline.dispatch(&frame).unwrap().await.unwrap();
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 150);
        assert_eq!(snapshot.tokens[0].mint, "mint-150");
        assert_eq!(snapshot.tokens[149].mint, "mint-1");
        assert!(snapshot.get("mint-0").is_none());
        assert_eq!(pipeline.creations(), 151);
    }

    #[tokio::test(start_paused = true)]
    async fn test_normalization_waits_for_settle_delay() {
        let store = Arc::new(TokenStore::default());
        let pipeline = pipeline(&store, Duration::from_secs(1));

        let handle = pipeline
            .dispatch(&RawFrame::new(json!({ "mint": "M", "creator": "C" })))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(store.snapshot().is_empty());

        handle.await.unwrap();
        assert_eq!(store.mints(), vec!["M"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_after_store_drop_is_ignored() {
        let store = Arc::new(TokenStore::default());
        let pipeline = pipeline(&store, Duration::from_secs(1));

        let handle = pipeline
            .dispatch(&RawFrame::new(json!({ "mint": "M", "creator": "C" })))
            .unwrap();
        drop(store);

        tokio_test::assert_ok!(handle.await);
    }

    #[tokio::test]
    async fn test_aggregator_creation() {
        let store = Arc::new(TokenStore::default());
        let aggregator = TokenAggregator::new(FeedConfig::default(), store, Arc::new(NoMetadata));

        assert!(!aggregator.is_running());
        assert_eq!(aggregator.stats().token_count, 0);
        assert!(!aggregator.stats().feed.connected);
    }
}
