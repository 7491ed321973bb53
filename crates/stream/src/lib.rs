//! Token launch feed ingestion
//!
//! Features:
//! - Single websocket connection with indefinite fixed-delay reconnect
//! - Validated frame parsing and creation-event detection
//! - Field normalization with off-band metadata resolution
//! - Deferred normalization after a settling delay
//! - Bounded copy-on-write record store with category partitions

pub mod aggregator;
pub mod extract;
pub mod feeds;
pub mod frames;
pub mod metadata;
pub mod normalizer;
pub mod schedule;
pub mod state;
pub mod status;

pub use aggregator::{AggregatorStats, IngestPipeline, TokenAggregator};
pub use feeds::TokenFeed;
pub use frames::{classify_frame, parse_frame, FrameKind};
pub use metadata::{HttpMetadataSource, MetadataSource, TokenMetadata};
pub use normalizer::Normalizer;
pub use schedule::DeferredScheduler;
pub use state::{AppendOutcome, MergeOutcome, StoreSnapshot, StoreStats, TokenStore};
pub use status::{FeedStats, FeedStatus};
