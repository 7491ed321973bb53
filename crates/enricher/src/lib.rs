//! Market data enrichment for ingested tokens
//!
//! Features:
//! - Pool-search metric source behind a trait
//! - Diffed, batched, rate-limited fetch passes merged into the store
//! - Per-mint metric cache and loading flag
//! - Listing-order ("DEX paid") status for bonding tokens

pub mod dex_paid;
pub mod enricher;
pub mod source;

pub use dex_paid::{DexPaidChecker, ListingSource, OrdersHttpSource};
pub use enricher::{EnrichmentReport, PriceEnricher};
pub use source::{MetricSource, PoolSearchSource};
