//! Bounded token record store
//!
//! The store holds one immutable [`StoreSnapshot`] behind an `Arc`. Every
//! mutation builds the next snapshot (collection plus category partitions)
//! and swaps it in under a short write lock, so readers only ever see whole
//! snapshots. A watch channel publishes the snapshot version after each swap.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use tokenfeed_core::{Category, CategoryThresholds, PriceMetric, StoreConfig, TokenRecord};

/// Immutable view of the store at one version
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub version: u64,
    /// All records, most recent first
    pub tokens: Vec<TokenRecord>,
    pub new: Vec<TokenRecord>,
    pub bonding: Vec<TokenRecord>,
    pub graduated: Vec<TokenRecord>,
}

impl StoreSnapshot {
    fn build(version: u64, tokens: Vec<TokenRecord>) -> Self {
        let mut snapshot = Self {
            version,
            ..Default::default()
        };

        for token in &tokens {
            match token.category() {
                Category::New => snapshot.new.push(token.clone()),
                Category::Bonding => snapshot.bonding.push(token.clone()),
                Category::Graduated => snapshot.graduated.push(token.clone()),
            }
        }

        snapshot.tokens = tokens;
        snapshot
    }

    pub fn partition(&self, category: Category) -> &[TokenRecord] {
        match category {
            Category::New => &self.new,
            Category::Bonding => &self.bonding,
            Category::Graduated => &self.graduated,
        }
    }

    pub fn get(&self, mint: &str) -> Option<&TokenRecord> {
        self.tokens.iter().find(|t| t.mint == mint)
    }

    pub fn mints(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.mint.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Result of [`TokenStore::append`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted { evicted: usize },
    Replaced,
}

/// Result of [`TokenStore::merge_metric`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// Same values already present
    Unchanged,
    UnknownMint,
    /// Metric had no market cap, nothing to merge
    Skipped,
}

/// Canonical token collection shared by the feed and the enricher
#[derive(Debug)]
pub struct TokenStore {
    config: StoreConfig,
    current: RwLock<Arc<StoreSnapshot>>,
    changes: watch::Sender<u64>,

    appended: AtomicU64,
    merged: AtomicU64,
    evicted: AtomicU64,
}

impl TokenStore {
    pub fn new(config: StoreConfig) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            config,
            current: RwLock::new(Arc::new(StoreSnapshot::default())),
            changes,
            appended: AtomicU64::new(0),
            merged: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    pub fn thresholds(&self) -> &CategoryThresholds {
        &self.config.thresholds
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Current snapshot; cheap to clone and safe to hold across awaits
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn mints(&self) -> Vec<String> {
        self.snapshot().mints()
    }

    /// Receiver that observes the version of every new snapshot
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Prepend a record, evicting the oldest past capacity.
    ///
    /// A record whose mint is already present replaces the existing entry in
    /// place.
    pub fn append(&self, record: TokenRecord) -> AppendOutcome {
        let mut current = self.current.write();
        let mut tokens = current.tokens.clone();

        let outcome = if let Some(existing) = tokens.iter_mut().find(|t| t.mint == record.mint) {
            *existing = record;
            AppendOutcome::Replaced
        } else {
            tokens.insert(0, record);
            let evicted = tokens.len().saturating_sub(self.config.capacity);
            tokens.truncate(self.config.capacity);
            AppendOutcome::Inserted { evicted }
        };

        let version = current.version + 1;
        *current = Arc::new(StoreSnapshot::build(version, tokens));
        drop(current);

        self.appended.fetch_add(1, Ordering::Relaxed);
        if let AppendOutcome::Inserted { evicted } = outcome {
            self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
        }
        self.changes.send_replace(version);

        outcome
    }

    /// Overwrite market data for a known mint and reclassify it.
    ///
    /// Unknown mints are ignored; this never creates a record.
    pub fn merge_metric(&self, mint: &str, metric: &PriceMetric) -> MergeOutcome {
        if !metric.has_market_cap() {
            return MergeOutcome::Skipped;
        }

        let mut current = self.current.write();
        let Some(index) = current.tokens.iter().position(|t| t.mint == mint) else {
            debug!("Ignoring metric for unknown mint {}", mint);
            return MergeOutcome::UnknownMint;
        };

        let mut updated = current.tokens[index].clone();
        if !updated.apply_metric(metric, &self.config.thresholds) {
            return MergeOutcome::Unchanged;
        }

        let mut tokens = current.tokens.clone();
        tokens[index] = updated;
        let version = current.version + 1;
        *current = Arc::new(StoreSnapshot::build(version, tokens));
        drop(current);

        self.merged.fetch_add(1, Ordering::Relaxed);
        self.changes.send_replace(version);

        MergeOutcome::Applied
    }

    pub fn stats(&self) -> StoreStats {
        let snapshot = self.snapshot();
        StoreStats {
            version: snapshot.version,
            token_count: snapshot.tokens.len(),
            new_count: snapshot.new.len(),
            bonding_count: snapshot.bonding.len(),
            graduated_count: snapshot.graduated.len(),
            appended: self.appended.load(Ordering::Relaxed),
            merged: self.merged.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Statistics about the store
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub version: u64,
    pub token_count: usize,
    pub new_count: usize,
    pub bonding_count: usize,
    pub graduated_count: usize,
    pub appended: u64,
    pub merged: u64,
    pub evicted: u64,
}
