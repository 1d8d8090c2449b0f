//! Per-symbol latest-value cache with compare-and-swap updates.
//!
//! Each symbol owns an `ArcSwap<MarketDataRecord>` slot. Readers load the current
//! `Arc` without blocking; writers build a replacement record and publish it with
//! `compare_and_swap` against the snapshot they read. A lost race is retried against
//! a fresh snapshot, at most [`MAX_CAS_ATTEMPTS`] times, so the worst-case latency of
//! a writer stays bounded.
//!
//! The key set is built before the engine starts and never changes afterwards, so
//! the map itself needs no synchronization.

use arc_swap::ArcSwap;
use md_common::RejectReason;
use md_common::record::MarketDataRecord;
use std::collections::HashMap;
use std::sync::Arc;

/// Compare-and-swap attempts per update or publish stamp.
pub const MAX_CAS_ATTEMPTS: usize = 2;

/// Result of [`SymbolCache::try_apply_update`] for a loaded symbol.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The new record replaced `previous`.
    Updated {
        /// Record the successful swap replaced.
        previous: Arc<MarketDataRecord>,
        /// Record now held by the cache.
        current: Arc<MarketDataRecord>,
    },
    /// The cache kept its current record.
    Rejected(RejectReason),
}

/// Fixed universe of symbols mapped to their atomically swappable current record.
#[derive(Debug, Default)]
pub struct SymbolCache {
    slots: HashMap<Arc<str>, ArcSwap<MarketDataRecord>>,
    order: Vec<Arc<str>>,
}

impl SymbolCache {
    /// Build a cache holding a just-loaded record for every symbol.
    pub fn initialize<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::default().extended(symbols)
    }

    /// Copy of this cache with `symbols` added; existing slots keep their record.
    pub fn extended<I, S>(&self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut slots: HashMap<Arc<str>, ArcSwap<MarketDataRecord>> = self
            .slots
            .iter()
            .map(|(symbol, slot)| (Arc::clone(symbol), ArcSwap::new(slot.load_full())))
            .collect();
        let mut order = self.order.clone();

        for symbol in symbols {
            let symbol = symbol.as_ref();
            if symbol.is_empty() || slots.contains_key(symbol) {
                continue;
            }
            let key: Arc<str> = Arc::from(symbol);
            slots.insert(
                Arc::clone(&key),
                ArcSwap::from_pointee(MarketDataRecord::just_loaded(symbol)),
            );
            order.push(key);
        }
        Self { slots, order }
    }

    /// Number of loaded symbols.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// No symbol loaded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether `symbol` was loaded.
    pub fn contains(&self, symbol: &str) -> bool {
        self.slots.contains_key(symbol)
    }

    /// Shared key for `symbol`, so queue entries reuse the cache's allocation.
    pub fn key(&self, symbol: &str) -> Option<Arc<str>> {
        self.slots.get_key_value(symbol).map(|(key, _)| Arc::clone(key))
    }

    /// Loaded symbols in load order.
    pub fn symbols(&self) -> &[Arc<str>] {
        &self.order
    }

    /// Current record for `symbol`, `None` if it was never loaded.
    pub fn get(&self, symbol: &str) -> Option<Arc<MarketDataRecord>> {
        self.slots.get(symbol).map(|slot| slot.load_full())
    }

    /// Replace the record of `symbol` with an unpublished one carrying the new value.
    ///
    /// Returns `None` if the symbol was never loaded. An `update_time` equal to the
    /// cached one is accepted; a strictly older one is rejected as stale.
    pub fn try_apply_update(
        &self,
        symbol: &str,
        price: f64,
        update_time: i64,
    ) -> Option<UpdateOutcome> {
        let slot = self.slots.get(symbol)?;

        for _ in 0..MAX_CAS_ATTEMPTS {
            let snapshot = slot.load_full();
            if update_time < snapshot.update_time {
                return Some(UpdateOutcome::Rejected(RejectReason::Stale));
            }
            let candidate = Arc::new(snapshot.updated(price, update_time));
            let witnessed = slot.compare_and_swap(&snapshot, Arc::clone(&candidate));
            if Arc::ptr_eq(&*witnessed, &snapshot) {
                return Some(UpdateOutcome::Updated {
                    previous: snapshot,
                    current: candidate,
                });
            }
        }
        Some(UpdateOutcome::Rejected(RejectReason::Contention))
    }

    /// Stamp the current record of `symbol` with `publish_time`.
    ///
    /// Returns the published record, or `None` when every attempt lost a race (the
    /// caller retries later) or the symbol is unknown.
    pub fn try_mark_published(
        &self,
        symbol: &str,
        publish_time: i64,
    ) -> Option<Arc<MarketDataRecord>> {
        let slot = self.slots.get(symbol)?;

        for _ in 0..MAX_CAS_ATTEMPTS {
            let snapshot = slot.load_full();
            let candidate = Arc::new(snapshot.published_at(publish_time));
            let witnessed = slot.compare_and_swap(&snapshot, Arc::clone(&candidate));
            if Arc::ptr_eq(&*witnessed, &snapshot) {
                return Some(candidate);
            }
        }
        None
    }
}
