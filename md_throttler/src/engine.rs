//! Engine composition root: lifecycle, ingest and wiring.
//!
//! `MarketDataThrottler` accepts symbols and subscribers while `NotStarted`, then on
//! `start` builds the publish queue, the dispatch workers and the controller thread.
//! `on_message` is the ingest entry point; it may be called from any number of threads.

use crate::cache::{SymbolCache, UpdateOutcome};
use crate::config::ThrottleConfig;
use crate::controller::ThrottleController;
use crate::dispatcher::Dispatcher;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::queue::PublishQueue;
use crate::subscriber::Subscriber;
use arc_swap::ArcSwap;
use crossbeam_channel::{Sender, bounded};
use log::{debug, error, info, warn};
use md_common::clock::now_millis;
use md_common::record::MarketDataRecord;
use md_common::{Result, ThrottleError};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread::JoinHandle;
use strum_macros::Display;

/// What `on_message` did with an accepted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum IngestOutcome {
    /// Cache updated and the symbol queued for publishing.
    Enqueued,
    /// Cache updated; the symbol was already queued and will publish the new value.
    Coalesced,
    /// Cache updated but the queue refused the symbol.
    QueueFull,
    /// Symbol was never loaded; nothing changed.
    Dropped,
}

/// Enqueue only when the replaced record had nothing pending, so a symbol is queued
/// at most once.
pub fn needs_enqueue(previous: &MarketDataRecord) -> bool {
    previous.is_published() || previous.is_just_loaded()
}

/// Apply one update to `cache` and queue its symbol if needed.
pub(crate) fn ingest(
    cache: &SymbolCache,
    queue: &PublishQueue,
    record: &MarketDataRecord,
) -> Result<IngestOutcome> {
    let symbol = record.symbol.as_str();
    match cache.try_apply_update(symbol, record.price, record.update_time) {
        None => {
            warn!("symbol {} not loaded before", symbol);
            Ok(IngestOutcome::Dropped)
        }
        Some(UpdateOutcome::Rejected(reason)) => {
            warn!("update {} rejected: {}", record, reason);
            Err(ThrottleError::data_not_updated(symbol, reason))
        }
        Some(UpdateOutcome::Updated { previous, .. }) => {
            if !needs_enqueue(&previous) {
                debug!("symbol {} not published before this update", symbol);
                return Ok(IngestOutcome::Coalesced);
            }
            let key = cache.key(symbol).unwrap_or_else(|| Arc::from(symbol));
            if queue.try_enqueue(key) {
                debug!("symbol {} queued for publishing", symbol);
                Ok(IngestOutcome::Enqueued)
            } else {
                error!(
                    "publish queue full ({} entries), {} not queued",
                    queue.capacity(),
                    symbol
                );
                Ok(IngestOutcome::QueueFull)
            }
        }
    }
}

struct Running {
    cache: Arc<SymbolCache>,
    queue: Arc<PublishQueue>,
    shutdown_tx: Sender<()>,
    controller: Mutex<Option<JoinHandle<()>>>,
}

/// Latest-value cache with throttled, coalescing republish to subscribers.
pub struct MarketDataThrottler {
    config: ThrottleConfig,
    lifecycle: Arc<Lifecycle>,
    subscribers: Mutex<Vec<Arc<dyn Subscriber>>>,
    cache: ArcSwap<SymbolCache>,
    running: OnceLock<Running>,
}

impl Default for MarketDataThrottler {
    fn default() -> Self {
        Self::with_valid_config(ThrottleConfig::default())
    }
}

impl MarketDataThrottler {
    /// New engine in `NotStarted`, with no symbols and no subscribers.
    pub fn new(config: ThrottleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: ThrottleConfig) -> Self {
        Self {
            config,
            lifecycle: Arc::new(Lifecycle::new()),
            subscribers: Mutex::new(Vec::new()),
            cache: ArcSwap::from_pointee(SymbolCache::default()),
            running: OnceLock::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Time source used for publish stamps, in milliseconds.
    pub fn current_time_millis(&self) -> i64 {
        now_millis()
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// `true` between `start` and `stop`.
    pub fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    /// Load symbols into the cache. Only allowed before start; repeated calls add.
    pub fn initialize<I, S>(&self, symbols: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _setup = self.setup_guard()?;
        let extended = self.cache.load().extended(symbols);
        info!("{} symbol(s) loaded", extended.len());
        self.cache.store(Arc::new(extended));
        Ok(())
    }

    /// Register a subscriber. Only allowed before start.
    pub fn register_subscriber(&self, subscriber: Arc<dyn Subscriber>) -> Result<()> {
        let mut subscribers = self.setup_guard()?;
        info!("Subscriber {} registered", subscriber.name());
        subscribers.push(subscriber);
        Ok(())
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Number of loaded symbols.
    pub fn symbol_count(&self) -> usize {
        self.cache.load().len()
    }

    /// Current cached record, `None` if the symbol was never loaded.
    pub fn get_cached(&self, symbol: &str) -> Option<Arc<MarketDataRecord>> {
        self.cache.load().get(symbol)
    }

    /// Build the queue and dispatch workers, then launch the controller thread.
    pub fn start(&self) -> Result<()> {
        let subscribers = self.setup_guard()?;
        let cache = self.cache.load_full();
        let queue = Arc::new(PublishQueue::new(
            self.config.queue_capacity_for(cache.len()),
        ));
        let dispatcher = Dispatcher::start(&subscribers)?;
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let running = Running {
            cache: Arc::clone(&cache),
            queue: Arc::clone(&queue),
            shutdown_tx,
            controller: Mutex::new(None),
        };
        if self.running.set(running).is_err() || !self.lifecycle.start() {
            return Err(ThrottleError::AlreadyStarted);
        }

        let controller = ThrottleController::new(
            cache,
            queue,
            dispatcher,
            Arc::clone(&self.lifecycle),
            shutdown_rx,
            self.config.clone(),
        );
        match controller.spawn() {
            Ok(handle) => {
                if let Some(running) = self.running.get() {
                    *lock_or_recover(&running.controller) = Some(handle);
                }
                info!(
                    "Engine started: {} symbol(s), {} subscriber(s)",
                    self.symbol_count(),
                    subscribers.len()
                );
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn throttle controller: {}", e);
                self.lifecycle.stop();
                Err(e)
            }
        }
    }

    /// Halt the controller. The cache stays readable; nothing is published afterwards.
    pub fn stop(&self) {
        let previous = self.lifecycle.stop();
        if previous != LifecycleState::Started {
            return;
        }
        if let Some(running) = self.running.get() {
            let _ = running.shutdown_tx.try_send(());
            let handle = lock_or_recover(&running.controller).take();
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    error!("Throttle controller panicked");
                }
            }
        }
        info!("Engine stopped");
    }

    /// Ingest one update.
    ///
    /// Unknown symbols are dropped without error. A stale update, or one that keeps
    /// losing compare-and-swap races, fails with `DataNotUpdated`.
    pub fn on_message(&self, record: &MarketDataRecord) -> Result<IngestOutcome> {
        if !self.lifecycle.is_started() {
            return Err(ThrottleError::NotStarted);
        }
        if record.symbol.is_empty() {
            warn!("market data record without symbol: {}", record);
            return Err(ThrottleError::EmptySymbol);
        }
        let running = self.running.get().ok_or(ThrottleError::NotStarted)?;
        ingest(&running.cache, &running.queue, record)
    }

    /// Number of symbols waiting to be published.
    pub fn pending_publishes(&self) -> usize {
        self.running.get().map_or(0, |running| running.queue.len())
    }

    fn setup_guard(&self) -> Result<MutexGuard<'_, Vec<Arc<dyn Subscriber>>>> {
        let guard = self.subscribers.lock()?;
        if self.lifecycle.state() != LifecycleState::NotStarted {
            warn!("the instance is started!");
            return Err(ThrottleError::AlreadyStarted);
        }
        Ok(guard)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Arc<dyn Subscriber>>> {
        lock_or_recover(&self.subscribers)
    }
}

impl Drop for MarketDataThrottler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn enqueue_policy_follows_previous_record() {
        let loaded = MarketDataRecord::just_loaded("A");
        let pending = loaded.updated(1.0, 10);
        let published = pending.published_at(11);

        assert!(needs_enqueue(&loaded));
        assert!(!needs_enqueue(&pending));
        assert!(needs_enqueue(&published));
    }

    #[test]
    fn ingest_coalesces_until_published() {
        let cache = SymbolCache::initialize(["A"]);
        let queue = PublishQueue::new(1);

        let first = ingest(&cache, &queue, &MarketDataRecord::new("A", 1.0, 10)).unwrap();
        let second = ingest(&cache, &queue, &MarketDataRecord::new("A", 1.1, 11)).unwrap();
        assert_eq!(first, IngestOutcome::Enqueued);
        assert_eq!(second, IngestOutcome::Coalesced);
        assert_eq!(queue.len(), 1);

        let head = queue.peek().unwrap();
        let published = cache.try_mark_published(&head, 12).unwrap();
        assert_eq!(published.price, 1.1);
        queue.remove_head();

        let third = ingest(&cache, &queue, &MarketDataRecord::new("A", 1.2, 13)).unwrap();
        assert_eq!(third, IngestOutcome::Enqueued);
    }

    #[test]
    fn ingest_reports_full_queue_without_failing() {
        let cache = SymbolCache::initialize(["A", "B"]);
        let queue = PublishQueue::new(1);

        ingest(&cache, &queue, &MarketDataRecord::new("A", 1.0, 10)).unwrap();
        let outcome = ingest(&cache, &queue, &MarketDataRecord::new("B", 2.0, 10)).unwrap();
        assert_eq!(outcome, IngestOutcome::QueueFull);
        assert_eq!(cache.get("B").unwrap().price, 2.0);
    }

    #[test]
    fn concurrent_ingest_queues_each_symbol_once() {
        let symbols: Vec<String> = (0..50).map(|i| format!("TEST{i}")).collect();
        let cache = Arc::new(SymbolCache::initialize(&symbols));
        let queue = Arc::new(PublishQueue::new(symbols.len()));

        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let cache = Arc::clone(&cache);
                let queue = Arc::clone(&queue);
                let symbols = symbols.clone();
                thread::spawn(move || {
                    for round in 0..20 {
                        for symbol in &symbols {
                            let record = MarketDataRecord::new(
                                symbol.as_str(),
                                f64::from(writer * 100 + round),
                                1_000,
                            );
                            match ingest(&cache, &queue, &record) {
                                Ok(outcome) => assert_ne!(outcome, IngestOutcome::QueueFull),
                                Err(ThrottleError::DataNotUpdated { .. }) => {}
                                Err(e) => panic!("unexpected error {e}"),
                            }
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut drained = HashSet::new();
        while let Some(symbol) = queue.remove_head() {
            assert!(drained.insert(symbol.to_string()), "{symbol} queued twice");
        }
        assert_eq!(drained.len(), symbols.len());
    }

    #[test]
    fn lifecycle_guards_entry_points() {
        let engine = MarketDataThrottler::default();
        engine.initialize(["A", "B"]).unwrap();
        let (tx, _rx) = unbounded::<MarketDataRecord>();
        engine.register_subscriber(Arc::new(tx)).unwrap();
        assert_eq!(engine.subscriber_count(), 1);

        let record = MarketDataRecord::new("A", 1.0, 1);
        assert!(matches!(engine.on_message(&record), Err(ThrottleError::NotStarted)));

        engine.start().unwrap();
        assert!(engine.is_started());
        assert!(matches!(engine.start(), Err(ThrottleError::AlreadyStarted)));
        assert!(matches!(engine.initialize(["C"]), Err(ThrottleError::AlreadyStarted)));
        let (late, _late_rx) = unbounded::<MarketDataRecord>();
        assert!(matches!(
            engine.register_subscriber(Arc::new(late)),
            Err(ThrottleError::AlreadyStarted)
        ));
        assert!(engine.get_cached("C").is_none());

        engine.stop();
        assert_eq!(engine.state(), LifecycleState::Stopped);
        assert!(matches!(engine.on_message(&record), Err(ThrottleError::NotStarted)));
        assert!(engine.get_cached("A").is_some());
    }

    #[test]
    fn empty_symbol_is_rejected() {
        let engine = MarketDataThrottler::default();
        engine.initialize(["A"]).unwrap();
        engine.start().unwrap();
        let record = MarketDataRecord::new("", 1.0, 1);
        assert!(matches!(engine.on_message(&record), Err(ThrottleError::EmptySymbol)));
        engine.stop();
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = ThrottleConfig {
            max_publish_per_slot: 0,
            ..ThrottleConfig::default()
        };
        assert!(matches!(
            MarketDataThrottler::new(config),
            Err(ThrottleError::Config(_))
        ));
    }
}
