//! Background drain loop enforcing the per-slot publish cap.
//!
//! The controller thread repeatedly peeks the publish queue, stamps the head symbol's
//! cached record as published, removes the head and fans the record out. Publishes are
//! counted against a rolling slot: once `max_publish_per_slot` records went out, the
//! loop pauses until the slot elapses, then re-arms the slot at the current time.
//!
//! The loop holds no lock between ticks and watches two stop signals: the engine
//! lifecycle flag, checked at the top of every tick, and a shutdown channel that
//! also interrupts rate-limit pauses.

use crate::cache::SymbolCache;
use crate::config::ThrottleConfig;
use crate::dispatcher::Dispatcher;
use crate::lifecycle::Lifecycle;
use crate::queue::PublishQueue;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};
use md_common::Result;
use md_common::clock::now_millis;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Rolling publish counter for one slot.
#[derive(Debug, Clone)]
pub struct SlotLimiter {
    max_per_slot: u32,
    slot: Duration,
    window_start: Instant,
    published: u32,
}

impl SlotLimiter {
    /// New limiter whose first slot starts at `now`.
    pub fn new(max_per_slot: u32, slot: Duration, now: Instant) -> Self {
        Self {
            max_per_slot,
            slot,
            window_start: now,
            published: 0,
        }
    }

    /// Start a fresh slot if the current one has elapsed.
    pub fn roll(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) >= self.slot {
            self.window_start = now;
            self.published = 0;
            true
        } else {
            false
        }
    }

    /// Time left in the current slot if its cap is used up.
    pub fn pause_needed(&self, now: Instant) -> Option<Duration> {
        if self.published < self.max_per_slot {
            return None;
        }
        Some(
            self.slot
                .saturating_sub(now.saturating_duration_since(self.window_start)),
        )
    }

    /// Count one publish in the current slot.
    pub fn record_publish(&mut self) {
        self.published = self.published.saturating_add(1);
    }

    /// Publishes counted in the current slot.
    pub fn published(&self) -> u32 {
        self.published
    }
}

/// Controller phase, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ControllerState {
    /// Not yet running.
    Idle,
    /// Draining the queue.
    Running,
    /// Loop exited.
    Halted,
}

/// Everything the drain loop needs, moved into its thread.
pub struct ThrottleController {
    cache: Arc<SymbolCache>,
    queue: Arc<PublishQueue>,
    dispatcher: Dispatcher,
    lifecycle: Arc<Lifecycle>,
    shutdown_rx: Receiver<()>,
    config: ThrottleConfig,
    state: ControllerState,
}

impl ThrottleController {
    /// Assemble a controller; nothing runs until [`spawn`](Self::spawn).
    pub fn new(
        cache: Arc<SymbolCache>,
        queue: Arc<PublishQueue>,
        dispatcher: Dispatcher,
        lifecycle: Arc<Lifecycle>,
        shutdown_rx: Receiver<()>,
        config: ThrottleConfig,
    ) -> Self {
        Self {
            cache,
            queue,
            dispatcher,
            lifecycle,
            shutdown_rx,
            config,
            state: ControllerState::Idle,
        }
    }

    /// Run the drain loop on a dedicated thread.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("md-throttle-controller".to_string())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    fn run(mut self) {
        self.state = ControllerState::Running;
        info!(
            "Throttle controller {}: max {} publish(es) per {} ms",
            self.state, self.config.max_publish_per_slot, self.config.slot_duration_ms
        );
        let mut limiter = SlotLimiter::new(
            self.config.max_publish_per_slot,
            self.config.slot_duration(),
            Instant::now(),
        );
        let idle_backoff = self.config.idle_backoff();

        while self.lifecycle.is_started() {
            limiter.roll(Instant::now());
            if let Some(pause) = limiter.pause_needed(Instant::now()) {
                debug!("Slot cap of {} reached, pausing {:?}", limiter.published(), pause);
                if self.wait_for_shutdown(pause) {
                    break;
                }
                continue;
            }

            let Some(symbol) = self.queue.wait_head(idle_backoff) else {
                continue;
            };
            match self.cache.try_mark_published(&symbol, now_millis()) {
                Some(record) => {
                    self.queue.remove_head();
                    debug!("Publishing {}", record);
                    self.dispatcher.publish(record);
                    limiter.record_publish();
                }
                None => {
                    if !self.cache.contains(&symbol) {
                        warn!("Dropping unknown symbol {} from publish queue", symbol);
                        self.queue.remove_head();
                    } else {
                        debug!("Publish of {} lost a race, retrying next tick", symbol);
                    }
                }
            }
        }

        self.state = ControllerState::Halted;
        self.dispatcher.shutdown();
        info!("Throttle controller {}", self.state);
    }

    /// Sleep up to `pause`; `true` if a stop was requested meanwhile.
    fn wait_for_shutdown(&self, pause: Duration) -> bool {
        match self.shutdown_rx.recv_timeout(pause) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => !self.lifecycle.is_started(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::Subscriber;
    use crossbeam_channel::unbounded;
    use md_common::record::MarketDataRecord;

    #[test]
    fn limiter_pauses_for_rest_of_slot_once_capped() {
        let start = Instant::now();
        let mut limiter = SlotLimiter::new(2, Duration::from_millis(1000), start);
        assert!(limiter.pause_needed(start).is_none());

        limiter.record_publish();
        limiter.record_publish();
        let pause = limiter
            .pause_needed(start + Duration::from_millis(300))
            .unwrap();
        assert_eq!(pause, Duration::from_millis(700));
        assert!(!limiter.roll(start + Duration::from_millis(999)));
    }

    #[test]
    fn limiter_rearms_window_on_each_reset() {
        let start = Instant::now();
        let mut limiter = SlotLimiter::new(1, Duration::from_millis(100), start);
        limiter.record_publish();

        let first_reset = start + Duration::from_millis(150);
        assert!(limiter.roll(first_reset));
        assert_eq!(limiter.published(), 0);

        limiter.record_publish();
        // Measured from the re-armed start, not the first one.
        assert!(!limiter.roll(first_reset + Duration::from_millis(99)));
        assert_eq!(
            limiter.pause_needed(first_reset + Duration::from_millis(40)),
            Some(Duration::from_millis(60))
        );
        assert!(limiter.roll(first_reset + Duration::from_millis(100)));
    }

    #[test]
    fn controller_drains_queue_and_halts_on_stop() {
        let cache = Arc::new(SymbolCache::initialize(["A", "B"]));
        let queue = Arc::new(PublishQueue::new(2));
        let lifecycle = Arc::new(Lifecycle::new());
        let (tx, rx) = unbounded::<MarketDataRecord>();
        let subscribers: Vec<Arc<dyn Subscriber>> = vec![Arc::new(tx)];
        let (shutdown_tx, shutdown_rx) = unbounded::<()>();

        cache.try_apply_update("A", 1.0, 10);
        cache.try_apply_update("B", 2.0, 10);
        assert!(queue.try_enqueue(Arc::from("A")));
        assert!(queue.try_enqueue(Arc::from("B")));

        assert!(lifecycle.start());
        let controller = ThrottleController::new(
            Arc::clone(&cache),
            Arc::clone(&queue),
            Dispatcher::start(&subscribers).unwrap(),
            Arc::clone(&lifecycle),
            shutdown_rx,
            ThrottleConfig::default(),
        );
        let handle = controller.spawn().unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!((first.symbol.as_str(), first.price), ("A", 1.0));
        assert_eq!((second.symbol.as_str(), second.price), ("B", 2.0));
        assert!(first.is_published());
        assert!(cache.get("A").unwrap().is_published());
        assert!(queue.is_empty());

        lifecycle.stop();
        let _ = shutdown_tx.send(());
        handle.join().unwrap();
    }
}
