//! Fan-out of published records to subscribers.
//!
//! The dispatcher owns one worker thread per subscriber, each fed by its own
//! `crossbeam_channel`. Publishing a record pushes it to every worker, so subscribers
//! run concurrently while each one still sees records in drain order.
//!
//! Event model:
//! - `DispatchEvent::Publish(record)`: deliver a record.
//! - `DispatchEvent::Shutdown`: finish what is queued and exit.
//!
//! A subscriber that returns an error or panics is logged and skipped for that
//! record; its worker keeps running and other subscribers are unaffected.

use crate::subscriber::Subscriber;
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info};
use md_common::Result;
use md_common::record::MarketDataRecord;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Message sent from the dispatcher to its workers.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// Record to hand to the worker's subscriber.
    Publish(Arc<MarketDataRecord>),
    /// Stop after the records already queued.
    Shutdown,
}

struct Worker {
    name: String,
    tx: Sender<DispatchEvent>,
    handle: Option<JoinHandle<()>>,
}

/// Pool of dispatch workers sized to the subscriber set.
pub struct Dispatcher {
    workers: Vec<Worker>,
}

impl Dispatcher {
    /// Spawn one worker per subscriber.
    pub fn start(subscribers: &[Arc<dyn Subscriber>]) -> Result<Self> {
        let mut workers = Vec::with_capacity(subscribers.len());
        for (index, subscriber) in subscribers.iter().enumerate() {
            let name = format!("{}-{}", subscriber.name(), index);
            let (tx, rx) = unbounded::<DispatchEvent>();
            let subscriber = Arc::clone(subscriber);
            let worker_name = name.clone();
            let handle = thread::Builder::new()
                .name(format!("md-dispatch-{index}"))
                .spawn(move || run_worker(&worker_name, subscriber, rx))?;
            workers.push(Worker {
                name,
                tx,
                handle: Some(handle),
            });
        }
        info!("Dispatcher started with {} worker(s)", workers.len());
        Ok(Self { workers })
    }

    /// Number of workers, equal to the subscriber count.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Hand `record` to every subscriber. Returns how many workers accepted it.
    pub fn publish(&self, record: Arc<MarketDataRecord>) -> usize {
        let mut accepted = 0;
        for worker in &self.workers {
            match worker.tx.send(DispatchEvent::Publish(Arc::clone(&record))) {
                Ok(()) => accepted += 1,
                Err(e) => error!("Dispatch worker {} is gone: {}", worker.name, e),
            }
        }
        accepted
    }

    /// Ask every worker to exit once its queued records are delivered.
    ///
    /// Subscriber calls in progress are not interrupted and workers are not joined.
    pub fn shutdown(&mut self) {
        for worker in &mut self.workers {
            let _ = worker.tx.send(DispatchEvent::Shutdown);
            worker.handle.take();
        }
    }

    /// Shut down and wait for every worker to drain.
    pub fn shutdown_and_join(&mut self) {
        for worker in &self.workers {
            let _ = worker.tx.send(DispatchEvent::Shutdown);
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    error!("Dispatch worker {} panicked", worker.name);
                }
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(name: &str, subscriber: Arc<dyn Subscriber>, rx: Receiver<DispatchEvent>) {
    debug!("Dispatch worker {} running", name);
    for event in rx.iter() {
        match event {
            DispatchEvent::Publish(record) => deliver(name, subscriber.as_ref(), &record),
            DispatchEvent::Shutdown => break,
        }
    }
    debug!("Dispatch worker {} stopped", name);
}

fn deliver(name: &str, subscriber: &dyn Subscriber, record: &MarketDataRecord) {
    match panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_receive(record))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Subscriber {} failed on {}: {}", name, record.symbol, e),
        Err(payload) => error!(
            "Subscriber {} panicked on {}: {}",
            name,
            record.symbol,
            panic_message(payload.as_ref())
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use md_common::ThrottleError;
    use std::time::Duration;

    struct Failing;

    impl Subscriber for Failing {
        fn on_receive(&self, _record: &MarketDataRecord) -> Result<()> {
            Err(ThrottleError::Subscriber("boom".to_string()))
        }
    }

    struct Panicking;

    impl Subscriber for Panicking {
        fn on_receive(&self, _record: &MarketDataRecord) -> Result<()> {
            panic!("subscriber exploded");
        }
    }

    fn record(symbol: &str, price: f64) -> Arc<MarketDataRecord> {
        Arc::new(MarketDataRecord::new(symbol, price, 1).published_at(2))
    }

    #[test]
    fn every_subscriber_receives_in_publish_order() {
        let (tx1, rx1) = unbounded::<MarketDataRecord>();
        let (tx2, rx2) = unbounded::<MarketDataRecord>();
        let subscribers: Vec<Arc<dyn Subscriber>> = vec![Arc::new(tx1), Arc::new(tx2)];
        let mut dispatcher = Dispatcher::start(&subscribers).unwrap();
        assert_eq!(dispatcher.worker_count(), 2);

        for i in 0..20 {
            assert_eq!(dispatcher.publish(record(&format!("S{i}"), i as f64)), 2);
        }
        dispatcher.shutdown_and_join();

        for rx in [rx1, rx2] {
            let symbols: Vec<String> = rx.try_iter().map(|r| r.symbol).collect();
            let expected: Vec<String> = (0..20).map(|i| format!("S{i}")).collect();
            assert_eq!(symbols, expected);
        }
    }

    #[test]
    fn failing_subscribers_do_not_affect_others() {
        let (tx, rx) = unbounded::<MarketDataRecord>();
        let subscribers: Vec<Arc<dyn Subscriber>> =
            vec![Arc::new(Failing), Arc::new(Panicking), Arc::new(tx)];
        let dispatcher = Dispatcher::start(&subscribers).unwrap();

        dispatcher.publish(record("A", 1.0));
        dispatcher.publish(record("B", 2.0));

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.symbol, "A");
        assert_eq!(second.symbol, "B");
    }

    #[test]
    fn no_subscribers_means_no_workers() {
        let dispatcher = Dispatcher::start(&[]).unwrap();
        assert_eq!(dispatcher.worker_count(), 0);
        assert_eq!(dispatcher.publish(record("A", 1.0)), 0);
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let from_str: Box<dyn Any + Send> = Box::new("static");
        let from_string: Box<dyn Any + Send> = Box::new("owned".to_string());
        assert_eq!(panic_message(from_str.as_ref()), "static");
        assert_eq!(panic_message(from_string.as_ref()), "owned");
    }
}
