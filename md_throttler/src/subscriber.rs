//! Subscriber capability invoked by the dispatcher.

use crossbeam_channel::Sender;
use md_common::record::MarketDataRecord;
use md_common::{Result, ThrottleError};

/// Receives every record the engine publishes.
///
/// Implementations run on a dedicated dispatch worker, one per subscriber, so a slow
/// subscriber delays only its own deliveries. Errors and panics are logged by the
/// dispatcher and never reach the engine.
pub trait Subscriber: Send + Sync {
    /// Handle one published record.
    fn on_receive(&self, record: &MarketDataRecord) -> Result<()>;

    /// Label used in logs and worker thread names.
    fn name(&self) -> String {
        "subscriber".to_string()
    }
}

/// Forward published records into a channel.
impl Subscriber for Sender<MarketDataRecord> {
    fn on_receive(&self, record: &MarketDataRecord) -> Result<()> {
        self.send(record.clone())
            .map_err(|e| ThrottleError::ChannelSend(e.to_string()))
    }

    fn name(&self) -> String {
        "channel".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn channel_subscriber_forwards_and_reports_disconnect() {
        let (tx, rx) = unbounded::<MarketDataRecord>();
        let record = MarketDataRecord::new("A", 1.0, 1);

        tx.on_receive(&record).unwrap();
        assert_eq!(rx.try_recv().unwrap(), record);

        drop(rx);
        assert!(matches!(
            tx.on_receive(&record),
            Err(ThrottleError::ChannelSend(_))
        ));
    }
}
