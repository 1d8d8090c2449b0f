//! Subscriber that writes published records to stdout.

use md_common::Result;
use md_common::record::MarketDataRecord;
use md_throttler::Subscriber;
use std::io::Write;

/// Prints each record as `symbol|price|update_time|publish_time`.
pub struct ConsoleSubscriber {
    id: usize,
}

impl ConsoleSubscriber {
    /// Create a console subscriber labelled `console-<id>`.
    pub fn new(id: usize) -> Self {
        Self { id }
    }
}

impl Subscriber for ConsoleSubscriber {
    fn on_receive(&self, record: &MarketDataRecord) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "[{}] {}", self.name(), record)?;
        Ok(())
    }

    fn name(&self) -> String {
        format!("console-{}", self.id)
    }
}
