//! Synthetic price source for the demo.
//!
//! Every symbol starts around 10.0 and then follows a small random walk. Each call to
//! [`PriceFeed::next_round`] produces one fresh `MarketDataRecord` per symbol, stamped
//! with the current wall-clock time.

use md_common::clock::now_millis;
use md_common::record::MarketDataRecord;
use rand::Rng;
use std::collections::HashMap;

/// Random-walk prices for a fixed symbol list.
pub struct PriceFeed {
    symbols: Vec<String>,
    prices: HashMap<String, f64>,
}

impl PriceFeed {
    /// Seed every symbol with a price in `[10.0, 11.0)`.
    pub fn new(symbols: &[String]) -> Self {
        let mut rng = rand::rng();
        let prices = symbols
            .iter()
            .map(|s| (s.clone(), 10.0 + rng.random::<f64>()))
            .collect();
        Self {
            symbols: symbols.to_vec(),
            prices,
        }
    }

    /// Next price from a uniform `[-1%, +1%)` move, floored at 0.01.
    pub fn next_price(current_price: f64) -> f64 {
        let mut rng = rand::rng();
        let change: f64 = rng.random_range(-0.01..0.01);
        let new_price = current_price * (1.0 + change);
        new_price.max(0.01)
    }

    /// One update per symbol, in symbol order.
    pub fn next_round(&mut self) -> Vec<MarketDataRecord> {
        let mut records = Vec::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            let price = self.prices.entry(symbol.clone()).or_insert(10.0);
            *price = Self::next_price(*price);
            records.push(MarketDataRecord::new(symbol.as_str(), *price, now_millis()));
        }
        records
    }
}
