//! Windowed trade message counter.
//!
//! One trade data frame counts as exactly one event, however many fills it carries. Counts
//! only grow within a window and every symbol is reset together by [`TradeRateCounter::tick`].

use crate::symbol::Symbol;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Counter lifecycle, one Idle -> Streaming -> Idle cycle per pause/resume.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
pub enum CounterState {
    #[default]
    Idle,
    Streaming,
}

/// Trade message count for one symbol in the current window.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct TradeWindowCount {
    pub symbol: Symbol,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub struct TradeRateCounter {
    state: CounterState,
    counts: IndexMap<Symbol, u64>,
    windows_completed: u64,
}

impl TradeRateCounter {
    /// Create an idle counter over the fixed symbol universe, every count at 0.
    pub fn new(universe: &[Symbol]) -> Self {
        Self {
            state: CounterState::Idle,
            counts: universe.iter().cloned().map(|symbol| (symbol, 0)).collect(),
            windows_completed: 0,
        }
    }

    pub fn state(&self) -> CounterState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == CounterState::Streaming
    }

    /// Enter Streaming with fresh counts.
    pub fn start(&mut self) {
        self.zero();
        self.state = CounterState::Streaming;
    }

    /// Return to Idle. Counts are frozen at their last value until the next start.
    pub fn stop(&mut self) {
        self.state = CounterState::Idle;
    }

    /// Count one trade message for `symbol`.
    ///
    /// Ignored while Idle or for symbols outside the universe. Returns true if a count changed.
    pub fn record(&mut self, symbol: &Symbol) -> bool {
        if !self.is_streaming() {
            return false;
        }

        match self.counts.get_mut(symbol) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    /// Window boundary: reset every symbol's count to 0 in one step.
    pub fn tick(&mut self) {
        self.zero();
        self.windows_completed += 1;
    }

    /// Current window count for `symbol`; 0 for symbols without trades.
    pub fn count(&self, symbol: &Symbol) -> u64 {
        self.counts.get(symbol).copied().unwrap_or(0)
    }

    /// Number of window resets since creation.
    pub fn windows_completed(&self) -> u64 {
        self.windows_completed
    }

    /// Every count, in universe order.
    pub fn counts(&self) -> Vec<TradeWindowCount> {
        self.counts
            .iter()
            .map(|(symbol, count)| TradeWindowCount {
                symbol: symbol.clone(),
                count: *count,
            })
            .collect()
    }

    fn zero(&mut self) {
        self.counts.values_mut().for_each(|count| *count = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::default_universe;
    use std::str::FromStr;

    fn symbol(input: &str) -> Symbol {
        Symbol::from_str(input).unwrap()
    }

    #[test]
    fn test_counter_records_one_per_message() {
        let mut counter = TradeRateCounter::new(&default_universe());
        counter.start();

        for _ in 0..3 {
            assert!(counter.record(&symbol("BTC/USDT")));
        }
        assert!(counter.record(&symbol("ETH/USDT")));

        assert_eq!(counter.count(&symbol("BTC/USDT")), 3);
        assert_eq!(counter.count(&symbol("ETH/USDT")), 1);
        // Symbols without trades report 0, not absent
        assert_eq!(counter.count(&symbol("SOL/USDT")), 0);
        assert_eq!(counter.counts().len(), default_universe().len());
    }

    #[test]
    fn test_counter_monotonic_within_window() {
        let mut counter = TradeRateCounter::new(&[symbol("BTC/USDT")]);
        counter.start();

        let mut previous = 0;
        for _ in 0..50 {
            counter.record(&symbol("BTC/USDT"));
            let current = counter.count(&symbol("BTC/USDT"));
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn test_counter_tick_resets_all_symbols_together() {
        let universe = default_universe();
        let mut counter = TradeRateCounter::new(&universe);
        counter.start();

        for symbol in &universe {
            counter.record(symbol);
            counter.record(symbol);
        }

        counter.tick();
        assert!(counter.counts().iter().all(|count| count.count == 0));
        assert_eq!(counter.windows_completed(), 1);

        // Next window counts from 0 again
        counter.record(&universe[0]);
        assert_eq!(counter.count(&universe[0]), 1);
    }

    #[test]
    fn test_counter_idle_ignores_records() {
        let mut counter = TradeRateCounter::new(&[symbol("BTC/USDT")]);
        assert_eq!(counter.state(), CounterState::Idle);
        assert!(!counter.record(&symbol("BTC/USDT")));

        counter.start();
        counter.record(&symbol("BTC/USDT"));
        counter.stop();

        // Frozen while idle
        assert!(!counter.record(&symbol("BTC/USDT")));
        assert_eq!(counter.count(&symbol("BTC/USDT")), 1);

        // Restart zeroes counts
        counter.start();
        assert_eq!(counter.count(&symbol("BTC/USDT")), 0);
    }

    #[test]
    fn test_counter_ignores_unknown_symbol() {
        let mut counter = TradeRateCounter::new(&[symbol("BTC/USDT")]);
        counter.start();
        assert!(!counter.record(&symbol("PEPE/USDT")));
        assert_eq!(counter.count(&symbol("PEPE/USDT")), 0);
    }
}
