use crate::{
    symbol::Symbol,
    ticker::{TickerCache, TickerStat},
};
use serde::{Deserialize, Serialize};

/// Minimum thresholds a symbol must meet to be visible, combined with logical AND.
#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct FilterCriteria {
    pub min_volume: f64,
    pub min_change: f64,
    pub min_trades: u64,
}

impl FilterCriteria {
    pub fn new(min_volume: f64, min_change: f64, min_trades: u64) -> Self {
        Self {
            min_volume,
            min_change,
            min_trades,
        }
    }

    /// Predicate for one symbol. A missing ticker never excludes on volume or change.
    pub fn admits(&self, trade_count: u64, ticker: Option<&TickerStat>) -> bool {
        trade_count >= self.min_trades
            && ticker.is_none_or(|stat| {
                stat.volume_24h >= self.min_volume && stat.change_24h >= self.min_change
            })
    }
}

/// Ordered subset of `universe` admitted by `criteria`, declaration order preserved.
pub fn filter_symbols<F>(
    universe: &[Symbol],
    trade_count: F,
    tickers: &TickerCache,
    criteria: &FilterCriteria,
) -> Vec<Symbol>
where
    F: Fn(&Symbol) -> u64,
{
    universe
        .iter()
        .filter(|symbol| criteria.admits(trade_count(symbol), tickers.get(symbol)))
        .cloned()
        .collect()
}
