use crate::{
    books::OrderBookSnapshot,
    connection::ConnectionStatus,
    error::ScannerError,
    filter::FilterCriteria,
    symbol::Symbol,
    ticker::TickerStat,
    trades::TradeWindowCount,
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Chart timeframe label shown on every card. Display only, it does not affect counting.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display, Deserialize, Serialize)]
pub enum Timeframe {
    #[default]
    #[display("1m")]
    #[serde(rename = "1m")]
    OneMinute,
    #[display("5m")]
    #[serde(rename = "5m")]
    FiveMinutes,
    #[display("15m")]
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[display("1h")]
    #[serde(rename = "1h")]
    OneHour,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
    ];
}

impl FromStr for Timeframe {
    type Err = ScannerError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim() {
            "1m" => Ok(Timeframe::OneMinute),
            "5m" => Ok(Timeframe::FiveMinutes),
            "15m" => Ok(Timeframe::FifteenMinutes),
            "1h" => Ok(Timeframe::OneHour),
            other => Err(ScannerError::InvalidConfig(format!(
                "unknown timeframe {other:?}, expected one of 1m, 5m, 15m, 1h"
            ))),
        }
    }
}

/// Everything a display needs for one visible symbol.
#[derive(Clone, PartialEq, Debug)]
pub struct SymbolCard {
    pub symbol: Symbol,
    /// Trade messages in the current window.
    pub trades: u64,
    pub ticker: Option<TickerStat>,
    /// Latest top-of-book, possibly stale while paused.
    pub book: Option<OrderBookSnapshot>,
    pub highlighted: bool,
    /// Status of the card's order book connection, `None` while paused.
    pub book_status: Option<ConnectionStatus>,
}

/// Published scanner state.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ScannerView {
    pub paused: bool,
    pub timeframe: Timeframe,
    pub criteria: FilterCriteria,
    /// Visible symbols, in universe order.
    pub cards: Vec<SymbolCard>,
    /// Every symbol's count, visible or not.
    pub trade_counts: Vec<TradeWindowCount>,
}

impl ScannerView {
    /// Visible symbols, in universe order.
    pub fn visible(&self) -> Vec<Symbol> {
        self.cards.iter().map(|card| card.symbol.clone()).collect()
    }

    pub fn card(&self, symbol: &Symbol) -> Option<&SymbolCard> {
        self.cards.iter().find(|card| &card.symbol == symbol)
    }
}
