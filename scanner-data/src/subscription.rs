use crate::symbol::Symbol;
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};

/// Category of stream a connection is subscribed to.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
pub enum ChannelKind {
    #[display("trades")]
    Trades,
    #[display("order_book")]
    OrderBook,
}

/// Everything a connection needs to subscribe: the symbol, the channel kind and any
/// channel specific parameter (eg/ the order book update interval).
#[derive(Clone, Eq, PartialEq, Hash, Debug, Constructor, Deserialize, Serialize)]
pub struct Subscription {
    pub symbol: Symbol,
    pub kind: ChannelKind,
    pub interval: Option<String>,
}

impl Subscription {
    /// Trade event subscription for `symbol`.
    pub fn trades(symbol: Symbol) -> Self {
        Self::new(symbol, ChannelKind::Trades, None)
    }

    /// Order book update subscription for `symbol` at the provided cadence, eg/ `100ms`.
    pub fn order_book(symbol: Symbol, interval: impl Into<String>) -> Self {
        Self::new(symbol, ChannelKind::OrderBook, Some(interval.into()))
    }

    /// Key used by the connection manager to enforce one connection per pair.
    pub fn key(&self) -> (Symbol, ChannelKind) {
        (self.symbol.clone(), self.kind)
    }
}
