use crate::subscription::ChannelKind;
use serde::Serialize;

/// Type that defines how to translate a scanner [`ChannelKind`] into a Gate.io channel to be
/// subscribed to.
///
/// See docs: <https://www.gate.io/docs/developers/apiv4/ws/en/>
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct GateChannel(pub &'static str);

impl GateChannel {
    /// Gate.io real-time spot trades channel name.
    ///
    /// See docs: <https://www.gate.io/docs/developers/apiv4/ws/en/#public-trades-channel>
    pub const TRADES: Self = Self("spot.trades");

    /// Gate.io spot order book update channel name.
    ///
    /// See docs: <https://www.gate.io/docs/developers/apiv4/ws/en/#changed-order-book-levels>
    pub const ORDER_BOOK_UPDATE: Self = Self("spot.order_book_update");
}

impl From<ChannelKind> for GateChannel {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Trades => GateChannel::TRADES,
            ChannelKind::OrderBook => GateChannel::ORDER_BOOK_UPDATE,
        }
    }
}

impl AsRef<str> for GateChannel {
    fn as_ref(&self) -> &str {
        self.0
    }
}
