/// Scanner Data - Gate.io spot activity scanner
///
/// Ingests live Gate.io v4 market data for a fixed symbol universe and maintains a filterable
/// view of each symbol's short-term activity:
/// - a trade message count per fixed window (5s by default)
/// - a top-5 order book snapshot per visible symbol
/// - a 24h volume / change baseline loaded from the REST ticker endpoint
///
/// Everything is owned by a single engine task (see [`ScannerHandle`]) which publishes a
/// [`ScannerView`] whenever the visible set or its contents change.
pub mod books;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod filter;
pub mod subscription;
pub mod symbol;
pub mod ticker;
pub mod trades;
pub mod view;

// Re-export commonly used types for convenience
pub use books::{OrderBookLevel, OrderBookMerger, OrderBookSnapshot, OrderBookUpdate};
pub use config::ScannerConfig;
pub use connection::{
    ConnectionManager, ConnectionStatus, Connector, HandleId, StreamEvent, StreamEventKind,
    gate::GateConnector,
};
pub use engine::{Command, Scanner, ScannerHandle};
pub use error::ScannerError;
pub use exchange::gate::ticker::GateRestClient;
pub use filter::{FilterCriteria, filter_symbols};
pub use subscription::{ChannelKind, Subscription};
pub use symbol::{Symbol, default_universe};
pub use ticker::{TickerCache, TickerSource, TickerStat, load_ticker_cache};
pub use trades::{CounterState, TradeRateCounter, TradeWindowCount};
pub use view::{ScannerView, SymbolCard, Timeframe};
