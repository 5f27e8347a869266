use crate::{
    error::ScannerError,
    symbol::{Symbol, default_universe, find_duplicate, parse_universe},
};
use std::time::Duration;
use url::Url;

/// Gate.io v4 public WebSocket endpoint.
pub const GATE_WS_URL: &str = "wss://api.gateio.ws/ws/v4/";

/// Gate.io v4 REST base url.
pub const GATE_REST_URL: &str = "https://api.gateio.ws/api/v4";

/// Deepest order book snapshot kept per side.
pub const MAX_BOOK_DEPTH: usize = 5;

/// Scanner configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    /// WebSocket url every stream connection is opened against
    pub ws_url: String,
    /// REST base url used for the 24h ticker snapshot
    pub rest_url: String,
    /// Fixed symbol universe, in display order
    pub symbols: Vec<Symbol>,
    /// Length of the trade counting window
    pub trade_window: Duration,
    /// Number of levels kept per order book side
    pub book_depth: usize,
    /// Update cadence requested on the order book channel
    pub book_interval: String,
    /// How long a card stays highlighted after an order book update
    pub highlight_duration: Duration,
    /// Timeout applied to the ticker snapshot request
    pub rest_timeout: Duration,
    /// Buffer size of the connection event channel
    pub channel_buffer_size: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            ws_url: GATE_WS_URL.to_string(),
            rest_url: GATE_REST_URL.to_string(),
            symbols: default_universe(),
            trade_window: Duration::from_secs(5),
            book_depth: 5,
            book_interval: "100ms".to_string(),
            highlight_duration: Duration::from_millis(300),
            rest_timeout: Duration::from_secs(10),
            channel_buffer_size: 1000,
        }
    }
}

impl ScannerConfig {
    /// Create a new configuration scanning the provided symbols
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            ..Default::default()
        }
    }

    /// Build a configuration from `SCANNER_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ScannerError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("SCANNER_WS_URL") {
            config.ws_url = url;
        }
        if let Ok(url) = std::env::var("SCANNER_REST_URL") {
            config.rest_url = url;
        }
        if let Ok(symbols) = std::env::var("SCANNER_SYMBOLS") {
            config.symbols = parse_universe(&symbols)?;
        }
        if let Some(secs) = env_parse::<u64>("SCANNER_WINDOW_SECS")? {
            config.trade_window = Duration::from_secs(secs);
        }
        if let Some(depth) = env_parse::<usize>("SCANNER_BOOK_DEPTH")? {
            config.book_depth = depth;
        }
        if let Ok(interval) = std::env::var("SCANNER_BOOK_INTERVAL") {
            config.book_interval = interval;
        }
        if let Some(millis) = env_parse::<u64>("SCANNER_HIGHLIGHT_MS")? {
            config.highlight_duration = Duration::from_millis(millis);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set WebSocket url
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    /// Set REST base url
    pub fn with_rest_url(mut self, url: impl Into<String>) -> Self {
        self.rest_url = url.into();
        self
    }

    /// Set trade counting window
    pub fn with_trade_window(mut self, window: Duration) -> Self {
        self.trade_window = window;
        self
    }

    /// Set order book depth
    pub fn with_book_depth(mut self, depth: usize) -> Self {
        self.book_depth = depth;
        self
    }

    /// Set highlight duration
    pub fn with_highlight_duration(mut self, duration: Duration) -> Self {
        self.highlight_duration = duration;
        self
    }

    /// Set channel buffer size
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), ScannerError> {
        let ws_url = Url::parse(&self.ws_url)
            .map_err(|error| ScannerError::InvalidConfig(format!("ws_url: {error}")))?;
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(ScannerError::InvalidConfig(format!(
                "ws_url must use ws or wss, got {}",
                ws_url.scheme()
            )));
        }

        let rest_url = Url::parse(&self.rest_url)
            .map_err(|error| ScannerError::InvalidConfig(format!("rest_url: {error}")))?;
        if !matches!(rest_url.scheme(), "http" | "https") {
            return Err(ScannerError::InvalidConfig(format!(
                "rest_url must use http or https, got {}",
                rest_url.scheme()
            )));
        }

        if self.symbols.is_empty() {
            return Err(ScannerError::InvalidConfig(
                "symbol universe must not be empty".to_string(),
            ));
        }
        if let Some(duplicate) = find_duplicate(&self.symbols) {
            return Err(ScannerError::InvalidConfig(format!(
                "symbol {duplicate} listed more than once"
            )));
        }
        if self.trade_window.is_zero() {
            return Err(ScannerError::InvalidConfig(
                "trade_window must be non-zero".to_string(),
            ));
        }
        if !(1..=MAX_BOOK_DEPTH).contains(&self.book_depth) {
            return Err(ScannerError::InvalidConfig(format!(
                "book_depth must be between 1 and {MAX_BOOK_DEPTH}, got {}",
                self.book_depth
            )));
        }
        if self.channel_buffer_size == 0 {
            return Err(ScannerError::InvalidConfig(
                "channel_buffer_size must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ScannerError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ScannerError::InvalidConfig(format!("{key}={value} is not valid"))),
        Err(_) => Ok(None),
    }
}
