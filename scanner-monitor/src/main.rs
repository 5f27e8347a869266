use rustls::crypto::ring::default_provider;
use scanner_data::{
    Command, FilterCriteria, GateConnector, GateRestClient, ScannerConfig, ScannerError,
    ScannerHandle, ScannerView, SymbolCard, Timeframe,
};
use std::str::FromStr;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::watch,
};
use tracing::{debug, info, warn};

/// Parsed stdin line
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Command(Command),
    Quit,
}

#[tokio::main]
async fn main() -> Result<(), ScannerError> {
    // Install rustls crypto provider for the wss:// and https:// endpoints
    let _ = default_provider().install_default();

    // Initialize logging
    init_logging();

    let config = ScannerConfig::from_env()?;
    let mut criteria = criteria_from_env()?;

    info!(
        symbols = config.symbols.len(),
        ws_url = %config.ws_url,
        rest_url = %config.rest_url,
        "Starting scanner monitor"
    );

    let connector = GateConnector::new(config.ws_url.clone());
    let source = GateRestClient::new(config.rest_url.clone(), config.rest_timeout);
    let scanner = ScannerHandle::spawn(config, connector, source)?;

    if criteria != FilterCriteria::default() {
        scanner.send(Command::SetCriteria(criteria)).await?;
    }

    tokio::spawn(log_view_changes(scanner.subscribe()));

    info!(
        "Commands: p (pause/resume), v <n>, c <n>, t <n>, tf <1m|5m|15m|1h>, \
         r (refresh tickers), q (quit)"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                break;
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_input(&line, &mut criteria) {
                    Ok(Some(Input::Quit)) => break,
                    Ok(Some(Input::Command(command))) => scanner.send(command).await?,
                    Ok(None) => {}
                    Err(error) => warn!(%error, "Ignoring input"),
                },
                Ok(None) => {
                    debug!("stdin closed, waiting for Ctrl-C");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    scanner.shutdown().await
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Initial thresholds from MIN_VOLUME, MIN_CHANGE and MIN_TRADES (default 0).
fn criteria_from_env() -> Result<FilterCriteria, ScannerError> {
    Ok(FilterCriteria::new(
        finite("MIN_VOLUME", env_or("MIN_VOLUME", 0.0)?)?,
        finite("MIN_CHANGE", env_or("MIN_CHANGE", 0.0)?)?,
        env_or("MIN_TRADES", 0)?,
    ))
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ScannerError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ScannerError::InvalidConfig(format!("{key}: cannot parse {value:?}"))),
        Err(_) => Ok(default),
    }
}

/// Parse one stdin line, updating `criteria` in place for threshold commands.
fn parse_input(line: &str, criteria: &mut FilterCriteria) -> Result<Option<Input>, ScannerError> {
    let mut parts = line.split_whitespace();
    let Some(keyword) = parts.next() else {
        return Ok(None);
    };
    let argument = parts.next();

    let input = match keyword {
        "q" | "quit" => Input::Quit,
        "p" | "pause" => Input::Command(Command::TogglePause),
        "r" | "refresh" => Input::Command(Command::RefreshTickers),
        "v" => {
            criteria.min_volume = parse_threshold(keyword, argument)?;
            Input::Command(Command::SetCriteria(*criteria))
        }
        "c" => {
            criteria.min_change = parse_threshold(keyword, argument)?;
            Input::Command(Command::SetCriteria(*criteria))
        }
        "t" => {
            criteria.min_trades = parse_argument(keyword, argument)?;
            Input::Command(Command::SetCriteria(*criteria))
        }
        "tf" => {
            let label = argument.ok_or_else(|| missing_argument(keyword))?;
            Input::Command(Command::SetTimeframe(Timeframe::from_str(label)?))
        }
        other => {
            return Err(ScannerError::InvalidConfig(format!(
                "unknown command {other:?}"
            )));
        }
    };

    Ok(Some(input))
}

fn parse_argument<T: FromStr>(keyword: &str, argument: Option<&str>) -> Result<T, ScannerError> {
    let argument = argument.ok_or_else(|| missing_argument(keyword))?;
    argument.parse().map_err(|_| {
        ScannerError::InvalidConfig(format!("{keyword}: cannot parse {argument:?}"))
    })
}

/// Finite `f64` threshold; `nan` and `inf` parse but never compare usefully.
fn parse_threshold(keyword: &str, argument: Option<&str>) -> Result<f64, ScannerError> {
    finite(keyword, parse_argument(keyword, argument)?)
}

fn finite(name: &str, value: f64) -> Result<f64, ScannerError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ScannerError::InvalidConfig(format!(
            "{name}: threshold must be finite, got {value}"
        )))
    }
}

fn missing_argument(keyword: &str) -> ScannerError {
    ScannerError::InvalidConfig(format!("{keyword}: missing argument"))
}

/// Log pause state and visible set transitions, plus order book updates at debug level.
async fn log_view_changes(mut view: watch::Receiver<ScannerView>) {
    let mut last_paused = None;
    let mut last_visible = Vec::new();

    while view.changed().await.is_ok() {
        let current = view.borrow_and_update().clone();

        if last_paused != Some(current.paused) {
            info!(
                paused = current.paused,
                timeframe = %current.timeframe,
                criteria = ?current.criteria,
                "Scanner state"
            );
            last_paused = Some(current.paused);
        }

        let visible = current.visible();
        if visible != last_visible {
            let cards = current
                .cards
                .iter()
                .map(format_card)
                .collect::<Vec<_>>()
                .join(", ");
            info!(count = visible.len(), "Visible: [{}]", cards);
            last_visible = visible;
        }

        for card in current.cards.iter().filter(|card| card.highlighted) {
            if let Some(book) = &card.book {
                debug!(
                    symbol = %card.symbol,
                    best_bid = ?book.best_bid().map(|level| level.price),
                    best_ask = ?book.best_ask().map(|level| level.price),
                    spread = ?book.spread(),
                    "Order book update"
                );
            }
        }
    }
}

fn format_card(card: &SymbolCard) -> String {
    match &card.ticker {
        Some(ticker) => format!(
            "{} (trades {}, vol {:.2}, chg {:+.2}%)",
            card.symbol, card.trades, ticker.volume_24h, ticker.change_24h
        ),
        None => format!("{} (trades {})", card.symbol, card.trades),
    }
}
