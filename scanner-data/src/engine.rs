//! Single-task scanner engine.
//!
//! [`Scanner`] is the synchronous state machine owning every component. [`ScannerHandle::spawn`]
//! drives it from one tokio task that serialises user commands, connection events, the trade
//! window reset, highlight deadlines and ticker fetch completions, then publishes a
//! [`ScannerView`] after each change.

use crate::{
    books::OrderBookMerger,
    config::ScannerConfig,
    connection::{ConnectionManager, Connector, StreamEvent, StreamEventKind},
    error::ScannerError,
    filter::{FilterCriteria, filter_symbols},
    subscription::{ChannelKind, Subscription},
    symbol::Symbol,
    ticker::{TickerCache, TickerSource, load_ticker_cache},
    trades::TradeRateCounter,
    view::{ScannerView, SymbolCard, Timeframe},
};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info};

/// User command accepted by the running engine.
#[derive(Clone, PartialEq, Debug)]
pub enum Command {
    Pause,
    Resume,
    TogglePause,
    SetCriteria(FilterCriteria),
    SetTimeframe(Timeframe),
    RefreshTickers,
    Shutdown,
}

pub struct Scanner<C> {
    universe: Vec<Symbol>,
    book_interval: String,
    manager: ConnectionManager<C>,
    counter: TradeRateCounter,
    books: OrderBookMerger,
    tickers: TickerCache,
    criteria: FilterCriteria,
    timeframe: Timeframe,
    paused: bool,
    visible: Vec<Symbol>,
}

impl<C> Scanner<C>
where
    C: Connector,
{
    /// Create a paused scanner. Nothing is opened until [`Scanner::resume`].
    pub fn new(config: &ScannerConfig, connector: C, events: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            universe: config.symbols.clone(),
            book_interval: config.book_interval.clone(),
            manager: ConnectionManager::new(connector, events),
            counter: TradeRateCounter::new(&config.symbols),
            books: OrderBookMerger::new(config.book_depth, config.highlight_duration),
            tickers: TickerCache::default(),
            criteria: FilterCriteria::default(),
            timeframe: Timeframe::default(),
            paused: true,
            visible: Vec::new(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_streaming(&self) -> bool {
        self.counter.is_streaming()
    }

    pub fn visible(&self) -> &[Symbol] {
        &self.visible
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.criteria
    }

    pub fn tickers(&self) -> &TickerCache {
        &self.tickers
    }

    pub fn counter(&self) -> &TradeRateCounter {
        &self.counter
    }

    pub fn books(&self) -> &OrderBookMerger {
        &self.books
    }

    pub fn connections(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    /// Start streaming: fresh counts, one trade connection per symbol, book connections for
    /// the visible set.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }

        info!(symbols = self.universe.len(), "resuming scanner");
        self.paused = false;
        self.counter.start();
        for symbol in &self.universe {
            self.manager.open(Subscription::trades(symbol.clone()));
        }
        self.refresh();
    }

    /// Stop streaming: every connection is closed and counts freeze. Book snapshots stay
    /// displayed.
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }

        info!("pausing scanner");
        self.paused = true;
        self.manager.close_all();
        self.counter.stop();
        self.books.clear_highlights();
        self.refresh();
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume()
        } else {
            self.pause()
        }
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        debug!(?criteria, "updating filter criteria");
        self.criteria = criteria;
        self.refresh();
    }

    pub fn set_timeframe(&mut self, timeframe: Timeframe) {
        self.timeframe = timeframe;
    }

    /// Replace the ticker baseline wholesale.
    pub fn apply_tickers(&mut self, tickers: TickerCache) {
        self.tickers = tickers;
        self.refresh();
    }

    /// Apply one command. Returns false for commands the caller must handle itself.
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::TogglePause => self.toggle_pause(),
            Command::SetCriteria(criteria) => self.set_criteria(criteria),
            Command::SetTimeframe(timeframe) => self.set_timeframe(timeframe),
            Command::RefreshTickers | Command::Shutdown => return false,
        }
        true
    }

    /// Apply one connection event. Events from closed handles are no-ops.
    ///
    /// Returns true if anything observable changed.
    pub fn handle_event(&mut self, event: StreamEvent, now: Instant) -> bool {
        if !self.manager.accept(&event) {
            return false;
        }

        match event.kind {
            StreamEventKind::Connected | StreamEventKind::Disconnected(_) => true,
            StreamEventKind::Trade => {
                let changed = self.counter.record(&event.symbol);
                if changed {
                    self.refresh();
                }
                changed
            }
            StreamEventKind::OrderBook(update) => self.books.apply(&event.symbol, update, now),
        }
    }

    /// Trade window boundary.
    pub fn tick(&mut self) {
        self.counter.tick();
        self.refresh();
    }

    pub fn next_highlight_expiry(&self) -> Option<Instant> {
        self.books.next_highlight_expiry()
    }

    pub fn expire_highlights(&mut self, now: Instant) -> bool {
        self.books.expire_highlights(now)
    }

    /// Close everything and stop counting.
    pub fn shutdown(&mut self) {
        self.paused = true;
        self.manager.close_all();
        self.counter.stop();
    }

    pub fn view(&self, now: Instant) -> ScannerView {
        let cards = self
            .visible
            .iter()
            .map(|symbol| SymbolCard {
                symbol: symbol.clone(),
                trades: self.counter.count(symbol),
                ticker: self.tickers.get(symbol).cloned(),
                book: self.books.snapshot(symbol).cloned(),
                highlighted: self.books.is_highlighted(symbol, now),
                book_status: self.manager.status(symbol, ChannelKind::OrderBook),
            })
            .collect();

        ScannerView {
            paused: self.paused,
            timeframe: self.timeframe,
            criteria: self.criteria,
            cards,
            trade_counts: self.counter.counts(),
        }
    }

    fn refresh(&mut self) {
        self.visible = filter_symbols(
            &self.universe,
            |symbol| self.counter.count(symbol),
            &self.tickers,
            &self.criteria,
        );
        self.reconcile_books();
    }

    /// Unmount cards that left the visible set, mount newcomers, and make sure every mounted
    /// card has a book connection while streaming.
    fn reconcile_books(&mut self) {
        let departed = self
            .books
            .mounted()
            .filter(|symbol| !self.visible.contains(symbol))
            .cloned()
            .collect::<Vec<_>>();

        for symbol in departed {
            self.books.unmount(&symbol);
            self.manager.close(&symbol, ChannelKind::OrderBook);
        }

        for symbol in &self.visible {
            self.books.mount(symbol.clone());
            if !self.paused && !self.manager.is_open(symbol, ChannelKind::OrderBook) {
                self.manager.open(Subscription::order_book(
                    symbol.clone(),
                    self.book_interval.clone(),
                ));
            }
        }
    }
}

/// Handle to a running scanner engine task.
#[derive(Debug)]
pub struct ScannerHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ScannerView>,
    task: JoinHandle<()>,
}

impl ScannerHandle {
    /// Validate `config`, start streaming and spawn the engine task. Must be called within a
    /// tokio runtime.
    pub fn spawn<C, S>(config: ScannerConfig, connector: C, source: S) -> Result<Self, ScannerError>
    where
        C: Connector + 'static,
        S: TickerSource + 'static,
    {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::channel(config.channel_buffer_size);
        let (commands_tx, commands_rx) = mpsc::channel(64);

        let mut scanner = Scanner::new(&config, connector, events_tx);
        scanner.resume();

        let (view_tx, view_rx) = watch::channel(scanner.view(Instant::now()));

        let task = tokio::spawn(run(
            scanner,
            events_rx,
            commands_rx,
            view_tx,
            Arc::new(source),
            config.trade_window,
        ));

        Ok(Self {
            commands: commands_tx,
            view: view_rx,
            task,
        })
    }

    pub async fn send(&self, command: Command) -> Result<(), ScannerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ScannerError::EngineStopped)
    }

    /// Receiver notified whenever the published view changes.
    pub fn subscribe(&self) -> watch::Receiver<ScannerView> {
        self.view.clone()
    }

    /// Latest published view.
    pub fn current(&self) -> ScannerView {
        self.view.borrow().clone()
    }

    /// Stop the engine, closing every connection, and wait for the task to exit.
    pub async fn shutdown(self) -> Result<(), ScannerError> {
        let _ = self.commands.send(Command::Shutdown).await;
        self.task.await.map_err(|_| ScannerError::EngineStopped)
    }
}

async fn run<C, S>(
    mut scanner: Scanner<C>,
    mut events: mpsc::Receiver<StreamEvent>,
    mut commands: mpsc::Receiver<Command>,
    view_tx: watch::Sender<ScannerView>,
    source: Arc<S>,
    window: Duration,
) where
    C: Connector,
    S: TickerSource + 'static,
{
    // Only the most recently requested ticker snapshot is applied
    let (tickers_tx, mut tickers_rx) = mpsc::channel(4);
    let mut ticker_generation = 0u64;
    spawn_ticker_fetch(&source, &tickers_tx, ticker_generation);

    let mut reset = scanner.is_streaming().then(|| window_interval(window));

    loop {
        let highlight = scanner.next_highlight_expiry();

        let changed = tokio::select! {
            command = commands.recv() => match command {
                None | Some(Command::Shutdown) => break,
                Some(Command::RefreshTickers) => {
                    ticker_generation += 1;
                    info!(generation = ticker_generation, "refreshing 24h ticker snapshot");
                    spawn_ticker_fetch(&source, &tickers_tx, ticker_generation);
                    false
                }
                Some(command) => {
                    let changed = scanner.apply(command);
                    match (scanner.is_streaming(), reset.is_some()) {
                        (true, false) => reset = Some(window_interval(window)),
                        (false, true) => reset = None,
                        _ => {}
                    }
                    changed
                }
            },

            Some(event) = events.recv() => scanner.handle_event(event, Instant::now()),

            _ = next_reset(&mut reset), if reset.is_some() => {
                debug!("trade window elapsed");
                scanner.tick();
                true
            }

            _ = sleep_until_highlight(highlight), if highlight.is_some() => {
                scanner.expire_highlights(Instant::now())
            }

            Some((generation, tickers)) = tickers_rx.recv() => {
                if generation == ticker_generation {
                    scanner.apply_tickers(tickers);
                    true
                } else {
                    debug!(
                        generation,
                        latest = ticker_generation,
                        "discarding superseded ticker snapshot"
                    );
                    false
                }
            }
        };

        if changed {
            let next = scanner.view(Instant::now());
            view_tx.send_if_modified(|current| {
                if *current == next {
                    return false;
                }
                *current = next;
                true
            });
        }
    }

    info!("scanner engine stopping");
    scanner.shutdown();
    view_tx.send_modify(|view| view.paused = true);
}

fn window_interval(window: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + window, window);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_reset(reset: &mut Option<Interval>) {
    match reset {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until_highlight(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn spawn_ticker_fetch<S>(
    source: &Arc<S>,
    tickers_tx: &mpsc::Sender<(u64, TickerCache)>,
    generation: u64,
) where
    S: TickerSource + 'static,
{
    let source = Arc::clone(source);
    let tickers_tx = tickers_tx.clone();
    tokio::spawn(async move {
        let cache = load_ticker_cache(source.as_ref()).await;
        let _ = tickers_tx.send((generation, cache)).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        books::{OrderBookLevel, OrderBookUpdate},
        connection::{ConnectionStatus, HandleId, test_utils::RecordingConnector},
        ticker::TickerStat,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::{collections::VecDeque, str::FromStr};

    fn symbol(input: &str) -> Symbol {
        Symbol::from_str(input).unwrap()
    }

    fn stat(input: &str, volume_24h: f64, change_24h: f64) -> TickerStat {
        TickerStat {
            symbol: symbol(input),
            volume_24h,
            change_24h,
        }
    }

    fn config(symbols: &[&str]) -> ScannerConfig {
        ScannerConfig::new(symbols.iter().map(|input| symbol(input)).collect())
    }

    fn scanner(symbols: &[&str]) -> (Scanner<RecordingConnector>, RecordingConnector) {
        let connector = RecordingConnector::default();
        let (tx, _rx) = mpsc::channel(64);
        let scanner = Scanner::new(&config(symbols), connector.clone(), tx);
        (scanner, connector)
    }

    fn trade(scanner: &Scanner<RecordingConnector>, input: &str) -> StreamEvent {
        event(scanner, input, ChannelKind::Trades, StreamEventKind::Trade)
    }

    fn event(
        scanner: &Scanner<RecordingConnector>,
        input: &str,
        channel: ChannelKind,
        kind: StreamEventKind,
    ) -> StreamEvent {
        let symbol = symbol(input);
        let handle = scanner
            .connections()
            .handle(&symbol, channel)
            .map(|handle| handle.id)
            .unwrap_or(HandleId(0));
        StreamEvent {
            handle,
            symbol,
            channel,
            kind,
        }
    }

    struct StaticSource(Result<Vec<TickerStat>, ScannerError>);

    #[async_trait]
    impl TickerSource for StaticSource {
        async fn fetch_tickers(&self) -> Result<Vec<TickerStat>, ScannerError> {
            self.0.clone()
        }
    }

    /// Serves queued snapshots in call order, each after its delay. The last one repeats.
    struct SequencedSource {
        responses: Mutex<VecDeque<(Duration, Vec<TickerStat>)>>,
    }

    impl SequencedSource {
        fn new(responses: impl IntoIterator<Item = (Duration, Vec<TickerStat>)>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl TickerSource for SequencedSource {
        async fn fetch_tickers(&self) -> Result<Vec<TickerStat>, ScannerError> {
            let (delay, stats) = {
                let mut responses = self.responses.lock();
                if responses.len() > 1 {
                    responses.pop_front()
                } else {
                    responses.front().cloned()
                }
            }
            .unwrap_or_default();

            tokio::time::sleep(delay).await;
            Ok(stats)
        }
    }

    fn ticker_of(view: &ScannerView, input: &str) -> Option<TickerStat> {
        view.card(&symbol(input)).and_then(|card| card.ticker.clone())
    }

    #[test]
    fn test_resume_opens_trades_for_universe_and_books_for_visible() {
        let (mut scanner, connector) = scanner(&["BTC/USDT", "ETH/USDT", "SOL/USDT"]);
        assert!(scanner.is_paused());
        assert_eq!(connector.opened_count(), 0);

        scanner.resume();

        // Default criteria admit every symbol
        assert_eq!(scanner.visible().len(), 3);
        assert_eq!(scanner.connections().open_symbols(ChannelKind::Trades).len(), 3);
        assert_eq!(scanner.connections().open_symbols(ChannelKind::OrderBook).len(), 3);
        assert_eq!(connector.live_count(), 6);

        let book = connector
            .live(&symbol("ETH/USDT"), ChannelKind::OrderBook)
            .unwrap();
        assert_eq!(book.subscription.interval.as_deref(), Some("100ms"));

        // Resuming twice is a no-op
        scanner.resume();
        assert_eq!(connector.opened_count(), 6);
    }

    #[test]
    fn test_pause_makes_stale_events_noops() {
        let (mut scanner, connector) = scanner(&["BTC/USDT"]);
        scanner.resume();
        let now = Instant::now();

        let stale_trade = trade(&scanner, "BTC/USDT");
        let stale_book = event(
            &scanner,
            "BTC/USDT",
            ChannelKind::OrderBook,
            StreamEventKind::OrderBook(OrderBookUpdate::new(
                vec![OrderBookLevel::new(dec!(100), dec!(1))],
                vec![],
            )),
        );
        assert!(scanner.handle_event(stale_trade.clone(), now));
        assert_eq!(scanner.counter().count(&symbol("BTC/USDT")), 1);

        scanner.pause();
        assert_eq!(connector.live_count(), 0);
        assert!(scanner.connections().is_empty());
        assert!(!scanner.is_streaming());

        // Late frames from cancelled handles change nothing
        assert!(!scanner.handle_event(stale_trade.clone(), now));
        assert!(!scanner.handle_event(stale_book, now));
        assert_eq!(scanner.counter().count(&symbol("BTC/USDT")), 1);
        assert!(scanner.books().snapshot(&symbol("BTC/USDT")).is_none());

        // Still stale after resume, since resume opens fresh handles
        scanner.resume();
        assert!(!scanner.handle_event(stale_trade, now));
    }

    #[test]
    fn test_resume_zeroes_counts() {
        let (mut scanner, _connector) = scanner(&["BTC/USDT", "ETH/USDT"]);
        scanner.resume();
        let now = Instant::now();

        for _ in 0..4 {
            scanner.handle_event(trade(&scanner, "ETH/USDT"), now);
        }
        scanner.pause();

        // Frozen while paused
        assert_eq!(scanner.view(now).trade_counts[1].count, 4);

        scanner.resume();
        assert!(scanner.view(now).trade_counts.iter().all(|count| count.count == 0));
    }

    #[test]
    fn test_pause_keeps_book_snapshots() {
        let (mut scanner, _connector) = scanner(&["BTC/USDT"]);
        scanner.resume();
        let now = Instant::now();

        let book = event(
            &scanner,
            "BTC/USDT",
            ChannelKind::OrderBook,
            StreamEventKind::OrderBook(OrderBookUpdate::new(
                vec![OrderBookLevel::new(dec!(100), dec!(1))],
                vec![OrderBookLevel::new(dec!(101), dec!(1))],
            )),
        );
        assert!(scanner.handle_event(book, now));
        assert!(scanner.view(now).cards[0].highlighted);

        scanner.pause();
        let view = scanner.view(now);
        assert!(view.paused);
        assert!(view.cards[0].book.is_some());
        assert!(!view.cards[0].highlighted);
        assert_eq!(view.cards[0].book_status, None);
    }

    #[test]
    fn test_book_connections_follow_visible_set() {
        let (mut scanner, connector) = scanner(&["BTC/USDT", "ETH/USDT"]);
        scanner.resume();
        let now = Instant::now();
        let eth_book = connector
            .live(&symbol("ETH/USDT"), ChannelKind::OrderBook)
            .unwrap();

        // Every symbol drops out: every book connection closes, trade connections stay
        scanner.set_criteria(FilterCriteria::new(0.0, 0.0, 1));
        assert!(scanner.visible().is_empty());
        assert!(eth_book.cancel.is_cancelled());
        assert!(scanner.connections().open_symbols(ChannelKind::OrderBook).is_empty());
        assert_eq!(scanner.connections().open_symbols(ChannelKind::Trades).len(), 2);
        assert_eq!(scanner.books().mounted().count(), 0);

        // A trade makes BTC visible again with a fresh book connection
        assert!(scanner.handle_event(trade(&scanner, "BTC/USDT"), now));
        assert_eq!(scanner.visible(), &[symbol("BTC/USDT")]);
        assert!(scanner.books().is_mounted(&symbol("BTC/USDT")));
        assert_eq!(
            scanner.connections().open_symbols(ChannelKind::OrderBook),
            vec![symbol("BTC/USDT")]
        );
        assert_eq!(
            scanner.connections().status(&symbol("BTC/USDT"), ChannelKind::OrderBook),
            Some(ConnectionStatus::Connecting)
        );

        // Window reset drops it again
        scanner.tick();
        assert!(scanner.visible().is_empty());
        assert!(scanner.connections().open_symbols(ChannelKind::OrderBook).is_empty());
    }

    #[test]
    fn test_disconnected_connection_is_not_reopened() {
        let (mut scanner, connector) = scanner(&["BTC/USDT"]);
        scanner.resume();
        let now = Instant::now();
        let opened = connector.opened_count();

        let disconnected = event(
            &scanner,
            "BTC/USDT",
            ChannelKind::OrderBook,
            StreamEventKind::Disconnected(Some(ScannerError::Socket("reset".to_string()))),
        );
        assert!(scanner.handle_event(disconnected, now));
        scanner.set_criteria(FilterCriteria::default());

        assert_eq!(connector.opened_count(), opened);
        assert_eq!(
            scanner.view(now).cards[0].book_status,
            Some(ConnectionStatus::Disconnected)
        );
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (mut scanner, _connector) = scanner(&["BTC/USDT", "ETH/USDT"]);
        scanner.resume();
        let now = Instant::now();

        scanner.apply_tickers(TickerCache::from_stats([
            stat("BTC/USDT", 5000.0, 1.2),
            stat("ETH/USDT", 500.0, -0.5),
        ]));
        scanner.set_criteria(FilterCriteria::new(1000.0, 0.0, 2));

        for _ in 0..3 {
            scanner.handle_event(trade(&scanner, "BTC/USDT"), now);
        }
        for _ in 0..10 {
            scanner.handle_event(trade(&scanner, "ETH/USDT"), now);
        }

        let view = scanner.view(now);
        assert_eq!(view.visible(), vec![symbol("BTC/USDT")]);
        assert_eq!(view.cards[0].trades, 3);
        assert_eq!(view.cards[0].ticker, Some(stat("BTC/USDT", 5000.0, 1.2)));
    }

    #[test]
    fn test_apply_command() {
        let (mut scanner, _connector) = scanner(&["BTC/USDT"]);

        struct TestCase {
            input: Command,
            expected_handled: bool,
            expected_paused: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: toggle from paused resumes
                input: Command::TogglePause,
                expected_handled: true,
                expected_paused: false,
            },
            TestCase {
                // TC1: refresh is left to the engine loop
                input: Command::RefreshTickers,
                expected_handled: false,
                expected_paused: false,
            },
            TestCase {
                // TC2: timeframe changes nothing else
                input: Command::SetTimeframe(Timeframe::OneHour),
                expected_handled: true,
                expected_paused: false,
            },
            TestCase {
                // TC3
                input: Command::Pause,
                expected_handled: true,
                expected_paused: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            assert_eq!(scanner.apply(test.input), test.expected_handled, "TC{} failed", index);
            assert_eq!(scanner.is_paused(), test.expected_paused, "TC{} failed", index);
        }

        assert_eq!(scanner.view(Instant::now()).timeframe, Timeframe::OneHour);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_resets_counts_every_window() {
        let connector = RecordingConnector::default();
        let handle = ScannerHandle::spawn(
            config(&["BTC/USDT", "ETH/USDT"]),
            connector.clone(),
            StaticSource(Ok(vec![])),
        )
        .unwrap();
        let mut view = handle.subscribe();
        let start = Instant::now();

        let trades = connector.live(&symbol("BTC/USDT"), ChannelKind::Trades).unwrap();
        for _ in 0..3 {
            trades.events.send(trades.event(StreamEventKind::Trade)).await.unwrap();
        }

        view.wait_for(|view| view.trade_counts[0].count == 3).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(5));

        view.wait_for(|view| view.trade_counts[0].count == 0).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));

        handle.shutdown().await.unwrap();
        assert_eq!(connector.live_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_pause_and_resume_commands() {
        let connector = RecordingConnector::default();
        let handle = ScannerHandle::spawn(
            config(&["BTC/USDT"]),
            connector.clone(),
            StaticSource(Ok(vec![])),
        )
        .unwrap();
        let mut view = handle.subscribe();
        assert!(!handle.current().paused);

        handle.send(Command::Pause).await.unwrap();
        view.wait_for(|view| view.paused).await.unwrap();
        assert_eq!(connector.live_count(), 0);

        handle.send(Command::Resume).await.unwrap();
        view.wait_for(|view| !view.paused).await.unwrap();
        assert_eq!(connector.live_count(), 2);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_engine_loads_tickers_and_filters_on_volume() {
        let connector = RecordingConnector::default();
        let handle = ScannerHandle::spawn(
            config(&["BTC/USDT", "ETH/USDT"]),
            connector,
            StaticSource(Ok(vec![stat("BTC/USDT", 5000.0, 1.2)])),
        )
        .unwrap();
        let mut view = handle.subscribe();

        view.wait_for(|view| ticker_of(view, "BTC/USDT").is_some())
            .await
            .unwrap();

        // Tickers exclude BTC only once a volume threshold applies; absent stats stay visible
        handle
            .send(Command::SetCriteria(FilterCriteria::new(6000.0, 0.0, 0)))
            .await
            .unwrap();
        let current = view
            .wait_for(|view| view.criteria.min_volume == 6000.0)
            .await
            .unwrap()
            .visible();
        assert_eq!(current, vec![symbol("ETH/USDT")]);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_refresh_replaces_ticker_cache() {
        let source = SequencedSource::new([
            (
                Duration::ZERO,
                vec![stat("BTC/USDT", 5000.0, 1.2), stat("ETH/USDT", 500.0, -0.5)],
            ),
            (Duration::ZERO, vec![stat("ETH/USDT", 800.0, 2.0)]),
        ]);
        let handle = ScannerHandle::spawn(
            config(&["BTC/USDT", "ETH/USDT"]),
            RecordingConnector::default(),
            source,
        )
        .unwrap();
        let mut view = handle.subscribe();

        view.wait_for(|view| {
            ticker_of(view, "BTC/USDT").is_some() && ticker_of(view, "ETH/USDT").is_some()
        })
        .await
        .unwrap();

        handle.send(Command::RefreshTickers).await.unwrap();
        let refreshed = view
            .wait_for(|view| ticker_of(view, "ETH/USDT") == Some(stat("ETH/USDT", 800.0, 2.0)))
            .await
            .unwrap()
            .clone();

        // Replaced wholesale: BTC is absent from the new snapshot
        assert_eq!(ticker_of(&refreshed, "BTC/USDT"), None);
        assert_eq!(refreshed.visible().len(), 2);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_discards_superseded_ticker_fetch() {
        let source = SequencedSource::new([
            (Duration::ZERO, vec![stat("BTC/USDT", 100.0, 0.0)]),
            (Duration::from_secs(10), vec![stat("BTC/USDT", 200.0, 0.0)]),
            (Duration::from_secs(1), vec![stat("BTC/USDT", 300.0, 0.0)]),
        ]);
        let handle = ScannerHandle::spawn(
            config(&["BTC/USDT"]),
            RecordingConnector::default(),
            source,
        )
        .unwrap();
        let mut view = handle.subscribe();

        view.wait_for(|view| ticker_of(view, "BTC/USDT").is_some())
            .await
            .unwrap();

        handle.send(Command::RefreshTickers).await.unwrap();
        handle.send(Command::RefreshTickers).await.unwrap();

        view.wait_for(|view| {
            ticker_of(view, "BTC/USDT").is_some_and(|stat| stat.volume_24h == 300.0)
        })
        .await
        .unwrap();

        // The slower, older fetch completes later and must not win
        tokio::time::sleep(Duration::from_secs(20)).await;
        let current = handle.current();
        assert_eq!(
            ticker_of(&current, "BTC/USDT"),
            Some(stat("BTC/USDT", 300.0, 0.0))
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_pause_freezes_counts_across_windows() {
        let connector = RecordingConnector::default();
        let handle = ScannerHandle::spawn(
            config(&["BTC/USDT"]),
            connector.clone(),
            StaticSource(Ok(vec![])),
        )
        .unwrap();
        let mut view = handle.subscribe();

        let trades = connector
            .live(&symbol("BTC/USDT"), ChannelKind::Trades)
            .unwrap();
        for _ in 0..3 {
            trades
                .events
                .send(trades.event(StreamEventKind::Trade))
                .await
                .unwrap();
        }
        view.wait_for(|view| view.trade_counts[0].count == 3)
            .await
            .unwrap();

        handle.send(Command::Pause).await.unwrap();
        view.wait_for(|view| view.paused).await.unwrap();

        // Several windows pass without a reset
        tokio::time::sleep(Duration::from_secs(12)).await;
        let frozen = handle.current();
        assert!(frozen.paused);
        assert_eq!(frozen.trade_counts[0].count, 3);

        handle.send(Command::Resume).await.unwrap();
        let resumed = view.wait_for(|view| !view.paused).await.unwrap().clone();
        assert_eq!(resumed.trade_counts[0].count, 0);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_engine_failed_ticker_fetch_is_permissive() {
        let handle = ScannerHandle::spawn(
            config(&["BTC/USDT"]),
            RecordingConnector::default(),
            StaticSource(Err(ScannerError::Rest("HTTP error: 503".to_string()))),
        )
        .unwrap();

        handle
            .send(Command::SetCriteria(FilterCriteria::new(1_000_000.0, 50.0, 0)))
            .await
            .unwrap();
        let visible = handle
            .subscribe()
            .wait_for(|view| view.criteria.min_change == 50.0)
            .await
            .unwrap()
            .visible();
        assert_eq!(visible, vec![symbol("BTC/USDT")]);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_rejects_invalid_config() {
        let result = ScannerHandle::spawn(
            ScannerConfig::new(vec![]),
            RecordingConnector::default(),
            StaticSource(Ok(vec![])),
        );
        assert!(matches!(result, Err(ScannerError::InvalidConfig(_))));
    }
}
