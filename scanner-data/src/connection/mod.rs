//! Per-symbol stream connection lifecycle.
//!
//! The [`ConnectionManager`] exclusively owns every [`ConnectionHandle`], at most one per
//! (symbol, channel) pair. Connection tasks never touch scanner state: they forward
//! [`StreamEvent`]s tagged with their [`HandleId`], and events from a handle that has since
//! been closed are rejected by [`ConnectionManager::accept`].

use crate::{
    books::OrderBookUpdate,
    error::ScannerError,
    subscription::{ChannelKind, Subscription},
    symbol::Symbol,
};
use derive_more::Display;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Gate.io WebSocket connection task.
pub mod gate;

/// Unique, monotonically increasing identifier of one opened connection.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
pub struct HandleId(pub u64);

/// Connection status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Event forwarded from a connection task to the scanner engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub handle: HandleId,
    pub symbol: Symbol,
    pub channel: ChannelKind,
    pub kind: StreamEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEventKind {
    /// Connection established and subscribe request sent.
    Connected,
    /// One trade data frame.
    Trade,
    /// One order book data frame.
    OrderBook(OrderBookUpdate),
    /// Connection failed or closed unexpectedly. It will not be retried.
    Disconnected(Option<ScannerError>),
}

/// Transport seam: starts a connection task for `subscription` that forwards events tagged
/// with `handle` until `cancel` fires or the connection ends.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        handle: HandleId,
        subscription: Subscription,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    );
}

/// One live stream connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: HandleId,
    pub subscription: Subscription,
    pub status: ConnectionStatus,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    fn close(&self) {
        self.cancel.cancel();
    }
}

pub struct ConnectionManager<C> {
    connector: C,
    events: mpsc::Sender<StreamEvent>,
    root: CancellationToken,
    handles: HashMap<(Symbol, ChannelKind), ConnectionHandle>,
    next_id: u64,
}

impl<C> ConnectionManager<C>
where
    C: Connector,
{
    pub fn new(connector: C, events: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            connector,
            events,
            root: CancellationToken::new(),
            handles: HashMap::new(),
            next_id: 0,
        }
    }

    /// Open a connection for `subscription`, closing any prior handle for the same pair first.
    pub fn open(&mut self, subscription: Subscription) -> HandleId {
        let key = subscription.key();
        if let Some(prior) = self.handles.remove(&key) {
            debug!(handle = %prior.id, symbol = %key.0, channel = %key.1, "replacing connection");
            prior.close();
        }

        self.next_id += 1;
        let id = HandleId(self.next_id);
        let cancel = self.root.child_token();

        debug!(handle = %id, symbol = %key.0, channel = %key.1, "opening connection");
        self.connector
            .connect(id, subscription.clone(), self.events.clone(), cancel.clone());

        self.handles.insert(
            key,
            ConnectionHandle {
                id,
                subscription,
                status: ConnectionStatus::Connecting,
                cancel,
            },
        );

        id
    }

    /// Close the connection for (`symbol`, `channel`). Returns false if none was open.
    pub fn close(&mut self, symbol: &Symbol, channel: ChannelKind) -> bool {
        match self.handles.remove(&(symbol.clone(), channel)) {
            Some(handle) => {
                debug!(handle = %handle.id, %symbol, %channel, "closing connection");
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Close every open connection.
    pub fn close_all(&mut self) {
        if !self.handles.is_empty() {
            info!(connections = self.handles.len(), "closing all connections");
        }
        for (_, handle) in self.handles.drain() {
            handle.close();
        }
    }

    /// Check `event` comes from a live handle and apply any status change it carries.
    ///
    /// Returns false for events from closed or replaced handles, which must be ignored.
    pub fn accept(&mut self, event: &StreamEvent) -> bool {
        let Some(handle) = self.handles.get_mut(&(event.symbol.clone(), event.channel)) else {
            return false;
        };
        if handle.id != event.handle {
            return false;
        }

        match &event.kind {
            StreamEventKind::Connected => {
                handle.status = ConnectionStatus::Connected;
            }
            StreamEventKind::Disconnected(error) => {
                warn!(
                    handle = %handle.id,
                    symbol = %event.symbol,
                    channel = %event.channel,
                    error = ?error,
                    "connection lost, not retrying until resume"
                );
                handle.status = ConnectionStatus::Disconnected;
            }
            StreamEventKind::Trade | StreamEventKind::OrderBook(_) => {}
        }

        true
    }

    pub fn is_open(&self, symbol: &Symbol, channel: ChannelKind) -> bool {
        self.handles.contains_key(&(symbol.clone(), channel))
    }

    pub fn handle(&self, symbol: &Symbol, channel: ChannelKind) -> Option<&ConnectionHandle> {
        self.handles.get(&(symbol.clone(), channel))
    }

    pub fn status(&self, symbol: &Symbol, channel: ChannelKind) -> Option<ConnectionStatus> {
        self.handle(symbol, channel).map(|handle| handle.status)
    }

    /// Symbols with an open connection on `channel`.
    pub fn open_symbols(&self, channel: ChannelKind) -> Vec<Symbol> {
        self.handles
            .keys()
            .filter(|(_, kind)| *kind == channel)
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<C> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
