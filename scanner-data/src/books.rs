//! Bounded top-of-book snapshots for visible symbols.
//!
//! The upstream feed already delivers merged, best-price-first levels, so each update replaces
//! the snapshot wholesale after truncation. Levels are never re-sorted here.

use crate::symbol::Symbol;
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;

/// Price/size level in an order book.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Constructor, Deserialize, Serialize)]
pub struct OrderBookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// One inbound order book update, both sides best price first.
#[derive(Clone, PartialEq, Eq, Debug, Default, Constructor, Deserialize, Serialize)]
pub struct OrderBookUpdate {
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

/// Top-N view of a symbol's book: bids descending, asks ascending, in feed order.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct OrderBookSnapshot {
    pub symbol: Symbol,
    pub bids: Vec<OrderBookLevel>,
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBookSnapshot {
    /// Build a snapshot keeping the first `depth` levels of each side.
    pub fn truncated(symbol: Symbol, update: OrderBookUpdate, depth: usize) -> Self {
        let OrderBookUpdate { mut bids, mut asks } = update;
        bids.truncate(depth);
        asks.truncate(depth);
        Self { symbol, bids, asks }
    }

    pub fn best_bid(&self) -> Option<&OrderBookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&OrderBookLevel> {
        self.asks.first()
    }

    /// Best ask minus best bid, if both sides are present.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }
}

/// Per-card state: the latest snapshot plus the cosmetic highlight deadline.
#[derive(Clone, Debug, Default)]
struct BookCard {
    snapshot: Option<OrderBookSnapshot>,
    highlight_until: Option<Instant>,
}

/// Owns every mounted card's [`OrderBookSnapshot`].
#[derive(Debug)]
pub struct OrderBookMerger {
    depth: usize,
    highlight: Duration,
    cards: HashMap<Symbol, BookCard>,
}

impl OrderBookMerger {
    pub fn new(depth: usize, highlight: Duration) -> Self {
        Self {
            depth,
            highlight,
            cards: HashMap::new(),
        }
    }

    /// Mount a card for `symbol`. Mounting an already mounted card keeps its state.
    pub fn mount(&mut self, symbol: Symbol) {
        self.cards.entry(symbol).or_default();
    }

    /// Unmount a card, dropping its snapshot and cancelling any pending highlight.
    pub fn unmount(&mut self, symbol: &Symbol) {
        self.cards.remove(symbol);
    }

    pub fn is_mounted(&self, symbol: &Symbol) -> bool {
        self.cards.contains_key(symbol)
    }

    pub fn mounted(&self) -> impl Iterator<Item = &Symbol> {
        self.cards.keys()
    }

    /// Replace the snapshot for a mounted `symbol` and highlight it until `now + highlight`.
    ///
    /// Returns false if the card is not mounted, in which case nothing changes.
    pub fn apply(&mut self, symbol: &Symbol, update: OrderBookUpdate, now: Instant) -> bool {
        let Some(card) = self.cards.get_mut(symbol) else {
            return false;
        };

        card.snapshot = Some(OrderBookSnapshot::truncated(
            symbol.clone(),
            update,
            self.depth,
        ));
        card.highlight_until = Some(now + self.highlight);
        true
    }

    pub fn snapshot(&self, symbol: &Symbol) -> Option<&OrderBookSnapshot> {
        self.cards.get(symbol)?.snapshot.as_ref()
    }

    pub fn is_highlighted(&self, symbol: &Symbol, now: Instant) -> bool {
        self.cards
            .get(symbol)
            .and_then(|card| card.highlight_until)
            .is_some_and(|until| now < until)
    }

    /// Earliest pending highlight deadline, if any.
    pub fn next_highlight_expiry(&self) -> Option<Instant> {
        self.cards
            .values()
            .filter_map(|card| card.highlight_until)
            .min()
    }

    /// Clear every highlight whose deadline has passed. Returns true if any was cleared.
    pub fn expire_highlights(&mut self, now: Instant) -> bool {
        let mut expired = false;
        for card in self.cards.values_mut() {
            if card.highlight_until.is_some_and(|until| until <= now) {
                card.highlight_until = None;
                expired = true;
            }
        }
        expired
    }

    /// Cancel every pending highlight, keeping snapshots.
    pub fn clear_highlights(&mut self) {
        for card in self.cards.values_mut() {
            card.highlight_until = None;
        }
    }
}
