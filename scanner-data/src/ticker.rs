//! 24h ticker baseline.
//!
//! Loaded once at startup and immutable afterwards. A refresh replaces the whole cache, it is
//! never patched per symbol and never invalidated by stream activity.

use crate::{error::ScannerError, symbol::Symbol};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 24h volume and percent change for one symbol.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct TickerStat {
    pub symbol: Symbol,
    /// 24h volume in base currency.
    pub volume_24h: f64,
    /// 24h change in percent, signed.
    pub change_24h: f64,
}

/// One-shot market snapshot request returning per-symbol 24h stats.
#[async_trait]
pub trait TickerSource: Send + Sync {
    async fn fetch_tickers(&self) -> Result<Vec<TickerStat>, ScannerError>;
}

/// Immutable-after-load map of [`TickerStat`]s keyed by [`Symbol`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickerCache {
    stats: HashMap<Symbol, TickerStat>,
    loaded: bool,
}

impl TickerCache {
    /// Build a loaded cache from a full snapshot. Later records win on duplicate symbols.
    pub fn from_stats(stats: impl IntoIterator<Item = TickerStat>) -> Self {
        Self {
            stats: stats
                .into_iter()
                .map(|stat| (stat.symbol.clone(), stat))
                .collect(),
            loaded: true,
        }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&TickerStat> {
        self.stats.get(symbol)
    }

    /// True once a snapshot has been stored, even if it was empty.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

/// Fetch a full snapshot from `source`.
///
/// A failed fetch degrades to an empty (but loaded) cache, which filters permissively.
pub async fn load_ticker_cache<S>(source: &S) -> TickerCache
where
    S: TickerSource + ?Sized,
{
    match source.fetch_tickers().await {
        Ok(stats) => {
            let cache = TickerCache::from_stats(stats);
            tracing::info!(symbols = cache.len(), "loaded 24h ticker snapshot");
            cache
        }
        Err(error) => {
            tracing::warn!(
                %error,
                "24h ticker snapshot unavailable, volume/change filters disabled"
            );
            TickerCache::from_stats([])
        }
    }
}
