use crate::error::ScannerError;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{collections::HashSet, str::FromStr};

/// Symbols scanned when no universe is configured.
pub const DEFAULT_SYMBOLS: [&str; 9] = [
    "BTC/USDT",
    "ETH/USDT",
    "SOL/USDT",
    "XRP/USDT",
    "LTC/USDT",
    "BNB/USDT",
    "DOGE/USDT",
    "ADA/USDT",
    "AVAX/USDT",
];

/// Trading pair in display form, eg/ `BTC/USDT`.
///
/// Gate.io names the same pair `BTC_USDT`, see [`Symbol::exchange_pair`].
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
pub struct Symbol(SmolStr);

impl Symbol {
    /// Build a [`Symbol`] from a Gate.io currency pair, translating the first `_` into `/`.
    pub fn from_exchange_pair(pair: &str) -> Self {
        Self(SmolStr::new(pair.replacen('_', "/", 1)))
    }

    /// Gate.io currency pair for this symbol, eg/ `BTC_USDT`.
    pub fn exchange_pair(&self) -> String {
        self.0.replacen('/', "_", 1)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for Symbol {
    type Err = ScannerError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        match input.split_once('/') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
                Ok(Self(SmolStr::new(input.to_uppercase())))
            }
            _ => Err(ScannerError::InvalidSymbol(input.to_string())),
        }
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// The fixed symbol universe used when nothing else is configured.
pub fn default_universe() -> Vec<Symbol> {
    DEFAULT_SYMBOLS
        .iter()
        .map(|symbol| Symbol(SmolStr::new_static(symbol)))
        .collect()
}

/// Parse a comma separated list of symbols, eg/ `"BTC/USDT, ETH/USDT"`.
pub fn parse_universe(input: &str) -> Result<Vec<Symbol>, ScannerError> {
    let symbols = input
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(Symbol::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    if symbols.is_empty() {
        return Err(ScannerError::InvalidConfig(
            "symbol universe must not be empty".to_string(),
        ));
    }

    if let Some(duplicate) = find_duplicate(&symbols) {
        return Err(ScannerError::InvalidConfig(format!(
            "symbol {duplicate} listed more than once"
        )));
    }

    Ok(symbols)
}

/// First symbol appearing more than once in `symbols`, if any.
pub fn find_duplicate(symbols: &[Symbol]) -> Option<&Symbol> {
    let mut seen = HashSet::with_capacity(symbols.len());
    symbols.iter().find(|symbol| !seen.insert(*symbol))
}
