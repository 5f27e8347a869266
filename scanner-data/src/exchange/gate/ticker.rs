use crate::{
    error::ScannerError,
    symbol::Symbol,
    ticker::{TickerSource, TickerStat},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Gate.io 24h spot ticker record.
///
/// See docs: <https://www.gate.io/docs/developers/apiv4/en/#retrieve-ticker-information>
///
/// Example:
/// ```json
/// {
///   "currency_pair": "BTC_USDT",
///   "last": "42000.1",
///   "change_percentage": "1.2",
///   "base_volume": "5000.12",
///   "quote_volume": "210000000"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct GateTicker {
    pub currency_pair: String,
    #[serde(default)]
    pub base_volume: String,
    #[serde(default)]
    pub change_percentage: String,
}

impl GateTicker {
    /// Normalise into a [`TickerStat`], returning `None` if either numeric field is unparseable.
    pub fn to_stat(&self) -> Option<TickerStat> {
        let volume_24h = self.base_volume.trim().parse::<f64>().ok()?;
        let change_24h = self.change_percentage.trim().parse::<f64>().ok()?;

        if !volume_24h.is_finite() || !change_24h.is_finite() || volume_24h < 0.0 {
            return None;
        }

        Some(TickerStat {
            symbol: Symbol::from_exchange_pair(&self.currency_pair),
            volume_24h,
            change_24h,
        })
    }
}

/// [`TickerSource`] backed by the Gate.io `/spot/tickers` REST endpoint.
#[derive(Debug, Clone)]
pub struct GateRestClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GateRestClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            timeout,
        }
    }

    fn tickers_url(&self) -> String {
        format!("{}/spot/tickers", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TickerSource for GateRestClient {
    async fn fetch_tickers(&self) -> Result<Vec<TickerStat>, ScannerError> {
        let url = self.tickers_url();
        debug!(%url, "requesting 24h ticker snapshot");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;

        if let Err(status_err) = response.error_for_status_ref() {
            return Err(ScannerError::Rest(format!("{url}: {status_err}")));
        }

        let tickers = response
            .json::<Vec<GateTicker>>()
            .await
            .map_err(|error| ScannerError::Deserialise {
                entity: "GateTicker",
                error: error.to_string(),
            })?;

        let total = tickers.len();
        let stats = tickers
            .iter()
            .filter_map(GateTicker::to_stat)
            .collect::<Vec<_>>();

        if stats.len() < total {
            debug!(
                skipped = total - stats.len(),
                "skipped ticker records with unparseable volume or change"
            );
        }

        Ok(stats)
    }
}
