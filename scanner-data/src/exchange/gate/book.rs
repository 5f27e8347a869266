use crate::{
    books::{OrderBookLevel, OrderBookUpdate},
    error::ScannerError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Gate.io order book update body, best price first on both sides.
///
/// Example:
/// ```json
/// {
///   "t": 1606294781123,
///   "s": "BTC_USDT",
///   "bids": [["19137.74", "0.0001"], ["19088.37", "1"]],
///   "asks": [["19137.75", "0.6135"]]
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GateOrderBookUpdate {
    #[serde(alias = "b")]
    pub bids: Vec<GateLevel>,
    #[serde(alias = "a")]
    pub asks: Vec<GateLevel>,
}

/// Gate.io order book level: `["price", "size"]`, as strings or numbers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GateLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl<'de> Deserialize<'de> for GateLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let arr: Vec<Decimal> = Deserialize::deserialize(deserializer)?;
        if arr.len() < 2 {
            return Err(serde::de::Error::custom("expected [price, size] level array"));
        }

        Ok(GateLevel {
            price: arr[0],
            size: arr[1],
        })
    }
}

impl TryFrom<GateLevel> for OrderBookLevel {
    type Error = ScannerError;

    fn try_from(level: GateLevel) -> Result<Self, Self::Error> {
        if level.price < Decimal::ZERO {
            return Err(ScannerError::InvalidLevel {
                field: "price",
                value: level.price.to_string(),
            });
        }
        if level.size < Decimal::ZERO {
            return Err(ScannerError::InvalidLevel {
                field: "size",
                value: level.size.to_string(),
            });
        }

        Ok(OrderBookLevel::new(level.price, level.size))
    }
}

impl TryFrom<GateOrderBookUpdate> for OrderBookUpdate {
    type Error = ScannerError;

    fn try_from(update: GateOrderBookUpdate) -> Result<Self, Self::Error> {
        let bids = update
            .bids
            .into_iter()
            .map(OrderBookLevel::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let asks = update
            .asks
            .into_iter()
            .map(OrderBookLevel::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderBookUpdate::new(bids, asks))
    }
}
