use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single funding-market candle.
///
/// For funding candles the "prices" are daily lending rates; `timestamp` is
/// the candle open time in unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
}

/// Ordering requested from the candle history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Bitfinex `sort` query value.
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::Asc => "1",
            Self::Desc => "-1",
        }
    }
}

/// Parameters of a funding candle history request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleQuery {
    pub currency: String,
    /// Candle timeframe, e.g. `1m`.
    pub timeframe: String,
    /// Aggregation bucket of the funding candle key (`a30`).
    pub aggregation: u32,
    /// Lowest lending period included in the aggregation (`p2`).
    pub period_start: u32,
    /// Highest lending period included in the aggregation (`p30`).
    pub period_end: u32,
    pub limit: u32,
    pub sort: SortOrder,
}

impl CandleQuery {
    /// Bitfinex candle key, e.g. `trade:1m:fUSD:a30:p2:p30`.
    pub fn candle_key(&self) -> String {
        format!(
            "trade:{}:f{}:a{}:p{}:p{}",
            self.timeframe, self.currency, self.aggregation, self.period_start, self.period_end
        )
    }
}
