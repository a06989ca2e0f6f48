//! Market data types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single price update for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Trade price
    pub price: Decimal,
    /// Traded volume carried by this update
    pub volume: Decimal,
    /// Exchange timestamp
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    pub fn new(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            volume: Decimal::ZERO,
            timestamp,
        }
    }
}

/// A closed OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Bar close time
    pub timestamp: DateTime<Utc>,
}

impl Bar {
    /// Prices are positive and the range contains open and close
    pub fn is_well_formed(&self) -> bool {
        self.low > Decimal::ZERO
            && self.high >= self.low
            && (self.low..=self.high).contains(&self.open)
            && (self.low..=self.high).contains(&self.close)
            && self.volume >= Decimal::ZERO
    }
}

/// Kind of trade tape event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TapeEventType {
    /// Regular trade print
    Trade,
    /// Forced liquidation print
    Liquidation,
}

/// One print from the trade/liquidation tape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapeEvent {
    pub symbol: String,
    pub event_type: TapeEventType,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Anything the market data path delivers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketEvent {
    Tick(PriceTick),
    Bar(Bar),
    Tape(TapeEvent),
}

impl MarketEvent {
    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::Tick(t) => &t.symbol,
            MarketEvent::Bar(b) => &b.symbol,
            MarketEvent::Tape(e) => &e.symbol,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            MarketEvent::Tick(t) => t.timestamp,
            MarketEvent::Bar(b) => b.timestamp,
            MarketEvent::Tape(e) => e.timestamp,
        }
    }
}

/// Point-in-time view handed to signal producers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    /// Last accepted price, if any tick has been seen
    pub last_price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    /// Most recent bars, oldest first
    pub recent_bars: Vec<Bar>,
}

/// Reasons a market data record is rejected
#[derive(Debug, Error, PartialEq)]
pub enum TickError {
    #[error("non-positive price {0}")]
    NonPositivePrice(Decimal),
    #[error("negative volume {0}")]
    NegativeVolume(Decimal),
    #[error("stale tick: {age_secs}s behind newest data")]
    Stale { age_secs: i64 },
    #[error("out-of-order tick for {symbol}")]
    OutOfOrder { symbol: String },
    #[error("malformed bar for {0}")]
    MalformedBar(String),
    #[error("invalid tape size {0}")]
    InvalidTapeSize(Decimal),
}
