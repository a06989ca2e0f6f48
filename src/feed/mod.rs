//! Market data module
//!
//! Tick, bar and tape types, validation, bar-derived volatility and replay

mod bars;
mod replay;
mod types;
mod validation;

pub use bars::{BarSeries, VolatilityContext};
pub use replay::{ReplayFeed, ReplayLog, ReplayRecord};
pub use types::{
    Bar, MarketEvent, MarketSnapshot, PriceTick, TapeEvent, TapeEventType, TickError,
};
pub use validation::TickValidator;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Trait for market data sources
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Subscribe to market events
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<MarketEvent>>;
}
