//! Persistence types

use crate::ensemble::{StrategyWeight, TradeRecord};
use crate::risk::{CircuitBreakerState, Position};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current snapshot layout
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to resume after a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub cycle_id: u64,
    pub breaker: CircuitBreakerState,
    pub weights: Vec<StrategyWeight>,
    pub last_rebalance: DateTime<Utc>,
    pub positions: Vec<Position>,
    pub realized_pnl: Decimal,
    /// Closed trades inside the performance lookback
    pub trades: Vec<TradeRecord>,
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("save failed after {attempts} attempts: {last_error}")]
    SaveFailed { attempts: u32, last_error: String },
}
