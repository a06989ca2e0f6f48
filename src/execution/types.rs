//! Execution types

use crate::signal::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Order identifier
pub type OrderId = Uuid;

/// A market order handed to the execution engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: OrderId,
    pub symbol: String,
    pub direction: Direction,
    /// Units of the asset
    pub quantity: Decimal,
    /// Price the order was sized at
    pub reference_price: Decimal,
    /// Position the order exits or reduces, if any
    pub position_id: Option<Uuid>,
    pub submitted_at: DateTime<Utc>,
}

/// A fill (executed trade)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub symbol: String,
    pub direction: Direction,
    pub price: Decimal,
    pub quantity: Decimal,
    pub fees: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// Execution failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    /// Venue refused the order
    #[error("order rejected: {0}")]
    Rejected(String),
    /// Venue could not be reached
    #[error("execution unavailable: {0}")]
    Unavailable(String),
}
