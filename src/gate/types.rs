//! Risk gate types

use crate::cascade::CascadeAlert;
use crate::execution::OrderRequest;
use crate::risk::BreakerTransition;
use crate::signal::Direction;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an order was emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderReason {
    NewEntry,
    SignalReversal,
    TrailingStop,
    CircuitBreakerHalt,
    CascadeReduce,
    CascadeClose,
    CascadeHedge,
}

impl OrderReason {
    /// Opens a new position
    pub fn opens_position(&self) -> bool {
        matches!(self, OrderReason::NewEntry | OrderReason::CascadeHedge)
    }

    /// Exit imposed by a stop, the breaker or the cascade detector
    pub fn is_forced(&self) -> bool {
        matches!(
            self,
            OrderReason::TrailingStop
                | OrderReason::CircuitBreakerHalt
                | OrderReason::CascadeReduce
                | OrderReason::CascadeClose
        )
    }
}

/// An order the gate wants placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInstruction {
    pub instruction_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    /// Units of the asset
    pub quantity: Decimal,
    pub reference_price: Decimal,
    pub reason: OrderReason,
    /// Position exited or reduced; for entries, the id the new position gets
    pub position_id: Option<Uuid>,
    /// Strategy whose stop rule the new position uses
    pub strategy_id: Option<String>,
    pub contributing_strategies: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl OrderInstruction {
    pub fn to_request(&self) -> OrderRequest {
        OrderRequest {
            order_id: self.instruction_id,
            symbol: self.symbol.clone(),
            direction: self.direction,
            quantity: self.quantity,
            reference_price: self.reference_price,
            position_id: self.position_id,
            submitted_at: self.created_at,
        }
    }
}

/// Everything one market update produced
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Forced exits, in the order they were raised
    pub instructions: Vec<OrderInstruction>,
    pub transitions: Vec<BreakerTransition>,
    pub cascade_alert: Option<CascadeAlert>,
    /// Positions flagged weak by an Alert transition
    pub flagged_weak: Vec<Uuid>,
}

impl TickOutcome {
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
            && self.transitions.is_empty()
            && self.cascade_alert.is_none()
            && self.flagged_weak.is_empty()
    }
}
