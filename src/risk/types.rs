//! Risk management types

use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons the gate refuses or cannot size a new entry
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RiskError {
    /// Estimated win probability under `kelly.min_probability`
    #[error("win probability {probability} below minimum {minimum}")]
    ProbabilityBelowMinimum {
        probability: Decimal,
        minimum: Decimal,
    },
    /// Kelly fraction is zero
    #[error("no positive edge")]
    NoEdge,
    /// Size exceeds available capital or position limits
    #[error("sizing conflict: {0}")]
    SizingConflict(String),
    /// Circuit breaker is halted
    #[error("trading halted by circuit breaker")]
    TradingHalted,
    /// Liquidation cascade alert active for the symbol
    #[error("liquidation cascade active on {0}")]
    CascadeActive(String),
    /// A forced exit for the symbol happened this cycle
    #[error("forced exit pending on {0}")]
    ForcedExitPending(String),
    /// No accepted price for the symbol yet
    #[error("no price for {0}")]
    NoPrice(String),
}
