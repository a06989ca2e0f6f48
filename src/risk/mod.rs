//! Risk management module
//!
//! Position sizing, correlation penalties, the daily drawdown breaker and
//! the position book.

mod circuit_breaker;
mod correlation;
mod kelly;
mod position;
mod types;

pub use circuit_breaker::{BreakerLevel, BreakerTransition, CircuitBreaker, CircuitBreakerState};
pub use correlation::CorrelationTracker;
pub use kelly::KellySizer;
pub use position::{ClosedTrade, Position, PositionBook, Side};
pub use types::RiskError;
