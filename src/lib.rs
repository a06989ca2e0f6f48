//! riskcore: real-time risk and capital allocation core for multi-strategy trading
//!
//! This library provides the core components for:
//! - Weighted ensemble voting across strategy signals
//! - Adaptive strategy weights from trailing Sharpe ratios
//! - Fractional Kelly sizing with a correlation penalty
//! - Daily drawdown circuit breaker
//! - Trailing stops (percentage, ATR, chandelier, dynamic)
//! - Liquidation cascade detection
//! - A risk gate and async runtime tying them together
//! - State snapshots, operator notifications and full observability

pub mod cascade;
pub mod cli;
pub mod config;
pub mod ensemble;
pub mod execution;
pub mod feed;
pub mod gate;
pub mod notify;
pub mod persistence;
pub mod risk;
pub mod signal;
pub mod stops;
pub mod telemetry;
