//! Risk gate and trading runtime
//!
//! [`RiskGate`] is the synchronous serial stage that owns every piece of
//! risk state. [`TradingRuntime`] wraps it in a mutex and drives it from the
//! market event channel and the decision interval.

mod risk_gate;
mod runtime;
mod types;

pub use risk_gate::{RiskGate, HEDGE_STRATEGY_ID};
pub use runtime::{CycleClock, RunSummary, RuntimeSettings, TradingRuntime};
pub use types::{OrderInstruction, OrderReason, TickOutcome};
