//! Strategy signals
//!
//! Signal types, the producer trait strategies implement, and the bounded
//! collector that gathers one vote per strategy each decision cycle.

mod collector;
mod recorded;
mod types;

pub use collector::{AbstainReason, CollectedSignals, SignalCollector};
pub use recorded::RecordedProducer;
pub use types::{Direction, SignalProducer, StrategyId, StrategySignal};
