//! Ensemble decision making
//!
//! Weighted multi-strategy voting, adaptive weight allocation and the
//! performance statistics both depend on.

mod allocator;
mod engine;
mod performance;
mod types;

pub use allocator::{project_capped_simplex, AdaptiveAllocator};
pub use engine::EnsembleEngine;
pub use performance::PerformanceTracker;
pub use types::{EdgeEstimate, EnsembleDecision, NoTradeReason, StrategyWeight, TradeRecord};
