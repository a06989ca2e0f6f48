//! Trailing stops
//!
//! Closed set of stop rules and the manager that advances each position's
//! stop state on every accepted tick.

mod manager;
mod types;

pub use manager::TrailingStopManager;
pub use types::{ForcedExit, StopKind, StopPhase, TrailingStopState};
