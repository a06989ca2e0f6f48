//! Liquidation cascade detection

mod detector;
mod types;

pub use detector::CascadeDetector;
pub use types::{CascadeAction, CascadeAlert, CascadeFactors, CascadeScore};
