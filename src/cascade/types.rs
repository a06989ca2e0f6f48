//! Cascade detection types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What the gate does to a symbol's positions when its cascade alert fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeAction {
    /// Close `reduce_fraction` of every position
    ReducePositions,
    /// Close every position
    CloseAll,
    /// Open an offsetting position sized at `hedge_ratio` of net exposure
    Hedge,
}

/// Raw and normalised inputs behind a cascade score
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CascadeFactors {
    /// Window volume over the mean baseline window volume
    pub volume_spike_ratio: Decimal,
    /// Fractional drop from the window peak per minute
    pub price_drop_speed: Decimal,
    pub liquidation_count: u32,
    pub volume_component: Decimal,
    pub drop_speed_component: Decimal,
    pub liquidation_component: Decimal,
}

/// Cascade risk for one symbol at one instant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeScore {
    pub symbol: String,
    /// Weighted sum of the components, in [0, 1]
    pub score: Decimal,
    pub factors: CascadeFactors,
    pub computed_at: DateTime<Utc>,
}

/// Emitted when a symbol's score rises to the threshold from below
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeAlert {
    pub symbol: String,
    pub score: CascadeScore,
    pub action: CascadeAction,
    pub at: DateTime<Utc>,
}
