//! Trailing stop types

use crate::config::StopRuleConfig;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stop update rule with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopKind {
    /// Fixed fraction behind the extreme price
    Percentage { trail_distance: Decimal },
    /// Multiple of ATR behind the extreme price
    Atr {
        atr_multiplier: Decimal,
        period: usize,
    },
    /// Multiple of ATR behind the channel high (long) or low (short)
    Chandelier {
        atr_multiplier: Decimal,
        period: usize,
    },
    /// Percentage trail widened to twice the realized volatility
    Dynamic {
        default_distance: Decimal,
        period: usize,
    },
}

impl StopKind {
    /// Bars of lookback the rule reads, if any
    pub fn period(&self) -> Option<usize> {
        match self {
            StopKind::Percentage { .. } => None,
            StopKind::Atr { period, .. }
            | StopKind::Chandelier { period, .. }
            | StopKind::Dynamic { period, .. } => Some(*period),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            StopKind::Percentage { trail_distance } => {
                if *trail_distance <= Decimal::ZERO || *trail_distance >= Decimal::ONE {
                    return Err(format!("trail_distance {} must be in (0, 1)", trail_distance));
                }
            }
            StopKind::Atr {
                atr_multiplier,
                period,
            }
            | StopKind::Chandelier {
                atr_multiplier,
                period,
            } => {
                if *atr_multiplier <= Decimal::ZERO {
                    return Err(format!("atr_multiplier {} must be positive", atr_multiplier));
                }
                if *period == 0 {
                    return Err("period must be non-zero".to_string());
                }
            }
            StopKind::Dynamic {
                default_distance,
                period,
            } => {
                if *default_distance <= Decimal::ZERO || *default_distance >= Decimal::ONE {
                    return Err(format!(
                        "default_distance {} must be in (0, 1)",
                        default_distance
                    ));
                }
                if *period < 2 {
                    return Err("period must be at least 2".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Lifecycle of a trailing stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopPhase {
    /// Waiting for the activation profit
    Inactive,
    /// Trailing the extreme price
    Active,
    /// Hit; terminal
    Triggered,
}

/// Per-position trailing stop state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingStopState {
    pub kind: StopKind,
    pub activation_profit_pct: Decimal,
    pub phase: StopPhase,
    /// Most favourable price seen while active (entry price before that)
    pub extreme_price: Decimal,
    pub current_stop_price: Option<Decimal>,
    pub triggered_at: Option<DateTime<Utc>>,
}

impl TrailingStopState {
    pub fn new(rule: &StopRuleConfig, entry_price: Decimal) -> Self {
        Self {
            kind: rule.kind.clone(),
            activation_profit_pct: rule.activation_profit_pct,
            phase: StopPhase::Inactive,
            extreme_price: entry_price,
            current_stop_price: None,
            triggered_at: None,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.phase == StopPhase::Triggered
    }
}

/// Exit demanded by a triggered stop
#[derive(Debug, Clone, PartialEq)]
pub struct ForcedExit {
    pub position_id: Uuid,
    pub symbol: String,
    pub stop_price: Decimal,
    pub trigger_price: Decimal,
    pub at: DateTime<Utc>,
}
