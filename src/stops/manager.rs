//! Trailing stop manager

use super::types::{ForcedExit, StopKind, StopPhase, TrailingStopState};
use crate::config::{StopRuleConfig, TrailingStopConfig};
use crate::feed::{BarSeries, VolatilityContext};
use crate::risk::{Position, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Holds the stop rules and advances per-position stop state
#[derive(Debug, Clone)]
pub struct TrailingStopManager {
    default: StopRuleConfig,
    overrides: HashMap<String, StopRuleConfig>,
}

impl TrailingStopManager {
    pub fn new(config: &TrailingStopConfig) -> Self {
        Self {
            default: config.default.clone(),
            overrides: config.overrides.clone(),
        }
    }

    /// Rule for a strategy, falling back to the default
    pub fn rule_for(&self, strategy_id: &str) -> &StopRuleConfig {
        self.overrides.get(strategy_id).unwrap_or(&self.default)
    }

    /// Fresh stop state for a position opened by `strategy_id`
    pub fn new_state(&self, strategy_id: &str, entry_price: Decimal) -> TrailingStopState {
        TrailingStopState::new(self.rule_for(strategy_id), entry_price)
    }

    /// Longest bar lookback any rule needs
    pub fn max_period(&self) -> usize {
        std::iter::once(&self.default)
            .chain(self.overrides.values())
            .filter_map(|r| r.kind.period())
            .max()
            .unwrap_or(0)
    }

    /// Advance the position's stop on an accepted price
    ///
    /// Returns a forced exit exactly once, on the tick that triggers the stop.
    pub fn update(
        &self,
        position: &mut Position,
        price: Decimal,
        bars: Option<&BarSeries>,
        now: DateTime<Utc>,
    ) -> Option<ForcedExit> {
        let profit_pct = position.profit_pct(price);
        let side = position.side;
        let state = &mut position.stop_state;

        match state.phase {
            StopPhase::Triggered => return None,
            StopPhase::Inactive => {
                if profit_pct < state.activation_profit_pct {
                    return None;
                }
                state.phase = StopPhase::Active;
                tracing::debug!(
                    position_id = %position.position_id,
                    symbol = %position.symbol,
                    profit_pct = %profit_pct,
                    "Trailing stop activated"
                );
            }
            StopPhase::Active => {}
        }

        state.extreme_price = match side {
            Side::Long => state.extreme_price.max(price),
            Side::Short => state.extreme_price.min(price),
        };

        let context = match (state.kind.period(), bars) {
            (Some(period), Some(series)) => series.context(period),
            _ => VolatilityContext::default(),
        };
        if let Some(candidate) = candidate_stop(&state.kind, side, state.extreme_price, &context) {
            state.current_stop_price = Some(match (side, state.current_stop_price) {
                (Side::Long, Some(current)) => current.max(candidate),
                (Side::Short, Some(current)) => current.min(candidate),
                (_, None) => candidate,
            });
        }

        let stop = state.current_stop_price?;
        let hit = match side {
            Side::Long => price <= stop,
            Side::Short => price >= stop,
        };
        if !hit {
            return None;
        }

        state.phase = StopPhase::Triggered;
        state.triggered_at = Some(now);
        tracing::info!(
            position_id = %position.position_id,
            symbol = %position.symbol,
            stop = %stop,
            price = %price,
            "Trailing stop triggered"
        );
        Some(ForcedExit {
            position_id: position.position_id,
            symbol: position.symbol.clone(),
            stop_price: stop,
            trigger_price: price,
            at: now,
        })
    }
}

/// Stop implied by the rule at this extreme, or `None` without enough data
fn candidate_stop(
    kind: &StopKind,
    side: Side,
    extreme: Decimal,
    context: &VolatilityContext,
) -> Option<Decimal> {
    let trail = |distance: Decimal| match side {
        Side::Long => extreme * (Decimal::ONE - distance),
        Side::Short => extreme * (Decimal::ONE + distance),
    };

    match kind {
        StopKind::Percentage { trail_distance } => Some(trail(*trail_distance)),
        StopKind::Atr { atr_multiplier, .. } => {
            let offset = *atr_multiplier * context.atr?;
            Some(match side {
                Side::Long => extreme - offset,
                Side::Short => extreme + offset,
            })
        }
        StopKind::Chandelier { atr_multiplier, .. } => {
            let offset = *atr_multiplier * context.atr?;
            match side {
                Side::Long => Some(context.highest_high? - offset),
                Side::Short => Some(context.lowest_low? + offset),
            }
        }
        StopKind::Dynamic {
            default_distance, ..
        } => {
            let vol = context.realized_volatility?;
            Some(trail((*default_distance).max(dec!(2) * vol)))
        }
    }
}
