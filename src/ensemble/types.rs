//! Ensemble types

use crate::signal::{Direction, StrategyId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Capital weight of one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyWeight {
    pub strategy_id: StrategyId,
    pub weight: Decimal,
    /// Sharpe the weight was last derived from
    pub trailing_sharpe: Decimal,
    pub last_updated: DateTime<Utc>,
}

/// Why an ensemble decision does not trade
#[derive(Debug, Clone, PartialEq)]
pub enum NoTradeReason {
    /// Weighted score is exactly zero
    Hold,
    /// |score| is under the confidence threshold
    BelowThreshold { confidence: Decimal },
    /// Too few strategies voted the winning direction
    InsufficientAgreement { agreeing: usize, required: usize },
}

/// Weighted vote for one symbol in one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleDecision {
    pub symbol: String,
    pub direction: Direction,
    /// |score|
    pub aggregate_confidence: Decimal,
    /// Signed weighted sum of votes
    pub score: Decimal,
    /// Strategies that voted the winning direction, in slot order
    pub contributing_strategies: Vec<StrategyId>,
    /// `None` when the decision is actionable
    pub no_trade: Option<NoTradeReason>,
}

impl EnsembleDecision {
    pub fn is_actionable(&self) -> bool {
        self.no_trade.is_none()
    }
}

/// One closed trade attributed to a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub strategy_id: StrategyId,
    /// Return on notional, net of fees
    pub return_pct: Decimal,
    pub closed_at: DateTime<Utc>,
}

/// Win probability and payoff ratio for Kelly sizing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeEstimate {
    pub win_probability: Decimal,
    pub payoff_ratio: Decimal,
}
