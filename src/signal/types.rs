//! Signal types

use crate::feed::MarketSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy identifier
pub type StrategyId = String;

/// Directional vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl Direction {
    /// +1 for Buy, -1 for Sell, 0 for Hold
    pub fn sign(&self) -> Decimal {
        match self {
            Direction::Buy => Decimal::ONE,
            Direction::Sell => Decimal::NEGATIVE_ONE,
            Direction::Hold => Decimal::ZERO,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
            Direction::Hold => Direction::Hold,
        }
    }

    /// Direction of a signed score; zero is Hold
    pub fn from_score(score: Decimal) -> Self {
        if score > Decimal::ZERO {
            Direction::Buy
        } else if score < Decimal::ZERO {
            Direction::Sell
        } else {
            Direction::Hold
        }
    }
}

/// One strategy's vote for one symbol in one decision cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy_id: StrategyId,
    pub symbol: String,
    pub direction: Direction,
    /// Confidence in [0, 1]
    pub confidence: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Free-form indicator values reported alongside the vote
    #[serde(default)]
    pub aux_indicators: BTreeMap<String, Decimal>,
}

impl StrategySignal {
    pub fn new(
        strategy_id: impl Into<StrategyId>,
        symbol: impl Into<String>,
        direction: Direction,
        confidence: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            direction,
            confidence,
            timestamp,
            aux_indicators: BTreeMap::new(),
        }
    }

    pub fn has_valid_confidence(&self) -> bool {
        self.confidence >= Decimal::ZERO && self.confidence <= Decimal::ONE
    }
}

/// Capability every externally supplied strategy exposes
#[async_trait]
pub trait SignalProducer: Send + Sync {
    /// Identifier of the strategy slot this producer fills
    fn strategy_id(&self) -> &str;

    /// Produce a vote for the snapshot's symbol; `Ok(None)` abstains
    async fn generate_signal(
        &self,
        snapshot: &MarketSnapshot,
    ) -> anyhow::Result<Option<StrategySignal>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::Buy.sign(), dec!(1));
        assert_eq!(Direction::Sell.sign(), dec!(-1));
        assert_eq!(Direction::Hold.sign(), dec!(0));
    }

    #[test]
    fn test_direction_from_score() {
        assert_eq!(Direction::from_score(dec!(0.52)), Direction::Buy);
        assert_eq!(Direction::from_score(dec!(-0.1)), Direction::Sell);
        assert_eq!(Direction::from_score(dec!(0)), Direction::Hold);
    }

    #[test]
    fn test_confidence_bounds() {
        let mut s = StrategySignal::new("a", "BTCUSDT", Direction::Buy, dec!(1), Utc::now());
        assert!(s.has_valid_confidence());
        s.confidence = dec!(1.2);
        assert!(!s.has_valid_confidence());
    }
}
