//! Weighted ensemble voting

use super::types::{EnsembleDecision, NoTradeReason, StrategyWeight};
use crate::config::EnsembleConfig;
use crate::signal::{Direction, StrategySignal};
use rust_decimal::Decimal;

/// Combines one vote per strategy slot into a single decision
#[derive(Debug, Clone)]
pub struct EnsembleEngine {
    confidence_threshold: Decimal,
    min_strategies_agree: usize,
}

impl EnsembleEngine {
    pub fn new(config: &EnsembleConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            min_strategies_agree: config.min_strategies_agree,
        }
    }

    /// Score the slots for `symbol`
    ///
    /// `slots` and `weights` are both in strategy slot order. An empty slot is
    /// an abstention. Signals that do not belong to their slot, target another
    /// symbol or carry a confidence outside [0, 1] are discarded as abstentions.
    pub fn decide(
        &self,
        symbol: &str,
        slots: &[Option<StrategySignal>],
        weights: &[StrategyWeight],
    ) -> EnsembleDecision {
        let votes: Vec<(&StrategySignal, Decimal)> = slots
            .iter()
            .zip(weights)
            .filter_map(|(slot, weight)| {
                let signal = slot.as_ref()?;
                if signal.strategy_id != weight.strategy_id {
                    tracing::warn!(
                        slot = %weight.strategy_id,
                        strategy = %signal.strategy_id,
                        "Signal in wrong strategy slot, treating as abstain"
                    );
                    return None;
                }
                if signal.symbol != symbol {
                    tracing::warn!(
                        strategy = %signal.strategy_id,
                        expected = symbol,
                        got = %signal.symbol,
                        "Signal for wrong symbol, treating as abstain"
                    );
                    return None;
                }
                if !signal.has_valid_confidence() {
                    tracing::warn!(
                        strategy = %signal.strategy_id,
                        confidence = %signal.confidence,
                        "Signal confidence out of range, treating as abstain"
                    );
                    return None;
                }
                Some((signal, weight.weight))
            })
            .collect();

        let score: Decimal = votes
            .iter()
            .map(|(s, w)| s.direction.sign() * s.confidence * *w)
            .sum();
        let direction = Direction::from_score(score);
        let confidence = score.abs();

        let contributing: Vec<String> = if direction == Direction::Hold {
            Vec::new()
        } else {
            votes
                .iter()
                .filter(|(s, _)| s.direction == direction)
                .map(|(s, _)| s.strategy_id.clone())
                .collect()
        };

        let no_trade = if direction == Direction::Hold {
            Some(NoTradeReason::Hold)
        } else if confidence < self.confidence_threshold {
            Some(NoTradeReason::BelowThreshold { confidence })
        } else if contributing.len() < self.min_strategies_agree {
            Some(NoTradeReason::InsufficientAgreement {
                agreeing: contributing.len(),
                required: self.min_strategies_agree,
            })
        } else {
            None
        };

        tracing::debug!(
            symbol,
            score = %score,
            direction = ?direction,
            voters = votes.len(),
            actionable = no_trade.is_none(),
            "Ensemble vote"
        );

        EnsembleDecision {
            symbol: symbol.to_string(),
            direction,
            aggregate_confidence: confidence,
            score,
            contributing_strategies: contributing,
            no_trade,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn weights(values: &[(&str, Decimal)]) -> Vec<StrategyWeight> {
        values
            .iter()
            .map(|(id, w)| StrategyWeight {
                strategy_id: id.to_string(),
                weight: *w,
                trailing_sharpe: dec!(0),
                last_updated: Utc::now(),
            })
            .collect()
    }

    fn vote(id: &str, direction: Direction, confidence: Decimal) -> Option<StrategySignal> {
        Some(StrategySignal::new(id, "BTCUSDT", direction, confidence, Utc::now()))
    }

    fn engine(threshold: Decimal, agree: usize) -> EnsembleEngine {
        EnsembleEngine::new(&EnsembleConfig {
            confidence_threshold: threshold,
            min_strategies_agree: agree,
            ..EnsembleConfig::default()
        })
    }

    fn three_weights() -> Vec<StrategyWeight> {
        weights(&[("a", dec!(0.3)), ("b", dec!(0.5)), ("c", dec!(0.2))])
    }

    #[test]
    fn test_weighted_score_is_actionable_buy() {
        let slots = vec![
            vote("a", Direction::Buy, dec!(1.0)),
            vote("b", Direction::Buy, dec!(0.6)),
            vote("c", Direction::Sell, dec!(0.4)),
        ];
        let decision = engine(dec!(0.5), 2).decide("BTCUSDT", &slots, &three_weights());

        assert_eq!(decision.score, dec!(0.52));
        assert_eq!(decision.direction, Direction::Buy);
        assert_eq!(decision.aggregate_confidence, dec!(0.52));
        assert_eq!(decision.contributing_strategies, vec!["a", "b"]);
        assert!(decision.is_actionable());
    }

    #[test]
    fn test_below_threshold_not_actionable() {
        let slots = vec![
            vote("a", Direction::Buy, dec!(1.0)),
            vote("b", Direction::Buy, dec!(0.6)),
            vote("c", Direction::Sell, dec!(0.4)),
        ];
        let decision = engine(dec!(0.6), 2).decide("BTCUSDT", &slots, &three_weights());
        assert_eq!(decision.direction, Direction::Buy);
        assert_eq!(
            decision.no_trade,
            Some(NoTradeReason::BelowThreshold {
                confidence: dec!(0.52)
            })
        );
    }

    #[test]
    fn test_agreement_counts_only_winning_side() {
        let slots = vec![
            None,
            vote("b", Direction::Buy, dec!(1.0)),
            vote("c", Direction::Sell, dec!(0.1)),
        ];
        let decision = engine(dec!(0.4), 2).decide("BTCUSDT", &slots, &three_weights());
        assert_eq!(
            decision.no_trade,
            Some(NoTradeReason::InsufficientAgreement {
                agreeing: 1,
                required: 2
            })
        );
    }

    #[test]
    fn test_zero_score_is_hold() {
        let slots = vec![
            vote("a", Direction::Hold, dec!(0.9)),
            vote("b", Direction::Hold, dec!(0.9)),
            None,
        ];
        let decision = engine(dec!(0.5), 1).decide("BTCUSDT", &slots, &three_weights());
        assert_eq!(decision.direction, Direction::Hold);
        assert_eq!(decision.no_trade, Some(NoTradeReason::Hold));
        assert!(decision.contributing_strategies.is_empty());
    }

    #[test]
    fn test_all_abstain_is_hold() {
        let decision = engine(dec!(0.5), 1).decide("BTCUSDT", &[None, None, None], &three_weights());
        assert_eq!(decision.score, dec!(0));
        assert!(!decision.is_actionable());
    }

    #[test]
    fn test_malformed_signals_abstain() {
        let mut wrong_symbol = vote("a", Direction::Sell, dec!(1.0));
        wrong_symbol.as_mut().unwrap().symbol = "ETHUSDT".to_string();
        let slots = vec![
            wrong_symbol,
            vote("c", Direction::Sell, dec!(1.0)),
            vote("c", Direction::Buy, dec!(2.0)),
        ];
        let decision = engine(dec!(0.1), 1).decide("BTCUSDT", &slots, &three_weights());
        assert_eq!(decision.score, dec!(0));
        assert_eq!(decision.direction, Direction::Hold);
    }
}
