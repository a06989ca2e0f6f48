//! Adaptive strategy weight allocation

use super::types::StrategyWeight;
use crate::config::AllocatorConfig;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// Recomputes strategy weights from trailing Sharpe ratios
///
/// Weights are always within `[min_weight, max_weight]` and sum to one.
/// They change only through [`AdaptiveAllocator::rebalance`], which the gate
/// calls at the start of a decision cycle.
#[derive(Debug, Clone)]
pub struct AdaptiveAllocator {
    min_weight: Decimal,
    max_weight: Decimal,
    smoothing: Decimal,
    rebalance_interval: Duration,
    weights: Vec<StrategyWeight>,
    last_rebalance: DateTime<Utc>,
}

impl AdaptiveAllocator {
    /// Equal weights across the strategies, in slot order
    pub fn new(config: &AllocatorConfig, strategy_ids: &[String], now: DateTime<Utc>) -> Self {
        let equal = if strategy_ids.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::ONE / Decimal::from(strategy_ids.len() as u64)
        };
        let mut allocator = Self {
            min_weight: config.min_weight,
            max_weight: config.max_weight,
            smoothing: config.smoothing,
            rebalance_interval: Duration::hours(config.rebalance_interval_hours),
            weights: strategy_ids
                .iter()
                .map(|id| StrategyWeight {
                    strategy_id: id.clone(),
                    weight: equal,
                    trailing_sharpe: Decimal::ZERO,
                    last_updated: now,
                })
                .collect(),
            last_rebalance: now,
        };
        let projected = project_capped_simplex(
            &allocator.weight_values(),
            allocator.min_weight,
            allocator.max_weight,
        );
        for (w, p) in allocator.weights.iter_mut().zip(projected) {
            w.weight = p;
        }
        allocator
    }

    pub fn weights(&self) -> &[StrategyWeight] {
        &self.weights
    }

    pub fn weight_of(&self, strategy_id: &str) -> Option<Decimal> {
        self.weights
            .iter()
            .find(|w| w.strategy_id == strategy_id)
            .map(|w| w.weight)
    }

    pub fn last_rebalance(&self) -> DateTime<Utc> {
        self.last_rebalance
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_rebalance >= self.rebalance_interval
    }

    fn weight_values(&self) -> Vec<Decimal> {
        self.weights.iter().map(|w| w.weight).collect()
    }

    /// Recompute weights from Sharpe ratios given in slot order
    pub fn rebalance(&mut self, sharpes: &[Decimal], now: DateTime<Utc>) {
        if sharpes.len() != self.weights.len() {
            tracing::error!(
                expected = self.weights.len(),
                got = sharpes.len(),
                "Sharpe count does not match strategy count, skipping rebalance"
            );
            return;
        }

        let positive: Vec<Decimal> = sharpes.iter().map(|s| (*s).max(Decimal::ZERO)).collect();
        let total: Decimal = positive.iter().copied().sum();
        let raw: Vec<Decimal> = if total > Decimal::ZERO {
            positive.iter().map(|s| *s / total).collect()
        } else {
            vec![Decimal::ZERO; positive.len()]
        };

        let smoothed: Vec<Decimal> = self
            .weights
            .iter()
            .zip(&raw)
            .map(|(prev, raw)| self.smoothing * prev.weight + (Decimal::ONE - self.smoothing) * raw)
            .collect();

        let projected = project_capped_simplex(&smoothed, self.min_weight, self.max_weight);
        for ((weight, value), sharpe) in self.weights.iter_mut().zip(projected).zip(sharpes) {
            weight.weight = value;
            weight.trailing_sharpe = *sharpe;
            weight.last_updated = now;
        }
        self.last_rebalance = now;

        tracing::info!(
            weights = ?self
                .weights
                .iter()
                .map(|w| (w.strategy_id.as_str(), w.weight.round_dp(4)))
                .collect::<Vec<_>>(),
            "Strategy weights rebalanced"
        );
    }

    /// Reinstate persisted weights if they cover the same strategies
    pub fn restore(&mut self, weights: Vec<StrategyWeight>, last_rebalance: DateTime<Utc>) -> bool {
        let same_ids = weights.len() == self.weights.len()
            && weights
                .iter()
                .zip(&self.weights)
                .all(|(a, b)| a.strategy_id == b.strategy_id);
        if !same_ids {
            tracing::warn!("Persisted weights do not match configured strategies, keeping equal weights");
            return false;
        }
        let values: Vec<Decimal> = weights.iter().map(|w| w.weight).collect();
        let projected = project_capped_simplex(&values, self.min_weight, self.max_weight);
        self.weights = weights;
        for (w, p) in self.weights.iter_mut().zip(projected) {
            w.weight = p;
        }
        self.last_rebalance = last_rebalance;
        true
    }
}

/// Closest weights to `scores` (up to scale) that sum to one and respect the bounds
///
/// Requires `n·min ≤ 1 ≤ n·max`. Scores summing to zero are treated as equal.
pub fn project_capped_simplex(scores: &[Decimal], min: Decimal, max: Decimal) -> Vec<Decimal> {
    let n = scores.len();
    if n == 0 {
        return Vec::new();
    }
    let scores: Vec<Decimal> = if scores.iter().copied().sum::<Decimal>() <= Decimal::ZERO {
        vec![Decimal::ONE; n]
    } else {
        scores.iter().map(|s| (*s).max(Decimal::ZERO)).collect()
    };

    let mut fixed: Vec<Option<Decimal>> = vec![None; n];
    let mut weights = vec![Decimal::ZERO; n];

    // Each pass pins at least one weight to a bound
    for _ in 0..=n {
        let free: Vec<usize> = (0..n).filter(|i| fixed[*i].is_none()).collect();
        if free.is_empty() {
            break;
        }
        let fixed_mass: Decimal = fixed.iter().flatten().copied().sum();
        let free_mass = Decimal::ONE - fixed_mass;
        let free_score: Decimal = free.iter().map(|i| scores[*i]).sum();

        for &i in &free {
            weights[i] = if free_score > Decimal::ZERO {
                scores[i] * free_mass / free_score
            } else {
                free_mass / Decimal::from(free.len() as u64)
            };
        }

        let excess: Decimal = free
            .iter()
            .filter(|i| weights[**i] > max)
            .map(|i| weights[*i] - max)
            .sum();
        let deficit: Decimal = free
            .iter()
            .filter(|i| weights[**i] < min)
            .map(|i| min - weights[*i])
            .sum();

        if excess.is_zero() && deficit.is_zero() {
            break;
        }
        if excess >= deficit {
            for &i in &free {
                if weights[i] > max {
                    fixed[i] = Some(max);
                }
            }
        } else {
            for &i in &free {
                if weights[i] < min {
                    fixed[i] = Some(min);
                }
            }
        }
    }

    for (w, f) in weights.iter_mut().zip(&fixed) {
        if let Some(bound) = f {
            *w = *bound;
        }
    }

    // Absorb rounding residual into weights with room
    let mut residual = Decimal::ONE - weights.iter().copied().sum::<Decimal>();
    for w in weights.iter_mut() {
        if residual.is_zero() {
            break;
        }
        if residual > Decimal::ZERO {
            let room = (max - *w).max(Decimal::ZERO);
            let take = room.min(residual);
            *w += take;
            residual -= take;
        } else {
            let room = (*w - min).max(Decimal::ZERO);
            let give = room.min(-residual);
            *w -= give;
            residual += give;
        }
    }
    weights
}
