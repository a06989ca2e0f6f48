//! Strategy performance tracking
//!
//! Keeps closed-trade returns per strategy over the allocator lookback and
//! turns them into the trailing Sharpe used for weighting and the win
//! probability and payoff ratio used for sizing.

use super::types::{EdgeEstimate, TradeRecord};
use crate::config::Config;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// Configured priors for a strategy without enough history
#[derive(Debug, Clone, Default)]
struct StrategyPrior {
    win_rate: Option<Decimal>,
    payoff_ratio: Option<Decimal>,
    sharpe: Option<Decimal>,
}

/// Rolling per-strategy trade statistics
#[derive(Debug, Clone)]
pub struct PerformanceTracker {
    lookback: Duration,
    min_trades: usize,
    default_win_probability: Decimal,
    default_payoff_ratio: Decimal,
    priors: HashMap<String, StrategyPrior>,
    trades: HashMap<String, VecDeque<TradeRecord>>,
}

impl PerformanceTracker {
    pub fn new(config: &Config) -> Self {
        let priors = config
            .strategies
            .iter()
            .map(|s| {
                (
                    s.id.clone(),
                    StrategyPrior {
                        win_rate: s.win_rate,
                        payoff_ratio: s.payoff_ratio,
                        sharpe: s.sharpe,
                    },
                )
            })
            .collect();

        Self {
            lookback: Duration::days(config.allocator.lookback_days),
            min_trades: config.kelly.min_trades_for_estimate,
            default_win_probability: config.kelly.prior_win_probability,
            default_payoff_ratio: config.kelly.prior_payoff_ratio,
            priors,
            trades: HashMap::new(),
        }
    }

    /// Record a closed trade
    pub fn record(&mut self, strategy_id: &str, return_pct: Decimal, closed_at: DateTime<Utc>) {
        self.trades
            .entry(strategy_id.to_string())
            .or_default()
            .push_back(TradeRecord {
                strategy_id: strategy_id.to_string(),
                return_pct,
                closed_at,
            });
    }

    /// Drop trades older than the lookback window
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.lookback;
        for trades in self.trades.values_mut() {
            while trades.front().is_some_and(|t| t.closed_at < cutoff) {
                trades.pop_front();
            }
        }
    }

    pub fn trade_count(&self, strategy_id: &str) -> usize {
        self.trades.get(strategy_id).map_or(0, VecDeque::len)
    }

    fn returns(&self, strategy_id: &str) -> Vec<Decimal> {
        self.trades
            .get(strategy_id)
            .map(|t| t.iter().map(|r| r.return_pct).collect())
            .unwrap_or_default()
    }

    fn has_estimate(&self, strategy_id: &str) -> bool {
        self.trade_count(strategy_id) >= self.min_trades.max(1)
    }

    /// Per-trade Sharpe: mean over sample standard deviation of returns.
    /// Zero with fewer than two trades or no variance.
    pub fn sharpe(&self, strategy_id: &str) -> Decimal {
        if !self.has_estimate(strategy_id) {
            if let Some(prior) = self.priors.get(strategy_id).and_then(|p| p.sharpe) {
                return prior;
            }
        }
        let returns: Vec<f64> = self
            .returns(strategy_id)
            .into_iter()
            .filter_map(|r| f64::try_from(r).ok())
            .collect();
        if returns.len() < 2 {
            return Decimal::ZERO;
        }
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std = variance.sqrt();
        if std <= f64::EPSILON {
            return Decimal::ZERO;
        }
        Decimal::try_from(mean / std).unwrap_or(Decimal::ZERO)
    }

    /// Share of winning trades, or the prior below the trade minimum
    pub fn win_probability(&self, strategy_id: &str) -> Decimal {
        if !self.has_estimate(strategy_id) {
            return self.prior_win_probability(strategy_id);
        }
        let returns = self.returns(strategy_id);
        let wins = returns.iter().filter(|r| **r > Decimal::ZERO).count();
        Decimal::from(wins as u64) / Decimal::from(returns.len() as u64)
    }

    /// Average win over average loss, or the prior when either side is empty
    pub fn payoff_ratio(&self, strategy_id: &str) -> Decimal {
        if !self.has_estimate(strategy_id) {
            return self.prior_payoff_ratio(strategy_id);
        }
        let returns = self.returns(strategy_id);
        let (wins, losses): (Vec<Decimal>, Vec<Decimal>) = returns
            .iter()
            .filter(|r| !r.is_zero())
            .partition(|r| **r > Decimal::ZERO);
        if wins.is_empty() || losses.is_empty() {
            return self.prior_payoff_ratio(strategy_id);
        }
        let avg_win = wins.iter().copied().sum::<Decimal>() / Decimal::from(wins.len() as u64);
        let avg_loss = losses.iter().copied().sum::<Decimal>().abs()
            / Decimal::from(losses.len() as u64);
        avg_win / avg_loss
    }

    pub fn edge(&self, strategy_id: &str) -> EdgeEstimate {
        EdgeEstimate {
            win_probability: self.win_probability(strategy_id),
            payoff_ratio: self.payoff_ratio(strategy_id),
        }
    }

    fn prior_win_probability(&self, strategy_id: &str) -> Decimal {
        self.priors
            .get(strategy_id)
            .and_then(|p| p.win_rate)
            .unwrap_or(self.default_win_probability)
    }

    fn prior_payoff_ratio(&self, strategy_id: &str) -> Decimal {
        self.priors
            .get(strategy_id)
            .and_then(|p| p.payoff_ratio)
            .unwrap_or(self.default_payoff_ratio)
    }

    /// All retained trades, for persistence
    pub fn records(&self) -> Vec<TradeRecord> {
        let mut records: Vec<TradeRecord> = self.trades.values().flatten().cloned().collect();
        records.sort_by_key(|r| r.closed_at);
        records
    }

    pub fn restore(&mut self, records: Vec<TradeRecord>) {
        self.trades.clear();
        for record in records {
            self.trades
                .entry(record.strategy_id.clone())
                .or_default()
                .push_back(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn tracker(min_trades: usize) -> PerformanceTracker {
        let mut config = Config::with_strategies(["trend", "revert"]);
        config.kelly.min_trades_for_estimate = min_trades;
        config.strategies[0] = StrategyConfig {
            id: "trend".to_string(),
            win_rate: Some(dec!(0.6)),
            payoff_ratio: Some(dec!(2.0)),
            sharpe: Some(dec!(1.2)),
        };
        PerformanceTracker::new(&config)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_priors_used_without_history() {
        let tracker = tracker(5);
        assert_eq!(tracker.win_probability("trend"), dec!(0.6));
        assert_eq!(tracker.payoff_ratio("trend"), dec!(2.0));
        assert_eq!(tracker.sharpe("trend"), dec!(1.2));
        // No strategy prior: falls back to the kelly defaults
        assert_eq!(tracker.win_probability("revert"), dec!(0.55));
        assert_eq!(tracker.payoff_ratio("revert"), dec!(1.5));
        assert_eq!(tracker.sharpe("revert"), dec!(0));
    }

    #[test]
    fn test_estimates_from_trades() {
        let mut tracker = tracker(4);
        for r in [dec!(0.02), dec!(0.04), dec!(-0.01), dec!(0.03)] {
            tracker.record("revert", r, t0());
        }
        assert_eq!(tracker.win_probability("revert"), dec!(0.75));
        // avg win 0.03 / avg loss 0.01
        assert_eq!(tracker.payoff_ratio("revert"), dec!(3));
        assert!(tracker.sharpe("revert") > dec!(0));
    }

    #[test]
    fn test_sharpe_zero_variance() {
        let mut tracker = tracker(2);
        tracker.record("revert", dec!(0.01), t0());
        tracker.record("revert", dec!(0.01), t0());
        assert_eq!(tracker.sharpe("revert"), dec!(0));
    }

    #[test]
    fn test_prune_respects_lookback() {
        let mut tracker = tracker(1);
        tracker.record("revert", dec!(0.01), t0());
        tracker.record("revert", dec!(0.02), t0() + Duration::days(20));
        tracker.prune(t0() + Duration::days(35));
        assert_eq!(tracker.trade_count("revert"), 1);
    }

    #[test]
    fn test_records_restore() {
        let mut tracker = tracker(1);
        tracker.record("trend", dec!(0.01), t0());
        tracker.record("revert", dec!(-0.02), t0() + Duration::hours(1));
        let records = tracker.records();

        let mut fresh = self::tracker(1);
        fresh.restore(records);
        assert_eq!(fresh.trade_count("trend"), 1);
        assert_eq!(fresh.trade_count("revert"), 1);
    }
}
