//! Daily drawdown circuit breaker

use crate::config::CircuitBreakerConfig;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Breaker level, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BreakerLevel {
    Normal,
    Caution,
    Alert,
    Halted,
}

impl BreakerLevel {
    /// Scale applied to new position sizes
    pub fn multiplier(&self) -> Decimal {
        match self {
            BreakerLevel::Normal => dec!(1),
            BreakerLevel::Caution => dec!(0.5),
            BreakerLevel::Alert => dec!(0.25),
            BreakerLevel::Halted => dec!(0),
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// A level change, reported to the gate and the notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerTransition {
    pub from: BreakerLevel,
    pub to: BreakerLevel,
    pub daily_pnl_pct: Decimal,
    pub at: DateTime<Utc>,
}

/// Persisted breaker state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub level: BreakerLevel,
    pub trading_day: NaiveDate,
    pub day_open_equity: Decimal,
    pub daily_pnl_pct: Decimal,
    pub cooldown_until: Option<DateTime<Utc>>,
}

/// Escalates on daily drawdown; only a cooldown expiry or a new UTC day
/// brings it back down
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    level_1: Decimal,
    level_2: Decimal,
    level_3: Decimal,
    cooldown: Duration,
    state: CircuitBreakerState,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig, equity: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            level_1: config.level_1_drawdown,
            level_2: config.level_2_drawdown,
            level_3: config.level_3_drawdown,
            cooldown: Duration::minutes(config.cooldown_minutes),
            state: CircuitBreakerState {
                level: BreakerLevel::Normal,
                trading_day: now.date_naive(),
                day_open_equity: equity,
                daily_pnl_pct: Decimal::ZERO,
                cooldown_until: None,
            },
        }
    }

    pub fn state(&self) -> &CircuitBreakerState {
        &self.state
    }

    pub fn level(&self) -> BreakerLevel {
        self.state.level
    }

    pub fn multiplier(&self) -> Decimal {
        self.state.level.multiplier()
    }

    pub fn is_halted(&self) -> bool {
        self.state.level == BreakerLevel::Halted
    }

    fn level_for(&self, pnl_pct: Decimal) -> BreakerLevel {
        if pnl_pct <= self.level_3 {
            BreakerLevel::Halted
        } else if pnl_pct <= self.level_2 {
            BreakerLevel::Alert
        } else if pnl_pct <= self.level_1 {
            BreakerLevel::Caution
        } else {
            BreakerLevel::Normal
        }
    }

    fn transition(
        &mut self,
        to: BreakerLevel,
        now: DateTime<Utc>,
        transitions: &mut Vec<BreakerTransition>,
    ) {
        let from = self.state.level;
        self.state.level = to;
        self.state.cooldown_until = if to == BreakerLevel::Halted {
            Some(now + self.cooldown)
        } else {
            None
        };
        transitions.push(BreakerTransition {
            from,
            to,
            daily_pnl_pct: self.state.daily_pnl_pct,
            at: now,
        });
    }

    /// Re-evaluate against current equity. Returns every level change, in order.
    pub fn update(&mut self, equity: Decimal, now: DateTime<Utc>) -> Vec<BreakerTransition> {
        let mut transitions = Vec::new();

        let today = now.date_naive();
        if today != self.state.trading_day {
            self.state.trading_day = today;
            self.state.day_open_equity = equity;
            self.state.daily_pnl_pct = Decimal::ZERO;
            if self.state.level != BreakerLevel::Normal {
                self.transition(BreakerLevel::Normal, now, &mut transitions);
            }
            self.state.cooldown_until = None;
        }

        self.state.daily_pnl_pct = if self.state.day_open_equity > Decimal::ZERO {
            (equity - self.state.day_open_equity) / self.state.day_open_equity
        } else {
            Decimal::ZERO
        };

        if self.state.level == BreakerLevel::Halted {
            match self.state.cooldown_until {
                Some(until) if now >= until => {
                    self.transition(BreakerLevel::Normal, now, &mut transitions);
                }
                _ => return transitions,
            }
        }

        let target = self.level_for(self.state.daily_pnl_pct);
        if target > self.state.level {
            self.transition(target, now, &mut transitions);
        }
        transitions
    }

    /// Reinstate persisted state. A state from an earlier day is ignored.
    pub fn restore(&mut self, state: CircuitBreakerState, now: DateTime<Utc>) {
        if state.trading_day == now.date_naive() {
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(&CircuitBreakerConfig::default(), dec!(3000), t0())
    }

    #[test]
    fn test_escalation_sequence() {
        let mut b = breaker();
        assert!(b.update(dec!(2900), t0()).is_empty());

        let t = b.update(dec!(2850), t0() + Duration::minutes(1));
        assert_eq!(t.len(), 1);
        assert_eq!((t[0].from, t[0].to), (BreakerLevel::Normal, BreakerLevel::Caution));
        assert_eq!(t[0].daily_pnl_pct, dec!(-0.05));
        assert_eq!(b.multiplier(), dec!(0.5));

        let t = b.update(dec!(2700), t0() + Duration::minutes(2));
        assert_eq!(t[0].to, BreakerLevel::Alert);
        assert_eq!(b.multiplier(), dec!(0.25));

        let halt_at = t0() + Duration::minutes(3);
        let t = b.update(dec!(2550), halt_at);
        assert_eq!(t[0].to, BreakerLevel::Halted);
        assert_eq!(b.multiplier(), dec!(0));
        assert_eq!(b.state().cooldown_until, Some(halt_at + Duration::minutes(30)));
    }

    #[test]
    fn test_escalation_skips_levels() {
        let mut b = breaker();
        let t = b.update(dec!(2500), t0());
        assert_eq!(t.len(), 1);
        assert_eq!((t[0].from, t[0].to), (BreakerLevel::Normal, BreakerLevel::Halted));
    }

    #[test]
    fn test_no_intraday_downgrade() {
        let mut b = breaker();
        b.update(dec!(2700), t0());
        assert_eq!(b.level(), BreakerLevel::Alert);
        assert!(b.update(dec!(3100), t0() + Duration::hours(1)).is_empty());
        assert_eq!(b.level(), BreakerLevel::Alert);
    }

    #[test]
    fn test_cooldown_resets_then_reevaluates() {
        let mut b = breaker();
        b.update(dec!(2550), t0());
        assert!(b.is_halted());

        // Still cooling down
        assert!(b.update(dec!(2950), t0() + Duration::minutes(29)).is_empty());
        assert!(b.is_halted());

        // Cooldown over and equity recovered to -2%
        let t = b.update(dec!(2940), t0() + Duration::minutes(30));
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].to, BreakerLevel::Normal);
        assert_eq!(b.state().cooldown_until, None);
    }

    #[test]
    fn test_cooldown_can_rehalt() {
        let mut b = breaker();
        b.update(dec!(2550), t0());
        let t = b.update(dec!(2550), t0() + Duration::minutes(31));
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].to, BreakerLevel::Normal);
        assert_eq!(t[1].to, BreakerLevel::Halted);
        assert!(b.is_halted());
    }

    #[test]
    fn test_new_day_resets_baseline() {
        let mut b = breaker();
        b.update(dec!(2700), t0());
        assert_eq!(b.level(), BreakerLevel::Alert);

        let next_day = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 1).unwrap();
        let t = b.update(dec!(2700), next_day);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].to, BreakerLevel::Normal);
        assert_eq!(b.state().day_open_equity, dec!(2700));
        assert_eq!(b.state().daily_pnl_pct, dec!(0));
    }

    #[test]
    fn test_restore_same_day_only() {
        let mut b = breaker();
        b.update(dec!(2700), t0());
        let saved = b.state().clone();

        let mut fresh = breaker();
        fresh.restore(saved.clone(), t0() + Duration::hours(2));
        assert_eq!(fresh.level(), BreakerLevel::Alert);

        let mut tomorrow = breaker();
        tomorrow.restore(saved, t0() + Duration::days(1));
        assert_eq!(tomorrow.level(), BreakerLevel::Normal);
    }
}
