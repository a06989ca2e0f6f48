//! Liquidation cascade detector
//!
//! Per symbol, a rolling window of tape volume, liquidations and prices is
//! reduced to three factors, each normalised into [0, 1]:
//!
//! - volume: `(ratio - 1) / (volume_spike_cap - 1)` where ratio is window
//!   volume over the mean of the last `baseline_windows` window volumes
//! - drop speed: `(peak - last) / peak / minutes_since_peak` over `drop_speed_cap`
//! - liquidations: count over `liquidation_count_cap`

use super::types::{CascadeAction, CascadeAlert, CascadeFactors, CascadeScore};
use crate::config::CascadeConfig;
use crate::feed::{TapeEvent, TapeEventType};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Default)]
struct SymbolWindow {
    volume: VecDeque<(DateTime<Utc>, Decimal)>,
    liquidations: VecDeque<DateTime<Utc>>,
    prices: VecDeque<(DateTime<Utc>, Decimal)>,
    baseline: VecDeque<Decimal>,
    bucket_start: Option<DateTime<Utc>>,
    bucket_volume: Decimal,
    alert_active: bool,
    last_score: Option<CascadeScore>,
}

impl SymbolWindow {
    fn evict(&mut self, cutoff: DateTime<Utc>) {
        while self.volume.front().is_some_and(|(t, _)| *t < cutoff) {
            self.volume.pop_front();
        }
        while self.liquidations.front().is_some_and(|t| *t < cutoff) {
            self.liquidations.pop_front();
        }
        while self.prices.front().is_some_and(|(t, _)| *t < cutoff) {
            self.prices.pop_front();
        }
    }

    /// Close every fully elapsed baseline bucket up to `now`
    fn roll(&mut self, now: DateTime<Utc>, window: Duration, keep: usize) {
        let Some(start) = self.bucket_start else {
            self.bucket_start = Some(now);
            return;
        };
        let window_secs = window.num_seconds().max(1);
        let elapsed = (now - start).num_seconds() / window_secs;
        if elapsed <= 0 {
            return;
        }
        self.baseline.push_back(self.bucket_volume);
        let empty = (elapsed - 1).min(keep as i64);
        for _ in 0..empty {
            self.baseline.push_back(Decimal::ZERO);
        }
        while self.baseline.len() > keep {
            self.baseline.pop_front();
        }
        self.bucket_start = Some(start + Duration::seconds(window_secs * elapsed));
        self.bucket_volume = Decimal::ZERO;
    }
}

/// Scores cascade risk per symbol and raises threshold-crossing alerts
#[derive(Debug, Clone)]
pub struct CascadeDetector {
    config: CascadeConfig,
    window: Duration,
    symbols: HashMap<String, SymbolWindow>,
}

fn unit_clamp(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(Decimal::ONE)
}

impl CascadeDetector {
    pub fn new(config: &CascadeConfig) -> Self {
        Self {
            config: config.clone(),
            window: Duration::seconds(config.window_secs),
            symbols: HashMap::new(),
        }
    }

    pub fn action(&self) -> CascadeAction {
        self.config.action
    }

    /// Feed a tape print
    pub fn on_tape(&mut self, event: &TapeEvent) {
        let (window, keep) = (self.window, self.config.baseline_windows);
        let state = self.symbols.entry(event.symbol.clone()).or_default();
        state.roll(event.timestamp, window, keep);
        state.bucket_volume += event.size;
        state.volume.push_back((event.timestamp, event.size));
        if event.event_type == TapeEventType::Liquidation {
            state.liquidations.push_back(event.timestamp);
        }
        state.evict(event.timestamp - window);
    }

    /// Feed an accepted price
    pub fn on_price(&mut self, symbol: &str, price: Decimal, at: DateTime<Utc>) {
        let (window, keep) = (self.window, self.config.baseline_windows);
        let state = self.symbols.entry(symbol.to_string()).or_default();
        state.roll(at, window, keep);
        state.prices.push_back((at, price));
        state.evict(at - window);
    }

    /// Score the symbol at `now`; returns an alert only on an upward crossing
    pub fn evaluate(&mut self, symbol: &str, now: DateTime<Utc>) -> (CascadeScore, Option<CascadeAlert>) {
        let window = self.window;
        let keep = self.config.baseline_windows;
        let state = self.symbols.entry(symbol.to_string()).or_default();
        state.roll(now, window, keep);
        state.evict(now - window);
        let factors = Self::factors(&self.config, state, now);

        let score = unit_clamp(
            self.config.volume_weight * factors.volume_component
                + self.config.drop_speed_weight * factors.drop_speed_component
                + self.config.liquidation_weight * factors.liquidation_component,
        );
        let score = CascadeScore {
            symbol: symbol.to_string(),
            score,
            factors,
            computed_at: now,
        };

        let above = score.score >= self.config.threshold;
        let alert = if above && !state.alert_active {
            tracing::warn!(
                symbol,
                score = %score.score,
                volume_ratio = %score.factors.volume_spike_ratio,
                drop_speed = %score.factors.price_drop_speed,
                liquidations = score.factors.liquidation_count,
                "Liquidation cascade alert"
            );
            Some(CascadeAlert {
                symbol: symbol.to_string(),
                score: score.clone(),
                action: self.config.action,
                at: now,
            })
        } else {
            if !above && state.alert_active {
                tracing::info!(symbol, score = %score.score, "Cascade alert cleared");
            }
            None
        };
        state.alert_active = above;
        state.last_score = Some(score.clone());
        (score, alert)
    }

    fn factors(config: &CascadeConfig, state: &SymbolWindow, now: DateTime<Utc>) -> CascadeFactors {
        let window_volume: Decimal = state.volume.iter().map(|(_, v)| *v).sum();
        let volume_spike_ratio = if state.baseline.is_empty() {
            Decimal::ZERO
        } else {
            let mean = state.baseline.iter().copied().sum::<Decimal>()
                / Decimal::from(state.baseline.len() as u64);
            if mean > Decimal::ZERO {
                window_volume / mean
            } else {
                Decimal::ZERO
            }
        };
        let volume_component = if volume_spike_ratio.is_zero() {
            Decimal::ZERO
        } else {
            unit_clamp((volume_spike_ratio - Decimal::ONE) / (config.volume_spike_cap - Decimal::ONE))
        };

        let mut price_drop_speed = Decimal::ZERO;
        let peak = state
            .prices
            .iter()
            .fold(None::<(DateTime<Utc>, Decimal)>, |best, (t, p)| match best {
                Some((_, bp)) if bp > *p => best,
                _ => Some((*t, *p)),
            });
        if let (Some((peak_at, peak)), Some((_, last))) = (peak, state.prices.back()) {
            if peak > Decimal::ZERO && *last < peak {
                let minutes = Decimal::from((now - peak_at).num_seconds().max(0)) / Decimal::from(60);
                let minutes = minutes.max(Decimal::ONE);
                price_drop_speed = (peak - *last) / peak / minutes;
            }
        }
        let drop_speed_component = unit_clamp(price_drop_speed / config.drop_speed_cap);

        let liquidation_count = state.liquidations.len() as u32;
        let liquidation_component = unit_clamp(
            Decimal::from(liquidation_count) / Decimal::from(config.liquidation_count_cap),
        );

        CascadeFactors {
            volume_spike_ratio,
            price_drop_speed,
            liquidation_count,
            volume_component,
            drop_speed_component,
            liquidation_component,
        }
    }

    /// Whether new entries for the symbol are blocked
    pub fn is_active(&self, symbol: &str) -> bool {
        self.symbols.get(symbol).is_some_and(|s| s.alert_active)
    }

    pub fn last_score(&self, symbol: &str) -> Option<&CascadeScore> {
        self.symbols.get(symbol).and_then(|s| s.last_score.as_ref())
    }

    /// Symbols currently in alert
    pub fn active_symbols(&self) -> Vec<String> {
        let mut active: Vec<String> = self
            .symbols
            .iter()
            .filter(|(_, s)| s.alert_active)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        active.sort();
        active
    }
}
