//! Rolling return correlation and portfolio correlation penalty

use crate::config::CorrelationConfig;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// Pearson correlation of bar-close returns between symbols
#[derive(Debug, Clone)]
pub struct CorrelationTracker {
    threshold: Decimal,
    window: usize,
    min_observations: usize,
    recompute_interval: Duration,
    last_close: HashMap<String, Decimal>,
    /// Simple returns keyed by the close time of the bar that ended them
    returns: HashMap<String, VecDeque<(DateTime<Utc>, f64)>>,
    /// Keyed by (lower, higher) symbol
    matrix: HashMap<(String, String), Decimal>,
    last_recompute: Option<DateTime<Utc>>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl CorrelationTracker {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            threshold: config.threshold,
            window: config.window,
            min_observations: config.min_observations,
            recompute_interval: Duration::seconds(config.recompute_interval_secs),
            last_close: HashMap::new(),
            returns: HashMap::new(),
            matrix: HashMap::new(),
            last_recompute: None,
        }
    }

    /// Record a bar close and the simple return since the previous close
    pub fn on_bar_close(&mut self, symbol: &str, close: Decimal, at: DateTime<Utc>) {
        if close <= Decimal::ZERO {
            return;
        }
        if let Some(prev) = self.last_close.insert(symbol.to_string(), close) {
            let ret = (close - prev) / prev;
            let Ok(ret) = f64::try_from(ret) else {
                return;
            };
            let series = self.returns.entry(symbol.to_string()).or_default();
            series.push_back((at, ret));
            while series.len() > self.window {
                series.pop_front();
            }
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.last_recompute
            .map_or(true, |last| now - last >= self.recompute_interval)
    }

    /// Rebuild the pairwise matrix from the current return windows
    pub fn recompute(&mut self, now: DateTime<Utc>) {
        let mut symbols: Vec<&String> = self.returns.keys().collect();
        symbols.sort();

        let mut matrix = HashMap::new();
        for (i, a) in symbols.iter().enumerate() {
            for b in symbols.iter().skip(i + 1) {
                if let Some(rho) = self.pearson(a, b) {
                    matrix.insert(pair_key(a, b), rho);
                }
            }
        }
        tracing::debug!(pairs = matrix.len(), "Correlation matrix recomputed");
        self.matrix = matrix;
        self.last_recompute = Some(now);
    }

    /// Correlation over the bar close times both return windows share
    fn pearson(&self, a: &str, b: &str) -> Option<Decimal> {
        let ra = self.returns.get(a)?;
        let rb: HashMap<DateTime<Utc>, f64> = self.returns.get(b)?.iter().copied().collect();
        let (xs, ys): (Vec<f64>, Vec<f64>) = ra
            .iter()
            .filter_map(|(at, x)| rb.get(at).map(|y| (*x, *y)))
            .unzip();
        let n = xs.len();
        if n < self.min_observations {
            return None;
        }

        let len = n as f64;
        let mean_x = xs.iter().sum::<f64>() / len;
        let mean_y = ys.iter().sum::<f64>() / len;
        let mut cov = 0.0;
        let mut var_x = 0.0;
        let mut var_y = 0.0;
        for (x, y) in xs.iter().zip(&ys) {
            let dx = x - mean_x;
            let dy = y - mean_y;
            cov += dx * dy;
            var_x += dx * dx;
            var_y += dy * dy;
        }
        if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
            return None;
        }
        let rho = (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0);
        Decimal::try_from(rho).ok()
    }

    /// Latest estimate for a pair; a symbol is fully correlated with itself
    pub fn correlation(&self, a: &str, b: &str) -> Option<Decimal> {
        if a == b {
            return Some(Decimal::ONE);
        }
        self.matrix.get(&pair_key(a, b)).copied()
    }

    pub fn set_correlation(&mut self, a: &str, b: &str, rho: Decimal) {
        self.matrix.insert(pair_key(a, b), rho);
    }

    /// Exposure-weighted mean pairwise correlation of the held symbols plus
    /// the candidate
    ///
    /// The candidate is weighted by the mean held notional, or 1 with nothing
    /// held. Pairs without an estimate are skipped.
    pub fn portfolio_correlation(
        &self,
        exposure: &HashMap<String, Decimal>,
        candidate: &str,
    ) -> Decimal {
        let mut weighted: Vec<(&str, Decimal)> = exposure
            .iter()
            .filter(|(symbol, notional)| symbol.as_str() != candidate && !notional.is_zero())
            .map(|(symbol, notional)| (symbol.as_str(), notional.abs()))
            .collect();
        weighted.sort_by(|a, b| a.0.cmp(b.0));

        let candidate_weight = if weighted.is_empty() {
            Decimal::ONE
        } else {
            weighted.iter().map(|(_, w)| *w).sum::<Decimal>()
                / Decimal::from(weighted.len() as u64)
        };
        let candidate_weight = exposure
            .get(candidate)
            .filter(|n| !n.is_zero())
            .map(|n| n.abs())
            .unwrap_or(candidate_weight);
        weighted.push((candidate, candidate_weight));

        if weighted.len() < 2 {
            return Decimal::ZERO;
        }

        let mut numerator = Decimal::ZERO;
        let mut denominator = Decimal::ZERO;
        for (i, (a, wa)) in weighted.iter().enumerate() {
            for (b, wb) in weighted.iter().skip(i + 1) {
                if let Some(rho) = self.correlation(a, b) {
                    numerator += *wa * *wb * rho;
                    denominator += *wa * *wb;
                }
            }
        }
        if denominator.is_zero() {
            return Decimal::ZERO;
        }
        numerator / denominator
    }

    /// Size multiplier for a portfolio correlation
    pub fn penalty(&self, rho_port: Decimal) -> Decimal {
        if rho_port <= self.threshold || self.threshold >= Decimal::ONE {
            return Decimal::ONE;
        }
        (Decimal::ONE - (rho_port - self.threshold) / (Decimal::ONE - self.threshold))
            .max(Decimal::ZERO)
    }
}
