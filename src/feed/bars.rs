//! Rolling OHLCV bar series
//!
//! Source of ATR, channel extremes and realized volatility for the
//! trailing stops.

use super::types::Bar;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Volatility inputs derived from bars for one stop update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolatilityContext {
    pub atr: Option<Decimal>,
    pub highest_high: Option<Decimal>,
    pub lowest_low: Option<Decimal>,
    pub realized_volatility: Option<Decimal>,
}

/// Fixed-capacity bar history for one symbol
#[derive(Debug, Clone)]
pub struct BarSeries {
    capacity: usize,
    bars: VecDeque<Bar>,
}

impl BarSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            bars: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a bar. A bar with the same close time replaces the last one,
    /// older bars are ignored.
    pub fn push(&mut self, bar: Bar) {
        if let Some(last) = self.bars.back_mut() {
            if bar.timestamp == last.timestamp {
                *last = bar;
                return;
            }
            if bar.timestamp < last.timestamp {
                return;
            }
        }
        self.bars.push_back(bar);
        while self.bars.len() > self.capacity {
            self.bars.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// Most recent `n` bars, oldest first
    pub fn recent(&self, n: usize) -> Vec<Bar> {
        let skip = self.bars.len().saturating_sub(n);
        self.bars.iter().skip(skip).cloned().collect()
    }

    /// Average true range over `period` bars (simple average, needs period + 1 bars)
    pub fn atr(&self, period: usize) -> Option<Decimal> {
        if period == 0 || self.bars.len() < period + 1 {
            return None;
        }
        let start = self.bars.len() - period;
        let mut sum = Decimal::ZERO;
        for i in start..self.bars.len() {
            let bar = &self.bars[i];
            let prev_close = self.bars[i - 1].close;
            let tr = (bar.high - bar.low)
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs());
            sum += tr;
        }
        Some(sum / Decimal::from(period as u64))
    }

    /// Highest high over the last `period` bars
    pub fn highest_high(&self, period: usize) -> Option<Decimal> {
        if period == 0 || self.bars.len() < period {
            return None;
        }
        self.bars.iter().rev().take(period).map(|b| b.high).max()
    }

    /// Lowest low over the last `period` bars
    pub fn lowest_low(&self, period: usize) -> Option<Decimal> {
        if period == 0 || self.bars.len() < period {
            return None;
        }
        self.bars.iter().rev().take(period).map(|b| b.low).min()
    }

    /// Per-bar standard deviation of log close returns over `period` returns
    pub fn realized_volatility(&self, period: usize) -> Option<Decimal> {
        if period < 2 || self.bars.len() < period + 1 {
            return None;
        }
        let start = self.bars.len() - period - 1;
        let closes: Vec<f64> = self
            .bars
            .iter()
            .skip(start)
            .map(|b| f64::try_from(b.close).unwrap_or(0.0))
            .collect();

        let returns: Vec<f64> = closes
            .windows(2)
            .filter(|w| w[0] > 0.0 && w[1] > 0.0)
            .map(|w| (w[1] / w[0]).ln())
            .collect();
        if returns.len() < 2 {
            return None;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        Decimal::try_from(variance.sqrt()).ok()
    }

    /// Everything a stop of the given lookback needs
    pub fn context(&self, period: usize) -> VolatilityContext {
        VolatilityContext {
            atr: self.atr(period),
            highest_high: self.highest_high(period),
            lowest_low: self.lowest_low(period),
            realized_volatility: self.realized_volatility(period),
        }
    }
}
