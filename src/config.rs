//! Configuration types for riskcore

use crate::cascade::CascadeAction;
use crate::stops::StopKind;
use crate::telemetry::LogFormat;
use anyhow::Context;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub allocator: AllocatorConfig,
    #[serde(default)]
    pub kelly: KellyConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub trailing_stop: TrailingStopConfig,
    #[serde(default)]
    pub cascade: CascadeConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Active strategies, in slot order
    pub strategies: Vec<StrategyConfig>,
}

/// Configuration that cannot be run with
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Inconsistent { field: &'static str, reason: String },
}

fn inconsistent(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Inconsistent {
        field,
        reason: reason.into(),
    }
}

/// Capital and cadence of the trading loop
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    pub initial_capital: Decimal,
    pub symbols: Vec<String>,
    pub trading_interval_secs: u64,
    pub max_open_positions: usize,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(3000),
            symbols: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            trading_interval_secs: 60,
            max_open_positions: 5,
        }
    }
}

/// Ensemble voting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    /// Minimum |score| for a decision to be actionable
    pub confidence_threshold: Decimal,
    /// Minimum number of strategies voting the winning direction
    pub min_strategies_agree: usize,
    /// Per-cycle deadline for signal producers
    pub signal_deadline_ms: u64,
    /// Upper bound on producers running at once
    pub max_concurrent_signals: usize,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: dec!(0.5),
            min_strategies_agree: 2,
            signal_deadline_ms: 2_000,
            max_concurrent_signals: 8,
        }
    }
}

/// Adaptive weight allocation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AllocatorConfig {
    pub min_weight: Decimal,
    pub max_weight: Decimal,
    /// Weight given to the previous allocation when smoothing
    pub smoothing: Decimal,
    pub lookback_days: i64,
    pub rebalance_interval_hours: i64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            min_weight: dec!(0.01),
            max_weight: dec!(0.25),
            smoothing: dec!(0.7),
            lookback_days: 30,
            rebalance_interval_hours: 24,
        }
    }
}

/// Fractional Kelly sizing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KellyConfig {
    /// Kelly fraction (e.g., 0.25 for quarter Kelly)
    pub fraction: Decimal,
    /// Trades below this win probability are rejected
    pub min_probability: Decimal,
    /// Smallest position as a fraction of capital
    pub min_position_size: Decimal,
    /// Largest position as a fraction of capital
    pub max_position_size: Decimal,
    /// Win probability used until enough trades are recorded
    pub prior_win_probability: Decimal,
    /// Payoff ratio used until enough trades are recorded
    pub prior_payoff_ratio: Decimal,
    pub min_trades_for_estimate: usize,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            fraction: dec!(0.25),
            min_probability: dec!(0.55),
            min_position_size: dec!(0.01),
            max_position_size: dec!(0.20),
            prior_win_probability: dec!(0.55),
            prior_payoff_ratio: dec!(1.5),
            min_trades_for_estimate: 20,
        }
    }
}

/// Correlation tracking configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationConfig {
    /// Portfolio correlation above which sizes are penalised
    pub threshold: Decimal,
    /// Number of returns kept per symbol
    pub window: usize,
    /// Minimum overlapping returns before a pair is estimated
    pub min_observations: usize,
    pub recompute_interval_secs: i64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            threshold: dec!(0.7),
            window: 100,
            min_observations: 20,
            recompute_interval_secs: 3_600,
        }
    }
}

/// Daily drawdown circuit breaker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub level_1_drawdown: Decimal,
    pub level_2_drawdown: Decimal,
    pub level_3_drawdown: Decimal,
    pub cooldown_minutes: i64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            level_1_drawdown: dec!(-0.05),
            level_2_drawdown: dec!(-0.10),
            level_3_drawdown: dec!(-0.15),
            cooldown_minutes: 30,
        }
    }
}

/// One trailing stop rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRuleConfig {
    pub kind: StopKind,
    /// Unrealized profit required before the stop arms
    pub activation_profit_pct: Decimal,
}

impl Default for StopRuleConfig {
    fn default() -> Self {
        Self {
            kind: StopKind::Percentage {
                trail_distance: dec!(0.02),
            },
            activation_profit_pct: dec!(0.01),
        }
    }
}

/// Trailing stop configuration with per-strategy overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrailingStopConfig {
    #[serde(default)]
    pub default: StopRuleConfig,
    #[serde(default)]
    pub overrides: HashMap<String, StopRuleConfig>,
}

/// Liquidation cascade detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CascadeConfig {
    pub threshold: Decimal,
    pub action: CascadeAction,
    pub window_secs: i64,
    /// Number of past windows forming the volume baseline
    pub baseline_windows: usize,
    /// Volume ratio that maps to a full volume score
    pub volume_spike_cap: Decimal,
    /// Drop per minute that maps to a full speed score
    pub drop_speed_cap: Decimal,
    /// Liquidations per window that map to a full count score
    pub liquidation_count_cap: u32,
    pub volume_weight: Decimal,
    pub drop_speed_weight: Decimal,
    pub liquidation_weight: Decimal,
    /// Share of each position closed by `reduce_positions`
    pub reduce_fraction: Decimal,
    /// Share of net exposure offset by `hedge`
    pub hedge_ratio: Decimal,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            threshold: dec!(0.6),
            action: CascadeAction::ReducePositions,
            window_secs: 300,
            baseline_windows: 12,
            volume_spike_cap: dec!(5),
            drop_speed_cap: dec!(0.02),
            liquidation_count_cap: 20,
            volume_weight: dec!(0.40),
            drop_speed_weight: dec!(0.35),
            liquidation_weight: dec!(0.25),
            reduce_fraction: dec!(0.5),
            hedge_ratio: dec!(1),
        }
    }
}

/// Market data validation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub max_tick_age_secs: i64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_tick_age_secs: 30,
        }
    }
}

/// Paper execution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    pub fee_rate: Decimal,
    pub slippage_bps: Decimal,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            fee_rate: dec!(0.001),
            slippage_bps: dec!(5),
        }
    }
}

/// State snapshot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub path: PathBuf,
    pub save_interval_secs: u64,
    pub save_retry_backoff_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./state/riskcore.json"),
            save_interval_secs: 60,
            save_retry_backoff_ms: 500,
        }
    }
}

/// Notification sink configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

/// A strategy slot with optional performance priors
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub id: String,
    pub win_rate: Option<Decimal>,
    pub payoff_ratio: Option<Decimal>,
    pub sharpe: Option<Decimal>,
}

impl StrategyConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            win_rate: None,
            payoff_ratio: None,
            sharpe: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration if the file exists
    ///
    /// Only a missing file yields `None`. An unreadable or malformed file is
    /// an error.
    pub fn load_if_exists(path: impl AsRef<std::path::Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(Some(config))
    }

    /// Build a config with defaults for the given strategy ids
    pub fn with_strategies<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trading: TradingConfig::default(),
            ensemble: EnsembleConfig::default(),
            allocator: AllocatorConfig::default(),
            kelly: KellyConfig::default(),
            correlation: CorrelationConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            trailing_stop: TrailingStopConfig::default(),
            cascade: CascadeConfig::default(),
            feed: FeedConfig::default(),
            execution: ExecutionConfig::default(),
            persistence: PersistenceConfig::default(),
            notify: NotifyConfig::default(),
            telemetry: TelemetryConfig::default(),
            strategies: ids.into_iter().map(StrategyConfig::new).collect(),
        }
    }

    /// Strategy ids in slot order
    pub fn strategy_ids(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.id.clone()).collect()
    }

    /// Reject internally inconsistent values. Startup must abort on error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_trading()?;
        self.validate_strategies()?;
        self.validate_sizing()?;
        self.validate_breaker()?;
        self.validate_stops()?;
        self.validate_cascade()?;
        Ok(())
    }

    fn validate_trading(&self) -> Result<(), ConfigError> {
        let t = &self.trading;
        if t.initial_capital <= Decimal::ZERO {
            return Err(inconsistent("trading.initial_capital", "must be positive"));
        }
        if t.symbols.is_empty() {
            return Err(inconsistent("trading.symbols", "at least one symbol required"));
        }
        if t.trading_interval_secs == 0 {
            return Err(inconsistent("trading.trading_interval_secs", "must be non-zero"));
        }
        if t.max_open_positions == 0 {
            return Err(inconsistent("trading.max_open_positions", "must be non-zero"));
        }
        let e = &self.ensemble;
        if !is_unit(e.confidence_threshold) {
            return Err(inconsistent("ensemble.confidence_threshold", "must be in [0, 1]"));
        }
        if e.min_strategies_agree == 0 || e.min_strategies_agree > self.strategies.len() {
            return Err(inconsistent(
                "ensemble.min_strategies_agree",
                format!("must be in 1..={}", self.strategies.len()),
            ));
        }
        if e.signal_deadline_ms == 0 || e.max_concurrent_signals == 0 {
            return Err(inconsistent(
                "ensemble",
                "signal_deadline_ms and max_concurrent_signals must be non-zero",
            ));
        }
        if self.persistence.save_interval_secs == 0 {
            return Err(inconsistent("persistence.save_interval_secs", "must be non-zero"));
        }
        Ok(())
    }

    fn validate_strategies(&self) -> Result<(), ConfigError> {
        let n = self.strategies.len();
        if n == 0 {
            return Err(inconsistent("strategies", "at least one strategy required"));
        }
        let mut seen = HashSet::new();
        for s in &self.strategies {
            if !seen.insert(s.id.as_str()) {
                return Err(inconsistent("strategies", format!("duplicate id {}", s.id)));
            }
            if let Some(p) = s.win_rate {
                if !is_unit(p) {
                    return Err(inconsistent("strategies.win_rate", "must be in [0, 1]"));
                }
            }
            if let Some(b) = s.payoff_ratio {
                if b <= Decimal::ZERO {
                    return Err(inconsistent("strategies.payoff_ratio", "must be positive"));
                }
            }
        }

        let a = &self.allocator;
        if a.min_weight <= Decimal::ZERO || a.min_weight > a.max_weight || a.max_weight > Decimal::ONE
        {
            return Err(inconsistent(
                "allocator",
                "require 0 < min_weight <= max_weight <= 1",
            ));
        }
        let count = Decimal::from(n as u64);
        if a.min_weight * count > Decimal::ONE || a.max_weight * count < Decimal::ONE {
            return Err(inconsistent(
                "allocator",
                format!("weight bounds cannot sum to 1 across {} strategies", n),
            ));
        }
        if !is_unit(a.smoothing) {
            return Err(inconsistent("allocator.smoothing", "must be in [0, 1]"));
        }
        if a.lookback_days <= 0 || a.rebalance_interval_hours <= 0 {
            return Err(inconsistent(
                "allocator",
                "lookback_days and rebalance_interval_hours must be positive",
            ));
        }
        Ok(())
    }

    fn validate_sizing(&self) -> Result<(), ConfigError> {
        let k = &self.kelly;
        if k.fraction <= Decimal::ZERO || k.fraction > Decimal::ONE {
            return Err(inconsistent("kelly.fraction", "must be in (0, 1]"));
        }
        if !is_unit(k.min_probability) || !is_unit(k.prior_win_probability) {
            return Err(inconsistent("kelly", "probabilities must be in [0, 1]"));
        }
        if k.prior_payoff_ratio <= Decimal::ZERO {
            return Err(inconsistent("kelly.prior_payoff_ratio", "must be positive"));
        }
        if k.min_position_size < Decimal::ZERO
            || k.min_position_size > k.max_position_size
            || k.max_position_size > Decimal::ONE
        {
            return Err(inconsistent(
                "kelly",
                "require 0 <= min_position_size <= max_position_size <= 1",
            ));
        }
        let c = &self.correlation;
        if !is_unit(c.threshold) {
            return Err(inconsistent("correlation.threshold", "must be in [0, 1]"));
        }
        if c.min_observations < 2 || c.window < c.min_observations {
            return Err(inconsistent(
                "correlation",
                "require 2 <= min_observations <= window",
            ));
        }
        if c.recompute_interval_secs <= 0 {
            return Err(inconsistent("correlation.recompute_interval_secs", "must be positive"));
        }
        Ok(())
    }

    fn validate_breaker(&self) -> Result<(), ConfigError> {
        let b = &self.circuit_breaker;
        for level in [b.level_1_drawdown, b.level_2_drawdown, b.level_3_drawdown] {
            if level >= Decimal::ZERO || level <= dec!(-1) {
                return Err(inconsistent(
                    "circuit_breaker",
                    format!("drawdown level {} must be in (-1, 0)", level),
                ));
            }
        }
        if !(b.level_1_drawdown > b.level_2_drawdown && b.level_2_drawdown > b.level_3_drawdown) {
            return Err(inconsistent(
                "circuit_breaker",
                "levels must grow strictly more severe from level 1 to level 3",
            ));
        }
        if b.cooldown_minutes <= 0 {
            return Err(inconsistent("circuit_breaker.cooldown_minutes", "must be positive"));
        }
        Ok(())
    }

    fn validate_stops(&self) -> Result<(), ConfigError> {
        let rules = std::iter::once(&self.trailing_stop.default)
            .chain(self.trailing_stop.overrides.values());
        for rule in rules {
            if rule.activation_profit_pct < Decimal::ZERO {
                return Err(inconsistent(
                    "trailing_stop.activation_profit_pct",
                    "must not be negative",
                ));
            }
            rule.kind
                .validate()
                .map_err(|reason| inconsistent("trailing_stop.kind", reason))?;
        }
        Ok(())
    }

    fn validate_cascade(&self) -> Result<(), ConfigError> {
        let c = &self.cascade;
        if !is_unit(c.threshold) {
            return Err(inconsistent("cascade.threshold", "must be in [0, 1]"));
        }
        if c.window_secs <= 0 || c.baseline_windows == 0 {
            return Err(inconsistent(
                "cascade",
                "window_secs and baseline_windows must be positive",
            ));
        }
        if c.volume_spike_cap <= Decimal::ONE
            || c.drop_speed_cap <= Decimal::ZERO
            || c.liquidation_count_cap == 0
        {
            return Err(inconsistent(
                "cascade",
                "require volume_spike_cap > 1, drop_speed_cap > 0, liquidation_count_cap > 0",
            ));
        }
        let weights = [c.volume_weight, c.drop_speed_weight, c.liquidation_weight];
        if weights.iter().any(|w| *w < Decimal::ZERO)
            || weights.iter().copied().sum::<Decimal>() != Decimal::ONE
        {
            return Err(inconsistent(
                "cascade",
                "factor weights must be non-negative and sum to 1",
            ));
        }
        if c.reduce_fraction <= Decimal::ZERO || c.reduce_fraction > Decimal::ONE {
            return Err(inconsistent("cascade.reduce_fraction", "must be in (0, 1]"));
        }
        if c.hedge_ratio <= Decimal::ZERO {
            return Err(inconsistent("cascade.hedge_ratio", "must be positive"));
        }
        Ok(())
    }
}

fn is_unit(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE
}
