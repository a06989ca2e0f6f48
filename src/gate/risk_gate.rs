//! Risk gate
//!
//! Single owner of all risk state. Every mutation of positions, stops, the
//! breaker and the weight table goes through here, under one lock held by
//! the runtime.

use super::types::{OrderInstruction, OrderReason, TickOutcome};
use crate::cascade::{CascadeAction, CascadeAlert, CascadeDetector};
use crate::config::{CircuitBreakerConfig, Config};
use crate::ensemble::{
    AdaptiveAllocator, EdgeEstimate, EnsembleEngine, PerformanceTracker, StrategyWeight,
};
use crate::execution::Fill;
use crate::feed::{Bar, BarSeries, MarketSnapshot, PriceTick, TapeEvent, TickError, TickValidator};
use crate::persistence::{StateSnapshot, SNAPSHOT_VERSION};
use crate::risk::{
    BreakerLevel, CircuitBreaker, ClosedTrade, CorrelationTracker, KellySizer,
    Position, PositionBook, RiskError, Side,
};
use crate::signal::StrategySignal;
use crate::stops::{ForcedExit, StopPhase, TrailingStopManager};
use crate::telemetry::{
    increment_counter, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

/// Stop rule lookup key for positions opened by a cascade hedge
pub const HEDGE_STRATEGY_ID: &str = "cascade-hedge";

/// Bars handed to signal producers in a market snapshot
const SNAPSHOT_BARS: usize = 20;

/// Minimum bars kept per symbol
const MIN_BAR_HISTORY: usize = 50;

/// Blended edge estimates drop division residue beyond this precision
const EDGE_DP: u32 = 10;

/// Order quantities are rounded to this many decimal places
const QUANTITY_DP: u32 = 8;

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Serial risk stage: ensemble, sizing, stops, breaker and cascade handling
pub struct RiskGate {
    initial_capital: Decimal,
    max_open_positions: usize,
    reduce_fraction: Decimal,
    hedge_ratio: Decimal,
    bar_capacity: usize,
    breaker_config: CircuitBreakerConfig,
    strategy_ids: Vec<String>,
    engine: EnsembleEngine,
    allocator: AdaptiveAllocator,
    performance: PerformanceTracker,
    sizer: KellySizer,
    correlation: CorrelationTracker,
    breaker: CircuitBreaker,
    stops: TrailingStopManager,
    cascade: CascadeDetector,
    validator: TickValidator,
    bars: HashMap<String, BarSeries>,
    last_prices: HashMap<String, Decimal>,
    book: PositionBook,
    /// Entries decided but not yet filled, as notional per symbol
    pending_entries: HashMap<String, Decimal>,
    /// Cycle in which each symbol last had a forced exit
    forced_exits: HashMap<String, u64>,
    cycle_id: u64,
    clock: DateTime<Utc>,
}

impl RiskGate {
    pub fn new(config: &Config, now: DateTime<Utc>) -> Self {
        let strategy_ids = config.strategy_ids();
        let stops = TrailingStopManager::new(&config.trailing_stop);
        let bar_capacity = (stops.max_period() + 1).max(MIN_BAR_HISTORY);
        Self {
            initial_capital: config.trading.initial_capital,
            max_open_positions: config.trading.max_open_positions,
            reduce_fraction: config.cascade.reduce_fraction,
            hedge_ratio: config.cascade.hedge_ratio,
            bar_capacity,
            breaker_config: config.circuit_breaker.clone(),
            engine: EnsembleEngine::new(&config.ensemble),
            allocator: AdaptiveAllocator::new(&config.allocator, &strategy_ids, now),
            performance: PerformanceTracker::new(config),
            sizer: KellySizer::new(&config.kelly),
            correlation: CorrelationTracker::new(&config.correlation),
            breaker: CircuitBreaker::new(
                &config.circuit_breaker,
                config.trading.initial_capital,
                now,
            ),
            stops,
            cascade: CascadeDetector::new(&config.cascade),
            validator: TickValidator::new(config.feed.max_tick_age_secs),
            bars: HashMap::new(),
            last_prices: HashMap::new(),
            book: PositionBook::new(),
            pending_entries: HashMap::new(),
            forced_exits: HashMap::new(),
            cycle_id: 0,
            clock: now,
            strategy_ids,
        }
    }

    /// Latest time seen on any input
    pub fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    pub fn cycle_id(&self) -> u64 {
        self.cycle_id
    }

    pub fn strategy_ids(&self) -> &[String] {
        &self.strategy_ids
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn positions(&self) -> &PositionBook {
        &self.book
    }

    pub fn weights(&self) -> &[StrategyWeight] {
        self.allocator.weights()
    }

    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.last_prices.get(symbol).copied()
    }

    pub fn is_cascade_active(&self, symbol: &str) -> bool {
        self.cascade.is_active(symbol)
    }

    /// Initial capital plus realized and unrealized P&L
    pub fn equity(&self) -> Decimal {
        self.initial_capital + self.book.realized_pnl() + self.book.unrealized_pnl()
    }

    /// Equity not tied up in open positions or unfilled entries
    pub fn available_capital(&self) -> Decimal {
        let pending: Decimal = self.pending_entries.values().copied().sum();
        self.equity() - self.book.open_notional() - pending
    }

    fn advance_clock(&mut self, at: DateTime<Utc>) {
        if at > self.clock {
            self.clock = at;
        }
    }

    /// What signal producers see for `symbol`
    pub fn market_snapshot(&self, symbol: &str, now: DateTime<Utc>) -> MarketSnapshot {
        MarketSnapshot {
            symbol: symbol.to_string(),
            last_price: self.last_price(symbol),
            timestamp: now,
            recent_bars: self
                .bars
                .get(symbol)
                .map(|s| s.recent(SNAPSHOT_BARS))
                .unwrap_or_default(),
        }
    }

    /// Apply an accepted price: mark, stops, breaker, then cascade
    pub fn on_tick(&mut self, tick: &PriceTick) -> Result<TickOutcome, TickError> {
        let started = Instant::now();
        if let Err(e) = self.validator.validate(tick) {
            tracing::warn!(symbol = %tick.symbol, price = %tick.price, error = %e, "Tick rejected");
            increment_counter(CounterMetric::TicksRejected);
            return Err(e);
        }

        let now = tick.timestamp;
        self.advance_clock(now);
        self.last_prices.insert(tick.symbol.clone(), tick.price);
        self.book.mark(&tick.symbol, tick.price);

        let mut outcome = TickOutcome::default();

        let mut triggered: Vec<ForcedExit> = Vec::new();
        let bars = self.bars.get(&tick.symbol);
        for position in self.book.for_symbol_mut(&tick.symbol) {
            if let Some(exit) = self.stops.update(position, tick.price, bars, now) {
                triggered.push(exit);
            }
        }
        for exit in triggered {
            if let Some(instruction) =
                self.exit_instruction(exit.position_id, None, OrderReason::TrailingStop, now)
            {
                outcome.instructions.push(instruction);
            }
        }

        self.apply_breaker(now, &mut outcome);

        self.cascade.on_price(&tick.symbol, tick.price, now);
        let (score, alert) = self.cascade.evaluate(&tick.symbol, now);
        set_gauge(GaugeMetric::CascadeScore, to_f64(score.score));
        if let Some(alert) = alert {
            self.apply_cascade(&alert, &mut outcome);
            outcome.cascade_alert = Some(alert);
        }

        self.publish_gauges();
        record_latency(LatencyMetric::TickProcessing, started.elapsed());
        Ok(outcome)
    }

    /// Record a closed bar for volatility and correlation
    pub fn on_bar(&mut self, bar: &Bar) -> Result<(), TickError> {
        if let Err(e) = self.validator.validate_bar(bar) {
            tracing::warn!(symbol = %bar.symbol, error = %e, "Bar rejected");
            increment_counter(CounterMetric::TicksRejected);
            return Err(e);
        }
        self.advance_clock(bar.timestamp);
        let capacity = self.bar_capacity;
        self.bars
            .entry(bar.symbol.clone())
            .or_insert_with(|| BarSeries::new(capacity))
            .push(bar.clone());
        self.correlation.on_bar_close(&bar.symbol, bar.close, bar.timestamp);
        Ok(())
    }

    /// Feed a trade or liquidation print to the cascade detector
    pub fn on_tape(&mut self, event: &TapeEvent) -> Result<(), TickError> {
        if let Err(e) = self.validator.validate_tape(event) {
            tracing::warn!(symbol = %event.symbol, error = %e, "Tape event rejected");
            increment_counter(CounterMetric::TicksRejected);
            return Err(e);
        }
        self.advance_clock(event.timestamp);
        self.cascade.on_tape(event);
        Ok(())
    }

    /// Start a decision cycle
    ///
    /// Runs due rebalances and correlation recomputes, expires forced-exit
    /// marks and lets the breaker see day rollovers and cooldown expiry.
    pub fn begin_cycle(&mut self, now: DateTime<Utc>) -> TickOutcome {
        self.advance_clock(now);
        self.cycle_id += 1;
        let cycle = self.cycle_id;
        self.forced_exits.retain(|_, stamp| cycle <= *stamp + 1);

        if self.allocator.is_due(now) {
            self.performance.prune(now);
            let sharpes: Vec<Decimal> = self
                .strategy_ids
                .iter()
                .map(|id| self.performance.sharpe(id))
                .collect();
            self.allocator.rebalance(&sharpes, now);
        }
        if self.correlation.is_due(now) {
            self.correlation.recompute(now);
        }

        let mut outcome = TickOutcome::default();
        self.apply_breaker(now, &mut outcome);
        self.publish_gauges();
        outcome
    }

    /// Turn one cycle's signals for `symbol` into at most one order
    ///
    /// Returns `Ok(None)` when there is nothing to do: no actionable decision,
    /// a position already held in that direction, an entry already pending, or
    /// a size that scales to zero.
    pub fn decide(
        &mut self,
        symbol: &str,
        slots: &[Option<StrategySignal>],
        now: DateTime<Utc>,
    ) -> Result<Option<OrderInstruction>, RiskError> {
        self.advance_clock(now);
        let decision = self.engine.decide(symbol, slots, self.allocator.weights());
        if !decision.is_actionable() {
            tracing::debug!(
                symbol,
                score = %decision.score,
                reason = ?decision.no_trade,
                "No trade"
            );
            return Ok(None);
        }
        let Some(side) = Side::from_direction(decision.direction) else {
            return Ok(None);
        };

        let held = self
            .book
            .primary(symbol)
            .map(|p| (p.position_id, p.side));
        if let Some((position_id, held_side)) = held {
            if held_side != side {
                // Close first; a new entry waits for a later cycle
                let exit =
                    self.exit_instruction(position_id, None, OrderReason::SignalReversal, now);
                if exit.is_some() {
                    tracing::info!(symbol, %position_id, direction = ?decision.direction, "Signal reversal");
                }
                return Ok(exit);
            }
        }

        self.check_entry_allowed(symbol)?;
        if held.is_some() || self.pending_entries.contains_key(symbol) {
            return Ok(None);
        }

        let price = self
            .last_price(symbol)
            .ok_or_else(|| RiskError::NoPrice(symbol.to_string()))?;

        let open = self.book.positions().filter(|p| !p.hedge).count() + self.pending_entries.len();
        if open >= self.max_open_positions {
            return Err(RiskError::SizingConflict(format!(
                "max open positions ({}) reached",
                self.max_open_positions
            )));
        }

        let edge = self.blended_edge(&decision.contributing_strategies);
        let kelly = self.sizer.size(edge)?;
        let rho = self
            .correlation
            .portfolio_correlation(&self.book.exposure_by_symbol(), symbol);
        set_gauge(GaugeMetric::PortfolioCorrelation, to_f64(rho));
        let penalty = self.correlation.penalty(rho);
        let fraction = kelly * penalty * self.breaker.multiplier();
        if fraction <= Decimal::ZERO {
            tracing::debug!(symbol, %kelly, %penalty, "Size scaled to zero");
            return Ok(None);
        }

        let notional = fraction * self.equity();
        let available = self.available_capital();
        if notional > available {
            return Err(RiskError::SizingConflict(format!(
                "notional {} exceeds available capital {}",
                notional.round_dp(2),
                available.round_dp(2)
            )));
        }
        let quantity = (notional / price).round_dp(QUANTITY_DP);
        if quantity.is_zero() {
            return Ok(None);
        }

        let lead = self.lead_strategy(&decision.contributing_strategies);
        let instruction = OrderInstruction {
            instruction_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            direction: decision.direction,
            quantity,
            reference_price: price,
            reason: OrderReason::NewEntry,
            position_id: Some(Uuid::new_v4()),
            strategy_id: lead,
            contributing_strategies: decision.contributing_strategies.clone(),
            created_at: now,
        };
        self.pending_entries.insert(symbol.to_string(), notional);

        tracing::info!(
            symbol,
            direction = ?instruction.direction,
            quantity = %quantity,
            price = %price,
            kelly = %kelly,
            penalty = %penalty,
            breaker = ?self.breaker.level(),
            "Entry approved"
        );
        Ok(Some(instruction))
    }

    /// Last check before an entry goes out
    ///
    /// A rejected entry is dropped from the pending set.
    pub fn entry_still_allowed(&mut self, instruction: &OrderInstruction) -> Result<(), RiskError> {
        if instruction.reason != OrderReason::NewEntry {
            return Ok(());
        }
        let result = self.check_entry_allowed(&instruction.symbol);
        if let Err(e) = &result {
            self.pending_entries.remove(&instruction.symbol);
            tracing::warn!(symbol = %instruction.symbol, error = %e, "Entry cancelled before submission");
        }
        result
    }

    fn check_entry_allowed(&self, symbol: &str) -> Result<(), RiskError> {
        if self.breaker.is_halted() {
            return Err(RiskError::TradingHalted);
        }
        if self.cascade.is_active(symbol) {
            return Err(RiskError::CascadeActive(symbol.to_string()));
        }
        if self.forced_exits.contains_key(symbol) {
            return Err(RiskError::ForcedExitPending(symbol.to_string()));
        }
        Ok(())
    }

    /// Apply a fill. Returns the closed trade for exits.
    pub fn on_fill(&mut self, instruction: &OrderInstruction, fill: &Fill) -> Option<ClosedTrade> {
        self.advance_clock(fill.timestamp);

        if instruction.reason.opens_position() {
            if instruction.reason == OrderReason::NewEntry {
                self.pending_entries.remove(&instruction.symbol);
            }
            let side = Side::from_direction(fill.direction)?;
            let strategy_id = instruction
                .strategy_id
                .clone()
                .unwrap_or_else(|| HEDGE_STRATEGY_ID.to_string());
            let stop_state = self.stops.new_state(&strategy_id, fill.price);
            let mut position = Position {
                position_id: instruction.position_id.unwrap_or_else(Uuid::new_v4),
                symbol: fill.symbol.clone(),
                side,
                entry_price: fill.price,
                size: fill.quantity,
                strategy_id,
                contributing_strategies: instruction.contributing_strategies.clone(),
                opened_at: fill.timestamp,
                last_price: fill.price,
                unrealized_pnl: Decimal::ZERO,
                flagged_weak: false,
                exit_pending: false,
                hedge: instruction.reason == OrderReason::CascadeHedge,
                stop_state,
            };
            if let Some(price) = self.last_price(&fill.symbol) {
                position.mark(price);
            }
            tracing::info!(
                position_id = %position.position_id,
                symbol = %position.symbol,
                side = ?position.side,
                size = %position.size,
                entry = %position.entry_price,
                hedge = position.hedge,
                "Position opened"
            );
            self.book.open(position, fill.fees);
            self.publish_gauges();
            return None;
        }

        let position_id = instruction.position_id?;
        let Some(trade) = self.book.close(
            position_id,
            fill.quantity,
            fill.price,
            fill.fees,
            fill.timestamp,
        ) else {
            tracing::warn!(%position_id, "Fill for unknown position");
            return None;
        };

        if !trade.hedge {
            for strategy_id in &trade.contributing_strategies {
                self.performance
                    .record(strategy_id, trade.return_pct, trade.closed_at);
            }
        }
        tracing::info!(
            %position_id,
            symbol = %trade.symbol,
            reason = ?instruction.reason,
            quantity = %trade.quantity,
            exit = %trade.exit_price,
            realized_pnl = %trade.realized_pnl,
            fully_closed = trade.fully_closed,
            "Position closed"
        );
        self.publish_gauges();
        Some(trade)
    }

    /// Undo the bookkeeping of an order the venue refused
    pub fn on_rejection(&mut self, instruction: &OrderInstruction, reason: &str) {
        tracing::error!(
            symbol = %instruction.symbol,
            reason = ?instruction.reason,
            error = reason,
            "Order rejected"
        );
        if instruction.reason == OrderReason::NewEntry {
            self.pending_entries.remove(&instruction.symbol);
            return;
        }
        if instruction.reason.opens_position() {
            return;
        }
        let Some(position) = instruction
            .position_id
            .and_then(|id| self.book.get_mut(&id))
        else {
            return;
        };
        position.exit_pending = false;
        if instruction.reason == OrderReason::TrailingStop {
            // Re-arm so the next price through the stop exits again
            position.stop_state.phase = StopPhase::Active;
            position.stop_state.triggered_at = None;
        }
    }

    /// Persistable view of the gate
    pub fn snapshot(&self, now: DateTime<Utc>) -> StateSnapshot {
        let mut positions: Vec<Position> = self.book.positions().cloned().collect();
        positions.sort_by_key(|p| (p.opened_at, p.position_id));
        StateSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: now,
            cycle_id: self.cycle_id,
            breaker: self.breaker.state().clone(),
            weights: self.allocator.weights().to_vec(),
            last_rebalance: self.allocator.last_rebalance(),
            positions,
            realized_pnl: self.book.realized_pnl(),
            trades: self.performance.records(),
        }
    }

    /// Resume from a snapshot
    pub fn restore(&mut self, snapshot: StateSnapshot, now: DateTime<Utc>) {
        for position in &snapshot.positions {
            self.last_prices
                .insert(position.symbol.clone(), position.last_price);
        }
        self.book.restore(snapshot.positions, snapshot.realized_pnl);
        self.performance.restore(snapshot.trades);
        if !self
            .allocator
            .restore(snapshot.weights, snapshot.last_rebalance)
        {
            tracing::warn!("Strategy set changed since snapshot, starting from equal weights");
        }
        // A new day opens at the restored equity
        self.breaker = CircuitBreaker::new(&self.breaker_config, self.equity(), now);
        self.breaker.restore(snapshot.breaker, now);
        self.cycle_id = snapshot.cycle_id;
        self.advance_clock(now);
        self.publish_gauges();
    }

    fn apply_breaker(&mut self, now: DateTime<Utc>, outcome: &mut TickOutcome) {
        let transitions = self.breaker.update(self.equity(), now);
        for transition in transitions {
            increment_counter(CounterMetric::BreakerTransitions);
            match transition.to {
                BreakerLevel::Normal | BreakerLevel::Caution => {
                    tracing::warn!(
                        from = ?transition.from,
                        to = ?transition.to,
                        daily_pnl_pct = %transition.daily_pnl_pct,
                        "Circuit breaker level changed"
                    );
                }
                BreakerLevel::Alert => {
                    tracing::warn!(
                        from = ?transition.from,
                        daily_pnl_pct = %transition.daily_pnl_pct,
                        "Circuit breaker at Alert, flagging losing positions"
                    );
                    for position in self.book.positions_mut() {
                        if position.unrealized_pnl < Decimal::ZERO && !position.flagged_weak {
                            position.flagged_weak = true;
                            outcome.flagged_weak.push(position.position_id);
                        }
                    }
                }
                BreakerLevel::Halted => {
                    tracing::error!(
                        from = ?transition.from,
                        daily_pnl_pct = %transition.daily_pnl_pct,
                        cooldown_until = ?self.breaker.state().cooldown_until,
                        "Circuit breaker HALTED, closing all positions"
                    );
                    let ids = self.ordered_position_ids(None);
                    for id in ids {
                        if let Some(instruction) =
                            self.exit_instruction(id, None, OrderReason::CircuitBreakerHalt, now)
                        {
                            outcome.instructions.push(instruction);
                        }
                    }
                }
            }
            outcome.transitions.push(transition);
        }
    }

    fn apply_cascade(&mut self, alert: &CascadeAlert, outcome: &mut TickOutcome) {
        increment_counter(CounterMetric::CascadeAlerts);
        tracing::warn!(
            symbol = %alert.symbol,
            score = %alert.score.score,
            action = ?alert.action,
            "Applying cascade action"
        );
        let now = alert.at;
        let ids = self.ordered_position_ids(Some(&alert.symbol));
        match alert.action {
            CascadeAction::ReducePositions => {
                for id in ids {
                    let quantity = self
                        .book
                        .get(&id)
                        .map(|p| (p.size * self.reduce_fraction).round_dp(QUANTITY_DP));
                    if let Some(instruction) =
                        self.exit_instruction(id, quantity, OrderReason::CascadeReduce, now)
                    {
                        outcome.instructions.push(instruction);
                    }
                }
            }
            CascadeAction::CloseAll => {
                for id in ids {
                    if let Some(instruction) =
                        self.exit_instruction(id, None, OrderReason::CascadeClose, now)
                    {
                        outcome.instructions.push(instruction);
                    }
                }
            }
            CascadeAction::Hedge => {
                if let Some(instruction) = self.hedge_instruction(&alert.symbol, now) {
                    outcome.instructions.push(instruction);
                }
            }
        }
        self.forced_exits.insert(alert.symbol.clone(), self.cycle_id);
    }

    /// Opposite-side order offsetting `hedge_ratio` of the symbol's net exposure
    ///
    /// Positions with an exit in flight are already being flattened and do
    /// not count.
    fn hedge_instruction(&self, symbol: &str, now: DateTime<Utc>) -> Option<OrderInstruction> {
        let net: Decimal = self
            .book
            .for_symbol(symbol)
            .filter(|p| !p.exit_pending)
            .map(|p| p.size * p.side.sign())
            .sum();
        let quantity = (net.abs() * self.hedge_ratio).round_dp(QUANTITY_DP);
        if quantity.is_zero() {
            return None;
        }
        let side = if net > Decimal::ZERO {
            Side::Short
        } else {
            Side::Long
        };
        let reference_price = self.last_price(symbol)?;
        increment_counter(CounterMetric::ForcedExits);
        Some(OrderInstruction {
            instruction_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            direction: side.entry_direction(),
            quantity,
            reference_price,
            reason: OrderReason::CascadeHedge,
            position_id: Some(Uuid::new_v4()),
            strategy_id: None,
            contributing_strategies: Vec::new(),
            created_at: now,
        })
    }

    /// Exit order for `quantity` (default: all) of a position
    ///
    /// Returns `None` if an exit is already in flight for it.
    fn exit_instruction(
        &mut self,
        position_id: Uuid,
        quantity: Option<Decimal>,
        reason: OrderReason,
        now: DateTime<Utc>,
    ) -> Option<OrderInstruction> {
        let position = self.book.get_mut(&position_id)?;
        if position.exit_pending {
            return None;
        }
        let quantity = quantity.unwrap_or(position.size).min(position.size);
        if quantity <= Decimal::ZERO {
            return None;
        }
        position.exit_pending = true;

        let instruction = OrderInstruction {
            instruction_id: Uuid::new_v4(),
            symbol: position.symbol.clone(),
            direction: position.side.exit_direction(),
            quantity,
            reference_price: position.last_price,
            reason,
            position_id: Some(position_id),
            strategy_id: Some(position.strategy_id.clone()),
            contributing_strategies: position.contributing_strategies.clone(),
            created_at: now,
        };
        if reason.is_forced() {
            increment_counter(CounterMetric::ForcedExits);
            self.forced_exits
                .insert(instruction.symbol.clone(), self.cycle_id);
        }
        Some(instruction)
    }

    fn ordered_position_ids(&self, symbol: Option<&str>) -> Vec<Uuid> {
        let mut positions: Vec<&Position> = self
            .book
            .positions()
            .filter(|p| symbol.map_or(true, |s| p.symbol == s))
            .collect();
        positions.sort_by_key(|p| (p.opened_at, p.position_id));
        positions.into_iter().map(|p| p.position_id).collect()
    }

    /// Weight-averaged win probability and payoff ratio of the contributors
    fn blended_edge(&self, contributors: &[String]) -> EdgeEstimate {
        let weighted: Vec<(Decimal, EdgeEstimate)> = contributors
            .iter()
            .map(|id| {
                (
                    self.allocator.weight_of(id).unwrap_or_default(),
                    self.performance.edge(id),
                )
            })
            .collect();
        let total: Decimal = weighted.iter().map(|(w, _)| *w).sum();
        let count = Decimal::from(weighted.len().max(1) as u64);

        let (mut p, mut b) = (Decimal::ZERO, Decimal::ZERO);
        for (weight, edge) in &weighted {
            let share = if total.is_zero() {
                Decimal::ONE / count
            } else {
                *weight / total
            };
            p += share * edge.win_probability;
            b += share * edge.payoff_ratio;
        }
        EdgeEstimate {
            win_probability: p.round_dp(EDGE_DP),
            payoff_ratio: b.round_dp(EDGE_DP),
        }
    }

    /// Highest-weighted contributor, first in slot order on ties
    fn lead_strategy(&self, contributors: &[String]) -> Option<String> {
        let mut best: Option<(&String, Decimal)> = None;
        for id in contributors {
            let weight = self.allocator.weight_of(id).unwrap_or_default();
            if best.map_or(true, |(_, w)| weight > w) {
                best = Some((id, weight));
            }
        }
        best.map(|(id, _)| id.clone())
    }

    fn publish_gauges(&self) {
        set_gauge(GaugeMetric::Equity, to_f64(self.equity()));
        set_gauge(
            GaugeMetric::DailyPnlPct,
            to_f64(self.breaker.state().daily_pnl_pct),
        );
        set_gauge(
            GaugeMetric::BreakerLevel,
            f64::from(self.breaker.level().as_u8()),
        );
        set_gauge(GaugeMetric::OpenPositions, self.book.len() as f64);
    }
}
