//! Async trading runtime
//!
//! Drives a [`RiskGate`] from a market event channel and a decision
//! interval. Signal collection and order submission run outside the gate
//! lock; every state change runs under it.

use super::risk_gate::RiskGate;
use super::types::{OrderInstruction, OrderReason, TickOutcome};
use crate::config::Config;
use crate::execution::ExecutionEngine;
use crate::feed::MarketEvent;
use crate::notify::{Notification, Notifier};
use crate::persistence::{load_or_default, save_with_retry, StateStore};
use crate::risk::{BreakerLevel, RiskError};
use crate::signal::SignalCollector;
use crate::telemetry::{increment_counter, record_latency, CounterMetric, LatencyMetric};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;

/// What decides when a decision cycle is due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleClock {
    /// Wall-clock interval, for live feeds
    Wall,
    /// Event timestamps, for replay: a cycle runs when data time crosses
    /// the next interval boundary
    Market,
}

/// Cadence and scope of the runtime
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub symbols: Vec<String>,
    pub trading_interval: Duration,
    pub save_interval: Duration,
    pub save_retry_backoff: Duration,
    pub clock: CycleClock,
}

impl RuntimeSettings {
    pub fn from_config(config: &Config, clock: CycleClock) -> Self {
        Self {
            symbols: config.trading.symbols.clone(),
            trading_interval: Duration::from_secs(config.trading.trading_interval_secs),
            save_interval: Duration::from_secs(config.persistence.save_interval_secs),
            save_retry_backoff: Duration::from_millis(config.persistence.save_retry_backoff_ms),
            clock,
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub events_processed: u64,
    pub events_rejected: u64,
    pub cycles: u64,
    pub orders_submitted: u64,
    pub orders_rejected: u64,
    pub entries_blocked: u64,
    pub trades_closed: u64,
    pub realized_pnl: Decimal,
    pub final_equity: Decimal,
    pub breaker_level: Option<BreakerLevel>,
}

/// Event loop around the risk gate
pub struct TradingRuntime {
    gate: Arc<Mutex<RiskGate>>,
    collector: SignalCollector,
    execution: Arc<dyn ExecutionEngine>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    settings: RuntimeSettings,
}

impl TradingRuntime {
    pub fn new(
        gate: Arc<Mutex<RiskGate>>,
        collector: SignalCollector,
        execution: Arc<dyn ExecutionEngine>,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            gate,
            collector,
            execution,
            store,
            notifier,
            settings,
        }
    }

    pub fn gate(&self) -> Arc<Mutex<RiskGate>> {
        Arc::clone(&self.gate)
    }

    /// Load the last snapshot into the gate. Returns whether one was found.
    pub async fn resume(&self, now: DateTime<Utc>) -> bool {
        match load_or_default(self.store.as_ref()).await {
            Some(snapshot) => {
                self.gate.lock().await.restore(snapshot, now);
                true
            }
            None => false,
        }
    }

    async fn now(&self) -> DateTime<Utc> {
        match self.settings.clock {
            CycleClock::Wall => Utc::now(),
            CycleClock::Market => self.gate.lock().await.clock(),
        }
    }

    /// Process events until the channel closes, then save state
    pub async fn run(&self, mut events: mpsc::Receiver<MarketEvent>) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();

        let mut decision = tokio::time::interval(self.settings.trading_interval);
        decision.set_missed_tick_behavior(MissedTickBehavior::Delay);
        decision.tick().await;
        let mut persist = tokio::time::interval(self.settings.save_interval);
        persist.set_missed_tick_behavior(MissedTickBehavior::Delay);
        persist.tick().await;

        let interval = chrono::Duration::from_std(self.settings.trading_interval)?;
        let mut next_cycle: Option<DateTime<Utc>> = None;

        tracing::info!(
            symbols = ?self.settings.symbols,
            interval_secs = self.settings.trading_interval.as_secs(),
            clock = ?self.settings.clock,
            "Trading runtime started"
        );

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::info!("Market event channel closed, shutting down");
                        break;
                    };
                    if self.settings.clock == CycleClock::Market {
                        let at = event.timestamp();
                        let next = next_cycle.get_or_insert(at + interval);
                        while at >= *next {
                            let cycle_at = *next;
                            *next = cycle_at + interval;
                            self.run_cycle(cycle_at, &mut summary).await;
                        }
                    }
                    self.handle_event(event, &mut summary).await;
                }
                _ = decision.tick(), if self.settings.clock == CycleClock::Wall => {
                    self.run_cycle(Utc::now(), &mut summary).await;
                }
                _ = persist.tick() => {
                    let now = self.now().await;
                    self.persist(now).await;
                }
            }
        }

        let now = self.now().await;
        self.persist(now).await;

        let gate = self.gate.lock().await;
        summary.realized_pnl = gate.positions().realized_pnl();
        summary.final_equity = gate.equity();
        summary.breaker_level = Some(gate.breaker().level());
        tracing::info!(
            events = summary.events_processed,
            cycles = summary.cycles,
            orders = summary.orders_submitted,
            equity = %summary.final_equity,
            "Trading runtime stopped"
        );
        Ok(summary)
    }

    /// Apply one market event and act on what it produced
    pub async fn handle_event(&self, event: MarketEvent, summary: &mut RunSummary) {
        let result = {
            let mut gate = self.gate.lock().await;
            match &event {
                MarketEvent::Tick(tick) => gate.on_tick(tick).map(Some),
                MarketEvent::Bar(bar) => gate.on_bar(bar).map(|_| None),
                MarketEvent::Tape(tape) => gate.on_tape(tape).map(|_| None),
            }
        };
        summary.events_processed += 1;
        match result {
            Ok(Some(outcome)) => self.dispatch(outcome, summary).await,
            Ok(None) => {}
            Err(_) => summary.events_rejected += 1,
        }
    }

    /// One decision cycle over every symbol
    pub async fn run_cycle(&self, now: DateTime<Utc>, summary: &mut RunSummary) {
        let (outcome, snapshots) = {
            let mut gate = self.gate.lock().await;
            let outcome = gate.begin_cycle(now);
            let snapshots: Vec<_> = self
                .settings
                .symbols
                .iter()
                .map(|symbol| gate.market_snapshot(symbol, now))
                .collect();
            (outcome, snapshots)
        };
        summary.cycles += 1;
        self.dispatch(outcome, summary).await;

        for snapshot in snapshots {
            let collected = self.collector.collect(&snapshot).await;

            let started = Instant::now();
            let decided = self
                .gate
                .lock()
                .await
                .decide(&snapshot.symbol, &collected.slots, now);
            record_latency(LatencyMetric::DecisionStage, started.elapsed());

            match decided {
                Ok(Some(instruction)) => self.execute(vec![instruction], summary).await,
                Ok(None) => {}
                Err(e) => {
                    summary.entries_blocked += 1;
                    match e {
                        RiskError::TradingHalted
                        | RiskError::CascadeActive(_)
                        | RiskError::ForcedExitPending(_) => {
                            tracing::info!(symbol = %snapshot.symbol, reason = %e, "Entry blocked")
                        }
                        _ => tracing::debug!(symbol = %snapshot.symbol, reason = %e, "Entry not sized"),
                    }
                }
            }
        }
    }

    /// Submit instructions one at a time and apply the results
    pub async fn execute(&self, instructions: Vec<OrderInstruction>, summary: &mut RunSummary) {
        for instruction in instructions {
            if instruction.reason == OrderReason::NewEntry {
                let allowed = self.gate.lock().await.entry_still_allowed(&instruction);
                if allowed.is_err() {
                    summary.entries_blocked += 1;
                    continue;
                }
            }

            increment_counter(CounterMetric::OrdersSubmitted);
            summary.orders_submitted += 1;
            match self.execution.submit_order(instruction.to_request()).await {
                Ok(fill) => {
                    let trade = self.gate.lock().await.on_fill(&instruction, &fill);
                    if trade.is_some() {
                        summary.trades_closed += 1;
                    }
                }
                Err(e) => {
                    increment_counter(CounterMetric::OrdersRejected);
                    summary.orders_rejected += 1;
                    self.gate
                        .lock()
                        .await
                        .on_rejection(&instruction, &e.to_string());
                }
            }
        }
    }

    /// Execute forced exits, then tell operators what happened
    async fn dispatch(&self, outcome: TickOutcome, summary: &mut RunSummary) {
        if outcome.is_empty() {
            return;
        }
        self.execute(outcome.instructions, summary).await;
        for transition in outcome.transitions {
            self.notify(Notification::BreakerTransition(transition)).await;
        }
        if let Some(alert) = outcome.cascade_alert {
            self.notify(Notification::CascadeAlert(alert)).await;
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            tracing::warn!(error = %e, "Notification failed");
        }
    }

    /// Save a snapshot; a failure alerts but never stops trading
    pub async fn persist(&self, now: DateTime<Utc>) {
        let snapshot = self.gate.lock().await.snapshot(now);
        let started = Instant::now();
        let result = save_with_retry(
            self.store.as_ref(),
            &snapshot,
            self.settings.save_retry_backoff,
        )
        .await;
        record_latency(LatencyMetric::PersistenceSave, started.elapsed());

        match result {
            Ok(()) => tracing::debug!(cycle_id = snapshot.cycle_id, "State saved"),
            Err(e) => {
                tracing::error!(error = %e, "State save failed");
                self.notify(Notification::PersistenceFailure {
                    error: e.to_string(),
                    at: now,
                })
                .await;
            }
        }
    }
}
