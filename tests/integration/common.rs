//! Shared fixtures

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use riskcore::config::Config;
use riskcore::execution::PaperEngine;
use riskcore::gate::{CycleClock, OrderInstruction, OrderReason, RiskGate, RuntimeSettings, TradingRuntime};
use riskcore::notify::{Notification, Notifier};
use riskcore::persistence::StateStore;
use riskcore::signal::{Direction, RecordedProducer, SignalCollector, StrategySignal};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const SYMBOL: &str = "BTCUSDT";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(secs)
}

/// Three strategies, one symbol, no fees or slippage
pub fn config() -> Config {
    let mut config = Config::with_strategies(["trend", "mean_revert", "breakout"]);
    config.allocator.max_weight = dec!(0.6);
    config.trading.symbols = vec![SYMBOL.to_string()];
    config.execution.fee_rate = Decimal::ZERO;
    config.execution.slippage_bps = Decimal::ZERO;
    config
}

pub fn buy_votes(ts: DateTime<Utc>) -> Vec<StrategySignal> {
    ["trend", "mean_revert", "breakout"]
        .iter()
        .map(|id| StrategySignal::new(*id, SYMBOL, Direction::Buy, dec!(0.9), ts))
        .collect()
}

/// Collects every notification
#[derive(Default)]
pub struct RecordingNotifier(pub Mutex<Vec<Notification>>);

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.0.lock().await.push(notification.clone());
        Ok(())
    }
}

pub struct Harness {
    pub runtime: TradingRuntime,
    pub paper: Arc<PaperEngine>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness(config: &Config, signals: &[StrategySignal], store: Arc<dyn StateStore>) -> Harness {
    let paper = Arc::new(PaperEngine::new(
        config.execution.fee_rate,
        config.execution.slippage_bps,
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let collector = SignalCollector::new(
        RecordedProducer::for_strategies(&config.strategy_ids(), signals),
        Duration::from_millis(config.ensemble.signal_deadline_ms),
        config.ensemble.max_concurrent_signals,
    );
    let runtime = TradingRuntime::new(
        Arc::new(Mutex::new(RiskGate::new(config, t0()))),
        collector,
        paper.clone(),
        store,
        notifier.clone(),
        RuntimeSettings::from_config(config, CycleClock::Market),
    );
    Harness {
        runtime,
        paper,
        notifier,
    }
}

/// A long entry of `quantity` at `price`
pub fn long_entry(quantity: Decimal, price: Decimal, ts: DateTime<Utc>) -> OrderInstruction {
    OrderInstruction {
        instruction_id: Uuid::new_v4(),
        symbol: SYMBOL.to_string(),
        direction: Direction::Buy,
        quantity,
        reference_price: price,
        reason: OrderReason::NewEntry,
        position_id: Some(Uuid::new_v4()),
        strategy_id: Some("trend".to_string()),
        contributing_strategies: vec!["trend".to_string(), "mean_revert".to_string()],
        created_at: ts,
    }
}
