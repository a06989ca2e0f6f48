//! Cascade alerts racing a concurrent entry decision

use crate::common::*;
use riskcore::config::Config;
use riskcore::execution::ExecutionEngine;
use riskcore::cascade::CascadeAction;
use riskcore::feed::{MarketEvent, PriceTick, TapeEvent, TapeEventType};
use riskcore::gate::RunSummary;
use riskcore::notify::Notification;
use riskcore::persistence::JsonFileStore;
use riskcore::signal::Direction;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn cascade_config(action: CascadeAction) -> Config {
    let mut config = config();
    config.cascade.action = action;
    // A single liquidation is enough to alert
    config.cascade.threshold = dec!(0.2);
    config.cascade.liquidation_count_cap = 1;
    config
}

fn liquidation(secs: i64) -> MarketEvent {
    MarketEvent::Tape(TapeEvent {
        symbol: SYMBOL.to_string(),
        event_type: TapeEventType::Liquidation,
        size: dec!(2),
        timestamp: at(secs),
    })
}

fn tick(secs: i64) -> MarketEvent {
    MarketEvent::Tick(PriceTick::new(SYMBOL, dec!(100), at(secs)))
}

#[tokio::test]
async fn test_cascade_reduces_despite_concurrent_buy() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        &cascade_config(CascadeAction::ReducePositions),
        &buy_votes(at(0)),
        Arc::new(JsonFileStore::new(dir.path().join("state.json"))),
    );
    let mut setup = RunSummary::default();
    h.runtime.handle_event(tick(0), &mut setup).await;
    h.runtime
        .execute(vec![long_entry(dec!(10), dec!(100), at(0))], &mut setup)
        .await;

    let mut cycle_summary = RunSummary::default();
    let mut tick_summary = RunSummary::default();
    let cascade = async {
        h.runtime.handle_event(liquidation(5), &mut tick_summary).await;
        h.runtime.handle_event(tick(5), &mut tick_summary).await;
    };
    tokio::join!(h.runtime.run_cycle(at(5), &mut cycle_summary), cascade);

    let fills = h.paper.fills().await;
    // The setup entry plus the reduce; the Buy never adds to the position
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[1].direction, Direction::Sell);
    assert_eq!(fills[1].quantity, dec!(5));

    let gate = h.runtime.gate();
    let gate = gate.lock().await;
    assert!(gate.is_cascade_active(SYMBOL));
    let position = gate.positions().primary(SYMBOL).unwrap();
    assert_eq!(position.size, dec!(5));

    let alerts = h.notifier.0.lock().await;
    assert!(alerts
        .iter()
        .any(|n| matches!(n, Notification::CascadeAlert(a) if a.symbol == SYMBOL)));
}

#[tokio::test]
async fn test_cascade_blocks_entry_from_flat() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        &cascade_config(CascadeAction::CloseAll),
        &buy_votes(at(0)),
        Arc::new(JsonFileStore::new(dir.path().join("state.json"))),
    );
    let mut summary = RunSummary::default();
    h.runtime.handle_event(tick(0), &mut summary).await;

    let mut cycle_summary = RunSummary::default();
    let cascade = async {
        let mut s = RunSummary::default();
        h.runtime.handle_event(liquidation(5), &mut s).await;
        h.runtime.handle_event(tick(5), &mut s).await;
    };
    tokio::join!(h.runtime.run_cycle(at(5), &mut cycle_summary), cascade);

    // Either the entry filled before the alert and was closed by it, or the
    // alert came first and the entry never went out
    let gate = h.runtime.gate();
    let gate = gate.lock().await;
    assert!(gate.positions().is_empty());
    let fills = h.paper.fills().await;
    assert!(fills.is_empty() || fills.len() == 2);
}
