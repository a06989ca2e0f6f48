//! Circuit breaker escalation through the runtime

use crate::common::*;
use chrono::{TimeZone, Utc};
use riskcore::execution::ExecutionEngine;
use riskcore::feed::{MarketEvent, PriceTick};
use riskcore::gate::RunSummary;
use riskcore::notify::Notification;
use riskcore::persistence::JsonFileStore;
use riskcore::risk::{BreakerLevel, RiskError};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn tick(price: rust_decimal::Decimal, secs: i64) -> MarketEvent {
    MarketEvent::Tick(PriceTick::new(SYMBOL, price, at(secs)))
}

#[tokio::test]
async fn test_breaker_escalates_halts_and_resets_next_day() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        &config(),
        &[],
        Arc::new(JsonFileStore::new(dir.path().join("state.json"))),
    );
    let mut summary = RunSummary::default();

    h.runtime.handle_event(tick(dec!(100), 0), &mut summary).await;
    h.runtime
        .execute(vec![long_entry(dec!(10), dec!(100), at(0))], &mut summary)
        .await;
    assert_eq!(h.runtime.gate().lock().await.positions().len(), 1);

    // 3000 equity: -5%, -10%, -15%
    h.runtime.handle_event(tick(dec!(85), 60), &mut summary).await;
    h.runtime.handle_event(tick(dec!(70), 120), &mut summary).await;
    h.runtime.handle_event(tick(dec!(55), 180), &mut summary).await;

    let levels: Vec<BreakerLevel> = h
        .notifier
        .0
        .lock()
        .await
        .iter()
        .filter_map(|n| match n {
            Notification::BreakerTransition(t) => Some(t.to),
            _ => None,
        })
        .collect();
    assert_eq!(
        levels,
        vec![BreakerLevel::Caution, BreakerLevel::Alert, BreakerLevel::Halted]
    );

    {
        let gate = h.runtime.gate();
        let gate = gate.lock().await;
        assert!(gate.breaker().is_halted());
        assert_eq!(
            gate.breaker().state().cooldown_until,
            Some(at(180) + chrono::Duration::minutes(30))
        );
        // Force-closed at 55
        assert!(gate.positions().is_empty());
        assert_eq!(gate.positions().realized_pnl(), dec!(-450));
    }
    assert_eq!(summary.trades_closed, 1);

    let fills = h.paper.fills().await;
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[1].price, dec!(55));

    // No entries while halted
    let slots: Vec<_> = buy_votes(at(240)).into_iter().map(Some).collect();
    let err = h
        .runtime
        .gate()
        .lock()
        .await
        .decide(SYMBOL, &slots, at(240))
        .unwrap_err();
    assert_eq!(err, RiskError::TradingHalted);

    // A new UTC day starts from Normal at the current equity
    let next_day = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 30).unwrap();
    h.runtime
        .handle_event(MarketEvent::Tick(PriceTick::new(SYMBOL, dec!(56), next_day)), &mut summary)
        .await;
    let gate = h.runtime.gate();
    let gate = gate.lock().await;
    assert_eq!(gate.breaker().level(), BreakerLevel::Normal);
    assert_eq!(gate.breaker().state().day_open_equity, dec!(2550));
}
