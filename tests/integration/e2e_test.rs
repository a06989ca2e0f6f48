//! End-to-end replay through the runtime

use crate::common::*;
use riskcore::config::Config;
use riskcore::feed::{MarketFeed, ReplayFeed, ReplayLog};
use riskcore::persistence::{JsonFileStore, StateStore};
use rust_decimal_macros::dec;
use std::sync::Arc;

const RECORDING: &str = r#"
# entry at the 60s cycle, trailing stop out at 100s
{"kind":"tick","symbol":"BTCUSDT","price":"100","volume":"1","timestamp":"2024-05-01T10:00:00Z"}
{"kind":"signal","strategy_id":"trend","symbol":"BTCUSDT","direction":"buy","confidence":"0.9","timestamp":"2024-05-01T10:00:10Z"}
{"kind":"signal","strategy_id":"mean_revert","symbol":"BTCUSDT","direction":"buy","confidence":"0.9","timestamp":"2024-05-01T10:00:10Z"}
{"kind":"signal","strategy_id":"breakout","symbol":"BTCUSDT","direction":"buy","confidence":"0.9","timestamp":"2024-05-01T10:00:10Z"}
{"kind":"tick","symbol":"BTCUSDT","price":"100","volume":"1","timestamp":"2024-05-01T10:00:30Z"}
{"kind":"tick","symbol":"BTCUSDT","price":"100","volume":"1","timestamp":"2024-05-01T10:01:00Z"}
{"kind":"tick","symbol":"BTCUSDT","price":"110","volume":"1","timestamp":"2024-05-01T10:01:30Z"}
{"kind":"tick","symbol":"BTCUSDT","price":"107","volume":"1","timestamp":"2024-05-01T10:01:40Z"}
{"kind":"tick","symbol":"BTCUSDT","price":"107","volume":"1","timestamp":"2024-05-01T10:02:10Z"}
"#;

#[test]
fn test_config_example_parses_and_validates() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert_eq!(config.validate(), Ok(()));
    assert_eq!(config.strategies.len(), 4);
}

#[tokio::test]
async fn test_replay_entry_stop_and_resume() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let log = ReplayLog::parse(RECORDING).unwrap();
    let config = config();

    let h = harness(
        &config,
        &log.signals,
        Arc::new(JsonFileStore::new(&state_path)),
    );
    let events = ReplayFeed::new(log.events.clone()).subscribe().await.unwrap();
    let summary = h.runtime.run(events).await.unwrap();

    assert_eq!(summary.events_processed, 6);
    assert_eq!(summary.cycles, 2);
    assert_eq!(summary.orders_submitted, 2);
    assert_eq!(summary.trades_closed, 1);
    // 1.875 units from 100 to 107
    assert_eq!(summary.realized_pnl, dec!(13.125));
    assert_eq!(summary.final_equity, dec!(3013.125));

    let saved = JsonFileStore::new(&state_path).load().await.unwrap().unwrap();
    assert!(saved.positions.is_empty());
    assert_eq!(saved.cycle_id, 2);
    // One record per contributing strategy
    assert_eq!(saved.trades.len(), 3);

    // A restart picks up where the last run stopped
    let restarted = harness(&config, &[], Arc::new(JsonFileStore::new(&state_path)));
    assert!(restarted.runtime.resume(at(200)).await);
    let gate = restarted.runtime.gate();
    let gate = gate.lock().await;
    assert_eq!(gate.cycle_id(), 2);
    assert_eq!(gate.equity(), dec!(3013.125));
}
