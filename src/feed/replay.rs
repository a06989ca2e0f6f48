//! Event replay from JSON-lines recordings
//!
//! Each line is one record tagged by `kind`: `tick`, `bar`, `tape` or
//! `signal`. Blank lines and lines starting with `#` are skipped.

use super::types::{Bar, MarketEvent, PriceTick, TapeEvent};
use super::MarketFeed;
use crate::signal::StrategySignal;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// One recorded line
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayRecord {
    Tick(PriceTick),
    Bar(Bar),
    Tape(TapeEvent),
    Signal(StrategySignal),
}

/// A parsed recording split into market events and strategy signals
#[derive(Debug, Clone, Default)]
pub struct ReplayLog {
    /// Market events in timestamp order
    pub events: Vec<MarketEvent>,
    /// Recorded strategy signals in file order
    pub signals: Vec<StrategySignal>,
}

impl ReplayLog {
    /// Parse a JSON-lines recording
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut log = ReplayLog::default();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record: ReplayRecord = serde_json::from_str(line)
                .with_context(|| format!("invalid replay record on line {}", index + 1))?;
            match record {
                ReplayRecord::Tick(t) => log.events.push(MarketEvent::Tick(t)),
                ReplayRecord::Bar(b) => log.events.push(MarketEvent::Bar(b)),
                ReplayRecord::Tape(e) => log.events.push(MarketEvent::Tape(e)),
                ReplayRecord::Signal(s) => log.signals.push(s),
            }
        }
        // Stable sort keeps file order for equal timestamps
        log.events.sort_by_key(|e| e.timestamp());
        Ok(log)
    }

    /// Load and parse a recording from disk
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay file {}", path.display()))?;
        Self::parse(&content)
    }
}

/// Streams recorded market events into the runtime
pub struct ReplayFeed {
    events: Vec<MarketEvent>,
    /// Delay between events, `None` replays as fast as the consumer reads
    pace: Option<Duration>,
}

impl ReplayFeed {
    pub fn new(events: Vec<MarketEvent>) -> Self {
        Self { events, pace: None }
    }

    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }
}

#[async_trait]
impl MarketFeed for ReplayFeed {
    async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<MarketEvent>> {
        let (tx, rx) = mpsc::channel(1_024);
        let events = self.events.clone();
        let pace = self.pace;

        tokio::spawn(async move {
            let total = events.len();
            for event in events {
                if tx.send(event).await.is_err() {
                    tracing::warn!("Replay receiver dropped");
                    return;
                }
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
            }
            tracing::info!(events = total, "Replay finished");
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Direction;
    use rust_decimal_macros::dec;

    const RECORDING: &str = r#"
# two ticks out of order, a bar, a liquidation and a signal
{"kind":"tick","symbol":"BTCUSDT","price":"100.5","volume":"2","timestamp":"2026-03-02T10:00:05Z"}
{"kind":"tick","symbol":"BTCUSDT","price":"100.0","volume":"1","timestamp":"2026-03-02T10:00:00Z"}
{"kind":"bar","symbol":"BTCUSDT","open":"99","high":"101","low":"98","close":"100","volume":"50","timestamp":"2026-03-02T10:00:00Z"}
{"kind":"tape","symbol":"BTCUSDT","event_type":"liquidation","size":"3.5","timestamp":"2026-03-02T10:00:03Z"}
{"kind":"signal","strategy_id":"trend","symbol":"BTCUSDT","direction":"buy","confidence":"0.8","timestamp":"2026-03-02T10:00:00Z"}
"#;

    #[test]
    fn test_parse_splits_events_and_signals() {
        let log = ReplayLog::parse(RECORDING).unwrap();
        assert_eq!(log.events.len(), 4);
        assert_eq!(log.signals.len(), 1);
        assert_eq!(log.signals[0].direction, Direction::Buy);
        assert_eq!(log.signals[0].confidence, dec!(0.8));
    }

    #[test]
    fn test_parse_orders_events_by_timestamp() {
        let log = ReplayLog::parse(RECORDING).unwrap();
        let stamps: Vec<_> = log.events.iter().map(|e| e.timestamp()).collect();
        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(stamps, sorted);
        assert!(matches!(log.events.last(), Some(MarketEvent::Tick(t)) if t.price == dec!(100.5)));
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = ReplayLog::parse("{\"kind\":\"tick\"}\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[tokio::test]
    async fn test_replay_feed_streams_all_events() {
        let log = ReplayLog::parse(RECORDING).unwrap();
        let feed = ReplayFeed::new(log.events);
        let mut rx = feed.subscribe().await.unwrap();

        let mut count = 0;
        while let Some(_event) = rx.recv().await {
            count += 1;
        }
        assert_eq!(count, 4);
    }
}
