//! Bounded, deadline-enforced signal collection
//!
//! One task per strategy, at most `max_concurrent` running at once. Every
//! task races the same cycle deadline; stragglers are aborted, never awaited,
//! and their slot stays empty (abstain).

use super::types::{SignalProducer, StrategySignal};
use crate::feed::MarketSnapshot;
use crate::telemetry::{increment_counter, record_latency, CounterMetric, LatencyMetric};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Why a slot ended up empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbstainReason {
    /// Producer explicitly abstained
    Declined,
    /// Producer did not answer before the cycle deadline
    DeadlineExceeded,
    /// Producer returned an error or panicked
    Failed(String),
    /// Producer answered with a malformed signal
    Invalid(String),
}

/// Result of one collection round, indexed by strategy slot
#[derive(Debug, Clone, Default)]
pub struct CollectedSignals {
    pub slots: Vec<Option<StrategySignal>>,
    /// (strategy id, reason) for every empty slot
    pub abstentions: Vec<(String, AbstainReason)>,
}

impl CollectedSignals {
    pub fn responded(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Collects one signal per strategy under a shared deadline
pub struct SignalCollector {
    producers: Vec<Arc<dyn SignalProducer>>,
    deadline: Duration,
    permits: Arc<Semaphore>,
}

impl SignalCollector {
    pub fn new(
        producers: Vec<Arc<dyn SignalProducer>>,
        deadline: Duration,
        max_concurrent: usize,
    ) -> Self {
        Self {
            producers,
            deadline,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn strategy_ids(&self) -> Vec<String> {
        self.producers
            .iter()
            .map(|p| p.strategy_id().to_string())
            .collect()
    }

    /// Run every producer against the snapshot and gather their votes
    pub async fn collect(&self, snapshot: &MarketSnapshot) -> CollectedSignals {
        let started = Instant::now();
        let deadline = started + self.deadline;
        let snapshot = Arc::new(snapshot.clone());

        let mut tasks = JoinSet::new();
        for (slot, producer) in self.producers.iter().enumerate() {
            let producer = Arc::clone(producer);
            let permits = Arc::clone(&self.permits);
            let snapshot = Arc::clone(&snapshot);
            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => producer.generate_signal(&snapshot).await,
                    Err(e) => Err(anyhow::anyhow!("signal pool closed: {}", e)),
                };
                (slot, result)
            });
        }

        let mut slots: Vec<Option<StrategySignal>> = vec![None; self.producers.len()];
        let mut reasons: Vec<Option<AbstainReason>> = vec![None; self.producers.len()];

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((slot, result)))) => {
                    let producer = &self.producers[slot];
                    match result {
                        Ok(Some(signal)) => match self.check(producer.as_ref(), &snapshot, &signal)
                        {
                            Ok(()) => slots[slot] = Some(signal),
                            Err(reason) => reasons[slot] = Some(AbstainReason::Invalid(reason)),
                        },
                        Ok(None) => reasons[slot] = Some(AbstainReason::Declined),
                        Err(e) => reasons[slot] = Some(AbstainReason::Failed(e.to_string())),
                    }
                }
                Ok(Some(Err(join_error))) => {
                    // The slot index is lost with a panicked task; it stays unmarked
                    // and is reported as failed below.
                    tracing::error!(error = %join_error, "Signal task panicked");
                }
                Ok(None) => break,
                Err(_) => {
                    tasks.abort_all();
                    break;
                }
            }
        }
        drop(tasks);

        let mut abstentions = Vec::new();
        let timed_out = Instant::now() >= deadline;
        for (slot, producer) in self.producers.iter().enumerate() {
            if slots[slot].is_some() {
                continue;
            }
            let reason = reasons[slot].take().unwrap_or(if timed_out {
                AbstainReason::DeadlineExceeded
            } else {
                AbstainReason::Failed("task panicked".to_string())
            });
            match &reason {
                AbstainReason::Declined => {}
                AbstainReason::DeadlineExceeded => tracing::info!(
                    strategy = producer.strategy_id(),
                    symbol = %snapshot.symbol,
                    "Strategy missed signal deadline, recording abstain"
                ),
                AbstainReason::Failed(e) | AbstainReason::Invalid(e) => tracing::warn!(
                    strategy = producer.strategy_id(),
                    symbol = %snapshot.symbol,
                    error = %e,
                    "Strategy signal discarded, recording abstain"
                ),
            }
            increment_counter(CounterMetric::Abstentions);
            abstentions.push((producer.strategy_id().to_string(), reason));
        }

        record_latency(LatencyMetric::SignalCollection, started.elapsed());
        CollectedSignals { slots, abstentions }
    }

    fn check(
        &self,
        producer: &dyn SignalProducer,
        snapshot: &MarketSnapshot,
        signal: &StrategySignal,
    ) -> Result<(), String> {
        if signal.strategy_id != producer.strategy_id() {
            return Err(format!(
                "signal carries strategy id {} from producer {}",
                signal.strategy_id,
                producer.strategy_id()
            ));
        }
        if signal.symbol != snapshot.symbol {
            return Err(format!(
                "signal for {} requested for {}",
                signal.symbol, snapshot.symbol
            ));
        }
        if !signal.has_valid_confidence() {
            return Err(format!("confidence {} outside [0, 1]", signal.confidence));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Direction;
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct FixedProducer {
        id: String,
        delay: Duration,
        answer: Option<(Direction, Decimal)>,
        fail: bool,
    }

    impl FixedProducer {
        fn new(id: &str, delay_ms: u64, answer: Option<(Direction, Decimal)>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                delay: Duration::from_millis(delay_ms),
                answer,
                fail: false,
            })
        }

        fn failing(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                delay: Duration::ZERO,
                answer: None,
                fail: true,
            })
        }
    }

    #[async_trait]
    impl SignalProducer for FixedProducer {
        fn strategy_id(&self) -> &str {
            &self.id
        }

        async fn generate_signal(
            &self,
            snapshot: &MarketSnapshot,
        ) -> anyhow::Result<Option<StrategySignal>> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                anyhow::bail!("model unavailable");
            }
            Ok(self.answer.map(|(direction, confidence)| {
                StrategySignal::new(
                    self.id.clone(),
                    snapshot.symbol.clone(),
                    direction,
                    confidence,
                    snapshot.timestamp,
                )
            }))
        }
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BTCUSDT".to_string(),
            last_price: Some(dec!(100)),
            timestamp: Utc::now(),
            recent_bars: vec![],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_collects_all_timely_signals_in_slot_order() {
        let collector = SignalCollector::new(
            vec![
                FixedProducer::new("a", 50, Some((Direction::Buy, dec!(0.9)))),
                FixedProducer::new("b", 10, Some((Direction::Sell, dec!(0.4)))),
            ],
            Duration::from_millis(500),
            4,
        );

        let collected = collector.collect(&snapshot()).await;
        assert_eq!(collected.responded(), 2);
        assert_eq!(collected.slots[0].as_ref().unwrap().strategy_id, "a");
        assert_eq!(collected.slots[1].as_ref().unwrap().direction, Direction::Sell);
        assert!(collected.abstentions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_strategy_abstains() {
        let collector = SignalCollector::new(
            vec![
                FixedProducer::new("fast", 10, Some((Direction::Buy, dec!(0.9)))),
                FixedProducer::new("slow", 5_000, Some((Direction::Buy, dec!(0.9)))),
            ],
            Duration::from_millis(200),
            4,
        );

        let started = Instant::now();
        let collected = collector.collect(&snapshot()).await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(collected.slots[0].is_some());
        assert!(collected.slots[1].is_none());
        assert_eq!(
            collected.abstentions,
            vec![("slow".to_string(), AbstainReason::DeadlineExceeded)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_tasks_share_the_cycle_deadline() {
        // One permit: the second producer waits for the first and misses the deadline
        let collector = SignalCollector::new(
            vec![
                FixedProducer::new("a", 150, Some((Direction::Buy, dec!(0.5)))),
                FixedProducer::new("b", 150, Some((Direction::Buy, dec!(0.5)))),
            ],
            Duration::from_millis(200),
            1,
        );

        let collected = collector.collect(&snapshot()).await;
        assert!(collected.slots[0].is_some());
        assert!(collected.slots[1].is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_and_explicit_abstain_are_not_fatal() {
        let collector = SignalCollector::new(
            vec![
                FixedProducer::failing("broken"),
                FixedProducer::new("quiet", 0, None),
                FixedProducer::new("ok", 0, Some((Direction::Sell, dec!(0.7)))),
            ],
            Duration::from_millis(200),
            4,
        );

        let collected = collector.collect(&snapshot()).await;
        assert_eq!(collected.responded(), 1);
        assert!(matches!(collected.abstentions[0].1, AbstainReason::Failed(_)));
        assert_eq!(collected.abstentions[1].1, AbstainReason::Declined);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_confidence_is_discarded() {
        let collector = SignalCollector::new(
            vec![FixedProducer::new("wild", 0, Some((Direction::Buy, dec!(1.5))))],
            Duration::from_millis(200),
            4,
        );

        let collected = collector.collect(&snapshot()).await;
        assert!(collected.slots[0].is_none());
        assert!(matches!(collected.abstentions[0].1, AbstainReason::Invalid(_)));
    }
}
