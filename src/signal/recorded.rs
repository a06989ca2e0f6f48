//! Replays pre-recorded strategy signals

use super::types::{SignalProducer, StrategySignal};
use crate::feed::MarketSnapshot;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Producer serving signals captured from a live run
///
/// On each request it consumes every queued signal for the symbol stamped at
/// or before the snapshot time and answers with the latest one. Older queued
/// signals are superseded, not replayed later.
pub struct RecordedProducer {
    strategy_id: String,
    queues: Mutex<HashMap<String, VecDeque<StrategySignal>>>,
}

impl RecordedProducer {
    pub fn new(strategy_id: impl Into<String>, signals: impl IntoIterator<Item = StrategySignal>) -> Self {
        let strategy_id = strategy_id.into();
        let mut queues: HashMap<String, VecDeque<StrategySignal>> = HashMap::new();
        for signal in signals {
            if signal.strategy_id == strategy_id {
                queues
                    .entry(signal.symbol.clone())
                    .or_default()
                    .push_back(signal);
            }
        }
        for queue in queues.values_mut() {
            queue.make_contiguous().sort_by_key(|s| s.timestamp);
        }
        Self {
            strategy_id,
            queues: Mutex::new(queues),
        }
    }

    /// One producer per strategy id, in the given order
    pub fn for_strategies(
        strategy_ids: &[String],
        signals: &[StrategySignal],
    ) -> Vec<Arc<dyn SignalProducer>> {
        strategy_ids
            .iter()
            .map(|id| {
                Arc::new(RecordedProducer::new(id.clone(), signals.iter().cloned()))
                    as Arc<dyn SignalProducer>
            })
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.queues
            .lock()
            .map(|q| q.values().map(VecDeque::len).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SignalProducer for RecordedProducer {
    fn strategy_id(&self) -> &str {
        &self.strategy_id
    }

    async fn generate_signal(
        &self,
        snapshot: &MarketSnapshot,
    ) -> anyhow::Result<Option<StrategySignal>> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| anyhow::anyhow!("recorded signal queue poisoned"))?;
        let Some(queue) = queues.get_mut(&snapshot.symbol) else {
            return Ok(None);
        };

        let mut latest = None;
        while queue
            .front()
            .is_some_and(|s| s.timestamp <= snapshot.timestamp)
        {
            latest = queue.pop_front();
        }
        Ok(latest)
    }
}
