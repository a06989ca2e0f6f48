//! Run command implementation

use crate::config::Config;
use crate::execution::PaperEngine;
use crate::feed::{MarketFeed, ReplayFeed, ReplayLog};
use crate::gate::{CycleClock, RiskGate, RuntimeSettings, TradingRuntime};
use crate::notify::NotifierSet;
use crate::persistence::JsonFileStore;
use crate::signal::{RecordedProducer, SignalCollector};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON-lines file of market events and strategy signals
    #[arg(long)]
    pub replay: PathBuf,

    /// State snapshot path (overrides persistence.path)
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Ignore any saved state and start from initial capital
    #[arg(long)]
    pub fresh: bool,

    /// Delay between replayed events in ms
    #[arg(long, default_value = "0")]
    pub pace_ms: u64,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let log = ReplayLog::load(&self.replay)?;
        let Some(first) = log.events.first() else {
            anyhow::bail!("replay file {} has no market events", self.replay.display());
        };
        let start = first.timestamp();
        tracing::info!(
            file = %self.replay.display(),
            events = log.events.len(),
            signals = log.signals.len(),
            %start,
            "Loaded replay"
        );

        let strategy_ids = config.strategy_ids();
        let collector = SignalCollector::new(
            RecordedProducer::for_strategies(&strategy_ids, &log.signals),
            Duration::from_millis(config.ensemble.signal_deadline_ms),
            config.ensemble.max_concurrent_signals,
        );
        let state_path = self
            .state
            .clone()
            .unwrap_or_else(|| config.persistence.path.clone());

        let runtime = TradingRuntime::new(
            Arc::new(Mutex::new(RiskGate::new(config, start))),
            collector,
            Arc::new(PaperEngine::new(
                config.execution.fee_rate,
                config.execution.slippage_bps,
            )),
            Arc::new(JsonFileStore::new(state_path)),
            Arc::new(NotifierSet::from_config(&config.notify)?),
            RuntimeSettings::from_config(config, CycleClock::Market),
        );
        if !self.fresh {
            runtime.resume(start).await;
        }

        let feed = ReplayFeed::new(log.events).with_pace(Duration::from_millis(self.pace_ms));
        let events = feed.subscribe().await?;
        let summary = runtime.run(events).await?;

        println!("Replay complete");
        println!("  Events:        {} ({} rejected)", summary.events_processed, summary.events_rejected);
        println!("  Cycles:        {}", summary.cycles);
        println!(
            "  Orders:        {} submitted, {} rejected, {} entries blocked",
            summary.orders_submitted, summary.orders_rejected, summary.entries_blocked
        );
        println!("  Trades closed: {}", summary.trades_closed);
        println!("  Realized P&L:  {}", summary.realized_pnl.round_dp(2));
        println!("  Final equity:  {}", summary.final_equity.round_dp(2));
        if let Some(level) = summary.breaker_level {
            println!("  Breaker:       {:?}", level);
        }
        Ok(())
    }
}
