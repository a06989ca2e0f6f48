//! Status command implementation

use crate::config::Config;
use crate::persistence::{JsonFileStore, StateStore};
use clap::Args;
use rust_decimal_macros::dec;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// State snapshot path (overrides persistence.path)
    #[arg(long)]
    pub state: Option<PathBuf>,
}

impl StatusArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let path = self
            .state
            .clone()
            .unwrap_or_else(|| config.persistence.path.clone());
        let store = JsonFileStore::new(&path);
        let Some(snapshot) = store.load().await? else {
            println!("riskcore status");
            println!("  No state snapshot at {}", path.display());
            return Ok(());
        };

        println!("riskcore status");
        println!("  Saved at:      {}", snapshot.saved_at);
        println!("  Cycle:         {}", snapshot.cycle_id);
        println!(
            "  Breaker:       {:?} (daily pnl {}%, day {})",
            snapshot.breaker.level,
            (snapshot.breaker.daily_pnl_pct * dec!(100)).round_dp(2),
            snapshot.breaker.trading_day
        );
        if let Some(until) = snapshot.breaker.cooldown_until {
            println!("  Cooldown until {}", until);
        }
        println!("  Realized P&L:  {}", snapshot.realized_pnl.round_dp(2));

        println!("  Weights:");
        for w in &snapshot.weights {
            println!(
                "    {:<16} {:>6}%  sharpe {}",
                w.strategy_id,
                (w.weight * dec!(100)).round_dp(2),
                w.trailing_sharpe.round_dp(3)
            );
        }

        println!("  Positions:     {}", snapshot.positions.len());
        for p in &snapshot.positions {
            println!(
                "    {} {:?} {} @ {} (last {}, upnl {}){}{}",
                p.symbol,
                p.side,
                p.size,
                p.entry_price,
                p.last_price,
                p.unrealized_pnl.round_dp(2),
                if p.hedge { " hedge" } else { "" },
                if p.flagged_weak { " weak" } else { "" }
            );
        }
        Ok(())
    }
}
