use clap::Parser;
use riskcore::cli::{Cli, Commands};
use riskcore::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load_if_exists(&cli.config)? {
        Some(config) => config,
        None => {
            eprintln!("Warning: {} not found", cli.config);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    if let Commands::Config = cli.command {
        println!("Current configuration:");
        println!(
            "  Trading: capital={} symbols={:?} interval={}s max_positions={}",
            config.trading.initial_capital,
            config.trading.symbols,
            config.trading.trading_interval_secs,
            config.trading.max_open_positions
        );
        println!("  Strategies: {:?}", config.strategy_ids());
        println!(
            "  Ensemble: threshold={} min_agree={} deadline={}ms",
            config.ensemble.confidence_threshold,
            config.ensemble.min_strategies_agree,
            config.ensemble.signal_deadline_ms
        );
        println!(
            "  Allocator: weights in [{}, {}], smoothing={}",
            config.allocator.min_weight, config.allocator.max_weight, config.allocator.smoothing
        );
        println!(
            "  Kelly: fraction={} min_p={} size in [{}, {}]",
            config.kelly.fraction,
            config.kelly.min_probability,
            config.kelly.min_position_size,
            config.kelly.max_position_size
        );
        println!(
            "  Breaker: {} / {} / {}, cooldown {}m",
            config.circuit_breaker.level_1_drawdown,
            config.circuit_breaker.level_2_drawdown,
            config.circuit_breaker.level_3_drawdown,
            config.circuit_breaker.cooldown_minutes
        );
        println!(
            "  Cascade: threshold={} action={:?}",
            config.cascade.threshold, config.cascade.action
        );
        match config.validate() {
            Ok(()) => println!("  Validation: ok"),
            Err(e) => println!("  Validation: FAILED ({})", e),
        }
        return Ok(());
    }

    config.validate()?;

    // Initialize telemetry
    riskcore::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting replay run");
            args.execute(&config).await?;
        }
        Commands::Status(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {}
    }

    Ok(())
}
