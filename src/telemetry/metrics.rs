//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Parallel signal collection for one symbol
    SignalCollection,
    /// Serial ensemble, sizing and gating stage
    DecisionStage,
    /// Stop, breaker and cascade update for one tick
    TickProcessing,
    /// State snapshot write
    PersistenceSave,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Current equity
    Equity,
    /// Daily P&L as a fraction of opening equity
    DailyPnlPct,
    /// Circuit breaker level (0-3)
    BreakerLevel,
    /// Open position count
    OpenPositions,
    /// Last computed portfolio correlation
    PortfolioCorrelation,
    /// Last computed cascade score
    CascadeScore,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    OrdersSubmitted,
    OrdersRejected,
    Abstentions,
    ForcedExits,
    CascadeAlerts,
    BreakerTransitions,
    TicksRejected,
}

/// Start the Prometheus scrape endpoint
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;
    tracing::info!(%addr, "Prometheus metrics endpoint listening");
    Ok(())
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::SignalCollection => "riskcore_signal_collection_latency_ms",
        LatencyMetric::DecisionStage => "riskcore_decision_stage_latency_ms",
        LatencyMetric::TickProcessing => "riskcore_tick_processing_latency_ms",
        LatencyMetric::PersistenceSave => "riskcore_persistence_save_latency_ms",
    };

    ::metrics::histogram!(metric_name).record(duration.as_secs_f64() * 1_000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::Equity => "riskcore_equity",
        GaugeMetric::DailyPnlPct => "riskcore_daily_pnl_pct",
        GaugeMetric::BreakerLevel => "riskcore_breaker_level",
        GaugeMetric::OpenPositions => "riskcore_open_positions",
        GaugeMetric::PortfolioCorrelation => "riskcore_portfolio_correlation",
        GaugeMetric::CascadeScore => "riskcore_cascade_score",
    };

    ::metrics::gauge!(metric_name).set(value);
}

/// Increment a counter by one
pub fn increment_counter(metric: CounterMetric) {
    let metric_name = match metric {
        CounterMetric::OrdersSubmitted => "riskcore_orders_submitted_total",
        CounterMetric::OrdersRejected => "riskcore_orders_rejected_total",
        CounterMetric::Abstentions => "riskcore_abstentions_total",
        CounterMetric::ForcedExits => "riskcore_forced_exits_total",
        CounterMetric::CascadeAlerts => "riskcore_cascade_alerts_total",
        CounterMetric::BreakerTransitions => "riskcore_breaker_transitions_total",
        CounterMetric::TicksRejected => "riskcore_ticks_rejected_total",
    };

    ::metrics::counter!(metric_name).increment(1);
}
