//! Benchmarks for the ensemble vote and the tick path

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use riskcore::config::Config;
use riskcore::ensemble::{AdaptiveAllocator, EnsembleEngine};
use riskcore::feed::PriceTick;
use riskcore::gate::{OrderInstruction, OrderReason, RiskGate};
use riskcore::execution::Fill;
use riskcore::signal::{Direction, StrategySignal};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

const STRATEGIES: [&str; 8] = [
    "trend", "mean_revert", "breakout", "carry", "funding", "basis", "flow", "vol",
];

fn config() -> Config {
    Config::with_strategies(STRATEGIES)
}

fn benchmark_ensemble_vote(c: &mut Criterion) {
    let config = config();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let engine = EnsembleEngine::new(&config.ensemble);
    let allocator = AdaptiveAllocator::new(&config.allocator, &config.strategy_ids(), now);
    let slots: Vec<Option<StrategySignal>> = STRATEGIES
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let direction = if i % 3 == 0 { Direction::Sell } else { Direction::Buy };
            Some(StrategySignal::new(*id, "BTCUSDT", direction, dec!(0.7), now))
        })
        .collect();

    c.bench_function("ensemble_vote_8_strategies", |b| {
        b.iter(|| engine.decide(black_box("BTCUSDT"), black_box(&slots), allocator.weights()))
    });
}

fn benchmark_tick_path(c: &mut Criterion) {
    let config = config();
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    let mut gate = RiskGate::new(&config, start);

    // Five open positions with armed stops
    for i in 0..5 {
        let instruction = OrderInstruction {
            instruction_id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            direction: Direction::Buy,
            quantity: dec!(0.1),
            reference_price: dec!(60000),
            reason: OrderReason::NewEntry,
            position_id: Some(Uuid::new_v4()),
            strategy_id: Some(STRATEGIES[i].to_string()),
            contributing_strategies: vec![STRATEGIES[i].to_string()],
            created_at: start,
        };
        let fill = Fill {
            order_id: instruction.instruction_id,
            symbol: instruction.symbol.clone(),
            direction: Direction::Buy,
            price: dec!(60000),
            quantity: dec!(0.1),
            fees: Decimal::ZERO,
            timestamp: start,
        };
        gate.on_fill(&instruction, &fill);
    }

    let mut n: i64 = 0;
    c.bench_function("tick_path_5_positions", |b| {
        b.iter(|| {
            n += 1;
            // Oscillate above entry so stops stay armed without triggering
            let price = dec!(61000) + Decimal::from(n % 50);
            let tick = PriceTick::new("BTCUSDT", price, start + Duration::milliseconds(n));
            black_box(gate.on_tick(black_box(&tick)))
        })
    });
}

criterion_group!(benches, benchmark_ensemble_vote, benchmark_tick_path);
criterion_main!(benches);
