//! Paper trading execution engine

use super::{ExecutionEngine, ExecutionError, Fill, OrderRequest};
use crate::signal::Direction;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Paper trading execution engine with simulated fills
///
/// Fills immediately at the reference price moved against the order by
/// `slippage_bps`, charging `fee_rate` on notional.
pub struct PaperEngine {
    fee_rate: Decimal,
    slippage_bps: Decimal,
    fills: Arc<RwLock<Vec<Fill>>>,
    scripted_rejections: Arc<RwLock<VecDeque<String>>>,
}

impl PaperEngine {
    /// Create a new paper trading engine
    pub fn new(fee_rate: Decimal, slippage_bps: Decimal) -> Self {
        Self {
            fee_rate,
            slippage_bps,
            fills: Arc::new(RwLock::new(vec![])),
            scripted_rejections: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Make the next submitted order fail with `reason`
    pub async fn reject_next(&self, reason: impl Into<String>) {
        self.scripted_rejections.write().await.push_back(reason.into());
    }

    fn fill_price(&self, direction: Direction, reference: Decimal) -> Decimal {
        let slip = reference * self.slippage_bps / Decimal::from(10_000);
        match direction {
            Direction::Buy => reference + slip,
            Direction::Sell => reference - slip,
            Direction::Hold => reference,
        }
    }
}

#[async_trait]
impl ExecutionEngine for PaperEngine {
    async fn submit_order(&self, order: OrderRequest) -> Result<Fill, ExecutionError> {
        if let Some(reason) = self.scripted_rejections.write().await.pop_front() {
            tracing::warn!(order_id = %order.order_id, %reason, "Paper order rejected");
            return Err(ExecutionError::Rejected(reason));
        }
        if order.direction == Direction::Hold {
            return Err(ExecutionError::Rejected("hold is not an order side".to_string()));
        }
        if order.quantity <= Decimal::ZERO || order.reference_price <= Decimal::ZERO {
            return Err(ExecutionError::Rejected(format!(
                "invalid quantity {} or price {}",
                order.quantity, order.reference_price
            )));
        }

        let price = self.fill_price(order.direction, order.reference_price);
        let fill = Fill {
            order_id: order.order_id,
            symbol: order.symbol,
            direction: order.direction,
            price,
            quantity: order.quantity,
            fees: order.quantity * price * self.fee_rate,
            timestamp: order.submitted_at,
        };

        self.fills.write().await.push(fill.clone());
        tracing::info!(
            order_id = %fill.order_id,
            symbol = %fill.symbol,
            direction = ?fill.direction,
            price = %fill.price,
            quantity = %fill.quantity,
            "Paper order filled"
        );
        Ok(fill)
    }

    async fn fills(&self) -> Vec<Fill> {
        self.fills.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn order(direction: Direction, quantity: Decimal, price: Decimal) -> OrderRequest {
        OrderRequest {
            order_id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            direction,
            quantity,
            reference_price: price,
            position_id: None,
            submitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_paper_engine_fill_with_slippage_and_fees() {
        let engine = PaperEngine::new(dec!(0.001), dec!(10));

        let buy = engine.submit_order(order(Direction::Buy, dec!(2), dec!(100))).await.unwrap();
        assert_eq!(buy.price, dec!(100.1));
        assert_eq!(buy.fees, dec!(0.2002));

        let sell = engine.submit_order(order(Direction::Sell, dec!(2), dec!(100))).await.unwrap();
        assert_eq!(sell.price, dec!(99.9));

        assert_eq!(engine.fills().await.len(), 2);
    }

    #[tokio::test]
    async fn test_paper_engine_zero_fee() {
        let engine = PaperEngine::new(dec!(0), dec!(0));
        let fill = engine.submit_order(order(Direction::Buy, dec!(1), dec!(50))).await.unwrap();
        assert_eq!(fill.price, dec!(50));
        assert_eq!(fill.fees, dec!(0));
    }

    #[tokio::test]
    async fn test_paper_engine_rejects_invalid_orders() {
        let engine = PaperEngine::new(dec!(0.001), dec!(5));
        let err = engine.submit_order(order(Direction::Buy, dec!(0), dec!(100))).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Rejected(_)));
        let err = engine.submit_order(order(Direction::Hold, dec!(1), dec!(100))).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Rejected(_)));
        assert!(engine.fills().await.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_rejection_applies_once() {
        let engine = PaperEngine::new(dec!(0.001), dec!(5));
        engine.reject_next("insufficient margin").await;

        let err = engine.submit_order(order(Direction::Buy, dec!(1), dec!(100))).await.unwrap_err();
        assert_eq!(err, ExecutionError::Rejected("insufficient margin".to_string()));
        assert!(engine.submit_order(order(Direction::Buy, dec!(1), dec!(100))).await.is_ok());
    }
}
