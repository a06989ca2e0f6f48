//! Position tracking

use crate::signal::Direction;
use crate::stops::TrailingStopState;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Side opened by an order in `direction`; Hold opens nothing
    pub fn from_direction(direction: Direction) -> Option<Self> {
        match direction {
            Direction::Buy => Some(Side::Long),
            Direction::Sell => Some(Side::Short),
            Direction::Hold => None,
        }
    }

    pub fn entry_direction(&self) -> Direction {
        match self {
            Side::Long => Direction::Buy,
            Side::Short => Direction::Sell,
        }
    }

    pub fn exit_direction(&self) -> Direction {
        self.entry_direction().opposite()
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Long => Decimal::ONE,
            Side::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

/// An open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    /// Size in units of the asset
    pub size: Decimal,
    /// Highest-weighted contributing strategy; selects the stop rule
    pub strategy_id: String,
    pub contributing_strategies: Vec<String>,
    pub opened_at: DateTime<Utc>,
    pub last_price: Decimal,
    pub unrealized_pnl: Decimal,
    /// Losing position marked at the Alert breaker level
    pub flagged_weak: bool,
    /// An exit order is in flight
    pub exit_pending: bool,
    /// Opened by a cascade hedge rather than an ensemble decision
    pub hedge: bool,
    pub stop_state: TrailingStopState,
}

impl Position {
    /// P&L of the whole position at `price`, before fees
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    /// Return on entry price at `price`, positive when in profit
    pub fn profit_pct(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        (price - self.entry_price) / self.entry_price * self.side.sign()
    }

    pub fn mark(&mut self, price: Decimal) {
        self.last_price = price;
        self.unrealized_pnl = self.pnl_at(price);
    }

    pub fn notional(&self) -> Decimal {
        self.size * self.last_price
    }
}

/// Realized result of closing some or all of a position
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub position_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Net of exit fees
    pub realized_pnl: Decimal,
    /// Realized P&L over entry notional of the closed quantity
    pub return_pct: Decimal,
    pub contributing_strategies: Vec<String>,
    pub hedge: bool,
    pub closed_at: DateTime<Utc>,
    pub fully_closed: bool,
}

/// Open positions keyed by id, plus realized P&L
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: HashMap<Uuid, Position>,
    realized_pnl: Decimal,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filled entry. Entry fees are realized immediately.
    pub fn open(&mut self, position: Position, fees: Decimal) {
        self.realized_pnl -= fees;
        self.positions.insert(position.position_id, position);
    }

    /// Close `quantity` units (capped at the position size) at `price`
    pub fn close(
        &mut self,
        position_id: Uuid,
        quantity: Decimal,
        price: Decimal,
        fees: Decimal,
        at: DateTime<Utc>,
    ) -> Option<ClosedTrade> {
        let position = self.positions.get_mut(&position_id)?;
        let quantity = quantity.min(position.size).max(Decimal::ZERO);

        let gross = (price - position.entry_price) * quantity * position.side.sign();
        let realized = gross - fees;
        let entry_notional = position.entry_price * quantity;
        let return_pct = if entry_notional.is_zero() {
            Decimal::ZERO
        } else {
            realized / entry_notional
        };

        position.size -= quantity;
        position.exit_pending = false;
        let fully_closed = position.size.is_zero();

        let trade = ClosedTrade {
            position_id,
            symbol: position.symbol.clone(),
            side: position.side,
            quantity,
            entry_price: position.entry_price,
            exit_price: price,
            realized_pnl: realized,
            return_pct,
            contributing_strategies: position.contributing_strategies.clone(),
            hedge: position.hedge,
            closed_at: at,
            fully_closed,
        };

        if fully_closed {
            // Stop state goes with the position
            self.positions.remove(&position_id);
        } else {
            position.mark(price);
        }
        self.realized_pnl += realized;
        Some(trade)
    }

    pub fn get(&self, position_id: &Uuid) -> Option<&Position> {
        self.positions.get(position_id)
    }

    pub fn get_mut(&mut self, position_id: &Uuid) -> Option<&mut Position> {
        self.positions.get_mut(position_id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn positions_mut(&mut self) -> impl Iterator<Item = &mut Position> {
        self.positions.values_mut()
    }

    pub fn for_symbol<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a Position> + 'a {
        self.positions.values().filter(move |p| p.symbol == symbol)
    }

    pub fn for_symbol_mut<'a>(
        &'a mut self,
        symbol: &'a str,
    ) -> impl Iterator<Item = &'a mut Position> + 'a {
        self.positions.values_mut().filter(move |p| p.symbol == symbol)
    }

    /// The ensemble-driven position for a symbol, ignoring hedges
    pub fn primary(&self, symbol: &str) -> Option<&Position> {
        self.positions
            .values()
            .find(|p| p.symbol == symbol && !p.hedge)
    }

    pub fn mark(&mut self, symbol: &str, price: Decimal) {
        for position in self.for_symbol_mut(symbol) {
            position.mark(price);
        }
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    /// Marked value of all open positions
    pub fn open_notional(&self) -> Decimal {
        self.positions.values().map(|p| p.notional()).sum()
    }

    /// Open notional per symbol
    pub fn exposure_by_symbol(&self) -> HashMap<String, Decimal> {
        let mut exposure: HashMap<String, Decimal> = HashMap::new();
        for p in self.positions.values() {
            *exposure.entry(p.symbol.clone()).or_default() += p.notional();
        }
        exposure
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Replace the book with persisted contents
    pub fn restore(&mut self, positions: Vec<Position>, realized_pnl: Decimal) {
        self.positions = positions
            .into_iter()
            .map(|mut p| {
                // Orders in flight at shutdown are gone
                p.exit_pending = false;
                (p.position_id, p)
            })
            .collect();
        self.realized_pnl = realized_pnl;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StopRuleConfig;
    use rust_decimal_macros::dec;

    fn position(symbol: &str, side: Side, entry: Decimal, size: Decimal) -> Position {
        Position {
            position_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            entry_price: entry,
            size,
            strategy_id: "trend".to_string(),
            contributing_strategies: vec!["trend".to_string()],
            opened_at: Utc::now(),
            last_price: entry,
            unrealized_pnl: dec!(0),
            flagged_weak: false,
            exit_pending: false,
            hedge: false,
            stop_state: TrailingStopState::new(&StopRuleConfig::default(), entry),
        }
    }

    #[test]
    fn test_mark_long_and_short() {
        let mut long = position("BTCUSDT", Side::Long, dec!(100), dec!(2));
        let mut short = position("BTCUSDT", Side::Short, dec!(100), dec!(2));
        long.mark(dec!(110));
        short.mark(dec!(110));
        assert_eq!(long.unrealized_pnl, dec!(20));
        assert_eq!(short.unrealized_pnl, dec!(-20));
        assert_eq!(long.profit_pct(dec!(110)), dec!(0.1));
        assert_eq!(short.profit_pct(dec!(90)), dec!(0.1));
    }

    #[test]
    fn test_close_realizes_pnl_and_removes() {
        let mut book = PositionBook::new();
        let p = position("BTCUSDT", Side::Long, dec!(100), dec!(2));
        let id = p.position_id;
        book.open(p, dec!(0.2));

        let trade = book.close(id, dec!(2), dec!(110), dec!(0.22), Utc::now()).unwrap();
        assert!(trade.fully_closed);
        assert_eq!(trade.realized_pnl, dec!(19.78));
        assert_eq!(book.realized_pnl(), dec!(19.58));
        assert!(book.is_empty());
    }

    #[test]
    fn test_partial_close_keeps_remainder() {
        let mut book = PositionBook::new();
        let p = position("ETHUSDT", Side::Short, dec!(2000), dec!(1));
        let id = p.position_id;
        book.open(p, dec!(0));

        let trade = book.close(id, dec!(0.5), dec!(1900), dec!(0), Utc::now()).unwrap();
        assert!(!trade.fully_closed);
        assert_eq!(trade.realized_pnl, dec!(50));
        assert_eq!(trade.return_pct, dec!(0.05));
        let remaining = book.get(&id).unwrap();
        assert_eq!(remaining.size, dec!(0.5));
        assert_eq!(remaining.unrealized_pnl, dec!(50));
    }

    #[test]
    fn test_primary_ignores_hedges() {
        let mut book = PositionBook::new();
        let mut hedge = position("BTCUSDT", Side::Short, dec!(100), dec!(1));
        hedge.hedge = true;
        book.open(hedge, dec!(0));
        assert!(book.primary("BTCUSDT").is_none());

        let p = position("BTCUSDT", Side::Long, dec!(100), dec!(1));
        let id = p.position_id;
        book.open(p, dec!(0));
        assert_eq!(book.primary("BTCUSDT").unwrap().position_id, id);
        assert_eq!(book.for_symbol("BTCUSDT").count(), 2);
    }

    #[test]
    fn test_exposure_by_symbol() {
        let mut book = PositionBook::new();
        book.open(position("BTCUSDT", Side::Long, dec!(100), dec!(2)), dec!(0));
        book.open(position("ETHUSDT", Side::Short, dec!(50), dec!(1)), dec!(0));
        book.mark("BTCUSDT", dec!(110));

        let exposure = book.exposure_by_symbol();
        assert_eq!(exposure["BTCUSDT"], dec!(220));
        assert_eq!(exposure["ETHUSDT"], dec!(50));
        assert_eq!(book.open_notional(), dec!(270));
        assert_eq!(book.unrealized_pnl(), dec!(20));
    }
}
