//! Portfolio state and equity tracking.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::position::{ClosedTrade, Position};
use super::symbol::Symbol;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub total_fees: f64,
    pub positions: HashMap<Symbol, Position>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            total_fees: 0.0,
            positions: HashMap::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.symbol.clone(), position);
    }

    pub fn get_position(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn get_position_mut(&mut self, symbol: &Symbol) -> Option<&mut Position> {
        self.positions.get_mut(symbol)
    }

    pub fn remove_position(&mut self, symbol: &Symbol) -> Option<Position> {
        self.positions.remove(symbol)
    }

    /// Signed quantity held, zero when flat.
    pub fn quantity(&self, symbol: &Symbol) -> i64 {
        self.positions.get(symbol).map(|p| p.quantity).unwrap_or(0)
    }

    /// True when any position is open.
    pub fn invested(&self) -> bool {
        self.positions.values().any(|p| p.quantity != 0)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.closed_trades.push(trade);
    }

    /// One point per date; a later call on the same date replaces the value.
    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        match self.equity_curve.last_mut() {
            Some(last) if last.date == date => last.equity = equity,
            _ => self.equity_curve.push(EquityPoint { date, equity }),
        }
    }

    /// Cash plus signed holdings value. Positions without a price are
    /// valued at their average price.
    pub fn total_equity(&self, price_map: &HashMap<Symbol, f64>) -> f64 {
        let holdings: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = price_map
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.average_price);
                pos.holdings_value(price)
            })
            .sum();
        self.cash + holdings
    }
}
