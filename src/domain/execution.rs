//! Order sizing and fill simulation.
//!
//! Orders fill immediately at the current market price adjusted for slippage.
//! Commission is a flat fee plus a percentage of traded value. The only order
//! type is a portfolio-target directive: "hold `fraction` of total equity in
//! this symbol".

use chrono::NaiveDateTime;
use std::collections::HashMap;

use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Position};
use super::symbol::Symbol;

/// Configuration for fill simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub allow_shorting: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            allow_shorting: false,
        }
    }
}

/// A filled order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub id: u64,
    pub time: NaiveDateTime,
    pub symbol: Symbol,
    /// Signed: positive buys, negative sells.
    pub quantity: i64,
    pub fill_price: f64,
    pub commission: f64,
    pub target_fraction: f64,
}

impl OrderEvent {
    pub fn value(&self) -> f64 {
        self.quantity.unsigned_abs() as f64 * self.fill_price
    }
}

/// Outcome of a `set_holdings` directive.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldingsResult {
    Filled(OrderEvent),
    AlreadyAtTarget,
    InsufficientCapital,
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Buying fills above the market price.
pub fn apply_slippage_buy(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Selling fills below the market price.
pub fn apply_slippage_sell(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

/// Largest buy quantity whose cost plus commission fits in `cash`.
fn affordable_quantity(cash: f64, execution_price: f64, config: &ExecutionConfig) -> i64 {
    let per_share = execution_price * (1.0 + config.commission_pct / 100.0);
    let budget = cash - config.commission_per_trade;
    if budget <= 0.0 || per_share <= 0.0 {
        return 0;
    }
    (budget / per_share).floor() as i64
}

/// Rebalance `symbol` to `fraction` of total portfolio equity.
///
/// Steps:
/// 1. Value the portfolio at `price_map` (plus `market_price` for `symbol`)
/// 2. Pick the slippage side from the naive quantity delta
/// 3. Size the target in whole shares at the execution price
/// 4. Clamp buys to what the cash balance can pay for, commission included
/// 5. Apply the fill to cash, fees, positions and closed trades
#[allow(clippy::too_many_arguments)]
pub fn set_holdings(
    portfolio: &mut Portfolio,
    symbol: &Symbol,
    fraction: f64,
    market_price: f64,
    time: NaiveDateTime,
    price_map: &HashMap<Symbol, f64>,
    order_id: u64,
    config: &ExecutionConfig,
) -> HoldingsResult {
    let mut prices = price_map.clone();
    prices.insert(symbol.clone(), market_price);
    let total_equity = portfolio.total_equity(&prices);
    let target_value = total_equity * fraction;
    let current = portfolio.quantity(symbol);

    let naive_target = (target_value / market_price).trunc() as i64;
    let execution_price = if naive_target >= current {
        apply_slippage_buy(market_price, config.slippage_pct)
    } else {
        apply_slippage_sell(market_price, config.slippage_pct)
    };

    let target = (target_value / execution_price).trunc() as i64;
    let mut delta = target - current;

    if delta == 0 {
        return HoldingsResult::AlreadyAtTarget;
    }

    if delta > 0 {
        delta = delta.min(affordable_quantity(portfolio.cash, execution_price, config));
        if delta <= 0 {
            return HoldingsResult::InsufficientCapital;
        }
    }

    let commission = calculate_commission(delta.unsigned_abs() as f64 * execution_price, config);
    apply_fill(portfolio, symbol, delta, execution_price, commission, time);

    HoldingsResult::Filled(OrderEvent {
        id: order_id,
        time,
        symbol: symbol.clone(),
        quantity: delta,
        fill_price: execution_price,
        commission,
        target_fraction: fraction,
    })
}

/// Apply a signed fill to the portfolio.
///
/// Reducing or reversing a position realises PnL on the closed part, net of
/// this fill's commission, and records a [`ClosedTrade`].
pub fn apply_fill(
    portfolio: &mut Portfolio,
    symbol: &Symbol,
    delta: i64,
    price: f64,
    commission: f64,
    time: NaiveDateTime,
) {
    portfolio.cash -= delta as f64 * price + commission;
    portfolio.total_fees += commission;

    let Some(position) = portfolio.get_position(symbol).cloned() else {
        portfolio.add_position(Position {
            symbol: symbol.clone(),
            quantity: delta,
            average_price: price,
            entry_time: time,
        });
        return;
    };

    let current = position.quantity;
    let new_quantity = current + delta;

    if current.signum() == delta.signum() {
        let average = (current as f64 * position.average_price + delta as f64 * price)
            / new_quantity as f64;
        if let Some(pos) = portfolio.get_position_mut(symbol) {
            pos.quantity = new_quantity;
            pos.average_price = average;
        }
        return;
    }

    let closed = current.signum() * delta.unsigned_abs().min(current.unsigned_abs()) as i64;
    let pnl = closed as f64 * (price - position.average_price) - commission;
    portfolio.record_trade(ClosedTrade {
        symbol: symbol.clone(),
        quantity: closed,
        entry_price: position.average_price,
        exit_price: price,
        entry_time: position.entry_time,
        exit_time: time,
        pnl,
    });

    if new_quantity == 0 {
        portfolio.remove_position(symbol);
    } else if new_quantity.signum() == current.signum() {
        if let Some(pos) = portfolio.get_position_mut(symbol) {
            pos.quantity = new_quantity;
        }
    } else {
        // reversed through zero
        portfolio.add_position(Position {
            symbol: symbol.clone(),
            quantity: new_quantity,
            average_price: price,
            entry_time: time,
        });
    }
}
