//! Run statistics derived from a finished backtest.

use std::collections::BTreeMap;

use super::backtest::BacktestResult;
use super::portfolio::EquityPoint;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub total_orders: usize,
    pub total_fees: f64,
    pub start_equity: f64,
    pub end_equity: f64,
    /// Net profit as a fraction of starting equity.
    pub net_profit: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: i64,
    pub sharpe_ratio: f64,
    pub trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
}

impl Statistics {
    pub fn compute(result: &BacktestResult, risk_free_rate: f64) -> Self {
        let portfolio = &result.portfolio;
        let equity_curve = &portfolio.equity_curve;
        let start_equity = portfolio.initial_capital;
        let end_equity = result.final_equity;

        let net_profit = if start_equity > 0.0 {
            (end_equity - start_equity) / start_equity
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && net_profit > -1.0 {
            (1.0 + net_profit).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let sharpe_ratio =
            compute_sharpe(equity_curve, risk_free_rate / TRADING_DAYS_PER_YEAR);

        let trades = portfolio.closed_trades.len();
        let trades_won = portfolio
            .closed_trades
            .iter()
            .filter(|t| t.pnl > 0.0)
            .count();
        let trades_lost = portfolio
            .closed_trades
            .iter()
            .filter(|t| t.pnl < 0.0)
            .count();
        let win_rate = if trades > 0 {
            trades_won as f64 / trades as f64
        } else {
            0.0
        };

        Statistics {
            total_orders: result.orders.len(),
            total_fees: portfolio.total_fees,
            start_equity,
            end_equity,
            net_profit,
            annualized_return,
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            trades,
            trades_won,
            trades_lost,
            win_rate,
        }
    }

    /// Labelled, formatted values keyed the way expected-statistics tables
    /// name them.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("Total Orders".into(), self.total_orders.to_string());
        map.insert("Net Profit".into(), percent(self.net_profit));
        map.insert(
            "Compounding Annual Return".into(),
            percent(self.annualized_return),
        );
        map.insert("Drawdown".into(), percent(self.max_drawdown));
        map.insert("Sharpe Ratio".into(), format!("{:.3}", self.sharpe_ratio));
        map.insert("Win Rate".into(), format!("{:.0}%", self.win_rate * 100.0));
        map.insert("Total Fees".into(), format!("${:.2}", self.total_fees));
        map.insert("Start Equity".into(), format!("{:.2}", self.start_equity));
        map.insert("End Equity".into(), format!("{:.2}", self.end_equity));
        map
    }
}

fn percent(fraction: f64) -> String {
    format!("{:.3}%", fraction * 100.0)
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0i64;
    let mut duration = 0i64;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}

fn compute_sharpe(equity_curve: &[EquityPoint], daily_rf: f64) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                (w[1].equity - w[0].equity) / w[0].equity
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        (mean - daily_rf) / stddev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::OrderEvent;
    use crate::domain::portfolio::Portfolio;
    use crate::domain::position::ClosedTrade;
    use crate::domain::symbol::Symbol;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2014, 6, 2).unwrap() + Duration::days(i)
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                date: day(i as i64),
                equity,
            })
            .collect()
    }

    fn result_with(equity: &[f64], orders: usize, trades: Vec<ClosedTrade>) -> BacktestResult {
        let mut portfolio = Portfolio::new(equity[0]);
        for point in curve(equity) {
            portfolio.record_equity(point.date, point.equity);
        }
        for trade in trades {
            portfolio.record_trade(trade);
        }
        portfolio.total_fees = 2.5;
        let time = day(0).and_hms_opt(9, 31, 0).unwrap();
        BacktestResult {
            algorithm: "Test".into(),
            start_date: day(0),
            end_date: day(equity.len() as i64 - 1),
            portfolio,
            orders: (0..orders as u64)
                .map(|id| OrderEvent {
                    id,
                    time,
                    symbol: Symbol::equity("AAPL"),
                    quantity: 10,
                    fill_price: 92.0,
                    commission: 0.0,
                    target_fraction: 1.0,
                })
                .collect(),
            slices_processed: equity.len(),
            data_points: equity.len(),
            final_equity: *equity.last().unwrap(),
        }
    }

    fn trade(pnl: f64) -> ClosedTrade {
        let time = day(0).and_hms_opt(9, 31, 0).unwrap();
        ClosedTrade {
            symbol: Symbol::equity("AAPL"),
            quantity: 10,
            entry_price: 90.0,
            exit_price: 90.0 + pnl / 10.0,
            entry_time: time,
            exit_time: time + Duration::days(1),
            pnl,
        }
    }

    #[test]
    fn net_profit_and_orders() {
        let result = result_with(&[100_000.0, 101_000.0, 102_000.0], 1, vec![]);
        let stats = Statistics::compute(&result, 0.0);
        assert_eq!(stats.total_orders, 1);
        assert_relative_eq!(stats.net_profit, 0.02, epsilon = 1e-12);
        assert_relative_eq!(stats.total_fees, 2.5);
        assert!(stats.annualized_return > stats.net_profit);
    }

    #[test]
    fn flat_curve_has_zero_risk_numbers() {
        let result = result_with(&[50_000.0, 50_000.0, 50_000.0], 0, vec![]);
        let stats = Statistics::compute(&result, 0.02);
        assert_eq!(stats.max_drawdown, 0.0);
        assert_eq!(stats.sharpe_ratio, 0.0);
        assert_eq!(stats.win_rate, 0.0);
    }

    #[test]
    fn drawdown_from_running_peak() {
        let (dd, duration) = compute_drawdown(&curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 120.0]));
        assert_relative_eq!(dd, 30.0 / 110.0, epsilon = 1e-12);
        assert_eq!(duration, 3);
    }

    #[test]
    fn sharpe_positive_for_rising_noisy_curve() {
        let sharpe = compute_sharpe(&curve(&[100.0, 102.0, 101.0, 104.0, 106.0]), 0.0);
        assert!(sharpe > 0.0);
    }

    #[test]
    fn win_rate_counts_closed_trades() {
        let result = result_with(
            &[100_000.0, 100_100.0],
            4,
            vec![trade(100.0), trade(-20.0), trade(50.0), trade(0.0)],
        );
        let stats = Statistics::compute(&result, 0.0);
        assert_eq!(stats.trades, 4);
        assert_eq!(stats.trades_won, 2);
        assert_eq!(stats.trades_lost, 1);
        assert_relative_eq!(stats.win_rate, 0.5);
    }

    #[test]
    fn map_uses_labelled_strings() {
        let result = result_with(&[100_000.0, 101_234.0], 1, vec![]);
        let map = Statistics::compute(&result, 0.0).to_map();
        assert_eq!(map["Total Orders"], "1");
        assert_eq!(map["Net Profit"], "1.234%");
        assert_eq!(map["Drawdown"], "0.000%");
        assert_eq!(map["Win Rate"], "0%");
        assert_eq!(map["Total Fees"], "$2.50");
        assert_eq!(map["End Equity"], "101234.00");
    }
}
