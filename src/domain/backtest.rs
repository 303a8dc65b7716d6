//! Backtest host and event loop.
//!
//! [`Backtest`] implements [`HostPort`] over a [`DataPort`]: it records the
//! algorithm's window and subscriptions during `initialize`, loads every
//! subscription's data for the window, merges it into one timeline of
//! [`Slice`]s and replays them in timestamp order.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::algorithm::Algorithm;
use super::data::{BaseData, DataType};
use super::error::FinecheckError;
use super::execution::{self, ExecutionConfig, HoldingsResult, OrderEvent};
use super::portfolio::Portfolio;
use super::resolution::Resolution;
use super::security::{SecurityManager, Subscription};
use super::slice::Slice;
use super::symbol::Symbol;
use crate::ports::data_port::DataPort;
use crate::ports::host_port::HostPort;

/// How far back a history request may reach.
pub const HISTORY_LOOKBACK_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub allow_shorting: bool,
    pub risk_free_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100_000.0,
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            allow_shorting: false,
            risk_free_rate: 0.0,
        }
    }
}

impl BacktestConfig {
    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_per_trade: self.commission_per_trade,
            commission_pct: self.commission_pct,
            slippage_pct: self.slippage_pct,
            allow_shorting: self.allow_shorting,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub algorithm: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub portfolio: Portfolio,
    pub orders: Vec<OrderEvent>,
    pub slices_processed: usize,
    pub data_points: usize,
    pub final_equity: f64,
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}

pub struct Backtest<'a> {
    data_port: &'a dyn DataPort,
    config: BacktestConfig,
    window: Option<(NaiveDate, NaiveDate)>,
    time: NaiveDateTime,
    initializing: bool,
    securities: SecurityManager,
    portfolio: Portfolio,
    orders: Vec<OrderEvent>,
    next_order_id: u64,
}

impl<'a> Backtest<'a> {
    pub fn new(data_port: &'a dyn DataPort, config: BacktestConfig) -> Self {
        let portfolio = Portfolio::new(config.initial_capital);
        Backtest {
            data_port,
            config,
            window: None,
            time: NaiveDateTime::default(),
            initializing: true,
            securities: SecurityManager::default(),
            portfolio,
            orders: Vec::new(),
            next_order_id: 1,
        }
    }

    pub fn securities(&self) -> &SecurityManager {
        &self.securities
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn total_equity(&self) -> f64 {
        self.portfolio.total_equity(&self.securities.price_map())
    }

    /// Run `algorithm` to completion. The first error from any callback
    /// aborts the run and is returned as is.
    pub fn run(mut self, algorithm: &mut dyn Algorithm) -> Result<BacktestResult, FinecheckError> {
        info!(algorithm = algorithm.name(), "initializing algorithm");
        algorithm.initialize(&mut self)?;
        self.initializing = false;

        let (start, end) = self.window.ok_or_else(|| FinecheckError::InvalidWindow {
            reason: "algorithm did not set a simulation window".into(),
        })?;
        if self.securities.subscriptions().is_empty() {
            return Err(FinecheckError::AlgorithmState {
                reason: "algorithm did not subscribe to any data".into(),
            });
        }

        let slices = self.load_slices(start, end)?;
        let data_points: usize = slices.iter().map(Slice::len).sum();
        info!(
            %start,
            %end,
            slices = slices.len(),
            data_points,
            "running backtest"
        );

        for slice in &slices {
            self.time = slice.time;
            for data in slice.iter() {
                self.securities.update(data);
            }
            algorithm.on_data(&mut self, slice)?;

            let equity = self.total_equity();
            self.portfolio.record_equity(slice.time.date(), equity);
        }

        self.time = start_of_day(end) + Duration::days(1);
        algorithm.on_end_of_algorithm(&mut self)?;

        let final_equity = self.total_equity();
        info!(
            orders = self.orders.len(),
            final_equity, "backtest complete"
        );

        Ok(BacktestResult {
            algorithm: algorithm.name().to_string(),
            start_date: start,
            end_date: end,
            portfolio: self.portfolio,
            orders: self.orders,
            slices_processed: slices.len(),
            data_points,
            final_equity,
        })
    }

    fn ensure_initializing(&self, operation: &str) -> Result<(), FinecheckError> {
        if self.initializing {
            Ok(())
        } else {
            Err(FinecheckError::AlgorithmState {
                reason: format!("{operation} is only allowed during initialize"),
            })
        }
    }

    /// Fetch `data_type` for `symbol`; a missing data set reads as empty.
    fn fetch(
        &self,
        data_type: DataType,
        symbol: &Symbol,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<BaseData>, FinecheckError> {
        let result = match data_type {
            DataType::TradeBar => self
                .data_port
                .fetch_trade_bars(symbol, from, to)
                .map(|bars| bars.into_iter().map(BaseData::TradeBar).collect()),
            DataType::FineFundamental => self
                .data_port
                .fetch_fine_fundamentals(symbol, from, to)
                .map(|records| records.into_iter().map(BaseData::Fine).collect()),
        };

        match result {
            Err(FinecheckError::NoData { ticker, data_type }) => {
                warn!(%ticker, %data_type, "no data available");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Merge every subscription's data in `[start, end]` into one timeline.
    /// Points sharing a timestamp land in the same slice, in subscription order.
    fn load_slices(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Slice>, FinecheckError> {
        let from = start_of_day(start);
        let until = start_of_day(end) + Duration::days(1);
        let mut timeline: BTreeMap<NaiveDateTime, Slice> = BTreeMap::new();

        for Subscription {
            symbol, data_type, ..
        } in self.securities.subscriptions()
        {
            let points = self.fetch(*data_type, symbol, from, until - Duration::seconds(1))?;
            debug!(%symbol, %data_type, points = points.len(), "loaded subscription");

            for point in points {
                let time = point.end_time();
                if time < from || time >= until {
                    continue;
                }
                timeline
                    .entry(time)
                    .or_insert_with(|| Slice::new(time))
                    .push(point);
            }
        }

        Ok(timeline.into_values().collect())
    }
}

impl HostPort for Backtest<'_> {
    fn time(&self) -> NaiveDateTime {
        self.time
    }

    fn set_simulation_window(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(), FinecheckError> {
        self.ensure_initializing("set_simulation_window")?;
        if start > end {
            return Err(FinecheckError::InvalidWindow {
                reason: format!("start {start} is after end {end}"),
            });
        }
        self.window = Some((start, end));
        self.time = start_of_day(start);
        Ok(())
    }

    fn add_equity(
        &mut self,
        ticker: &str,
        resolution: Resolution,
    ) -> Result<Symbol, FinecheckError> {
        self.ensure_initializing("add_equity")?;
        if resolution != Resolution::Minute {
            return Err(FinecheckError::AlgorithmState {
                reason: format!("{resolution} equity data is not available, use minute"),
            });
        }
        let symbol = Symbol::equity(ticker);
        self.securities.subscribe(Subscription {
            symbol: symbol.clone(),
            data_type: DataType::TradeBar,
            resolution,
        });
        debug!(%symbol, %resolution, "added equity");
        Ok(symbol)
    }

    fn add_data(
        &mut self,
        data_type: DataType,
        underlying: &Symbol,
    ) -> Result<Symbol, FinecheckError> {
        self.ensure_initializing("add_data")?;
        let symbol = match data_type {
            DataType::FineFundamental => Symbol::fundamental(underlying),
            DataType::TradeBar => {
                return Err(FinecheckError::AlgorithmState {
                    reason: "trade bars are subscribed with add_equity".into(),
                });
            }
        };
        self.securities.subscribe(Subscription {
            symbol: symbol.clone(),
            data_type,
            resolution: Resolution::Daily,
        });
        debug!(%symbol, %data_type, "added custom data");
        Ok(symbol)
    }

    fn history(
        &mut self,
        data_type: DataType,
        symbol: &Symbol,
        count: usize,
    ) -> Result<Vec<BaseData>, FinecheckError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let now = self.time;
        let from = now - Duration::days(HISTORY_LOOKBACK_DAYS);

        let mut points = self.fetch(data_type, symbol, from, now)?;
        points.retain(|p| p.end_time() < now);
        let skip = points.len().saturating_sub(count);
        let points: Vec<BaseData> = points.into_iter().skip(skip).collect();

        info!(%symbol, %data_type, requested = count, returned = points.len(), "history request");
        Ok(points)
    }

    fn get_cached(&self, symbol: &Symbol, data_type: DataType) -> Option<&BaseData> {
        self.securities
            .get(symbol)
            .and_then(|security| security.cache.get(data_type))
    }

    fn is_invested(&self) -> bool {
        self.portfolio.invested()
    }

    fn set_holdings(
        &mut self,
        symbol: &Symbol,
        fraction: f64,
    ) -> Result<Option<OrderEvent>, FinecheckError> {
        if !fraction.is_finite() || !(-1.0..=1.0).contains(&fraction) {
            return Err(FinecheckError::InvalidOrder {
                symbol: symbol.to_string(),
                reason: format!("target fraction {fraction} outside [-1, 1]"),
            });
        }
        if fraction < 0.0 && !self.config.allow_shorting {
            return Err(FinecheckError::InvalidOrder {
                symbol: symbol.to_string(),
                reason: "shorting is disabled".into(),
            });
        }
        if !symbol.is_equity() {
            return Err(FinecheckError::InvalidOrder {
                symbol: symbol.to_string(),
                reason: "only equities are tradable".into(),
            });
        }

        let security = self
            .securities
            .get(symbol)
            .ok_or_else(|| FinecheckError::UnknownSymbol {
                symbol: symbol.to_string(),
            })?;
        let Some(price) = security.price() else {
            warn!(%symbol, time = %self.time, "no price yet, order skipped");
            return Ok(None);
        };

        let prices = self.securities.price_map();
        let result = execution::set_holdings(
            &mut self.portfolio,
            symbol,
            fraction,
            price,
            self.time,
            &prices,
            self.next_order_id,
            &self.config.execution_config(),
        );

        match result {
            HoldingsResult::Filled(order) => {
                info!(
                    id = order.id,
                    %symbol,
                    quantity = order.quantity,
                    fill_price = order.fill_price,
                    time = %order.time,
                    "order filled"
                );
                self.next_order_id += 1;
                self.orders.push(order.clone());
                Ok(Some(order))
            }
            HoldingsResult::AlreadyAtTarget => Ok(None),
            HoldingsResult::InsufficientCapital => {
                warn!(%symbol, fraction, cash = self.portfolio.cash, "insufficient capital");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::data::TradeBar;
    use crate::domain::fundamental::FineFundamental;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        date(2014, 6, d).and_hms_opt(h, m, 0).unwrap()
    }

    /// Serves one bar per day at 09:31 and one fine record per day.
    struct DailyPort;

    impl DataPort for DailyPort {
        fn fetch_trade_bars(
            &self,
            symbol: &Symbol,
            start: NaiveDateTime,
            end: NaiveDateTime,
        ) -> Result<Vec<TradeBar>, FinecheckError> {
            Ok((1..=20)
                .map(|d| TradeBar {
                    symbol: symbol.clone(),
                    time: at(d, 9, 30),
                    end_time: at(d, 9, 31),
                    open: 90.0 + d as f64,
                    high: 91.0 + d as f64,
                    low: 89.0 + d as f64,
                    close: 90.0 + d as f64,
                    volume: 1_000,
                })
                .filter(|b| b.time >= start && b.time <= end)
                .collect())
        }

        fn fetch_fine_fundamentals(
            &self,
            symbol: &Symbol,
            start: NaiveDateTime,
            end: NaiveDateTime,
        ) -> Result<Vec<FineFundamental>, FinecheckError> {
            Ok((1..=20)
                .map(|d| FineFundamental::new(symbol.clone(), at(d, 0, 0)))
                .filter(|f| f.time >= start && f.time <= end)
                .collect())
        }

        fn list_tickers(&self) -> Result<Vec<String>, FinecheckError> {
            Ok(vec!["AAPL".into()])
        }

        fn get_data_range(
            &self,
            _ticker: &str,
            _data_type: DataType,
        ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, FinecheckError> {
            Ok(None)
        }
    }

    struct MissingPort;

    impl DataPort for MissingPort {
        fn fetch_trade_bars(
            &self,
            symbol: &Symbol,
            _start: NaiveDateTime,
            _end: NaiveDateTime,
        ) -> Result<Vec<TradeBar>, FinecheckError> {
            Err(FinecheckError::NoData {
                ticker: symbol.ticker.clone(),
                data_type: DataType::TradeBar,
            })
        }

        fn fetch_fine_fundamentals(
            &self,
            symbol: &Symbol,
            _start: NaiveDateTime,
            _end: NaiveDateTime,
        ) -> Result<Vec<FineFundamental>, FinecheckError> {
            Err(FinecheckError::NoData {
                ticker: symbol.ticker.clone(),
                data_type: DataType::FineFundamental,
            })
        }

        fn list_tickers(&self) -> Result<Vec<String>, FinecheckError> {
            Ok(vec![])
        }

        fn get_data_range(
            &self,
            _ticker: &str,
            _data_type: DataType,
        ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, FinecheckError> {
            Ok(None)
        }
    }

    /// Buys on the first bar, records how many slices it saw.
    struct BuyFirstBar {
        equity: Option<Symbol>,
        slices: usize,
        ended: bool,
    }

    impl BuyFirstBar {
        fn new() -> Self {
            BuyFirstBar {
                equity: None,
                slices: 0,
                ended: false,
            }
        }
    }

    impl Algorithm for BuyFirstBar {
        fn name(&self) -> &str {
            "BuyFirstBar"
        }

        fn initialize(&mut self, host: &mut dyn HostPort) -> Result<(), FinecheckError> {
            host.set_simulation_window(date(2014, 6, 5), date(2014, 6, 10))?;
            let equity = host.add_equity("AAPL", Resolution::Minute)?;
            host.add_data(DataType::FineFundamental, &equity)?;
            self.equity = Some(equity);
            Ok(())
        }

        fn on_data(&mut self, host: &mut dyn HostPort, _slice: &Slice) -> Result<(), FinecheckError> {
            self.slices += 1;
            if let Some(equity) = self.equity.clone() {
                if !host.is_invested() {
                    host.set_holdings(&equity, 1.0)?;
                }
            }
            Ok(())
        }

        fn on_end_of_algorithm(&mut self, _host: &mut dyn HostPort) -> Result<(), FinecheckError> {
            self.ended = true;
            Ok(())
        }
    }

    struct NoWindow;

    impl Algorithm for NoWindow {
        fn name(&self) -> &str {
            "NoWindow"
        }

        fn initialize(&mut self, host: &mut dyn HostPort) -> Result<(), FinecheckError> {
            host.add_equity("AAPL", Resolution::Minute)?;
            Ok(())
        }

        fn on_data(&mut self, _host: &mut dyn HostPort, _slice: &Slice) -> Result<(), FinecheckError> {
            Ok(())
        }
    }

    #[test]
    fn run_replays_window_in_order() {
        let port = DailyPort;
        let mut algo = BuyFirstBar::new();
        let result = Backtest::new(&port, BacktestConfig::default())
            .run(&mut algo)
            .unwrap();

        // 6 days, each with a midnight fine slice and a 09:31 bar slice
        assert_eq!(result.slices_processed, 12);
        assert_eq!(result.data_points, 12);
        assert!(algo.ended);
        assert_eq!(algo.slices, 12);
        assert_eq!(result.portfolio.equity_curve.len(), 6);
        assert_eq!(result.start_date, date(2014, 6, 5));
    }

    #[test]
    fn first_order_waits_for_a_price() {
        let port = DailyPort;
        let mut algo = BuyFirstBar::new();
        let result = Backtest::new(&port, BacktestConfig::default())
            .run(&mut algo)
            .unwrap();

        assert_eq!(result.orders.len(), 1);
        assert_eq!(result.orders[0].time, at(5, 9, 31));
        assert_eq!(result.orders[0].fill_price, 95.0);
        assert_eq!(result.orders[0].id, 1);
    }

    #[test]
    fn missing_window_is_rejected() {
        let port = DailyPort;
        let err = Backtest::new(&port, BacktestConfig::default())
            .run(&mut NoWindow)
            .unwrap_err();
        assert!(matches!(err, FinecheckError::InvalidWindow { .. }));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let port = DailyPort;
        let mut host = Backtest::new(&port, BacktestConfig::default());
        let err = host
            .set_simulation_window(date(2014, 6, 10), date(2014, 6, 5))
            .unwrap_err();
        assert!(matches!(err, FinecheckError::InvalidWindow { .. }));
    }

    #[test]
    fn history_returns_last_records_before_now() {
        let port = DailyPort;
        let mut host = Backtest::new(&port, BacktestConfig::default());
        host.set_simulation_window(date(2014, 6, 5), date(2014, 6, 10))
            .unwrap();
        let equity = host.add_equity("AAPL", Resolution::Minute).unwrap();
        let fine = host.add_data(DataType::FineFundamental, &equity).unwrap();

        let history = host.history(DataType::FineFundamental, &fine, 3).unwrap();
        let times: Vec<_> = history.iter().map(BaseData::end_time).collect();
        assert_eq!(times, vec![at(2, 0, 0), at(3, 0, 0), at(4, 0, 0)]);
        assert!(history.iter().all(|p| p.symbol() == &fine));

        assert!(host.history(DataType::FineFundamental, &fine, 0).unwrap().is_empty());
        assert_eq!(
            host.history(DataType::FineFundamental, &fine, 100).unwrap().len(),
            4
        );
    }

    #[test]
    fn missing_data_reads_as_empty() {
        let port = MissingPort;
        let mut host = Backtest::new(&port, BacktestConfig::default());
        host.set_simulation_window(date(2014, 6, 5), date(2014, 6, 10))
            .unwrap();
        let equity = host.add_equity("AAPL", Resolution::Minute).unwrap();
        let fine = host.add_data(DataType::FineFundamental, &equity).unwrap();

        assert!(host.history(DataType::FineFundamental, &fine, 10).unwrap().is_empty());

        let mut algo = BuyFirstBar::new();
        let result = Backtest::new(&port, BacktestConfig::default())
            .run(&mut algo)
            .unwrap();
        assert_eq!(result.slices_processed, 0);
        assert!(result.orders.is_empty());
    }

    #[test]
    fn set_holdings_guards() {
        let port = DailyPort;
        let mut host = Backtest::new(&port, BacktestConfig::default());
        host.set_simulation_window(date(2014, 6, 5), date(2014, 6, 10))
            .unwrap();
        let equity = host.add_equity("AAPL", Resolution::Minute).unwrap();
        let fine = host.add_data(DataType::FineFundamental, &equity).unwrap();

        assert!(matches!(
            host.set_holdings(&equity, 1.5),
            Err(FinecheckError::InvalidOrder { .. })
        ));
        assert!(matches!(
            host.set_holdings(&equity, -0.5),
            Err(FinecheckError::InvalidOrder { .. })
        ));
        assert!(matches!(
            host.set_holdings(&fine, 1.0),
            Err(FinecheckError::InvalidOrder { .. })
        ));
        assert!(matches!(
            host.set_holdings(&Symbol::equity("MSFT"), 1.0),
            Err(FinecheckError::UnknownSymbol { .. })
        ));
        assert_eq!(host.set_holdings(&equity, 1.0).unwrap(), None);
    }

    #[test]
    fn subscriptions_are_rejected_after_initialize() {
        let port = DailyPort;
        let mut host = Backtest::new(&port, BacktestConfig::default());
        host.initializing = false;
        assert!(matches!(
            host.add_equity("AAPL", Resolution::Minute),
            Err(FinecheckError::AlgorithmState { .. })
        ));
    }

    #[test]
    fn only_minute_equities() {
        let port = DailyPort;
        let mut host = Backtest::new(&port, BacktestConfig::default());
        assert!(host.add_equity("AAPL", Resolution::Daily).is_err());
        assert!(
            host.add_data(DataType::TradeBar, &Symbol::equity("AAPL"))
                .is_err()
        );
    }
}
