#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use finecheck::domain::backtest::BacktestConfig;
use finecheck::domain::data::{DataType, TradeBar};
use finecheck::domain::error::FinecheckError;
use finecheck::domain::fundamental::FineFundamental;
use finecheck::domain::symbol::Symbol;
use finecheck::ports::data_port::DataPort;
use std::collections::HashMap;

/// In-memory data keyed by ticker. Tickers with no entry for a data type
/// report `NoData`, like the file and database adapters.
pub struct MockDataPort {
    pub bars: HashMap<String, Vec<TradeBar>>,
    pub fine: HashMap<String, Vec<FineFundamental>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            fine: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<TradeBar>) -> Self {
        self.bars.entry(ticker.to_string()).or_default().extend(bars);
        self
    }

    pub fn with_fine(mut self, ticker: &str, records: Vec<FineFundamental>) -> Self {
        self.fine
            .entry(ticker.to_string())
            .or_default()
            .extend(records);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    fn check_error(&self, ticker: &str) -> Result<(), FinecheckError> {
        match self.errors.get(ticker) {
            Some(reason) => Err(FinecheckError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_trade_bars(
        &self,
        symbol: &Symbol,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<TradeBar>, FinecheckError> {
        self.check_error(&symbol.ticker)?;
        let bars = self
            .bars
            .get(&symbol.ticker)
            .ok_or_else(|| FinecheckError::NoData {
                ticker: symbol.ticker.clone(),
                data_type: DataType::TradeBar,
            })?;
        let mut selected: Vec<TradeBar> = bars
            .iter()
            .filter(|b| b.time >= start && b.time <= end)
            .map(|b| TradeBar {
                symbol: symbol.clone(),
                ..b.clone()
            })
            .collect();
        selected.sort_by_key(|b| b.time);
        Ok(selected)
    }

    fn fetch_fine_fundamentals(
        &self,
        symbol: &Symbol,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<FineFundamental>, FinecheckError> {
        self.check_error(&symbol.ticker)?;
        let records = self
            .fine
            .get(&symbol.ticker)
            .ok_or_else(|| FinecheckError::NoData {
                ticker: symbol.ticker.clone(),
                data_type: DataType::FineFundamental,
            })?;
        let mut selected: Vec<FineFundamental> = records
            .iter()
            .filter(|f| f.time >= start && f.time <= end)
            .map(|f| FineFundamental {
                symbol: symbol.clone(),
                ..f.clone()
            })
            .collect();
        selected.sort_by_key(|f| f.time);
        Ok(selected)
    }

    fn list_tickers(&self) -> Result<Vec<String>, FinecheckError> {
        let mut tickers: Vec<String> = self
            .bars
            .keys()
            .chain(self.fine.keys())
            .cloned()
            .collect();
        tickers.sort();
        tickers.dedup();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
        data_type: DataType,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, FinecheckError> {
        self.check_error(ticker)?;
        let times: Vec<NaiveDateTime> = match data_type {
            DataType::TradeBar => self
                .bars
                .get(ticker)
                .map(|b| b.iter().map(|b| b.time).collect())
                .unwrap_or_default(),
            DataType::FineFundamental => self
                .fine
                .get(ticker)
                .map(|f| f.iter().map(|f| f.time).collect())
                .unwrap_or_default(),
        };
        match (times.iter().min(), times.iter().max()) {
            (Some(min), Some(max)) => Ok(Some((*min, *max, times.len()))),
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(d: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
    d.and_hms_opt(h, m, 0).unwrap()
}

/// The four trading days inside the 2014-06-05..2014-06-10 window.
pub fn trading_days() -> Vec<NaiveDate> {
    vec![
        date(2014, 6, 5),
        date(2014, 6, 6),
        date(2014, 6, 9),
        date(2014, 6, 10),
    ]
}

pub fn make_bar(ticker: &str, time: NaiveDateTime, close: f64) -> TradeBar {
    TradeBar {
        symbol: Symbol::equity(ticker),
        time,
        end_time: time + Duration::minutes(1),
        open: close - 0.05,
        high: close + 0.10,
        low: close - 0.10,
        close,
        volume: 10_000,
    }
}

/// A few minute bars per trading day starting at 09:30, drifting up.
pub fn minute_bars(ticker: &str, days: &[NaiveDate], start_price: f64) -> Vec<TradeBar> {
    let mut bars = Vec::new();
    let mut price = start_price;
    for day in days {
        for minute in 0..5 {
            bars.push(make_bar(ticker, at(*day, 9, 30 + minute), price));
            price += 0.05;
        }
    }
    bars
}

pub fn make_fine(ticker: &str, day: NaiveDate, growth_1y: f64) -> FineFundamental {
    let mut fine = FineFundamental::new(
        Symbol::fundamental(&Symbol::equity(ticker)),
        at(day, 0, 0),
    );
    fine.market_cap = 556_210_000_000.0;
    fine.valuation_ratios.pe_ratio = 15.12;
    fine.earning_ratios.equity_per_share_growth.one_year = growth_1y;
    fine
}

/// One snapshot per weekday in `[from, to]`.
pub fn fine_weekdays(
    ticker: &str,
    from: NaiveDate,
    to: NaiveDate,
    growth_1y: f64,
) -> Vec<FineFundamental> {
    use chrono::Datelike;

    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| d.weekday().number_from_monday() <= 5)
        .map(|d| make_fine(ticker, d, growth_1y))
        .collect()
}

/// Bars in the window and fine data from a month before through the end.
pub fn aapl_port(growth_1y: f64) -> MockDataPort {
    MockDataPort::new()
        .with_bars("AAPL", minute_bars("AAPL", &trading_days(), 92.30))
        .with_fine(
            "AAPL",
            fine_weekdays("AAPL", date(2014, 5, 1), date(2014, 6, 10), growth_1y),
        )
}

pub fn default_config() -> BacktestConfig {
    BacktestConfig::default()
}
