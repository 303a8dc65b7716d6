//! CSV file data adapter.
//!
//! One directory holds `<TICKER>_minute.csv` trade bars and
//! `<TICKER>_fine.csv` fine fundamental snapshots.

use crate::domain::data::{DataType, TradeBar};
use crate::domain::error::FinecheckError;
use crate::domain::fundamental::FineFundamental;
use crate::domain::symbol::Symbol;
use crate::ports::data_port::DataPort;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

pub const MINUTE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str, data_type: DataType) -> PathBuf {
        let suffix = match data_type {
            DataType::TradeBar => "minute",
            DataType::FineFundamental => "fine",
        };
        self.base_path
            .join(format!("{}_{}.csv", ticker.to_uppercase(), suffix))
    }

    fn read_records(
        &self,
        ticker: &str,
        data_type: DataType,
    ) -> Result<Vec<StringRecord>, FinecheckError> {
        let path = self.csv_path(ticker, data_type);
        if !path.exists() {
            return Err(FinecheckError::NoData {
                ticker: ticker.to_string(),
                data_type,
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| FinecheckError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let records = rdr
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FinecheckError::Database {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
        debug!(path = %path.display(), rows = records.len(), "read csv file");
        Ok(records)
    }

    /// Every bar for `symbol`, oldest first.
    pub fn read_trade_bars(&self, symbol: &Symbol) -> Result<Vec<TradeBar>, FinecheckError> {
        let mut bars = self
            .read_records(&symbol.ticker, DataType::TradeBar)?
            .iter()
            .map(|record| parse_trade_bar(record, symbol))
            .collect::<Result<Vec<_>, _>>()?;
        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }

    /// Every fine snapshot for `symbol`, oldest first.
    pub fn read_fine_fundamentals(
        &self,
        symbol: &Symbol,
    ) -> Result<Vec<FineFundamental>, FinecheckError> {
        let mut records = self
            .read_records(&symbol.ticker, DataType::FineFundamental)?
            .iter()
            .map(|record| parse_fine(record, symbol))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|f| f.time);
        Ok(records)
    }
}

fn field<T: FromStr>(record: &StringRecord, index: usize, name: &str) -> Result<T, FinecheckError>
where
    T::Err: std::fmt::Display,
{
    record
        .get(index)
        .ok_or_else(|| FinecheckError::Database {
            reason: format!("missing {name} column"),
        })?
        .trim()
        .parse()
        .map_err(|e| FinecheckError::Database {
            reason: format!("invalid {name} value: {e}"),
        })
}

/// Optional ratio column; empty or absent reads as zero.
fn ratio(record: &StringRecord, index: usize, name: &str) -> Result<f64, FinecheckError> {
    match record.get(index).map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(_) => field(record, index, name),
    }
}

fn parse_trade_bar(record: &StringRecord, symbol: &Symbol) -> Result<TradeBar, FinecheckError> {
    let time_str: String = field(record, 0, "time")?;
    let time = NaiveDateTime::parse_from_str(&time_str, MINUTE_TIME_FORMAT).map_err(|e| {
        FinecheckError::Database {
            reason: format!("invalid time format: {e}"),
        }
    })?;

    Ok(TradeBar {
        symbol: symbol.clone(),
        time,
        end_time: time + Duration::minutes(1),
        open: field(record, 1, "open")?,
        high: field(record, 2, "high")?,
        low: field(record, 3, "low")?,
        close: field(record, 4, "close")?,
        volume: field(record, 5, "volume")?,
    })
}

fn parse_fine(record: &StringRecord, symbol: &Symbol) -> Result<FineFundamental, FinecheckError> {
    let date_str: String = field(record, 0, "date")?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        FinecheckError::Database {
            reason: format!("invalid date format: {e}"),
        }
    })?;

    let mut fine = FineFundamental::new(symbol.clone(), date.and_time(NaiveTime::default()));
    fine.market_cap = ratio(record, 1, "market_cap")?;
    fine.valuation_ratios.pe_ratio = ratio(record, 2, "pe_ratio")?;
    fine.valuation_ratios.pb_ratio = ratio(record, 3, "pb_ratio")?;
    fine.earning_ratios.diluted_eps_growth.one_year = ratio(record, 4, "eps_growth_1y")?;

    let growth = &mut fine.earning_ratios.equity_per_share_growth;
    growth.three_months = ratio(record, 5, "equity_per_share_growth_3m")?;
    growth.six_months = ratio(record, 6, "equity_per_share_growth_6m")?;
    growth.one_year = ratio(record, 7, "equity_per_share_growth_1y")?;
    growth.three_years = ratio(record, 8, "equity_per_share_growth_3y")?;
    growth.five_years = ratio(record, 9, "equity_per_share_growth_5y")?;
    Ok(fine)
}

impl DataPort for CsvAdapter {
    fn fetch_trade_bars(
        &self,
        symbol: &Symbol,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<TradeBar>, FinecheckError> {
        let mut bars = self.read_trade_bars(symbol)?;
        bars.retain(|b| b.time >= start && b.time <= end);
        Ok(bars)
    }

    fn fetch_fine_fundamentals(
        &self,
        symbol: &Symbol,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<FineFundamental>, FinecheckError> {
        let mut records = self.read_fine_fundamentals(symbol)?;
        records.retain(|f| f.time >= start && f.time <= end);
        Ok(records)
    }

    fn list_tickers(&self) -> Result<Vec<String>, FinecheckError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| FinecheckError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FinecheckError::Database {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            let ticker = name_str
                .strip_suffix("_minute.csv")
                .or_else(|| name_str.strip_suffix("_fine.csv"));
            if let Some(ticker) = ticker {
                tickers.push(ticker.to_string());
            }
        }

        tickers.sort();
        tickers.dedup();
        Ok(tickers)
    }

    fn get_data_range(
        &self,
        ticker: &str,
        data_type: DataType,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, FinecheckError> {
        let symbol = Symbol::equity(ticker);
        let times: Vec<NaiveDateTime> = match data_type {
            DataType::TradeBar => match self.read_trade_bars(&symbol) {
                Ok(bars) => bars.iter().map(|b| b.time).collect(),
                Err(FinecheckError::NoData { .. }) => return Ok(None),
                Err(e) => return Err(e),
            },
            DataType::FineFundamental => {
                match self.read_fine_fundamentals(&Symbol::fundamental(&symbol)) {
                    Ok(records) => records.iter().map(|f| f.time).collect(),
                    Err(FinecheckError::NoData { .. }) => return Ok(None),
                    Err(e) => return Err(e),
                }
            }
        };

        match (times.first(), times.last()) {
            (Some(first), Some(last)) => Ok(Some((*first, *last, times.len()))),
            _ => Ok(None),
        }
    }
}
