//! Market data payloads and typed lookup.
//!
//! Everything the host delivers is a [`BaseData`]. Algorithms pull the payload
//! they care about back out by type through [`DataKind`], so a slice or a
//! history result can be filtered with `of_type::<FineFundamental>()` without
//! any runtime reflection.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::fundamental::FineFundamental;
use super::symbol::Symbol;

/// Type tag for a data subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    TradeBar,
    FineFundamental,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::TradeBar => write!(f, "TradeBar"),
            DataType::FineFundamental => write!(f, "FineFundamental"),
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tradebar" | "trade_bar" | "minute" => Ok(DataType::TradeBar),
            "finefundamental" | "fine_fundamental" | "fine" => Ok(DataType::FineFundamental),
            other => Err(format!("unknown data type '{other}'")),
        }
    }
}

/// OHLCV price bar covering `[time, end_time)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeBar {
    pub symbol: Symbol,
    pub time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// One delivered data point.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseData {
    TradeBar(TradeBar),
    Fine(FineFundamental),
}

impl BaseData {
    pub fn data_type(&self) -> DataType {
        match self {
            BaseData::TradeBar(_) => DataType::TradeBar,
            BaseData::Fine(_) => DataType::FineFundamental,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        match self {
            BaseData::TradeBar(bar) => &bar.symbol,
            BaseData::Fine(fine) => &fine.symbol,
        }
    }

    /// Time at which the point becomes visible to an algorithm.
    pub fn end_time(&self) -> NaiveDateTime {
        match self {
            BaseData::TradeBar(bar) => bar.end_time,
            BaseData::Fine(fine) => fine.time,
        }
    }

    /// Price implied by the point, if any.
    pub fn price(&self) -> Option<f64> {
        match self {
            BaseData::TradeBar(bar) => Some(bar.close),
            BaseData::Fine(_) => None,
        }
    }
}

/// Typed view into a [`BaseData`].
pub trait DataKind: Sized {
    const DATA_TYPE: DataType;

    fn from_data(data: &BaseData) -> Option<&Self>;
}

impl DataKind for TradeBar {
    const DATA_TYPE: DataType = DataType::TradeBar;

    fn from_data(data: &BaseData) -> Option<&Self> {
        match data {
            BaseData::TradeBar(bar) => Some(bar),
            _ => None,
        }
    }
}

impl DataKind for FineFundamental {
    const DATA_TYPE: DataType = DataType::FineFundamental;

    fn from_data(data: &BaseData) -> Option<&Self> {
        match data {
            BaseData::Fine(fine) => Some(fine),
            _ => None,
        }
    }
}

/// Keep only the points of type `T`, preserving order.
pub fn of_type<T: DataKind>(data: &[BaseData]) -> Vec<&T> {
    data.iter().filter_map(T::from_data).collect()
}
