//! Data access port trait.
//!
//! Adapters return [`FinecheckError::NoData`] when a ticker has no data of the
//! requested type at all; the backtest host treats that as an empty result.

use crate::domain::data::{DataType, TradeBar};
use crate::domain::error::FinecheckError;
use crate::domain::fundamental::FineFundamental;
use crate::domain::symbol::Symbol;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// Minute bars whose start time falls in `[start, end]`, oldest first.
    fn fetch_trade_bars(
        &self,
        symbol: &Symbol,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<TradeBar>, FinecheckError>;

    /// Fine fundamental snapshots for the underlying of `symbol` dated in
    /// `[start, end]`, oldest first, keyed by `symbol`.
    fn fetch_fine_fundamentals(
        &self,
        symbol: &Symbol,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<FineFundamental>, FinecheckError>;

    fn list_tickers(&self) -> Result<Vec<String>, FinecheckError>;

    fn get_data_range(
        &self,
        ticker: &str,
        data_type: DataType,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, FinecheckError>;
}
