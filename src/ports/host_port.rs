//! The host contract an algorithm is written against.
//!
//! The host owns time, subscriptions, the data cache and the portfolio; the
//! algorithm only reacts to callbacks and issues requests through this trait.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::data::{BaseData, DataType};
use crate::domain::error::FinecheckError;
use crate::domain::execution::OrderEvent;
use crate::domain::resolution::Resolution;
use crate::domain::symbol::Symbol;

pub trait HostPort {
    /// Current algorithm time.
    fn time(&self) -> NaiveDateTime;

    /// Declare the simulated date range (inclusive).
    fn set_simulation_window(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(), FinecheckError>;

    fn add_equity(&mut self, ticker: &str, resolution: Resolution)
    -> Result<Symbol, FinecheckError>;

    /// Subscribe `data_type` for `underlying`; returns the derived symbol the
    /// data will be keyed by.
    fn add_data(
        &mut self,
        data_type: DataType,
        underlying: &Symbol,
    ) -> Result<Symbol, FinecheckError>;

    /// Up to `count` records strictly before the current time, oldest first.
    fn history(
        &mut self,
        data_type: DataType,
        symbol: &Symbol,
        count: usize,
    ) -> Result<Vec<BaseData>, FinecheckError>;

    /// Latest cached record of `data_type` for a subscribed security.
    fn get_cached(&self, symbol: &Symbol, data_type: DataType) -> Option<&BaseData>;

    fn is_invested(&self) -> bool;

    /// Rebalance `symbol` to `fraction` of total portfolio value. `None` when
    /// no order was needed or possible.
    fn set_holdings(
        &mut self,
        symbol: &Symbol,
        fraction: f64,
    ) -> Result<Option<OrderEvent>, FinecheckError>;
}
