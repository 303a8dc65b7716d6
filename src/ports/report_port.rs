//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::FinecheckError;
use crate::domain::statistics::Statistics;

/// Port for writing run results.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        statistics: &Statistics,
        output_path: &str,
    ) -> Result<(), FinecheckError>;
}
