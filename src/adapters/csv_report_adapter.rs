//! CSV order log writer implementing [`ReportPort`].
//!
//! `write` produces the order log at the given path and the labelled
//! statistics next to it as `<stem>.statistics.csv`.

use std::path::{Path, PathBuf};

use crate::domain::backtest::BacktestResult;
use crate::domain::error::FinecheckError;
use crate::domain::statistics::Statistics;
use crate::ports::report_port::ReportPort;
use tracing::info;

pub struct CsvReportAdapter;

/// Where the statistics table for an order log at `output_path` goes.
pub fn statistics_path(output_path: &Path) -> PathBuf {
    output_path.with_extension("statistics.csv")
}

fn csv_error(e: csv::Error) -> FinecheckError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => FinecheckError::Io(io),
        other => FinecheckError::Io(std::io::Error::other(format!("{other:?}"))),
    }
}

impl CsvReportAdapter {
    fn write_orders(result: &BacktestResult, path: &Path) -> Result<(), FinecheckError> {
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        writer
            .write_record([
                "id",
                "time",
                "symbol",
                "quantity",
                "fill_price",
                "commission",
                "value",
                "target_fraction",
            ])
            .map_err(csv_error)?;

        for order in &result.orders {
            writer
                .write_record([
                    order.id.to_string(),
                    order.time.format("%Y-%m-%d %H:%M:%S").to_string(),
                    order.symbol.to_string(),
                    order.quantity.to_string(),
                    format!("{:.4}", order.fill_price),
                    format!("{:.2}", order.commission),
                    format!("{:.2}", order.value()),
                    format!("{}", order.target_fraction),
                ])
                .map_err(csv_error)?;
        }

        writer.flush()?;
        Ok(())
    }

    fn write_statistics(statistics: &Statistics, path: &Path) -> Result<(), FinecheckError> {
        let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
        writer.write_record(["statistic", "value"]).map_err(csv_error)?;
        for (name, value) in statistics.to_map() {
            writer.write_record([name, value]).map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        statistics: &Statistics,
        output_path: &str,
    ) -> Result<(), FinecheckError> {
        let orders_path = Path::new(output_path);
        Self::write_orders(result, orders_path)?;

        let stats_path = statistics_path(orders_path);
        Self::write_statistics(statistics, &stats_path)?;

        info!(
            orders = %orders_path.display(),
            statistics = %stats_path.display(),
            "report written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::OrderEvent;
    use crate::domain::portfolio::Portfolio;
    use crate::domain::symbol::Symbol;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    fn sample_result() -> BacktestResult {
        let day = NaiveDate::from_ymd_opt(2014, 6, 5).unwrap();
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.record_equity(day, 100_050.0);
        BacktestResult {
            algorithm: "FineFundamentalRegressionAlgorithm".into(),
            start_date: day,
            end_date: NaiveDate::from_ymd_opt(2014, 6, 10).unwrap(),
            portfolio,
            orders: vec![OrderEvent {
                id: 1,
                time: day.and_hms_opt(9, 31, 0).unwrap(),
                symbol: Symbol::equity("AAPL"),
                quantity: 1082,
                fill_price: 92.4,
                commission: 1.0,
                target_fraction: 1.0,
            }],
            slices_processed: 2,
            data_points: 2,
            final_equity: 100_050.0,
        }
    }

    #[test]
    fn writes_order_log_and_statistics() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("orders.csv");
        let result = sample_result();
        let stats = Statistics::compute(&result, 0.0);

        CsvReportAdapter
            .write(&result, &stats, out.to_str().unwrap())
            .unwrap();

        let orders = fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = orders.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("id,time,symbol,quantity"));
        assert!(lines[1].starts_with("1,2014-06-05 09:31:00,AAPL,1082,92.4000,1.00"));

        let stats_file = fs::read_to_string(dir.path().join("orders.statistics.csv")).unwrap();
        assert!(stats_file.contains("Total Orders,1"));
        assert!(stats_file.contains("Net Profit,0.050%"));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let result = sample_result();
        let stats = Statistics::compute(&result, 0.0);
        let err = CsvReportAdapter
            .write(&result, &stats, "/nonexistent/dir/orders.csv")
            .unwrap_err();
        assert!(matches!(err, FinecheckError::Io(_)));
    }
}
