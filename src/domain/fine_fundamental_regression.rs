//! Regression scenario for fine fundamental data.
//!
//! Subscribes one equity together with its fine fundamental data and checks
//! two things: a history request during setup returns records, and the
//! streamed slices carry fine data keyed to the equity at least once. While
//! flat, it buys the equity as soon as the cached one-year equity-per-share
//! growth exceeds the threshold.

use chrono::NaiveDate;
use tracing::{debug, info};

use super::algorithm::Algorithm;
use super::data::{DataKind, DataType};
use super::error::FinecheckError;
use super::fundamental::FineFundamental;
use super::resolution::Resolution;
use super::slice::Slice;
use super::symbol::Symbol;
use crate::ports::host_port::HostPort;

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioParams {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub history_count: usize,
    /// Strict lower bound on one-year equity-per-share growth.
    pub growth_threshold: f64,
    pub allocation: f64,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        ScenarioParams {
            ticker: "AAPL".into(),
            start_date: NaiveDate::from_ymd_opt(2014, 6, 5).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2014, 6, 10).unwrap_or_default(),
            history_count: 10,
            growth_threshold: 0.01,
            allocation: 1.0,
        }
    }
}

pub struct FineFundamentalRegression {
    params: ScenarioParams,
    equity: Option<Symbol>,
    fine: Option<Symbol>,
    got_fine_data: bool,
}

impl FineFundamentalRegression {
    pub fn new(params: ScenarioParams) -> Self {
        FineFundamentalRegression {
            params,
            equity: None,
            fine: None,
            got_fine_data: false,
        }
    }

    pub fn params(&self) -> &ScenarioParams {
        &self.params
    }

    /// True once any slice carried fine data for the equity.
    pub fn got_fine_data(&self) -> bool {
        self.got_fine_data
    }

    fn equity(&self) -> Result<&Symbol, FinecheckError> {
        self.equity
            .as_ref()
            .ok_or_else(|| FinecheckError::AlgorithmState {
                reason: "on_data called before initialize".into(),
            })
    }
}

impl Default for FineFundamentalRegression {
    fn default() -> Self {
        Self::new(ScenarioParams::default())
    }
}

impl Algorithm for FineFundamentalRegression {
    fn name(&self) -> &str {
        "FineFundamentalRegressionAlgorithm"
    }

    fn initialize(&mut self, host: &mut dyn HostPort) -> Result<(), FinecheckError> {
        host.set_simulation_window(self.params.start_date, self.params.end_date)?;

        let equity = host.add_equity(&self.params.ticker, Resolution::Minute)?;
        let fine = host.add_data(DataType::FineFundamental, &equity)?;

        let history = host.history(DataType::FineFundamental, &fine, self.params.history_count)?;
        if history.is_empty() {
            return Err(FinecheckError::EmptyHistory {
                data_type: DataType::FineFundamental,
                symbol: equity.to_string(),
            });
        }
        info!(%fine, records = history.len(), "fine fundamental history loaded");

        self.equity = Some(equity);
        self.fine = Some(fine);
        Ok(())
    }

    fn on_data(&mut self, host: &mut dyn HostPort, slice: &Slice) -> Result<(), FinecheckError> {
        let equity = self.equity()?.clone();

        if slice
            .get::<FineFundamental>()
            .keys()
            .any(|symbol| symbol.has_underlying(&equity))
        {
            self.got_fine_data = true;
        }

        if host.is_invested() {
            return Ok(());
        }

        let growth = host
            .get_cached(&equity, DataType::FineFundamental)
            .and_then(FineFundamental::from_data)
            .map(FineFundamental::equity_per_share_growth_one_year);

        if let Some(growth) = growth {
            if growth > self.params.growth_threshold {
                debug!(%equity, growth, time = %slice.time, "growth above threshold");
                host.set_holdings(&equity, self.params.allocation)?;
            }
        }
        Ok(())
    }

    fn on_end_of_algorithm(&mut self, _host: &mut dyn HostPort) -> Result<(), FinecheckError> {
        if !self.got_fine_data {
            let symbol = self
                .equity
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| self.params.ticker.clone());
            return Err(FinecheckError::NoStreamingData {
                data_type: DataType::FineFundamental,
                symbol,
            });
        }
        Ok(())
    }
}
