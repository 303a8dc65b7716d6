//! Fine fundamental snapshots.
//!
//! A [`FineFundamental`] is a point-in-time view of company metrics derived from
//! financial statements. It is keyed by a fundamental [`Symbol`] whose underlying
//! is the equity. Only the fields the harness reads or reports are modelled;
//! absent source values are carried as `0.0`.

use chrono::NaiveDateTime;

use super::symbol::Symbol;

/// A ratio reported over several look-back horizons.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MultiPeriodField {
    pub three_months: f64,
    pub six_months: f64,
    pub one_year: f64,
    pub three_years: f64,
    pub five_years: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EarningRatios {
    pub equity_per_share_growth: MultiPeriodField,
    pub diluted_eps_growth: MultiPeriodField,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValuationRatios {
    pub pe_ratio: f64,
    pub pb_ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FineFundamental {
    pub symbol: Symbol,
    pub time: NaiveDateTime,
    pub market_cap: f64,
    pub valuation_ratios: ValuationRatios,
    pub earning_ratios: EarningRatios,
}

impl FineFundamental {
    /// Empty snapshot; every metric zero.
    pub fn new(symbol: Symbol, time: NaiveDateTime) -> Self {
        FineFundamental {
            symbol,
            time,
            market_cap: 0.0,
            valuation_ratios: ValuationRatios::default(),
            earning_ratios: EarningRatios::default(),
        }
    }

    /// Equity symbol this snapshot describes.
    pub fn underlying(&self) -> Option<&Symbol> {
        self.symbol.underlying()
    }

    pub fn equity_per_share_growth_one_year(&self) -> f64 {
        self.earning_ratios.equity_per_share_growth.one_year
    }
}
