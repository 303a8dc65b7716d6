//! Configuration validation.
//!
//! Checks every config field before a run starts. Keys that are absent fall
//! back to defaults and are not errors, except where noted.

use crate::domain::error::FinecheckError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DEFAULT_POOL_SIZE: i64 = 4;
pub const MAX_POOL_SIZE: i64 = 64;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    validate_initial_capital(config)?;
    validate_commission(config)?;
    validate_slippage(config)?;
    validate_risk_free_rate(config)?;
    Ok(())
}

pub fn validate_scenario_config(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    validate_ticker(config)?;
    validate_dates(config)?;
    validate_history_count(config)?;
    validate_growth_threshold(config)?;
    validate_allocation(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    validate_pool_size(config)?;
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim() {
        "csv" => Ok(()),
        "sqlite" => match config.get_string("sqlite", "path") {
            Some(path) if !path.trim().is_empty() => Ok(()),
            _ => Err(FinecheckError::ConfigMissing {
                section: "sqlite".to_string(),
                key: "path".to_string(),
            }),
        },
        other => Err(FinecheckError::ConfigInvalid {
            section: "data".to_string(),
            key: "source".to_string(),
            reason: format!("unknown data source '{other}', expected csv or sqlite"),
        }),
    }
}

fn validate_pool_size(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    let value = config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE);
    if !(1..=MAX_POOL_SIZE).contains(&value) {
        return Err(FinecheckError::ConfigInvalid {
            section: "sqlite".to_string(),
            key: "pool_size".to_string(),
            reason: format!("pool_size must be between 1 and {MAX_POOL_SIZE}, got {value}"),
        });
    }
    Ok(())
}

/// Run every section's checks.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    validate_backtest_config(config)?;
    validate_data_config(config)?;
    validate_scenario_config(config)?;
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    let value = config.get_double("backtest", "initial_capital", 100_000.0);
    if value <= 0.0 {
        return Err(FinecheckError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "initial_capital".to_string(),
            reason: "initial_capital must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    for key in ["commission_per_trade", "commission_pct"] {
        if config.get_double("backtest", key, 0.0) < 0.0 {
            return Err(FinecheckError::ConfigInvalid {
                section: "backtest".to_string(),
                key: key.to_string(),
                reason: format!("{key} must be non-negative"),
            });
        }
    }
    Ok(())
}

fn validate_slippage(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    let value = config.get_double("backtest", "slippage_pct", 0.0);
    if value < 0.0 {
        return Err(FinecheckError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "slippage_pct".to_string(),
            reason: "slippage_pct must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(FinecheckError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "risk_free_rate".to_string(),
            reason: "risk_free_rate must be between 0 and 1".to_string(),
        });
    }
    Ok(())
}

fn validate_ticker(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    match config.get_string("scenario", "ticker") {
        Some(t) if t.trim().is_empty() => Err(FinecheckError::ConfigInvalid {
            section: "scenario".to_string(),
            key: "ticker".to_string(),
            reason: "ticker must not be empty".to_string(),
        }),
        Some(t) if !t.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '.') => {
            Err(FinecheckError::ConfigInvalid {
                section: "scenario".to_string(),
                key: "ticker".to_string(),
                reason: format!("invalid ticker '{}'", t.trim()),
            })
        }
        _ => Ok(()),
    }
}

/// Parse an optional `[scenario]` date.
pub fn parse_scenario_date(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<NaiveDate>, FinecheckError> {
    match config.get_string("scenario", key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
            .map(Some)
            .map_err(|_| FinecheckError::ConfigInvalid {
                section: "scenario".to_string(),
                key: key.to_string(),
                reason: format!("invalid {key} format, expected YYYY-MM-DD"),
            }),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    let start = parse_scenario_date(config, "start_date")?;
    let end = parse_scenario_date(config, "end_date")?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(FinecheckError::ConfigInvalid {
                section: "scenario".to_string(),
                key: "start_date".to_string(),
                reason: "start_date must not be after end_date".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_history_count(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    let value = config.get_int("scenario", "history_count", 10);
    if value < 1 {
        return Err(FinecheckError::ConfigInvalid {
            section: "scenario".to_string(),
            key: "history_count".to_string(),
            reason: "history_count must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_growth_threshold(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    let value = config.get_double("scenario", "growth_threshold", 0.01);
    if !value.is_finite() {
        return Err(FinecheckError::ConfigInvalid {
            section: "scenario".to_string(),
            key: "growth_threshold".to_string(),
            reason: "growth_threshold must be a finite number".to_string(),
        });
    }
    Ok(())
}

fn validate_allocation(config: &dyn ConfigPort) -> Result<(), FinecheckError> {
    let value = config.get_double("scenario", "allocation", 1.0);
    if !(-1.0..=1.0).contains(&value) {
        return Err(FinecheckError::ConfigInvalid {
            section: "scenario".to_string(),
            key: "allocation".to_string(),
            reason: "allocation must be between -1 and 1".to_string(),
        });
    }
    if value < 0.0 && !config.get_bool("backtest", "allow_shorting", false) {
        return Err(FinecheckError::ConfigInvalid {
            section: "scenario".to_string(),
            key: "allocation".to_string(),
            reason: "negative allocation requires allow_shorting".to_string(),
        });
    }
    Ok(())
}
