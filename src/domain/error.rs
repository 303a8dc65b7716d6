//! Domain error types.

use crate::domain::data::DataType;

/// Top-level error type for finecheck.
#[derive(Debug, thiserror::Error)]
pub enum FinecheckError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no {data_type} data for {ticker}")]
    NoData { ticker: String, data_type: DataType },

    #[error("invalid simulation window: {reason}")]
    InvalidWindow { reason: String },

    #[error("invalid order for {symbol}: {reason}")]
    InvalidOrder { symbol: String, reason: String },

    #[error("unknown symbol {symbol}: not subscribed")]
    UnknownSymbol { symbol: String },

    #[error("algorithm state error: {reason}")]
    AlgorithmState { reason: String },

    #[error("did not get any historical {data_type} data for {symbol}")]
    EmptyHistory { data_type: DataType, symbol: String },

    #[error("did not get any {data_type} data for {symbol} in on_data")]
    NoStreamingData { data_type: DataType, symbol: String },

    #[error("{count} statistic(s) differ from expected: {details}")]
    StatisticsMismatch { count: usize, details: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FinecheckError {
    /// True for the failures a regression scenario raises on purpose.
    pub fn is_regression_failure(&self) -> bool {
        matches!(
            self,
            FinecheckError::EmptyHistory { .. }
                | FinecheckError::NoStreamingData { .. }
                | FinecheckError::StatisticsMismatch { .. }
        )
    }

    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            FinecheckError::Io(_) => 1,
            FinecheckError::ConfigParse { .. }
            | FinecheckError::ConfigMissing { .. }
            | FinecheckError::ConfigInvalid { .. } => 2,
            FinecheckError::Database { .. }
            | FinecheckError::DatabaseQuery { .. }
            | FinecheckError::NoData { .. } => 3,
            FinecheckError::InvalidWindow { .. }
            | FinecheckError::InvalidOrder { .. }
            | FinecheckError::UnknownSymbol { .. }
            | FinecheckError::AlgorithmState { .. } => 4,
            FinecheckError::EmptyHistory { .. }
            | FinecheckError::NoStreamingData { .. }
            | FinecheckError::StatisticsMismatch { .. } => 6,
        }
    }
}

impl From<&FinecheckError> for std::process::ExitCode {
    fn from(err: &FinecheckError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
