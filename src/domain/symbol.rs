//! Instrument identity.
//!
//! A [`Symbol`] is an opaque instrument identifier: two symbols are the same
//! instrument only when ticker, market, security type and underlying all match.
//! Fundamental-data symbols are derived from an equity and keep it as their
//! underlying, which is how a fundamental entry in a slice is mapped back to the
//! equity it describes.

use std::fmt;

pub const DEFAULT_MARKET: &str = "usa";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecurityType {
    Equity,
    Fundamental,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
    pub ticker: String,
    pub market: String,
    pub security_type: SecurityType,
    pub underlying: Option<Box<Symbol>>,
}

impl Symbol {
    pub fn equity(ticker: &str) -> Self {
        Self::equity_in(ticker, DEFAULT_MARKET)
    }

    pub fn equity_in(ticker: &str, market: &str) -> Self {
        Symbol {
            ticker: ticker.trim().to_uppercase(),
            market: market.trim().to_lowercase(),
            security_type: SecurityType::Equity,
            underlying: None,
        }
    }

    /// Fundamental-data symbol whose underlying is `equity`.
    pub fn fundamental(equity: &Symbol) -> Self {
        Symbol {
            ticker: equity.ticker.clone(),
            market: equity.market.clone(),
            security_type: SecurityType::Fundamental,
            underlying: Some(Box::new(equity.clone())),
        }
    }

    pub fn underlying(&self) -> Option<&Symbol> {
        self.underlying.as_deref()
    }

    pub fn has_underlying(&self, symbol: &Symbol) -> bool {
        self.underlying() == Some(symbol)
    }

    pub fn is_equity(&self) -> bool {
        self.security_type == SecurityType::Equity
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.security_type {
            SecurityType::Equity => write!(f, "{}", self.ticker),
            SecurityType::Fundamental => write!(f, "{}|FINE", self.ticker),
        }
    }
}
