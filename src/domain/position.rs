//! Open positions and closed trades.

use chrono::NaiveDateTime;

use super::symbol::Symbol;

/// Signed holding: positive is long, negative is short.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: i64,
    pub average_price: f64,
    pub entry_time: NaiveDateTime,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }

    /// Signed value: shorts contribute negatively.
    pub fn holdings_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn absolute_value(&self, price: f64) -> f64 {
        self.quantity.unsigned_abs() as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.average_price)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: Symbol,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub pnl: f64,
}

impl ClosedTrade {
    pub fn duration_days(&self) -> i64 {
        (self.exit_time - self.entry_time).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2014, 6, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn sample_long_position() -> Position {
        Position {
            symbol: Symbol::equity("AAPL"),
            quantity: 100,
            average_price: 90.0,
            entry_time: at(5),
        }
    }

    fn sample_short_position() -> Position {
        Position {
            symbol: Symbol::equity("MSFT"),
            quantity: -50,
            average_price: 40.0,
            entry_time: at(5),
        }
    }

    #[test]
    fn direction() {
        assert!(sample_long_position().is_long());
        assert!(!sample_long_position().is_short());
        assert!(sample_short_position().is_short());
    }

    #[test]
    fn holdings_value_is_signed() {
        assert!((sample_long_position().holdings_value(95.0) - 9500.0).abs() < f64::EPSILON);
        assert!((sample_short_position().holdings_value(42.0) - (-2100.0)).abs() < f64::EPSILON);
        assert!((sample_short_position().absolute_value(42.0) - 2100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl() {
        assert!((sample_long_position().unrealized_pnl(95.0) - 500.0).abs() < f64::EPSILON);
        assert!((sample_short_position().unrealized_pnl(38.0) - 100.0).abs() < f64::EPSILON);
        assert!((sample_short_position().unrealized_pnl(42.0) - (-100.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn closed_trade_duration() {
        let trade = ClosedTrade {
            symbol: Symbol::equity("AAPL"),
            quantity: 100,
            entry_price: 90.0,
            exit_price: 95.0,
            entry_time: at(5),
            exit_time: at(10),
            pnl: 500.0,
        };
        assert_eq!(trade.duration_days(), 5);
    }
}
