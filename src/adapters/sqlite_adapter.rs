//! SQLite data adapter.
//!
//! Minute bars live in `trade_bars`, fine snapshots in `fine_fundamentals`.
//! Times are stored as sortable text so range filters run in SQL.

use crate::domain::config_validation::{DEFAULT_POOL_SIZE, MAX_POOL_SIZE};
use crate::domain::data::{DataType, TradeBar};
use crate::domain::error::FinecheckError;
use crate::domain::fundamental::FineFundamental;
use crate::domain::symbol::Symbol;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::{debug, info, warn};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_error(e: rusqlite::Error) -> FinecheckError {
    FinecheckError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_error<E>(value: &str, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(value.len(), rusqlite::types::Type::Text, Box::new(e))
}

fn parse_time(value: &str) -> Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(value, TIME_FORMAT).map_err(|e| conversion_error(value, e))
}

fn parse_date(value: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|e| conversion_error(value, e))
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, FinecheckError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| FinecheckError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let requested = config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE);
        let pool_size = u32::try_from(requested.clamp(1, MAX_POOL_SIZE)).unwrap_or(1);
        if i64::from(pool_size) != requested {
            warn!(requested, pool_size, "sqlite pool_size out of range, clamped");
        }

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| FinecheckError::Database {
                reason: e.to_string(),
            })?;

        info!(path = %db_path, pool_size, "opened sqlite store");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, FinecheckError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| FinecheckError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, FinecheckError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| FinecheckError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), FinecheckError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS trade_bars (
                    ticker TEXT NOT NULL,
                    market TEXT NOT NULL,
                    time TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    PRIMARY KEY (ticker, market, time)
                );
                CREATE TABLE IF NOT EXISTS fine_fundamentals (
                    ticker TEXT NOT NULL,
                    market TEXT NOT NULL,
                    date TEXT NOT NULL,
                    market_cap REAL NOT NULL DEFAULT 0,
                    pe_ratio REAL NOT NULL DEFAULT 0,
                    pb_ratio REAL NOT NULL DEFAULT 0,
                    eps_growth_1y REAL NOT NULL DEFAULT 0,
                    equity_per_share_growth_3m REAL NOT NULL DEFAULT 0,
                    equity_per_share_growth_6m REAL NOT NULL DEFAULT 0,
                    equity_per_share_growth_1y REAL NOT NULL DEFAULT 0,
                    equity_per_share_growth_3y REAL NOT NULL DEFAULT 0,
                    equity_per_share_growth_5y REAL NOT NULL DEFAULT 0,
                    PRIMARY KEY (ticker, market, date)
                );
                CREATE INDEX IF NOT EXISTS idx_trade_bars_time ON trade_bars(time);",
            )
            .map_err(query_error)?;

        Ok(())
    }

    pub fn insert_trade_bars(&self, bars: &[TradeBar]) -> Result<usize, FinecheckError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO trade_bars
                     (ticker, market, time, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    bar.symbol.ticker,
                    bar.symbol.market,
                    bar.time.format(TIME_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        debug!(rows = bars.len(), "inserted trade bars");
        Ok(bars.len())
    }

    pub fn insert_fine_fundamentals(
        &self,
        records: &[FineFundamental],
    ) -> Result<usize, FinecheckError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for fine in records {
            let growth = &fine.earning_ratios.equity_per_share_growth;
            tx.execute(
                "INSERT OR REPLACE INTO fine_fundamentals
                     (ticker, market, date, market_cap, pe_ratio, pb_ratio, eps_growth_1y,
                      equity_per_share_growth_3m, equity_per_share_growth_6m,
                      equity_per_share_growth_1y, equity_per_share_growth_3y,
                      equity_per_share_growth_5y)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    fine.symbol.ticker,
                    fine.symbol.market,
                    fine.time.date().format(DATE_FORMAT).to_string(),
                    fine.market_cap,
                    fine.valuation_ratios.pe_ratio,
                    fine.valuation_ratios.pb_ratio,
                    fine.earning_ratios.diluted_eps_growth.one_year,
                    growth.three_months,
                    growth.six_months,
                    growth.one_year,
                    growth.three_years,
                    growth.five_years
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        debug!(rows = records.len(), "inserted fine fundamentals");
        Ok(records.len())
    }

    fn table(data_type: DataType) -> &'static str {
        match data_type {
            DataType::TradeBar => "trade_bars",
            DataType::FineFundamental => "fine_fundamentals",
        }
    }

    /// `NoData` when the table holds nothing at all for `symbol`. Takes the
    /// caller's connection: the pool may hold only one.
    fn ensure_any(
        conn: &rusqlite::Connection,
        symbol: &Symbol,
        data_type: DataType,
    ) -> Result<(), FinecheckError> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE ticker = ?1 AND market = ?2",
            Self::table(data_type)
        );
        let count: i64 = conn
            .query_row(&query, params![symbol.ticker, symbol.market], |row| {
                row.get(0)
            })
            .map_err(query_error)?;
        if count == 0 {
            return Err(FinecheckError::NoData {
                ticker: symbol.ticker.clone(),
                data_type,
            });
        }
        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_trade_bars(
        &self,
        symbol: &Symbol,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<TradeBar>, FinecheckError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT time, open, high, low, close, volume
                 FROM trade_bars
                 WHERE ticker = ?1 AND market = ?2 AND time >= ?3 AND time <= ?4
                 ORDER BY time ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![
                    symbol.ticker,
                    symbol.market,
                    start.format(TIME_FORMAT).to_string(),
                    end.format(TIME_FORMAT).to_string()
                ],
                |row| {
                    let time_str: String = row.get(0)?;
                    let time = parse_time(&time_str)?;
                    Ok(TradeBar {
                        symbol: symbol.clone(),
                        time,
                        end_time: time + Duration::minutes(1),
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: row.get(5)?,
                    })
                },
            )
            .map_err(query_error)?;

        let bars = rows.collect::<Result<Vec<_>, _>>().map_err(query_error)?;
        if bars.is_empty() {
            Self::ensure_any(&conn, symbol, DataType::TradeBar)?;
        }
        Ok(bars)
    }

    fn fetch_fine_fundamentals(
        &self,
        symbol: &Symbol,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<FineFundamental>, FinecheckError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, market_cap, pe_ratio, pb_ratio, eps_growth_1y,
                        equity_per_share_growth_3m, equity_per_share_growth_6m,
                        equity_per_share_growth_1y, equity_per_share_growth_3y,
                        equity_per_share_growth_5y
                 FROM fine_fundamentals
                 WHERE ticker = ?1 AND market = ?2 AND date >= ?3 AND date <= ?4
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![
                    symbol.ticker,
                    symbol.market,
                    start.date().format(DATE_FORMAT).to_string(),
                    end.date().format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let date_str: String = row.get(0)?;
                    let date = parse_date(&date_str)?;
                    let mut fine =
                        FineFundamental::new(symbol.clone(), date.and_time(NaiveTime::default()));
                    fine.market_cap = row.get(1)?;
                    fine.valuation_ratios.pe_ratio = row.get(2)?;
                    fine.valuation_ratios.pb_ratio = row.get(3)?;
                    fine.earning_ratios.diluted_eps_growth.one_year = row.get(4)?;
                    let growth = &mut fine.earning_ratios.equity_per_share_growth;
                    growth.three_months = row.get(5)?;
                    growth.six_months = row.get(6)?;
                    growth.one_year = row.get(7)?;
                    growth.three_years = row.get(8)?;
                    growth.five_years = row.get(9)?;
                    Ok(fine)
                },
            )
            .map_err(query_error)?;

        let mut records = rows.collect::<Result<Vec<_>, _>>().map_err(query_error)?;
        records.retain(|f| f.time >= start && f.time <= end);
        if records.is_empty() {
            Self::ensure_any(&conn, symbol, DataType::FineFundamental)?;
        }
        Ok(records)
    }

    fn list_tickers(&self) -> Result<Vec<String>, FinecheckError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ticker FROM trade_bars
                 UNION
                 SELECT ticker FROM fine_fundamentals
                 ORDER BY ticker",
            )
            .map_err(query_error)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_error)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_error)
    }

    fn get_data_range(
        &self,
        ticker: &str,
        data_type: DataType,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, FinecheckError> {
        let column = match data_type {
            DataType::TradeBar => "time",
            DataType::FineFundamental => "date",
        };
        let query = format!(
            "SELECT MIN({column}), MAX({column}), COUNT(*) FROM {} WHERE ticker = ?1",
            Self::table(data_type)
        );

        let result: (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(&query, params![ticker.to_uppercase()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(query_error)?;

        let parse = |value: &str| match data_type {
            DataType::TradeBar => parse_time(value),
            DataType::FineFundamental => {
                parse_date(value).map(|d| d.and_time(NaiveTime::default()))
            }
        };

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let min = parse(&min_str).map_err(query_error)?;
                let max = parse(&max_str).map_err(query_error)?;
                Ok(Some((min, max, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
