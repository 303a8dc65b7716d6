//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::{statistics_path, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{Backtest, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{parse_scenario_date, validate_all};
use crate::domain::data::DataType;
use crate::domain::error::FinecheckError;
use crate::domain::fine_fundamental_regression::{FineFundamentalRegression, ScenarioParams};
use crate::domain::regression::assert_statistics;
use crate::domain::statistics::Statistics;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "finecheck", about = "Fine fundamental data regression harness")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset (overrides [logging] level)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the regression scenario
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Order log path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Read CSV data from this directory regardless of [data] source
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data ranges for a ticker
    Info {
        #[arg(long)]
        ticker: Option<String>,
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Copy CSV data files into the SQLite store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv_dir: PathBuf,
        #[arg(long)]
        ticker: String,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Run { config, .. }
            | Command::Validate { config }
            | Command::Info { config, .. }
            | Command::Import { config, .. } => config,
        }
    }
}

impl Cli {
    /// `--log-level`, else `[logging] level` from the config file, else `warn`.
    pub fn log_level(&self) -> String {
        if let Some(level) = &self.log_level {
            return level.clone();
        }
        FileConfigAdapter::from_file(self.command.config_path())
            .ok()
            .and_then(|c| c.get_string("logging", "level"))
            .unwrap_or_else(|| "warn".to_string())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            output,
            data_dir,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_scenario(&config, output.as_deref(), data_dir.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { ticker, config } => run_info(ticker.as_deref(), &config),
        Command::Import {
            config,
            csv_dir,
            ticker,
        } => run_import(&config, &csv_dir, &ticker),
    }
}

fn fail(err: FinecheckError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, FinecheckError> {
    FileConfigAdapter::from_file(path).map_err(|e| FinecheckError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> BacktestConfig {
    let defaults = BacktestConfig::default();
    BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", defaults.initial_capital),
        commission_per_trade: config.get_double(
            "backtest",
            "commission_per_trade",
            defaults.commission_per_trade,
        ),
        commission_pct: config.get_double("backtest", "commission_pct", defaults.commission_pct),
        slippage_pct: config.get_double("backtest", "slippage_pct", defaults.slippage_pct),
        allow_shorting: config.get_bool("backtest", "allow_shorting", defaults.allow_shorting),
        risk_free_rate: config.get_double("backtest", "risk_free_rate", defaults.risk_free_rate),
    }
}

pub fn build_scenario_params(config: &dyn ConfigPort) -> Result<ScenarioParams, FinecheckError> {
    let defaults = ScenarioParams::default();
    Ok(ScenarioParams {
        ticker: config
            .get_string("scenario", "ticker")
            .map(|t| t.trim().to_uppercase())
            .unwrap_or(defaults.ticker),
        start_date: parse_scenario_date(config, "start_date")?.unwrap_or(defaults.start_date),
        end_date: parse_scenario_date(config, "end_date")?.unwrap_or(defaults.end_date),
        history_count: config
            .get_int("scenario", "history_count", defaults.history_count as i64)
            .max(0) as usize,
        growth_threshold: config.get_double(
            "scenario",
            "growth_threshold",
            defaults.growth_threshold,
        ),
        allocation: config.get_double("scenario", "allocation", defaults.allocation),
    })
}

/// The `[expected_statistics]` table; empty when the section is absent.
pub fn expected_statistics(config: &dyn ConfigPort) -> BTreeMap<String, String> {
    config
        .section_keys("expected_statistics")
        .into_iter()
        .filter_map(|key| {
            config
                .get_string("expected_statistics", &key)
                .map(|value| (key, value))
        })
        .collect()
}

pub fn open_data_port(
    config: &dyn ConfigPort,
    data_dir: Option<&Path>,
) -> Result<Box<dyn DataPort>, FinecheckError> {
    if let Some(dir) = data_dir {
        return Ok(Box::new(CsvAdapter::new(dir.to_path_buf())));
    }
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim() {
        "sqlite" => open_sqlite(config),
        _ => {
            let path = config
                .get_string("csv", "path")
                .unwrap_or_else(|| "data".to_string());
            Ok(Box::new(CsvAdapter::new(PathBuf::from(path))))
        }
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, FinecheckError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let adapter = SqliteAdapter::from_config(config)?;
    adapter.initialize_schema()?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, FinecheckError> {
    Err(FinecheckError::ConfigInvalid {
        section: "data".into(),
        key: "source".into(),
        reason: "sqlite feature is required for source = sqlite".into(),
    })
}

/// Run the scenario against `data_port`, write the report when an output
/// path is given, and check the expected statistics.
pub fn run_regression_pipeline(
    data_port: &dyn DataPort,
    bt_config: &BacktestConfig,
    params: ScenarioParams,
    expected: &BTreeMap<String, String>,
    output_path: Option<&Path>,
) -> Result<(BacktestResult, Statistics), FinecheckError> {
    let mut algorithm = FineFundamentalRegression::new(params);
    let result = Backtest::new(data_port, bt_config.clone()).run(&mut algorithm)?;
    let statistics = Statistics::compute(&result, bt_config.risk_free_rate);

    if let Some(path) = output_path {
        CsvReportAdapter.write(&result, &statistics, &path.to_string_lossy())?;
    }

    assert_statistics(expected, &statistics.to_map())?;
    Ok((result, statistics))
}

fn print_summary(result: &BacktestResult, statistics: &Statistics) {
    eprintln!("\n=== {} ===", result.algorithm);
    eprintln!(
        "Window:           {} to {}",
        result.start_date, result.end_date
    );
    eprintln!("Slices:           {}", result.slices_processed);
    eprintln!("Data points:      {}", result.data_points);
    for order in &result.orders {
        eprintln!(
            "  order #{} {} {} {:+} @ {:.2}",
            order.id, order.time, order.symbol, order.quantity, order.fill_price
        );
    }
    eprintln!("\n=== Statistics ===");
    for (name, value) in statistics.to_map() {
        eprintln!("{:<28}{}", format!("{name}:"), value);
    }
}

fn run_scenario(config_path: &Path, output: Option<&Path>, data_dir: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    if let Err(e) = validate_all(&config) {
        return fail(e);
    }

    let bt_config = build_backtest_config(&config);
    let params = match build_scenario_params(&config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let expected = expected_statistics(&config);

    let data_port = match open_data_port(&config, data_dir) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Running scenario on {}: {} to {}",
        params.ticker, params.start_date, params.end_date
    );

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("orders.csv"));

    match run_regression_pipeline(
        data_port.as_ref(),
        &bt_config,
        params,
        &expected,
        Some(&output),
    ) {
        Ok((result, statistics)) => {
            print_summary(&result, &statistics);
            eprintln!("\nOrder log written to: {}", output.display());
            eprintln!(
                "Statistics written to: {}",
                statistics_path(&output).display()
            );
            if !expected.is_empty() {
                eprintln!("{} expected statistics matched", expected.len());
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn print_params(bt_config: &BacktestConfig, params: &ScenarioParams) {
    eprintln!("\nBacktest:");
    eprintln!("  initial_capital:      {:.2}", bt_config.initial_capital);
    eprintln!("  commission_per_trade: {}", bt_config.commission_per_trade);
    eprintln!("  commission_pct:       {}", bt_config.commission_pct);
    eprintln!("  slippage_pct:         {}", bt_config.slippage_pct);
    eprintln!("  allow_shorting:       {}", bt_config.allow_shorting);
    eprintln!("\nScenario:");
    eprintln!("  ticker:           {}", params.ticker);
    eprintln!("  window:           {} to {}", params.start_date, params.end_date);
    eprintln!("  history_count:    {}", params.history_count);
    eprintln!("  growth_threshold: {}", params.growth_threshold);
    eprintln!("  allocation:       {}", params.allocation);
}

fn resolve_params(config_path: &Path) -> Result<(BacktestConfig, ScenarioParams, usize), FinecheckError> {
    let config = load_config(config_path)?;
    validate_all(&config)?;
    let params = build_scenario_params(&config)?;
    Ok((
        build_backtest_config(&config),
        params,
        expected_statistics(&config).len(),
    ))
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let (bt_config, params, expected) = match resolve_params(config_path) {
        Ok(resolved) => resolved,
        Err(e) => return fail(e),
    };
    eprintln!("Config validated successfully");
    print_params(&bt_config, &params);

    eprintln!("\nSubscriptions:");
    eprintln!("  {} {}", params.ticker, DataType::TradeBar);
    eprintln!("  {}|FINE {}", params.ticker, DataType::FineFundamental);
    eprintln!("\nExpected statistics: {expected}");
    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let (bt_config, params, expected) = match resolve_params(config_path) {
        Ok(resolved) => resolved,
        Err(e) => return fail(e),
    };
    print_params(&bt_config, &params);
    eprintln!("\nExpected statistics: {expected}");
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(ticker: Option<&str>, config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let ticker = ticker
        .map(str::to_string)
        .or_else(|| config.get_string("scenario", "ticker"))
        .unwrap_or_else(|| ScenarioParams::default().ticker)
        .trim()
        .to_uppercase();

    let data_port = match open_data_port(&config, None) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    for data_type in [DataType::TradeBar, DataType::FineFundamental] {
        match data_port.get_data_range(&ticker, data_type) {
            Ok(Some((first, last, count))) => {
                println!("{ticker} {data_type}: {count} records, {first} to {last}");
            }
            Ok(None) => eprintln!("{ticker} {data_type}: no data found"),
            Err(e) => return fail(e),
        }
    }
    ExitCode::SUCCESS
}

fn run_import(config_path: &Path, csv_dir: &Path, ticker: &str) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    #[cfg(feature = "sqlite")]
    {
        match import_csv(&config, csv_dir, ticker) {
            Ok((bars, fine)) => {
                eprintln!(
                    "Imported {} trade bars and {} fine fundamental records for {}",
                    bars,
                    fine,
                    ticker.to_uppercase()
                );
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, csv_dir, ticker);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

/// Copy both CSV files for `ticker` into the configured SQLite store.
/// A missing file skips that data type.
#[cfg(feature = "sqlite")]
pub fn import_csv(
    config: &dyn ConfigPort,
    csv_dir: &Path,
    ticker: &str,
) -> Result<(usize, usize), FinecheckError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;
    use crate::domain::symbol::Symbol;
    use tracing::warn;

    let store = SqliteAdapter::from_config(config)?;
    store.initialize_schema()?;
    let source = CsvAdapter::new(csv_dir.to_path_buf());
    let equity = Symbol::equity(ticker);

    let bars = match source.read_trade_bars(&equity) {
        Ok(bars) => store.insert_trade_bars(&bars)?,
        Err(FinecheckError::NoData { ticker, data_type }) => {
            warn!(%ticker, %data_type, "no csv file, skipped");
            0
        }
        Err(e) => return Err(e),
    };

    let fine = match source.read_fine_fundamentals(&Symbol::fundamental(&equity)) {
        Ok(records) => store.insert_fine_fundamentals(&records)?,
        Err(FinecheckError::NoData { ticker, data_type }) => {
            warn!(%ticker, %data_type, "no csv file, skipped");
            0
        }
        Err(e) => return Err(e),
    };

    Ok((bars, fine))
}
