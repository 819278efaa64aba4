//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::PairBacktest;
use crate::domain::config_validation::{RunConfig, load_run_config, validate_dates, validate_symbols};
use crate::domain::error::PairtraderError;
use crate::domain::hedge::HedgeEstimator;
use crate::domain::metrics::Metrics;
use crate::domain::strategy::{BollingerPair, PairStrategy};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::{PriceSeriesProvider, load_pair};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "pairtrader", about = "Pairs-trading backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for the configured pair
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Cash needed to hold a hedge vector in whole shares at the latest close
    Budget {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        h1: f64,
        #[arg(long, allow_hyphen_values = true)]
        h2: f64,
        #[arg(long, default_value_t = 2)]
        decimals: u32,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest { config, output } => run_backtest(&config, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config } => run_info(&config),
        Command::Budget {
            config,
            h1,
            h2,
            decimals,
        } => run_budget(&config, [h1, h2], decimals),
    }
}

fn fail(err: PairtraderError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        fail(PairtraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
    })
}

fn load_validated(path: &Path) -> Result<RunConfig, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    load_run_config(&adapter).map_err(fail)
}

fn run_backtest(config_path: &Path, output_path: Option<&Path>) -> ExitCode {
    let run = match load_validated(config_path) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let provider = CsvPriceAdapter::new(run.data_directory.clone());
    run_backtest_pipeline(&provider, &run, output_path)
}

/// Load the pair, estimate hedge ratios and run the configured strategy.
pub fn execute_backtest(
    provider: &dyn PriceSeriesProvider,
    run: &RunConfig,
) -> Result<(PairBacktest<BollingerPair>, Metrics), PairtraderError> {
    let bt = &run.backtest;
    let pair = load_pair(provider, &run.symbol1, &run.symbol2, bt.start_date, bt.end_date)?;

    let mut estimator = HedgeEstimator::new(pair);
    estimator.estimate_with(bt.hedge_method, bt.hedge_lookback)?;

    let backtest = PairBacktest::new(estimator, run.strategy.clone()).with_commission(bt.commission);
    let metrics = Metrics::compute(&backtest)?;
    Ok((backtest, metrics))
}

pub fn run_backtest_pipeline(
    provider: &dyn PriceSeriesProvider,
    run: &RunConfig,
    output_path: Option<&Path>,
) -> ExitCode {
    eprintln!(
        "Running backtest: {}/{}, {} to {}",
        run.symbol1, run.symbol2, run.backtest.start_date, run.backtest.end_date
    );
    eprintln!(
        "  Hedge: {} over {} days, strategy: {} over {} days",
        run.backtest.hedge_method,
        run.backtest.hedge_lookback,
        run.strategy.name(),
        run.strategy.lookback()
    );

    let (backtest, metrics) = match execute_backtest(provider, run) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    eprintln!("  Processing: {} aligned dates", backtest.pair().len());

    print_summary(&metrics);

    let output = output_path
        .map(Path::to_path_buf)
        .or_else(|| run.report_output.as_ref().map(PathBuf::from));
    if let Some(output) = output {
        if let Err(e) = CsvReportAdapter::new().write(&backtest, &metrics, &output.to_string_lossy()) {
            return fail(e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }

    ExitCode::SUCCESS
}

fn print_summary(metrics: &Metrics) {
    eprintln!("\n=== Results ===");
    eprintln!("Realized Return:  {:.2}%", metrics.realized_return * 100.0);
    eprintln!("Theoretical:      {:.2}%", metrics.cumulative_return * 100.0);
    eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!(
        "Max Drawdown:     -{:.1}% ({} days)",
        metrics.max_drawdown * 100.0,
        metrics.max_drawdown_duration
    );
    eprintln!("Total Trades:     {}", metrics.trades);
    eprintln!("Commission:       ${:.2}", metrics.total_commission);
    eprintln!(
        "Budget:           ${:.2} -> ${:.2}",
        metrics.initial_budget, metrics.final_budget
    );
}

fn run_validate(config_path: &Path) -> ExitCode {
    let run = match load_validated(config_path) {
        Ok(r) => r,
        Err(code) => return code,
    };

    eprintln!("\nPair:       {} / {}", run.symbol1, run.symbol2);
    eprintln!(
        "Window:     {} to {}",
        run.backtest.start_date, run.backtest.end_date
    );
    eprintln!(
        "Hedge:      {} (lookback {})",
        run.backtest.hedge_method, run.backtest.hedge_lookback
    );
    eprintln!(
        "Strategy:   {} (entry {}, exit {}, lookback {}, units {})",
        run.strategy.name(),
        run.strategy.entry_z(),
        run.strategy.exit_z(),
        run.strategy.lookback(),
        run.strategy.units()
    );
    eprintln!(
        "Commission: {} per unit, minimum {}",
        run.backtest.commission.per_unit(),
        run.backtest.commission.minimum()
    );
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let directory = match config.get_trimmed("data", "directory") {
        Some(d) => PathBuf::from(d),
        None => {
            return fail(PairtraderError::ConfigMissing {
                section: "data".into(),
                key: "directory".into(),
            });
        }
    };
    let (symbol1, symbol2) = match validate_symbols(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let provider = CsvPriceAdapter::new(directory);
    match pair_info(&provider, &symbol1, &symbol2) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// One line per symbol plus the window both symbols share.
///
/// A symbol with no data fails with the provider's available symbols listed.
pub fn pair_info(
    provider: &dyn PriceSeriesProvider,
    symbol1: &str,
    symbol2: &str,
) -> Result<Vec<String>, PairtraderError> {
    let mut lines = Vec::with_capacity(3);
    let mut ranges = Vec::with_capacity(2);
    for symbol in [symbol1, symbol2] {
        match provider.data_range(symbol)? {
            Some((first, last, count)) => {
                lines.push(format!("{symbol}: {count} rows, {first} to {last}"));
                ranges.push((first, last));
            }
            None => {
                let available = provider.list_symbols().unwrap_or_default();
                let reason = if available.is_empty() {
                    "no data found".to_string()
                } else {
                    format!("no data found (available: {})", available.join(", "))
                };
                return Err(PairtraderError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason,
                });
            }
        }
    }

    let start = ranges[0].0.max(ranges[1].0);
    let end = ranges[0].1.min(ranges[1].1);
    if end > start {
        lines.push(format!("shared: {start} to {end}"));
    } else {
        lines.push("shared: none".to_string());
    }
    Ok(lines)
}

fn run_budget(config_path: &Path, hedge_ratio: [f64; 2], decimals: u32) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    match budget_from_config(&config, hedge_ratio, decimals) {
        Ok(budget) => {
            println!("{budget:.2}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Required budget at the latest close inside the configured window.
pub fn budget_from_config(
    config: &dyn ConfigPort,
    hedge_ratio: [f64; 2],
    decimals: u32,
) -> Result<f64, PairtraderError> {
    let directory = config
        .get_trimmed("data", "directory")
        .ok_or_else(|| PairtraderError::ConfigMissing {
            section: "data".into(),
            key: "directory".into(),
        })?;
    let (symbol1, symbol2) = validate_symbols(config)?;
    let (start, end) = validate_dates(config)?;

    let provider = CsvPriceAdapter::new(PathBuf::from(directory));
    let pair = load_pair(&provider, &symbol1, &symbol2, start, end)?;
    pair.required_budget(hedge_ratio, decimals)
}
