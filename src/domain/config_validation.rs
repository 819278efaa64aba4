//! Configuration validation.
//!
//! Reads every section eagerly and turns it into a [`RunConfig`], so a bad value
//! is reported before any price data is loaded.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::domain::backtest::{BacktestConfig, CommissionModel};
use crate::domain::error::PairtraderError;
use crate::domain::hedge::HedgeMethod;
use crate::domain::strategy::BollingerPair;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_HEDGE_LOOKBACK: i64 = 20;
pub const DEFAULT_STRATEGY_LOOKBACK: i64 = 20;
pub const DEFAULT_ENTRY_Z: f64 = 1.0;
pub const DEFAULT_EXIT_Z: f64 = 0.0;
pub const DEFAULT_UNITS: f64 = 1.0;

/// Everything a backtest run needs, validated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data_directory: PathBuf,
    pub symbol1: String,
    pub symbol2: String,
    pub backtest: BacktestConfig,
    pub strategy: BollingerPair,
    pub report_output: Option<String>,
}

pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, PairtraderError> {
    let data_directory = PathBuf::from(required_string(config, "data", "directory")?);
    let (symbol1, symbol2) = validate_symbols(config)?;
    let (start_date, end_date) = validate_dates(config)?;
    let (hedge_method, hedge_lookback) = validate_hedge(config)?;
    let strategy = validate_strategy(config)?;
    let commission = validate_commission(config)?;

    Ok(RunConfig {
        data_directory,
        symbol1,
        symbol2,
        backtest: BacktestConfig {
            start_date,
            end_date,
            hedge_method,
            hedge_lookback,
            commission,
        },
        strategy,
        report_output: config.get_trimmed("report", "output"),
    })
}

pub fn validate_symbols(config: &dyn ConfigPort) -> Result<(String, String), PairtraderError> {
    let symbol1 = required_string(config, "pair", "symbol1")?;
    let symbol2 = required_string(config, "pair", "symbol2")?;
    if symbol1.eq_ignore_ascii_case(&symbol2) {
        return Err(invalid("pair", "symbol2", "must differ from symbol1"));
    }
    Ok((symbol1, symbol2))
}

pub fn validate_dates(config: &dyn ConfigPort) -> Result<(NaiveDate, NaiveDate), PairtraderError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;
    if start_date >= end_date {
        return Err(invalid("pair", "start_date", "start_date must be before end_date"));
    }
    Ok((start_date, end_date))
}

pub fn validate_hedge(config: &dyn ConfigPort) -> Result<(HedgeMethod, usize), PairtraderError> {
    let method = match config.get_trimmed("hedge", "method") {
        Some(name) => HedgeMethod::from_str(&name)?,
        None => HedgeMethod::Ols,
    };
    let lookback = read_count(config, "hedge", "lookback", DEFAULT_HEDGE_LOOKBACK, 1)?;
    Ok((method, lookback))
}

pub fn validate_strategy(config: &dyn ConfigPort) -> Result<BollingerPair, PairtraderError> {
    if let Some(name) = config.get_trimmed("strategy", "name") {
        if !name.eq_ignore_ascii_case("bollinger") {
            return Err(invalid(
                "strategy",
                "name",
                format!("unknown strategy {name:?} (available: bollinger)"),
            ));
        }
    }

    let entry_z = read_double(config, "strategy", "entry_z", DEFAULT_ENTRY_Z)?;
    let exit_z = read_double(config, "strategy", "exit_z", DEFAULT_EXIT_Z)?;
    let lookback = read_count(config, "strategy", "lookback", DEFAULT_STRATEGY_LOOKBACK, 2)?;
    let units = read_double(config, "strategy", "units", DEFAULT_UNITS)?;

    BollingerPair::new(entry_z, exit_z, lookback, units).map_err(|e| match e {
        PairtraderError::InvalidParameter { name, reason } => invalid("strategy", &name, reason),
        other => other,
    })
}

pub fn validate_commission(config: &dyn ConfigPort) -> Result<CommissionModel, PairtraderError> {
    let defaults = CommissionModel::default();
    let per_unit = read_double(config, "commission", "per_unit", defaults.per_unit())?;
    let minimum = read_double(config, "commission", "minimum", defaults.minimum())?;
    CommissionModel::new(per_unit, minimum).map_err(|e| match e {
        PairtraderError::InvalidParameter { name, reason } => invalid("commission", &name, reason),
        other => other,
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> PairtraderError {
    PairtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required_string(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, PairtraderError> {
    config
        .get_trimmed(section, key)
        .ok_or_else(|| PairtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, PairtraderError> {
    let value = required_string(config, "pair", field)?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
        invalid("pair", field, format!("invalid {field} format, expected YYYY-MM-DD"))
    })
}

fn read_double(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, PairtraderError> {
    let value = config
        .get_double(section, key)
        .map_err(|reason| invalid(section, key, reason))?
        .unwrap_or(default);
    if !value.is_finite() {
        return Err(invalid(section, key, "must be a finite number"));
    }
    Ok(value)
}

fn read_count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
    min: i64,
) -> Result<usize, PairtraderError> {
    let value = config
        .get_int(section, key)
        .map_err(|reason| invalid(section, key, reason))?
        .unwrap_or(default);
    if value < min {
        return Err(invalid(section, key, format!("{key} must be at least {min}")));
    }
    usize::try_from(value).map_err(|_| invalid(section, key, "out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const BASE: &str = "[data]\ndirectory = /data\n\
                        [pair]\nsymbol1 = V\nsymbol2 = MA\nstart_date = 2021-01-01\nend_date = 2021-12-31\n";

    fn make_config(extra: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(&format!("{BASE}{extra}")).unwrap()
    }

    fn invalid_key(err: &PairtraderError) -> Option<(&str, &str)> {
        match err {
            PairtraderError::ConfigInvalid { section, key, .. } => Some((section, key)),
            _ => None,
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let run = load_run_config(&make_config("")).unwrap();
        assert_eq!(run.data_directory, PathBuf::from("/data"));
        assert_eq!(run.symbol1, "V");
        assert_eq!(run.symbol2, "MA");
        assert_eq!(run.backtest.hedge_method, HedgeMethod::Ols);
        assert_eq!(run.backtest.hedge_lookback, 20);
        assert_eq!(run.backtest.commission, CommissionModel::default());
        assert_eq!(run.strategy, BollingerPair::new(1.0, 0.0, 20, 1.0).unwrap());
        assert_eq!(run.report_output, None);
    }

    #[test]
    fn full_config_is_read() {
        let run = load_run_config(&make_config(
            r#"
[hedge]
method = OLS
lookback = 30

[strategy]
name = bollinger
entry_z = 2.0
exit_z = 0.5
lookback = 10
units = 3

[commission]
per_unit = 0.01
minimum = 1.0

[report]
output = daily.csv
"#,
        ))
        .unwrap();
        assert_eq!(run.backtest.hedge_lookback, 30);
        assert_eq!(run.backtest.start_date, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(run.strategy, BollingerPair::new(2.0, 0.5, 10, 3.0).unwrap());
        assert_eq!(run.backtest.commission, CommissionModel::new(0.01, 1.0).unwrap());
        assert_eq!(run.report_output.as_deref(), Some("daily.csv"));
    }

    #[test]
    fn missing_data_directory_fails() {
        let config = FileConfigAdapter::from_string(
            "[pair]\nsymbol1 = V\nsymbol2 = MA\nstart_date = 2021-01-01\nend_date = 2021-12-31\n",
        )
        .unwrap();
        let err = load_run_config(&config).unwrap_err();
        assert!(matches!(err, PairtraderError::ConfigMissing { key, .. } if key == "directory"));
    }

    #[test]
    fn missing_symbol_fails() {
        let config = FileConfigAdapter::from_string("[pair]\nsymbol1 = V\n").unwrap();
        let err = validate_symbols(&config).unwrap_err();
        assert!(matches!(err, PairtraderError::ConfigMissing { key, .. } if key == "symbol2"));
    }

    #[test]
    fn identical_symbols_fail() {
        let config = FileConfigAdapter::from_string("[pair]\nsymbol1 = V\nsymbol2 = v\n").unwrap();
        let err = validate_symbols(&config).unwrap_err();
        assert_eq!(invalid_key(&err), Some(("pair", "symbol2")));
    }

    #[test]
    fn invalid_date_format_fails() {
        let config =
            FileConfigAdapter::from_string("[pair]\nstart_date = 2021/01/01\nend_date = 2021-12-31\n")
                .unwrap();
        let err = validate_dates(&config).unwrap_err();
        assert_eq!(invalid_key(&err), Some(("pair", "start_date")));
    }

    #[test]
    fn start_date_after_end_date_fails() {
        let config =
            FileConfigAdapter::from_string("[pair]\nstart_date = 2021-12-31\nend_date = 2021-01-01\n")
                .unwrap();
        let err = validate_dates(&config).unwrap_err();
        assert_eq!(invalid_key(&err), Some(("pair", "start_date")));
    }

    #[test]
    fn unknown_hedge_method_is_unsupported() {
        let err = load_run_config(&make_config("[hedge]\nmethod = Kalman\n")).unwrap_err();
        assert!(matches!(err, PairtraderError::UnsupportedMethod { method } if method == "Kalman"));
    }

    #[test]
    fn hedge_lookback_must_be_positive() {
        let err = load_run_config(&make_config("[hedge]\nlookback = 0\n")).unwrap_err();
        assert_eq!(invalid_key(&err), Some(("hedge", "lookback")));
    }

    #[test]
    fn non_numeric_lookback_fails() {
        let err = load_run_config(&make_config("[hedge]\nlookback = twenty\n")).unwrap_err();
        assert_eq!(invalid_key(&err), Some(("hedge", "lookback")));
    }

    #[test]
    fn unknown_strategy_fails() {
        let err = load_run_config(&make_config("[strategy]\nname = momentum\n")).unwrap_err();
        assert_eq!(invalid_key(&err), Some(("strategy", "name")));
    }

    #[test]
    fn strategy_parameter_errors_name_the_key() {
        let err = load_run_config(&make_config("[strategy]\nentry_z = 1.0\nexit_z = 2.0\n"))
            .unwrap_err();
        assert_eq!(invalid_key(&err), Some(("strategy", "exit_z")));

        let err = load_run_config(&make_config("[strategy]\nlookback = 1\n")).unwrap_err();
        assert_eq!(invalid_key(&err), Some(("strategy", "lookback")));

        let err = load_run_config(&make_config("[strategy]\nunits = -1\n")).unwrap_err();
        assert_eq!(invalid_key(&err), Some(("strategy", "units")));
    }

    #[test]
    fn negative_commission_fails() {
        let err = load_run_config(&make_config("[commission]\nminimum = -0.35\n")).unwrap_err();
        assert_eq!(invalid_key(&err), Some(("commission", "minimum")));
    }
}
