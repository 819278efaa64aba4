//! CSV report adapter implementing ReportPort.
//!
//! Writes one row per aligned date to the output path and the summary metrics
//! as `metric,value` rows to a sibling `<stem>.summary.csv`.

use std::path::{Path, PathBuf};

use crate::domain::backtest::PairBacktest;
use crate::domain::error::PairtraderError;
use crate::domain::metrics::Metrics;
use crate::domain::strategy::PairStrategy;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// `reports/daily.csv` → `reports/daily.summary.csv`.
    pub fn summary_path(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        output_path.with_file_name(format!("{stem}.summary.csv"))
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn csv_error(err: csv::Error) -> PairtraderError {
    PairtraderError::Io(std::io::Error::other(err))
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl ReportPort for CsvReportAdapter {
    fn write<S: PairStrategy>(
        &self,
        backtest: &PairBacktest<S>,
        metrics: &Metrics,
        output_path: &str,
    ) -> Result<(), PairtraderError> {
        let pair = backtest.pair();
        let hedge_ratios = backtest.estimator().hedge_ratios()?;
        let spread = backtest.estimator().price_spread()?;
        let positions = backtest.positions()?;
        let rounded = backtest.rounded_positions()?;
        let theoretical = backtest.theoretical_returns()?;
        let cumulative = backtest.cumulative_returns()?;

        let (s1, s2) = (pair.symbol1(), pair.symbol2());
        let mut wtr = csv::Writer::from_path(output_path).map_err(csv_error)?;
        wtr.write_record([
            "date".to_string(),
            format!("close_{s1}"),
            format!("close_{s2}"),
            format!("hedge_{s1}"),
            format!("hedge_{s2}"),
            "spread".to_string(),
            format!("position_{s1}"),
            format!("position_{s2}"),
            format!("shares_{s1}"),
            format!("shares_{s2}"),
            "theoretical_return".to_string(),
            "cumulative_return".to_string(),
        ])
        .map_err(csv_error)?;

        for (i, date) in pair.dates().iter().enumerate() {
            let [c1, c2] = pair.closes_at(i);
            let [h1, h2] = hedge_ratios[i];
            let [p1, p2] = positions[i];
            let [u1, u2] = rounded[i];
            wtr.write_record([
                date.format("%Y-%m-%d").to_string(),
                c1.to_string(),
                c2.to_string(),
                h1.to_string(),
                h2.to_string(),
                spread[i].to_string(),
                p1.to_string(),
                p2.to_string(),
                u1.to_string(),
                u2.to_string(),
                optional(theoretical[i]),
                optional(cumulative[i]),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush()?;

        let summary_path = Self::summary_path(Path::new(output_path));
        let mut wtr = csv::Writer::from_path(&summary_path).map_err(csv_error)?;
        wtr.write_record(["metric", "value"]).map_err(csv_error)?;
        let rows: [(&str, String); 10] = [
            ("realized_return", metrics.realized_return.to_string()),
            ("cumulative_return", metrics.cumulative_return.to_string()),
            ("annualized_return", metrics.annualized_return.to_string()),
            ("sharpe_ratio", metrics.sharpe_ratio.to_string()),
            ("max_drawdown", metrics.max_drawdown.to_string()),
            ("max_drawdown_duration", metrics.max_drawdown_duration.to_string()),
            ("trades", metrics.trades.to_string()),
            ("total_commission", metrics.total_commission.to_string()),
            ("initial_budget", metrics.initial_budget.to_string()),
            ("final_budget", metrics.final_budget.to_string()),
        ];
        for (name, value) in rows {
            wtr.write_record([name, value.as_str()]).map_err(csv_error)?;
        }
        wtr.flush()?;

        Ok(())
    }
}
