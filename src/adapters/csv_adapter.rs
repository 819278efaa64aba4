//! CSV file price adapter.
//!
//! One file per symbol, `<base>/<SYMBOL>.csv`, with a header row containing a
//! `date` column (`YYYY-MM-DD`) and a `close` column. `adj_close` or
//! `adjusted_close` is preferred over `close` when present.

use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

use crate::domain::error::PairtraderError;
use crate::domain::price::{PricePoint, PriceSeries};
use crate::ports::price_port::PriceSeriesProvider;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    fn read_points(&self, symbol: &str) -> Result<Vec<PricePoint>, PairtraderError> {
        let unavailable = |reason: String| PairtraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| unavailable(format!("CSV header error: {e}")))?
            .clone();
        let column = |names: &[&str]| {
            names.iter().find_map(|name| {
                headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(name))
            })
        };
        let date_col = column(&["date"]).ok_or_else(|| unavailable("missing date column".into()))?;
        let close_col = column(&["adj_close", "adjusted_close", "close"])
            .ok_or_else(|| unavailable("missing close column".into()))?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| unavailable(format!("CSV parse error: {e}")))?;

            let date_str = record
                .get(date_col)
                .ok_or_else(|| unavailable("missing date value".into()))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| unavailable(format!("invalid date {date_str:?}: {e}")))?;

            let close: f64 = record
                .get(close_col)
                .ok_or_else(|| unavailable("missing close value".into()))?
                .trim()
                .parse()
                .map_err(|e| unavailable(format!("invalid close on {date}: {e}")))?;

            points.push(PricePoint::new(date, close));
        }

        points.sort_by_key(|p| p.date);
        Ok(points)
    }
}

impl PriceSeriesProvider for CsvPriceAdapter {
    fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, PairtraderError> {
        let points: Vec<PricePoint> = self
            .read_points(symbol)?
            .into_iter()
            .filter(|p| p.date >= start && p.date <= end)
            .collect();
        PriceSeries::new(symbol, points).map_err(|e| match e {
            PairtraderError::DataUnavailable { .. } => e,
            other => PairtraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: other.to_string(),
            },
        })
    }

    fn list_symbols(&self) -> Result<Vec<String>, PairtraderError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PairtraderError> {
        if !self.csv_path(symbol).exists() {
            return Ok(None);
        }
        let points = self.read_points(symbol)?;
        match (points.first(), points.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date, last.date, points.len()))),
            _ => Ok(None),
        }
    }
}
