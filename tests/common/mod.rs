#![allow(dead_code)]

use chrono::NaiveDate;
use pairtrader::domain::error::PairtraderError;
use pairtrader::domain::hedge::HedgeRatio;
use pairtrader::domain::pair::InstrumentPair;
pub use pairtrader::domain::price::{PricePoint, PriceSeries};
use pairtrader::domain::strategy::{PairStrategy, Position};
use pairtrader::ports::price_port::PriceSeriesProvider;
use std::collections::HashMap;

pub struct MockPriceProvider {
    pub data: HashMap<String, Vec<PricePoint>>,
    pub errors: HashMap<String, String>,
}

impl MockPriceProvider {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_points(mut self, symbol: &str, points: Vec<PricePoint>) -> Self {
        self.data.insert(symbol.to_string(), points);
        self
    }

    pub fn with_closes(self, symbol: &str, start: NaiveDate, closes: &[f64]) -> Self {
        self.with_points(symbol, daily_points(start, closes))
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), PairtraderError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(PairtraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl PriceSeriesProvider for MockPriceProvider {
    fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, PairtraderError> {
        self.check(symbol)?;
        let points = self
            .data
            .get(symbol)
            .map(|pts| {
                pts.iter()
                    .filter(|p| p.date >= start && p.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        PriceSeries::new(symbol, points)
    }

    fn list_symbols(&self) -> Result<Vec<String>, PairtraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PairtraderError> {
        self.check(symbol)?;
        match self.data.get(symbol) {
            Some(points) if !points.is_empty() => {
                let min = points.iter().map(|p| p.date).min().unwrap();
                let max = points.iter().map(|p| p.date).max().unwrap();
                Ok(Some((min, max, points.len())))
            }
            _ => Ok(None),
        }
    }
}

/// Always flat.
pub struct NoTrade;

impl PairStrategy for NoTrade {
    fn name(&self) -> &str {
        "no-trade"
    }

    fn lookback(&self) -> usize {
        0
    }

    fn positions(
        &self,
        pair: &InstrumentPair,
        _hedge_ratios: &[HedgeRatio],
        _spread: &[f64],
    ) -> Result<Vec<Position>, PairtraderError> {
        Ok(vec![[0.0, 0.0]; pair.len()])
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Consecutive calendar days starting at `start`.
pub fn daily_points(start: NaiveDate, closes: &[f64]) -> Vec<PricePoint> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PricePoint::new(start + chrono::Duration::days(i as i64), c))
        .collect()
}

pub fn make_pair(start: NaiveDate, closes1: &[f64], closes2: &[f64]) -> InstrumentPair {
    InstrumentPair::new(
        PriceSeries::new("V", daily_points(start, closes1)).unwrap(),
        PriceSeries::new("MA", daily_points(start, closes2)).unwrap(),
    )
    .unwrap()
}

/// Ten dates where instrument 1 tracks `2 * close2 + 5` exactly up to t = 5 and
/// then drifts upward by 3 per day.
pub fn diverging_closes() -> (Vec<f64>, Vec<f64>) {
    let closes2: Vec<f64> = (0..10).map(|t| 10.0 + t as f64).collect();
    let closes1 = closes2
        .iter()
        .enumerate()
        .map(|(t, c2)| 2.0 * c2 + 5.0 + 3.0 * t.saturating_sub(5) as f64)
        .collect();
    (closes1, closes2)
}

pub const VALID_INI: &str = r#"
[data]
directory = /var/lib/pairtrader/prices

[pair]
symbol1 = V
symbol2 = MA
start_date = 2021-01-01
end_date = 2021-01-10

[hedge]
method = OLS
lookback = 5

[strategy]
name = bollinger
entry_z = 1.0
exit_z = 0.0
lookback = 3
units = 1

[commission]
per_unit = 0.0035
minimum = 0.35
"#;
