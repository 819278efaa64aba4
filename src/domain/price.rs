//! Adjusted-close price series for a single instrument.

use chrono::NaiveDate;

use crate::domain::error::PairtraderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Chronologically ordered closes for one symbol.
///
/// Dates are unique and strictly increasing and every close is a positive finite
/// number. Gaps in the calendar are kept as delivered; nothing is resampled.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, PairtraderError> {
        let symbol = symbol.into();
        if points.is_empty() {
            return Err(PairtraderError::DataUnavailable {
                symbol,
                reason: "series is empty".into(),
            });
        }
        for w in points.windows(2) {
            if w[1].date <= w[0].date {
                return Err(PairtraderError::invalid(
                    "points",
                    format!(
                        "{symbol} dates must be strictly increasing ({} then {})",
                        w[0].date, w[1].date
                    ),
                ));
            }
        }
        if let Some(p) = points.iter().find(|p| !p.close.is_finite() || p.close <= 0.0) {
            return Err(PairtraderError::invalid(
                "points",
                format!("{symbol} close on {} must be positive, got {}", p.date, p.close),
            ));
        }
        Ok(Self { symbol, points })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    /// Points with `start <= date <= end`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> &[PricePoint] {
        let lo = self.points.partition_point(|p| p.date < start);
        let hi = self.points.partition_point(|p| p.date <= end);
        if lo >= hi { &[] } else { &self.points[lo..hi] }
    }
}
