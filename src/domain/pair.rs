//! Two instruments reconciled onto their shared trading window.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::error::PairtraderError;
use crate::domain::numeric::truncate;
use crate::domain::price::PriceSeries;

/// Aligned closes for a sub-range of a pair.
#[derive(Debug, Clone, Copy)]
pub struct AlignedCloses<'a> {
    pub dates: &'a [NaiveDate],
    pub closes1: &'a [f64],
    pub closes2: &'a [f64],
}

#[derive(Debug, Clone)]
pub struct InstrumentPair {
    series1: PriceSeries,
    series2: PriceSeries,
    start_date: NaiveDate,
    end_date: NaiveDate,
    dates: Vec<NaiveDate>,
    closes1: Vec<f64>,
    closes2: Vec<f64>,
}

impl InstrumentPair {
    /// Build a pair over `[max(starts), min(ends)]`.
    ///
    /// Only dates quoted by both series inside that window are kept. Fails with
    /// `IncompatibleRange` when the window is empty or fewer than two dates are
    /// shared.
    pub fn new(series1: PriceSeries, series2: PriceSeries) -> Result<Self, PairtraderError> {
        let start_date = series1.start_date().max(series2.start_date());
        let end_date = series1.end_date().min(series2.end_date());

        if end_date <= start_date {
            return Err(PairtraderError::IncompatibleRange {
                symbol1: series1.symbol().to_string(),
                symbol2: series2.symbol().to_string(),
                reason: format!("no shared dates (window {start_date} to {end_date})"),
            });
        }

        let a = series1.between(start_date, end_date);
        let b = series2.between(start_date, end_date);

        let mut dates = Vec::with_capacity(a.len().min(b.len()));
        let mut closes1 = Vec::with_capacity(dates.capacity());
        let mut closes2 = Vec::with_capacity(dates.capacity());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].date.cmp(&b[j].date) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dates.push(a[i].date);
                    closes1.push(a[i].close);
                    closes2.push(b[j].close);
                    i += 1;
                    j += 1;
                }
            }
        }

        if dates.len() < 2 {
            return Err(PairtraderError::IncompatibleRange {
                symbol1: series1.symbol().to_string(),
                symbol2: series2.symbol().to_string(),
                reason: format!("only {} common trading dates", dates.len()),
            });
        }

        let dropped = a.len() + b.len() - 2 * dates.len();
        if dropped > 0 {
            debug!(
                symbol1 = series1.symbol(),
                symbol2 = series2.symbol(),
                dropped,
                "dropped dates not quoted by both instruments"
            );
        }

        Ok(Self {
            series1,
            series2,
            start_date,
            end_date,
            dates,
            closes1,
            closes2,
        })
    }

    pub fn symbol1(&self) -> &str {
        self.series1.symbol()
    }

    pub fn symbol2(&self) -> &str {
        self.series2.symbol()
    }

    pub fn series1(&self) -> &PriceSeries {
        &self.series1
    }

    pub fn series2(&self) -> &PriceSeries {
        &self.series2
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Calendar days between the pair's start and end dates.
    pub fn elapsed_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn closes1(&self) -> &[f64] {
        &self.closes1
    }

    pub fn closes2(&self) -> &[f64] {
        &self.closes2
    }

    /// Both closes on aligned row `i`.
    pub fn closes_at(&self, i: usize) -> [f64; 2] {
        [self.closes1[i], self.closes2[i]]
    }

    pub fn latest_closes(&self) -> [f64; 2] {
        self.closes_at(self.dates.len() - 1)
    }

    /// Aligned closes restricted to `start..=end`.
    pub fn closes_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AlignedCloses<'_>, PairtraderError> {
        let range_err = |reason: &str| PairtraderError::Range {
            start: start.to_string(),
            end: end.to_string(),
            reason: reason.to_string(),
        };
        if end <= start {
            return Err(range_err("end date is the same as or before start date"));
        }
        if start < self.start_date {
            return Err(range_err("start date is before the pair start date"));
        }
        if end > self.end_date {
            return Err(range_err("end date is after the pair end date"));
        }

        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end);
        Ok(AlignedCloses {
            dates: &self.dates[lo..hi],
            closes1: &self.closes1[lo..hi],
            closes2: &self.closes2[lo..hi],
        })
    }

    /// Cash needed to hold an integer number of shares of each leg at the latest
    /// close, for hedge ratios expressed to `decimals` places.
    ///
    /// Each ratio is truncated, its magnitude scaled by `10^decimals`, priced at
    /// the latest aligned close, and the total truncated to cents.
    pub fn required_budget(
        &self,
        hedge_ratio: [f64; 2],
        decimals: u32,
    ) -> Result<f64, PairtraderError> {
        if hedge_ratio.iter().any(|h| !h.is_finite()) {
            return Err(PairtraderError::invalid(
                "hedge_ratio",
                format!("components must be finite, got {hedge_ratio:?}"),
            ));
        }
        let scale = 10i32
            .checked_pow(decimals)
            .map(f64::from)
            .ok_or_else(|| PairtraderError::invalid("decimals", format!("{decimals} is too large")))?;

        let [price1, price2] = self.latest_closes();
        let budget = price1 * truncate(hedge_ratio[0], decimals).abs() * scale
            + price2 * truncate(hedge_ratio[1], decimals).abs() * scale;
        Ok(truncate(budget, 2))
    }
}
