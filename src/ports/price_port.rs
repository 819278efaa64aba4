//! Price series provider port trait.

use chrono::NaiveDate;

use crate::domain::error::PairtraderError;
use crate::domain::pair::InstrumentPair;
use crate::domain::price::PriceSeries;

pub trait PriceSeriesProvider {
    /// Adjusted closes for `symbol` with `start <= date <= end`, oldest first.
    ///
    /// Any failure (missing file, network, no rows) is reported as
    /// `DataUnavailable`.
    fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, PairtraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, PairtraderError>;

    /// First date, last date and row count, or `None` if the symbol is unknown.
    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PairtraderError>;
}

/// Fetch both legs over `start..=end` and reconcile them into a pair.
pub fn load_pair(
    provider: &dyn PriceSeriesProvider,
    symbol1: &str,
    symbol2: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<InstrumentPair, PairtraderError> {
    let series1 = provider.fetch_series(symbol1, start, end)?;
    let series2 = provider.fetch_series(symbol2, start, end)?;
    InstrumentPair::new(series1, series2)
}
