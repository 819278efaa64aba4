//! Report generation port trait.

use crate::domain::backtest::PairBacktest;
use crate::domain::error::PairtraderError;
use crate::domain::metrics::Metrics;
use crate::domain::strategy::PairStrategy;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write<S: PairStrategy>(
        &self,
        backtest: &PairBacktest<S>,
        metrics: &Metrics,
        output_path: &str,
    ) -> Result<(), PairtraderError>;
}
