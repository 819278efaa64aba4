//! Pluggable pair strategies.
//!
//! A strategy turns a pair, its hedge ratios and its spread into one desired
//! continuous holding `[units1, units2]` per aligned date. Positions for a date
//! must only depend on data up to and including that date; the backtest engine
//! trusts this and does not check it.
//!
//! `lookback` is the number of leading dates the strategy needs before its
//! output is meaningful. The engine never trades on those dates.

pub mod bollinger;

use crate::domain::error::PairtraderError;
use crate::domain::hedge::HedgeRatio;
use crate::domain::pair::InstrumentPair;

pub use bollinger::BollingerPair;

/// Desired holdings of instrument 1 and instrument 2, in (fractional) units.
pub type Position = [f64; 2];

pub trait PairStrategy {
    fn name(&self) -> &str;

    fn lookback(&self) -> usize;

    fn positions(
        &self,
        pair: &InstrumentPair,
        hedge_ratios: &[HedgeRatio],
        spread: &[f64],
    ) -> Result<Vec<Position>, PairtraderError>;
}

impl<S: PairStrategy + ?Sized> PairStrategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn lookback(&self) -> usize {
        (**self).lookback()
    }

    fn positions(
        &self,
        pair: &InstrumentPair,
        hedge_ratios: &[HedgeRatio],
        spread: &[f64],
    ) -> Result<Vec<Position>, PairtraderError> {
        (**self).positions(pair, hedge_ratios, spread)
    }
}

/// Check that per-date inputs line up with the pair's aligned dates.
pub(crate) fn check_aligned(
    pair: &InstrumentPair,
    hedge_ratios: &[HedgeRatio],
    spread: &[f64],
) -> Result<(), PairtraderError> {
    if hedge_ratios.len() != pair.len() || spread.len() != pair.len() {
        return Err(PairtraderError::invalid(
            "hedge_ratios",
            format!(
                "expected {} rows, got {} hedge ratios and {} spread values",
                pair.len(),
                hedge_ratios.len(),
                spread.len()
            ),
        ));
    }
    Ok(())
}
