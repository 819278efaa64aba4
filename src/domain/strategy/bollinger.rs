//! Bollinger band rule on the pair spread.
//!
//! z = (spread - SMA(n)) / StdDev(n), over the trailing `n = lookback` spreads
//! ending at the current date. StdDev is the population standard deviation.
//!
//! - flat and `z > entry_z`: short the spread (`-units`)
//! - flat and `z < -entry_z`: long the spread (`+units`)
//! - short and `z <= exit_z`: flat
//! - long and `z >= -exit_z`: flat
//!
//! Exits are checked before entries, so a position can flip on the same date.
//! Holdings per instrument are `units * hedge_ratio`.
//!
//! A date is only scored once every row of its window carries a hedge vector.
//! Windows that reach back into the unestimated `[0, 0]` rows close any open
//! position and hold nothing.

use crate::domain::error::PairtraderError;
use crate::domain::hedge::HedgeRatio;
use crate::domain::pair::InstrumentPair;
use crate::domain::strategy::{PairStrategy, Position, check_aligned};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerPair {
    entry_z: f64,
    exit_z: f64,
    lookback: usize,
    units: f64,
}

impl BollingerPair {
    pub fn new(entry_z: f64, exit_z: f64, lookback: usize, units: f64) -> Result<Self, PairtraderError> {
        if !entry_z.is_finite() || entry_z <= 0.0 {
            return Err(PairtraderError::invalid("entry_z", "must be a positive number"));
        }
        if !exit_z.is_finite() || exit_z >= entry_z {
            return Err(PairtraderError::invalid("exit_z", "must be below entry_z"));
        }
        if lookback < 2 {
            return Err(PairtraderError::invalid("lookback", "must be at least 2"));
        }
        if !units.is_finite() || units <= 0.0 {
            return Err(PairtraderError::invalid("units", "must be a positive number"));
        }
        Ok(Self {
            entry_z,
            exit_z,
            lookback,
            units,
        })
    }

    pub fn entry_z(&self) -> f64 {
        self.entry_z
    }

    pub fn exit_z(&self) -> f64 {
        self.exit_z
    }

    pub fn units(&self) -> f64 {
        self.units
    }

    /// z-score of `spread[i]` against the window ending at `i`.
    fn z_score(&self, spread: &[f64], i: usize) -> f64 {
        let window = &spread[i + 1 - self.lookback..=i];
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let stddev = variance.sqrt();
        if stddev > 0.0 {
            (spread[i] - mean) / stddev
        } else {
            0.0
        }
    }

    fn next_units(&self, current: f64, z: f64) -> f64 {
        let mut next = current;
        if next < 0.0 && z <= self.exit_z {
            next = 0.0;
        } else if next > 0.0 && z >= -self.exit_z {
            next = 0.0;
        }
        if next == 0.0 {
            if z > self.entry_z {
                next = -self.units;
            } else if z < -self.entry_z {
                next = self.units;
            }
        }
        next
    }
}

impl PairStrategy for BollingerPair {
    fn name(&self) -> &str {
        "bollinger"
    }

    fn lookback(&self) -> usize {
        self.lookback
    }

    fn positions(
        &self,
        pair: &InstrumentPair,
        hedge_ratios: &[HedgeRatio],
        spread: &[f64],
    ) -> Result<Vec<Position>, PairtraderError> {
        check_aligned(pair, hedge_ratios, spread)?;

        let mut positions = vec![[0.0, 0.0]; pair.len()];
        let mut units = 0.0;
        for i in self.lookback..pair.len() {
            let window = &hedge_ratios[i + 1 - self.lookback..=i];
            if window.iter().any(|h| *h == [0.0, 0.0]) {
                units = 0.0;
                continue;
            }
            units = self.next_units(units, self.z_score(spread, i));
            let [h1, h2] = hedge_ratios[i];
            positions[i] = [units * h1, units * h2];
        }
        Ok(positions)
    }
}
