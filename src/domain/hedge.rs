//! Rolling hedge-ratio estimation and the derived price spread.
//!
//! For every row `i` in `lookback..n` instrument 1's close is regressed on
//! instrument 2's close (with intercept) over the trailing window
//! `[i - lookback, i)`, which never includes row `i` itself. The slope `β`
//! becomes the hedge vector `[1, -β]` and is stored at row `i - 1`, one row
//! earlier than the first date it could be traded on. Downstream returns depend
//! on this alignment, so it is kept as is.
//!
//! Rows before `lookback` are the warm-up period and stay `[0, 0]`; the estimate
//! from the very first window would land on row `lookback - 1` and is therefore
//! discarded. The last row is never reached by a window and stays `[0, 0]` too.

use std::cell::OnceCell;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::domain::error::PairtraderError;
use crate::domain::pair::InstrumentPair;

/// `[h1, h2]` weights such that `h1 * close1 + h2 * close2` is the spread.
pub type HedgeRatio = [f64; 2];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HedgeMethod {
    Ols,
}

impl FromStr for HedgeMethod {
    type Err = PairtraderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OLS" => Ok(HedgeMethod::Ols),
            other => Err(PairtraderError::UnsupportedMethod {
                method: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for HedgeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HedgeMethod::Ols => write!(f, "OLS"),
        }
    }
}

/// Slope of the least-squares line `y = a + b x`.
///
/// Returns `None` when `x` has no variance (or fewer than two points), where the
/// slope is undefined.
pub fn ols_slope(y: &[f64], x: &[f64]) -> Option<f64> {
    let n = y.len().min(x.len());
    if n < 2 {
        return None;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (xi, yi) in x[..n].iter().zip(&y[..n]) {
        let dx = xi - mean_x;
        cov += dx * (yi - mean_y);
        var_x += dx * dx;
    }

    if var_x <= f64::EPSILON * mean_x.abs().max(1.0) {
        None
    } else {
        Some(cov / var_x)
    }
}

/// Pointwise `h1 * close1 + h2 * close2`.
pub fn compute_spread(ratios: &[HedgeRatio], closes1: &[f64], closes2: &[f64]) -> Vec<f64> {
    ratios
        .iter()
        .zip(closes1.iter().zip(closes2))
        .map(|([h1, h2], (c1, c2))| h1 * c1 + h2 * c2)
        .collect()
}

#[derive(Debug)]
struct HedgeEstimate {
    method: HedgeMethod,
    lookback: usize,
    ratios: Vec<HedgeRatio>,
    spread: OnceCell<Vec<f64>>,
}

/// Hedge ratios and spread are one unit: either both absent, or ratios present
/// with a spread that is derived from exactly those ratios.
#[derive(Debug)]
enum HedgeState {
    Absent,
    Estimated(HedgeEstimate),
}

#[derive(Debug)]
pub struct HedgeEstimator {
    pair: InstrumentPair,
    state: HedgeState,
}

impl HedgeEstimator {
    pub fn new(pair: InstrumentPair) -> Self {
        Self {
            pair,
            state: HedgeState::Absent,
        }
    }

    pub fn pair(&self) -> &InstrumentPair {
        &self.pair
    }

    /// Estimate hedge ratios with a method name such as `"OLS"`.
    pub fn estimate(&mut self, method: &str, lookback: usize) -> Result<&[HedgeRatio], PairtraderError> {
        let method = method.parse::<HedgeMethod>()?;
        self.estimate_with(method, lookback)
    }

    /// Recompute hedge ratios, replacing any cached ratios and spread.
    pub fn estimate_with(
        &mut self,
        method: HedgeMethod,
        lookback: usize,
    ) -> Result<&[HedgeRatio], PairtraderError> {
        if lookback == 0 {
            return Err(PairtraderError::invalid("lookback", "must be > 0"));
        }

        let ratios = match method {
            HedgeMethod::Ols => self.rolling_ols(lookback),
        };
        debug!(
            %method,
            lookback,
            rows = ratios.len(),
            symbol1 = self.pair.symbol1(),
            symbol2 = self.pair.symbol2(),
            "estimated hedge ratios"
        );

        self.state = HedgeState::Estimated(HedgeEstimate {
            method,
            lookback,
            ratios,
            spread: OnceCell::new(),
        });
        self.hedge_ratios()
    }

    fn rolling_ols(&self, lookback: usize) -> Vec<HedgeRatio> {
        let closes1 = self.pair.closes1();
        let closes2 = self.pair.closes2();
        let mut ratios = vec![[0.0, 0.0]; self.pair.len()];

        for i in (lookback + 1)..self.pair.len() {
            let window = (i - lookback)..i;
            let beta = match ols_slope(&closes1[window.clone()], &closes2[window]) {
                Some(beta) => beta,
                None => {
                    warn!(
                        row = i - 1,
                        date = %self.pair.dates()[i - 1],
                        "regressor has no variance in window, using zero slope"
                    );
                    0.0
                }
            };
            ratios[i - 1] = [1.0, -beta];
        }
        ratios
    }

    /// Drop cached hedge ratios together with the spread derived from them.
    pub fn invalidate(&mut self) {
        self.state = HedgeState::Absent;
    }

    pub fn is_estimated(&self) -> bool {
        matches!(self.state, HedgeState::Estimated(_))
    }

    pub fn method(&self) -> Option<HedgeMethod> {
        match &self.state {
            HedgeState::Estimated(e) => Some(e.method),
            HedgeState::Absent => None,
        }
    }

    pub fn lookback(&self) -> Option<usize> {
        match &self.state {
            HedgeState::Estimated(e) => Some(e.lookback),
            HedgeState::Absent => None,
        }
    }

    pub fn hedge_ratios(&self) -> Result<&[HedgeRatio], PairtraderError> {
        match &self.state {
            HedgeState::Estimated(e) => Ok(&e.ratios),
            HedgeState::Absent => Err(PairtraderError::precedence("hedge ratios", "estimate")),
        }
    }

    /// `h1 * close1 + h2 * close2` per aligned date, computed once per estimate.
    pub fn price_spread(&self) -> Result<&[f64], PairtraderError> {
        match &self.state {
            HedgeState::Estimated(e) => Ok(e.spread.get_or_init(|| {
                compute_spread(&e.ratios, self.pair.closes1(), self.pair.closes2())
            })),
            HedgeState::Absent => Err(PairtraderError::precedence("price spread", "hedge ratios")),
        }
    }
}
