//! Performance metrics derived from the theoretical return series.

use crate::domain::backtest::PairBacktest;
use crate::domain::error::PairtraderError;
use crate::domain::strategy::PairStrategy;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub realized_return: f64,
    pub cumulative_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub trades: usize,
    pub total_commission: f64,
    pub initial_budget: f64,
    pub final_budget: f64,
}

impl Metrics {
    pub fn compute<S: PairStrategy>(backtest: &PairBacktest<S>) -> Result<Self, PairtraderError> {
        let ledger = backtest.ledger()?;
        let theoretical = backtest.theoretical_returns()?;
        let cumulative = cumulative_returns(&theoretical);

        let cumulative_return = cumulative.last().copied().flatten().unwrap_or(0.0);
        let (max_drawdown, max_drawdown_duration) = drawdown(&cumulative);

        Ok(Metrics {
            realized_return: ledger.realized_return(),
            cumulative_return,
            annualized_return: annualize(cumulative_return, backtest.pair().elapsed_days()),
            sharpe_ratio: sharpe_ratio(&theoretical),
            max_drawdown,
            max_drawdown_duration,
            trades: ledger.trade_count(),
            total_commission: ledger.total_commission(),
            initial_budget: ledger.initial_budget,
            final_budget: ledger.final_budget,
        })
    }
}

/// Running `Π(1 + r) - 1`.
///
/// Dates before the first available return stay `None`; later gaps carry the
/// previous cumulative value forward.
pub fn cumulative_returns(returns: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut growth = 1.0;
    let mut started = false;
    returns
        .iter()
        .map(|r| {
            if let Some(r) = r {
                growth *= 1.0 + r;
                started = true;
            }
            started.then_some(growth - 1.0)
        })
        .collect()
}

/// `(1 + total)^(365 / days) - 1`; zero when `days` is not positive.
pub fn annualize(total_return: f64, elapsed_days: i64) -> f64 {
    if elapsed_days <= 0 {
        return 0.0;
    }
    (1.0 + total_return).powf(CALENDAR_DAYS_PER_YEAR / elapsed_days as f64) - 1.0
}

/// `sqrt(252) * mean / stddev` over the available returns.
///
/// Uses the population standard deviation (divides by N). Zero when there are
/// no returns or they do not vary.
pub fn sharpe_ratio(returns: &[Option<f64>]) -> f64 {
    let values: Vec<f64> = returns.iter().flatten().copied().collect();
    if values.is_empty() {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        TRADING_DAYS_PER_YEAR.sqrt() * mean / stddev
    } else {
        0.0
    }
}

/// Maximum drawdown and its duration over the equity curve `1 + cumulative`.
///
/// Drawdown is `(peak - equity) / peak` against the running peak, reported as a
/// positive fraction. Duration is the longest run of consecutive dates spent
/// strictly below the running peak.
pub fn drawdown(cumulative: &[Option<f64>]) -> (f64, usize) {
    let mut equity = cumulative.iter().flatten().map(|c| 1.0 + c);
    let Some(mut peak) = equity.next() else {
        return (0.0, 0);
    };

    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut current_duration = 0usize;

    for value in equity {
        if value >= peak {
            peak = value;
            current_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}
