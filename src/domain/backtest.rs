//! Backtest engine: integer orders, commissions and returns for one pair.
//!
//! BacktestConfig collects the run parameters read from configuration.
//!
//! Realized returns quantise the strategy's continuous positions to integer
//! share counts (truncated to 3 decimals, scaled by 1000), trade the day-over-day
//! difference at each date's close, charge commission per order, and compare the
//! cash left after the second-to-last date with a budget worth 1000 units of each
//! leg on the first date. Theoretical returns ignore all of that and mark the
//! continuous allocation to market.

use std::cell::OnceCell;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use crate::domain::error::PairtraderError;
use crate::domain::hedge::{HedgeEstimator, HedgeMethod};
use crate::domain::metrics;
use crate::domain::numeric::{decimal_to_f64, to_units, truncate};
use crate::domain::pair::InstrumentPair;
use crate::domain::strategy::{PairStrategy, Position};

/// Positions are quantised to this many decimals before scaling to shares.
pub const POSITION_DECIMALS: u32 = 3;

/// Units of each instrument bought with the initial budget.
pub const BUDGET_UNITS: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub hedge_method: HedgeMethod,
    pub hedge_lookback: usize,
    pub commission: CommissionModel,
}

/// `max(|order| * per_unit, minimum)` per non-zero order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommissionModel {
    per_unit: Decimal,
    minimum: Decimal,
}

impl Default for CommissionModel {
    fn default() -> Self {
        Self {
            per_unit: dec!(0.0035),
            minimum: dec!(0.35),
        }
    }
}

impl CommissionModel {
    pub fn new(per_unit: f64, minimum: f64) -> Result<Self, PairtraderError> {
        let parse = |name: &str, value: f64| {
            if !value.is_finite() || value < 0.0 {
                return Err(PairtraderError::invalid(name, "must be a non-negative number"));
            }
            Decimal::from_f64(value)
                .ok_or_else(|| PairtraderError::invalid(name, format!("{value} is out of range")))
        };
        Ok(Self {
            per_unit: parse("per_unit", per_unit)?,
            minimum: parse("minimum", minimum)?,
        })
    }

    pub fn per_unit(&self) -> f64 {
        decimal_to_f64(self.per_unit)
    }

    pub fn minimum(&self) -> f64 {
        decimal_to_f64(self.minimum)
    }

    pub fn commission(&self, order: i64) -> f64 {
        if order == 0 {
            return 0.0;
        }
        let cost = Decimal::from(order.unsigned_abs()) * self.per_unit;
        decimal_to_f64(cost.max(self.minimum))
    }
}

/// Integer trades and cash flow behind a realized return.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub rounded_positions: Vec<[i64; 2]>,
    pub orders: Vec<[i64; 2]>,
    pub commissions: Vec<[f64; 2]>,
    pub initial_budget: f64,
    pub final_budget: f64,
}

impl Ledger {
    pub fn realized_return(&self) -> f64 {
        self.final_budget / self.initial_budget - 1.0
    }

    /// Number of non-zero orders across both legs.
    pub fn trade_count(&self) -> usize {
        self.orders.iter().flatten().filter(|o| **o != 0).count()
    }

    pub fn total_commission(&self) -> f64 {
        self.commissions.iter().flatten().sum()
    }
}

/// One strategy run over one pair.
///
/// Owns the hedge estimator and caches the strategy's positions until the hedge
/// ratios are re-estimated or [`PairBacktest::invalidate`] is called.
#[derive(Debug)]
pub struct PairBacktest<S> {
    estimator: HedgeEstimator,
    strategy: S,
    commission: CommissionModel,
    positions: OnceCell<Vec<Position>>,
}

impl<S: PairStrategy> PairBacktest<S> {
    pub fn new(estimator: HedgeEstimator, strategy: S) -> Self {
        Self {
            estimator,
            strategy,
            commission: CommissionModel::default(),
            positions: OnceCell::new(),
        }
    }

    pub fn with_commission(mut self, commission: CommissionModel) -> Self {
        self.commission = commission;
        self
    }

    pub fn pair(&self) -> &InstrumentPair {
        self.estimator.pair()
    }

    pub fn estimator(&self) -> &HedgeEstimator {
        &self.estimator
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn commission(&self) -> &CommissionModel {
        &self.commission
    }

    /// Re-estimate hedge ratios and drop positions derived from the old ones.
    pub fn estimate_hedge(&mut self, method: HedgeMethod, lookback: usize) -> Result<(), PairtraderError> {
        self.estimator.estimate_with(method, lookback)?;
        self.positions = OnceCell::new();
        Ok(())
    }

    /// Drop cached positions.
    pub fn invalidate(&mut self) {
        self.positions = OnceCell::new();
    }

    pub fn positions(&self) -> Result<&[Position], PairtraderError> {
        if let Some(p) = self.positions.get() {
            return Ok(p);
        }

        let hedge_ratios = self.estimator.hedge_ratios()?;
        let spread = self.estimator.price_spread()?;
        let positions = self.strategy.positions(self.pair(), hedge_ratios, spread)?;

        if positions.len() != self.pair().len() {
            return Err(PairtraderError::invalid(
                "positions",
                format!(
                    "{} returned {} rows for {} dates",
                    self.strategy.name(),
                    positions.len(),
                    self.pair().len()
                ),
            ));
        }
        if let Some(i) = positions.iter().position(|p| p.iter().any(|v| !v.is_finite())) {
            return Err(PairtraderError::invalid(
                "positions",
                format!("{} produced a non-finite position on row {i}", self.strategy.name()),
            ));
        }

        debug!(strategy = self.strategy.name(), rows = positions.len(), "computed positions");
        Ok(self.positions.get_or_init(|| positions))
    }

    /// Integer share counts per date.
    ///
    /// Rows before the strategy lookback, and the final row, are flat.
    pub fn rounded_positions(&self) -> Result<Vec<[i64; 2]>, PairtraderError> {
        let positions = self.positions()?;
        let n = positions.len();
        let mut rounded = vec![[0i64, 0i64]; n];
        for i in self.strategy.lookback()..n.saturating_sub(1) {
            let [p1, p2] = positions[i];
            rounded[i] = [to_units(p1, POSITION_DECIMALS)?, to_units(p2, POSITION_DECIMALS)?];
        }
        Ok(rounded)
    }

    /// Cash needed for `BUDGET_UNITS` of each leg at the first aligned close.
    pub fn initial_budget(&self) -> f64 {
        let [c1, c2] = self.pair().closes_at(0);
        truncate(BUDGET_UNITS * (c1 + c2), 2)
    }

    pub fn ledger(&self) -> Result<Ledger, PairtraderError> {
        let rounded_positions = self.rounded_positions()?;
        let orders = first_difference(&rounded_positions);
        let commissions: Vec<[f64; 2]> = orders
            .iter()
            .map(|[o1, o2]| [self.commission.commission(*o1), self.commission.commission(*o2)])
            .collect();

        let pair = self.pair();
        let initial_budget = self.initial_budget();
        let mut budget = initial_budget;
        for i in 0..orders.len().saturating_sub(1) {
            let closes = pair.closes_at(i);
            for leg in 0..2 {
                budget -= orders[i][leg] as f64 * closes[leg] + commissions[i][leg];
            }
        }

        Ok(Ledger {
            rounded_positions,
            orders,
            commissions,
            initial_budget,
            final_budget: budget,
        })
    }

    /// Budget-normalised return after integer rounding and commissions.
    pub fn returns(&self) -> Result<f64, PairtraderError> {
        let ledger = self.ledger()?;
        info!(
            strategy = self.strategy.name(),
            trades = ledger.trade_count(),
            initial_budget = ledger.initial_budget,
            final_budget = ledger.final_budget,
            "realized backtest"
        );
        Ok(ledger.realized_return())
    }

    /// Frictionless per-date returns; `None` where no prior allocation exists.
    pub fn theoretical_returns(&self) -> Result<Vec<Option<f64>>, PairtraderError> {
        let positions = self.positions()?;
        let pair = self.pair();

        let allocations: Vec<[f64; 2]> = positions
            .iter()
            .enumerate()
            .map(|(i, [p1, p2])| {
                let [c1, c2] = pair.closes_at(i);
                [p1 * c1, p2 * c2]
            })
            .collect();

        let mut returns = Vec::with_capacity(positions.len());
        returns.push(None);
        for i in 1..positions.len() {
            let [prev1, prev2] = pair.closes_at(i - 1);
            let [c1, c2] = pair.closes_at(i);
            let [a1, a2] = allocations[i - 1];
            let pnl = a1 * (c1 / prev1 - 1.0) + a2 * (c2 / prev2 - 1.0);
            let gross = a1.abs() + a2.abs();
            returns.push(if gross > 0.0 { Some(pnl / gross) } else { None });
        }
        Ok(returns)
    }

    pub fn cumulative_returns(&self) -> Result<Vec<Option<f64>>, PairtraderError> {
        Ok(metrics::cumulative_returns(&self.theoretical_returns()?))
    }

    pub fn annualized_return(&self) -> Result<f64, PairtraderError> {
        let cumulative = self.cumulative_returns()?;
        let final_cum = cumulative.last().copied().flatten().unwrap_or(0.0);
        Ok(metrics::annualize(final_cum, self.pair().elapsed_days()))
    }

    pub fn sharpe(&self) -> Result<f64, PairtraderError> {
        Ok(metrics::sharpe_ratio(&self.theoretical_returns()?))
    }

    pub fn max_drawdown(&self) -> Result<f64, PairtraderError> {
        let (drawdown, _) = metrics::drawdown(&self.cumulative_returns()?);
        Ok(drawdown)
    }

    pub fn max_drawdown_duration(&self) -> Result<usize, PairtraderError> {
        let (_, duration) = metrics::drawdown(&self.cumulative_returns()?);
        Ok(duration)
    }
}

/// Day-over-day change per leg; the first row is always zero.
pub fn first_difference(rows: &[[i64; 2]]) -> Vec<[i64; 2]> {
    let mut out = Vec::with_capacity(rows.len());
    if rows.is_empty() {
        return out;
    }
    out.push([0, 0]);
    for w in rows.windows(2) {
        out.push([w[1][0] - w[0][0], w[1][1] - w[0][1]]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hedge::HedgeRatio;
    use crate::domain::price::{PricePoint, PriceSeries};
    use approx::assert_relative_eq;

    /// Replays a fixed position table.
    struct Scripted {
        lookback: usize,
        rows: Vec<Position>,
    }

    impl PairStrategy for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn lookback(&self) -> usize {
            self.lookback
        }

        fn positions(
            &self,
            _pair: &InstrumentPair,
            _hedge_ratios: &[HedgeRatio],
            _spread: &[f64],
        ) -> Result<Vec<Position>, PairtraderError> {
            Ok(self.rows.clone())
        }
    }

    fn make_pair(closes1: &[f64], closes2: &[f64]) -> InstrumentPair {
        let start = NaiveDate::from_ymd_opt(2022, 3, 1).unwrap();
        let build = |symbol: &str, closes: &[f64]| {
            let points = closes
                .iter()
                .enumerate()
                .map(|(i, &c)| PricePoint::new(start + chrono::Duration::days(i as i64), c))
                .collect();
            PriceSeries::new(symbol, points).unwrap()
        };
        InstrumentPair::new(build("V", closes1), build("MA", closes2)).unwrap()
    }

    fn backtest(closes1: &[f64], closes2: &[f64], lookback: usize, rows: Vec<Position>) -> PairBacktest<Scripted> {
        let mut estimator = HedgeEstimator::new(make_pair(closes1, closes2));
        estimator.estimate("OLS", 1).unwrap();
        PairBacktest::new(estimator, Scripted { lookback, rows })
    }

    #[test]
    fn commission_minimum_applies_to_small_orders() {
        let model = CommissionModel::default();
        assert_eq!(model.commission(50), 0.35);
        assert_eq!(model.commission(-50), 0.35);
    }

    #[test]
    fn commission_scales_with_large_orders() {
        let model = CommissionModel::default();
        assert_eq!(model.commission(200), 0.70);
        assert_eq!(model.commission(-1000), 3.5);
    }

    #[test]
    fn commission_zero_order_is_free() {
        assert_eq!(CommissionModel::default().commission(0), 0.0);
    }

    #[test]
    fn commission_model_rejects_negative_rates() {
        assert!(CommissionModel::new(-0.1, 0.35).is_err());
        assert!(CommissionModel::new(0.0035, f64::NAN).is_err());
        let custom = CommissionModel::new(0.01, 1.0).unwrap();
        assert_eq!(custom.commission(500), 5.0);
        assert_eq!(custom.per_unit(), 0.01);
        assert_eq!(custom.minimum(), 1.0);
    }

    #[test]
    fn first_difference_starts_at_zero() {
        let orders = first_difference(&[[100, -50], [100, -50], [0, 0], [20, 10]]);
        assert_eq!(orders, vec![[0, 0], [0, 0], [-100, 50], [20, 10]]);
        assert!(first_difference(&[]).is_empty());
    }

    #[test]
    fn positions_require_hedge_ratios() {
        let estimator = HedgeEstimator::new(make_pair(&[1.0, 2.0], &[3.0, 4.0]));
        let bt = PairBacktest::new(
            estimator,
            Scripted {
                lookback: 0,
                rows: vec![[0.0, 0.0]; 2],
            },
        );
        assert!(matches!(bt.positions(), Err(PairtraderError::Precedence { .. })));
        assert!(matches!(bt.returns(), Err(PairtraderError::Precedence { .. })));
    }

    #[test]
    fn position_row_count_is_checked() {
        let bt = backtest(&[1.0, 2.0, 3.0], &[3.0, 4.0, 5.0], 0, vec![[0.0, 0.0]; 2]);
        assert!(matches!(bt.positions(), Err(PairtraderError::InvalidParameter { .. })));
    }

    #[test]
    fn rounded_positions_truncate_and_skip_warm_up_and_last_row() {
        let rows = vec![[0.5, -0.5], [0.5, -0.5], [0.12345, -0.0679], [0.2, 0.3], [9.0, 9.0]];
        let bt = backtest(&[10.0; 5], &[20.0; 5], 2, rows);
        let rounded = bt.rounded_positions().unwrap();
        assert_eq!(rounded, vec![[0, 0], [0, 0], [123, -67], [200, 300], [0, 0]]);
    }

    #[test]
    fn initial_budget_is_truncated_to_cents() {
        let bt = backtest(&[10.0078125, 11.0], &[20.0, 21.0], 0, vec![[0.0, 0.0]; 2]);
        // 1000 * 30.0078125 = 30007.8125
        assert_eq!(bt.initial_budget(), 30007.81);
    }

    #[test]
    fn zero_positions_return_exactly_zero() {
        let bt = backtest(&[10.0, 11.0, 12.0, 13.0], &[5.0, 4.0, 6.0, 7.0], 1, vec![[0.0, 0.0]; 4]);
        let ledger = bt.ledger().unwrap();
        assert_eq!(ledger.trade_count(), 0);
        assert_eq!(ledger.total_commission(), 0.0);
        assert_eq!(bt.returns().unwrap(), 0.0);
    }

    #[test]
    fn realized_return_tracks_cash_and_commission() {
        // buy 100 of leg 1 on row 1 at 10, sell on row 2 at 12; row 3 is the last date
        let closes1 = [10.0, 10.0, 12.0, 12.0];
        let closes2 = [20.0, 20.0, 20.0, 20.0];
        let rows = vec![[0.0, 0.0], [0.1, 0.0], [0.0, 0.0], [0.0, 0.0]];
        let bt = backtest(&closes1, &closes2, 1, rows);

        let ledger = bt.ledger().unwrap();
        assert_eq!(ledger.orders, vec![[0, 0], [100, 0], [-100, 0], [0, 0]]);
        assert_eq!(ledger.initial_budget, 30000.0);
        // -1000 - 0.35 + 1200 - 0.35
        assert_relative_eq!(ledger.final_budget, 30199.3, epsilon = 1e-9);
        assert_relative_eq!(bt.returns().unwrap(), 199.3 / 30000.0, epsilon = 1e-12);
        assert_eq!(ledger.trade_count(), 2);
        assert_relative_eq!(ledger.total_commission(), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn last_date_orders_are_not_booked() {
        // position opened on row 2 is flattened by the forced-flat last row, which
        // is never booked: only the opening cash flow counts
        let closes1 = [10.0, 10.0, 10.0, 50.0];
        let closes2 = [10.0, 10.0, 10.0, 10.0];
        let rows = vec![[0.0, 0.0], [0.0, 0.0], [1.0, 0.0], [1.0, 0.0]];
        let bt = backtest(&closes1, &closes2, 1, rows);
        let ledger = bt.ledger().unwrap();
        assert_eq!(ledger.orders[3], [-1000, 0]);
        assert_relative_eq!(ledger.final_budget, 20000.0 - 10000.0 - 3.5, epsilon = 1e-9);
    }

    #[test]
    fn theoretical_first_value_is_not_available() {
        let bt = backtest(&[10.0, 11.0, 12.0], &[5.0, 5.0, 5.0], 0, vec![[1.0, -1.0]; 3]);
        let returns = bt.theoretical_returns().unwrap();
        assert_eq!(returns[0], None);
        assert!(returns[1].is_some());
    }

    #[test]
    fn theoretical_returns_weight_by_gross_allocation() {
        // day 1 allocation: +10 in leg 1, -20 in leg 2
        // day 2: leg 1 +10%, leg 2 +5% → pnl = 1 - 1 = 0
        // day 3: leg 1 0%, leg 2 -10% → pnl = 11 * 0 + (-21) * -0.1 = 2.1 over 32
        let closes1 = [10.0, 11.0, 11.0];
        let closes2 = [20.0, 21.0, 18.9];
        let rows = vec![[1.0, -1.0]; 3];
        let bt = backtest(&closes1, &closes2, 0, rows);
        let returns = bt.theoretical_returns().unwrap();
        assert_relative_eq!(returns[1].unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(returns[2].unwrap(), 2.1 / 32.0, epsilon = 1e-12);
    }

    #[test]
    fn theoretical_return_is_not_available_without_exposure() {
        let rows = vec![[0.0, 0.0], [0.0, 0.0], [1.0, 1.0], [1.0, 1.0]];
        let bt = backtest(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0, 4.0], 0, rows);
        let returns = bt.theoretical_returns().unwrap();
        assert_eq!(returns[..3], [None, None, None]);
        assert_relative_eq!(returns[3].unwrap(), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn re_estimating_hedge_drops_cached_positions() {
        let mut bt = backtest(&[1.0, 2.0, 4.0, 3.0], &[2.0, 3.0, 5.0, 4.0], 0, vec![[0.0, 0.0]; 4]);
        bt.positions().unwrap();
        bt.estimate_hedge(HedgeMethod::Ols, 2).unwrap();
        assert_eq!(bt.estimator().lookback(), Some(2));
        assert!(bt.positions.get().is_none());
        bt.positions().unwrap();
        bt.invalidate();
        assert!(bt.positions.get().is_none());
    }
}
