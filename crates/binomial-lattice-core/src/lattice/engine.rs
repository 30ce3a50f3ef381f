use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::LatticeError;
use crate::types::*;
use crate::LatticeResult;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Stock price at t = 0
    pub initial_price: Money,
    /// Strike of the option
    pub strike: Money,
    /// Number of periods N
    #[serde(default = "default_periods")]
    pub periods: u32,
    /// One-period gross up move u
    #[serde(default = "default_up_factor")]
    pub up_factor: Factor,
    /// One-period gross down move d
    #[serde(default = "default_down_factor")]
    pub down_factor: Factor,
    /// Per-period riskless rate r
    #[serde(default)]
    pub rate: Rate,
}

fn default_periods() -> u32 {
    1
}

fn default_up_factor() -> Factor {
    dec!(1.05)
}

fn default_down_factor() -> Factor {
    dec!(0.95)
}

impl ModelParameters {
    /// Parameters with one period, u = 1.05, d = 0.95 and r = 0.
    pub fn new(initial_price: Money, strike: Money) -> Self {
        Self {
            initial_price,
            strike,
            periods: default_periods(),
            up_factor: default_up_factor(),
            down_factor: default_down_factor(),
            rate: Decimal::ZERO,
        }
    }
}

/// What to do when `d < 1 + r < u` does not hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitragePolicy {
    /// Accept the model; callers surface a warning.
    #[default]
    Warn,
    /// Reject with `LatticeError::ArithmeticDegeneracy`.
    Strict,
}

/// Full result of a backward induction, indexed `[time_step][down_moves]`.
///
/// `stock_prices` and `option_values` have `N + 1` layers. `deltas` and
/// `etas` have `N` layers: the position held at step `t` replicates the
/// step `t + 1` payoff, so the terminal step carries no hedge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lattice {
    pub stock_prices: Vec<Vec<Money>>,
    pub option_values: Vec<Vec<Money>>,
    pub deltas: Vec<Vec<Decimal>>,
    pub etas: Vec<Vec<Money>>,
}

/// One node of the lattice in flat form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeNode {
    pub step: u32,
    pub down_moves: u32,
    pub stock_price: Money,
    pub option_value: Money,
    pub delta: Option<Decimal>,
    pub eta: Option<Money>,
}

impl Lattice {
    pub fn periods(&self) -> u32 {
        self.stock_prices.len().saturating_sub(1) as u32
    }

    /// Option value at the root node.
    pub fn price(&self) -> Money {
        self.option_values
            .first()
            .and_then(|layer| layer.first())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Hedge at the root node, `None` for a zero-period lattice.
    pub fn initial_hedge(&self) -> Option<(Decimal, Money)> {
        let delta = self.deltas.first()?.first()?;
        let eta = self.etas.first()?.first()?;
        Some((*delta, *eta))
    }

    /// Every node in (step, down_moves) order.
    pub fn nodes(&self) -> Vec<LatticeNode> {
        let count = self.stock_prices.iter().map(Vec::len).sum();
        let mut nodes = Vec::with_capacity(count);
        for (step, (prices, values)) in self
            .stock_prices
            .iter()
            .zip(&self.option_values)
            .enumerate()
        {
            for (downs, (&stock_price, &option_value)) in prices.iter().zip(values).enumerate() {
                nodes.push(LatticeNode {
                    step: step as u32,
                    down_moves: downs as u32,
                    stock_price,
                    option_value,
                    delta: self.deltas.get(step).and_then(|l| l.get(downs)).copied(),
                    eta: self.etas.get(step).and_then(|l| l.get(downs)).copied(),
                });
            }
        }
        nodes
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn validate_parameters(params: &ModelParameters) -> LatticeResult<()> {
    if params.initial_price <= Decimal::ZERO {
        return Err(LatticeError::InvalidParameter {
            field: "initial_price".into(),
            reason: "must be positive".into(),
        });
    }
    if params.strike < Decimal::ZERO {
        return Err(LatticeError::InvalidParameter {
            field: "strike".into(),
            reason: "must be non-negative".into(),
        });
    }
    if params.down_factor <= Decimal::ZERO {
        return Err(LatticeError::InvalidParameter {
            field: "down_factor".into(),
            reason: "must be positive".into(),
        });
    }
    if params.up_factor <= params.down_factor {
        return Err(LatticeError::InvalidParameter {
            field: "up_factor".into(),
            reason: format!(
                "must exceed down_factor ({} <= {})",
                params.up_factor, params.down_factor
            ),
        });
    }
    if params.rate <= dec!(-1) {
        return Err(LatticeError::InvalidParameter {
            field: "rate".into(),
            reason: "must be greater than -100%".into(),
        });
    }
    Ok(())
}

/// pi = ((1 + r) - d) / (u - d). Requires u > d.
fn risk_neutral_probability(params: &ModelParameters) -> Decimal {
    ((Decimal::ONE + params.rate) - params.down_factor) / (params.up_factor - params.down_factor)
}

/// `base^exp`, `None` when the result leaves Decimal range.
pub(crate) fn checked_pow(base: Decimal, exp: u32) -> Option<Decimal> {
    base.checked_powu(u64::from(exp))
}

fn price_range_error(step: u32, down_moves: u32) -> LatticeError {
    LatticeError::NumericRange {
        context: format!("stock price at step {step}, node {down_moves}"),
    }
}

fn node_range_error(quantity: &str) -> LatticeError {
    LatticeError::NumericRange {
        context: format!("{quantity} at node"),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Cox-Ross-Rubinstein lattice for a fixed set of model parameters.
///
/// The risk-neutral probability is derived once at construction. The engine
/// is immutable; build a new one for new parameters.
#[derive(Debug, Clone)]
pub struct BinomialLatticeEngine {
    params: ModelParameters,
    pi: Decimal,
}

impl BinomialLatticeEngine {
    pub fn new(params: ModelParameters) -> LatticeResult<Self> {
        Self::with_policy(params, ArbitragePolicy::Warn)
    }

    pub fn with_policy(params: ModelParameters, policy: ArbitragePolicy) -> LatticeResult<Self> {
        validate_parameters(&params)?;
        let pi = risk_neutral_probability(&params);
        let engine = Self { params, pi };
        if policy == ArbitragePolicy::Strict && !engine.is_arbitrage_free() {
            return Err(LatticeError::ArithmeticDegeneracy { probability: pi });
        }
        Ok(engine)
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    pub fn risk_neutral_probability(&self) -> Decimal {
        self.pi
    }

    /// True when `0 <= pi <= 1`, i.e. `d <= 1 + r <= u`.
    pub fn is_arbitrage_free(&self) -> bool {
        self.pi >= Decimal::ZERO && self.pi <= Decimal::ONE
    }

    fn growth(&self) -> Decimal {
        Decimal::ONE + self.params.rate
    }

    /// Discounted risk-neutral expectation of the two children.
    pub fn option_value_at_node(&self, value_up: Money, value_down: Money) -> LatticeResult<Money> {
        let up_leg = self.pi.checked_mul(value_up);
        let down_leg = (Decimal::ONE - self.pi).checked_mul(value_down);
        up_leg
            .zip(down_leg)
            .and_then(|(a, b)| a.checked_add(b))
            .and_then(|expected| expected.checked_div(self.growth()))
            .ok_or_else(|| node_range_error("option value"))
    }

    /// Shares held at a node with the given spot.
    pub fn hedge_delta_at_node(
        &self,
        value_up: Money,
        value_down: Money,
        spot: Money,
    ) -> LatticeResult<Decimal> {
        let spread = self.params.up_factor - self.params.down_factor;
        let swing = value_up.checked_sub(value_down);
        let range = spot.checked_mul(spread);
        swing
            .zip(range)
            .and_then(|(num, den)| num.checked_div(den))
            .ok_or_else(|| node_range_error("hedge delta"))
    }

    /// Money-market position held at a node.
    pub fn hedge_eta_at_node(&self, value_up: Money, value_down: Money) -> LatticeResult<Money> {
        let u = self.params.up_factor;
        let d = self.params.down_factor;
        let carry = u.checked_mul(value_down);
        let cost = d.checked_mul(value_up);
        carry
            .zip(cost)
            .and_then(|(a, b)| a.checked_sub(b))
            .and_then(|num| num.checked_div((u - d) * self.growth()))
            .ok_or_else(|| node_range_error("hedge eta"))
    }

    /// Worst-case factor by which one backward step can scale option values:
    /// `(|pi| + |1 - pi|) / (1 + r)`. Equals `1 / (1 + r)` when `0 <= pi <= 1`.
    pub fn step_amplification(&self) -> LatticeResult<Decimal> {
        (self.pi.abs() + (Decimal::ONE - self.pi).abs())
            .checked_div(self.growth())
            .ok_or_else(|| node_range_error("step amplification"))
    }

    /// Fails when terminal values scaled by `N` backward steps could leave
    /// Decimal range.
    fn check_value_growth(&self, terminal: &[Money]) -> LatticeResult<()> {
        let peak = terminal
            .iter()
            .map(|v| v.abs())
            .max()
            .unwrap_or(Decimal::ZERO);
        if peak.is_zero() {
            return Ok(());
        }
        let periods = self.params.periods;
        let amplification = self.step_amplification()?;
        checked_pow(amplification, periods)
            .and_then(|growth| growth.checked_mul(peak))
            .map(|_| ())
            .ok_or_else(|| LatticeError::NumericRange {
                context: format!(
                    "option values over {periods} backward steps \
                     (per-step amplification {amplification}, terminal peak {peak})"
                ),
            })
    }

    /// `S0 * u^(step - down_moves) * d^down_moves`.
    pub fn stock_price_at(&self, step: u32, down_moves: u32) -> LatticeResult<Money> {
        if down_moves > step {
            return Err(LatticeError::InvalidParameter {
                field: "down_moves".into(),
                reason: format!("{down_moves} exceeds step {step}"),
            });
        }
        let ups = checked_pow(self.params.up_factor, step - down_moves)
            .ok_or_else(|| price_range_error(step, down_moves))?;
        let downs = checked_pow(self.params.down_factor, down_moves)
            .ok_or_else(|| price_range_error(step, down_moves))?;
        let price = self
            .params
            .initial_price
            .checked_mul(ups)
            .and_then(|p| p.checked_mul(downs))
            .ok_or_else(|| price_range_error(step, down_moves))?;
        // Underflow to zero would later divide by zero in the delta.
        if price.is_zero() {
            return Err(price_range_error(step, down_moves));
        }
        Ok(price)
    }

    /// Backward induction for a European call, `max(S - K, 0)`.
    pub fn run(&self) -> LatticeResult<Lattice> {
        let strike = self.params.strike;
        self.run_with_payoff(|spot| (spot - strike).max(Decimal::ZERO))
    }

    /// Backward induction for an arbitrary terminal payoff `spot -> value`.
    pub fn run_with_payoff<F>(&self, payoff: F) -> LatticeResult<Lattice>
    where
        F: Fn(Money) -> Money,
    {
        let n = self.params.periods as usize;

        // Forward pass and growth bound. Range failures surface here, before valuation.
        let stock_prices = self.build_price_lattice()?;

        let mut option_values: Vec<Vec<Money>> = vec![Vec::new(); n + 1];
        let mut deltas: Vec<Vec<Decimal>> = vec![Vec::new(); n];
        let mut etas: Vec<Vec<Money>> = vec![Vec::new(); n];

        option_values[n] = stock_prices[n].iter().map(|&spot| payoff(spot)).collect();
        self.check_value_growth(&option_values[n])?;

        for t in (0..n).rev() {
            let size = t + 1;
            let mut values = Vec::with_capacity(size);
            let mut delta_t = Vec::with_capacity(size);
            let mut eta_t = Vec::with_capacity(size);

            // Child i is the up move, child i + 1 the down move.
            for (children, &spot) in option_values[t + 1].windows(2).zip(&stock_prices[t]) {
                let (up, down) = (children[0], children[1]);
                values.push(self.option_value_at_node(up, down)?);
                delta_t.push(self.hedge_delta_at_node(up, down, spot)?);
                eta_t.push(self.hedge_eta_at_node(up, down)?);
            }

            option_values[t] = values;
            deltas[t] = delta_t;
            etas[t] = eta_t;
        }

        Ok(Lattice {
            stock_prices,
            option_values,
            deltas,
            etas,
        })
    }

    fn build_price_lattice(&self) -> LatticeResult<Vec<Vec<Money>>> {
        (0..=self.params.periods)
            .map(|step| {
                (0..=step)
                    .map(|downs| self.stock_price_at(step, downs))
                    .collect::<LatticeResult<Vec<Money>>>()
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // Tolerance helper: check |a - b| < tol
    fn approx_eq(a: Decimal, b: Decimal, tol: Decimal) -> bool {
        (a - b).abs() < tol
    }

    fn one_period_params() -> ModelParameters {
        ModelParameters {
            initial_price: dec!(100),
            strike: dec!(100),
            periods: 1,
            up_factor: dec!(1.1),
            down_factor: dec!(0.9),
            rate: dec!(0),
        }
    }

    fn three_period_params() -> ModelParameters {
        ModelParameters {
            periods: 3,
            rate: dec!(0.02),
            ..one_period_params()
        }
    }

    fn expect_invalid(params: ModelParameters, expected_field: &str) {
        match BinomialLatticeEngine::new(params) {
            Err(LatticeError::InvalidParameter { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("Expected InvalidParameter on {expected_field}, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn test_defaults() {
        let params = ModelParameters::new(dec!(50), dec!(45));
        assert_eq!(params.periods, 1);
        assert_eq!(params.up_factor, dec!(1.05));
        assert_eq!(params.down_factor, dec!(0.95));
        assert_eq!(params.rate, Decimal::ZERO);
    }

    #[test]
    fn test_serde_defaults_match_constructor() {
        let json = serde_json::json!({ "initial_price": "50", "strike": "45" });
        let params: ModelParameters = serde_json::from_value(json).unwrap();
        assert_eq!(params, ModelParameters::new(dec!(50), dec!(45)));
    }

    #[test]
    fn test_equal_factors_rejected() {
        expect_invalid(
            ModelParameters {
                up_factor: dec!(1.0),
                down_factor: dec!(1.0),
                ..one_period_params()
            },
            "up_factor",
        );
    }

    #[test]
    fn test_inverted_factors_rejected() {
        expect_invalid(
            ModelParameters {
                up_factor: dec!(0.9),
                down_factor: dec!(1.1),
                ..one_period_params()
            },
            "up_factor",
        );
    }

    #[test]
    fn test_non_positive_spot_rejected() {
        expect_invalid(
            ModelParameters {
                initial_price: dec!(0),
                ..one_period_params()
            },
            "initial_price",
        );
        expect_invalid(
            ModelParameters {
                initial_price: dec!(-5),
                ..one_period_params()
            },
            "initial_price",
        );
    }

    #[test]
    fn test_negative_strike_rejected() {
        expect_invalid(
            ModelParameters {
                strike: dec!(-1),
                ..one_period_params()
            },
            "strike",
        );
    }

    #[test]
    fn test_rate_at_minus_one_rejected() {
        expect_invalid(
            ModelParameters {
                rate: dec!(-1),
                ..one_period_params()
            },
            "rate",
        );
    }

    #[test]
    fn test_zero_strike_accepted() {
        let params = ModelParameters {
            strike: dec!(0),
            ..one_period_params()
        };
        assert!(BinomialLatticeEngine::new(params).is_ok());
    }

    #[test]
    fn test_negative_periods_rejected_at_deserialisation() {
        let json = serde_json::json!({
            "initial_price": "100",
            "strike": "100",
            "periods": -1
        });
        assert!(serde_json::from_value::<ModelParameters>(json).is_err());
    }

    #[test]
    fn test_strict_policy_rejects_arbitrage() {
        // pi = (1.10 - 1.01) / (1.05 - 1.01) = 2.25
        let params = ModelParameters {
            up_factor: dec!(1.05),
            down_factor: dec!(1.01),
            rate: dec!(0.10),
            ..one_period_params()
        };
        match BinomialLatticeEngine::with_policy(params.clone(), ArbitragePolicy::Strict) {
            Err(LatticeError::ArithmeticDegeneracy { probability }) => {
                assert_eq!(probability, dec!(2.25));
            }
            other => panic!("Expected ArithmeticDegeneracy, got {other:?}"),
        }

        let lenient = BinomialLatticeEngine::new(params).unwrap();
        assert!(!lenient.is_arbitrage_free());
        assert!(lenient.run().is_ok());
    }

    // -----------------------------------------------------------------------
    // Risk-neutral probability and node formulas
    // -----------------------------------------------------------------------

    #[test]
    fn test_risk_neutral_probability() {
        let engine = BinomialLatticeEngine::new(one_period_params()).unwrap();
        assert_eq!(engine.risk_neutral_probability(), dec!(0.5));
        assert!(engine.is_arbitrage_free());
    }

    #[test]
    fn test_martingale_property() {
        for (u, d, r) in [
            (dec!(1.1), dec!(0.9), dec!(0)),
            (dec!(1.2), dec!(0.85), dec!(0.03)),
            (dec!(1.05), dec!(0.95), dec!(0.01)),
        ] {
            let params = ModelParameters {
                up_factor: u,
                down_factor: d,
                rate: r,
                ..one_period_params()
            };
            let engine = BinomialLatticeEngine::new(params).unwrap();
            let pi = engine.risk_neutral_probability();
            let expected = pi * u + (Decimal::ONE - pi) * d;
            assert!(
                approx_eq(expected, Decimal::ONE + r, dec!(0.000000001)),
                "pi*u + (1-pi)*d = {expected}, expected {}",
                Decimal::ONE + r
            );
        }
    }

    #[test]
    fn test_node_formulas() {
        let engine = BinomialLatticeEngine::new(one_period_params()).unwrap();
        assert_eq!(engine.option_value_at_node(dec!(10), dec!(0)).unwrap(), dec!(5));
        assert_eq!(
            engine
                .hedge_delta_at_node(dec!(10), dec!(0), dec!(100))
                .unwrap(),
            dec!(0.5)
        );
        assert_eq!(engine.hedge_eta_at_node(dec!(10), dec!(0)).unwrap(), dec!(-45));
    }

    #[test]
    fn test_node_value_discounts() {
        let params = ModelParameters {
            rate: dec!(0.05),
            up_factor: dec!(1.2),
            down_factor: dec!(0.9),
            ..one_period_params()
        };
        let engine = BinomialLatticeEngine::new(params).unwrap();
        // pi = (1.05 - 0.9) / 0.3 = 0.5
        assert_eq!(engine.risk_neutral_probability(), dec!(0.5));
        assert_eq!(engine.option_value_at_node(dec!(21), dec!(0)).unwrap(), dec!(10));
    }

    #[test]
    fn test_stock_price_at() {
        let engine = BinomialLatticeEngine::new(three_period_params()).unwrap();
        assert_eq!(engine.stock_price_at(0, 0).unwrap(), dec!(100));
        assert_eq!(engine.stock_price_at(2, 0).unwrap(), dec!(121));
        assert_eq!(engine.stock_price_at(2, 1).unwrap(), dec!(99));
        assert_eq!(engine.stock_price_at(2, 2).unwrap(), dec!(81));
        assert!(engine.stock_price_at(1, 2).is_err());
    }

    #[test]
    fn test_checked_pow() {
        assert_eq!(checked_pow(dec!(1.1), 0), Some(Decimal::ONE));
        assert_eq!(checked_pow(dec!(2), 10), Some(dec!(1024)));
        assert_eq!(checked_pow(dec!(0.5), 3), Some(dec!(0.125)));
        assert_eq!(checked_pow(dec!(10), 40), None);
    }

    // -----------------------------------------------------------------------
    // Backward induction
    // -----------------------------------------------------------------------

    #[test]
    fn test_one_period_scenario() {
        let engine = BinomialLatticeEngine::new(one_period_params()).unwrap();
        let lattice = engine.run().unwrap();

        assert_eq!(lattice.stock_prices, vec![vec![dec!(100)], vec![dec!(110), dec!(90)]]);
        assert_eq!(lattice.option_values[1], vec![dec!(10), dec!(0)]);
        assert_eq!(lattice.option_values[0], vec![dec!(5)]);
        assert_eq!(lattice.deltas, vec![vec![dec!(0.5)]]);
        assert_eq!(lattice.etas, vec![vec![dec!(-45)]]);
        assert_eq!(lattice.price(), dec!(5));
        assert_eq!(lattice.initial_hedge(), Some((dec!(0.5), dec!(-45))));
    }

    #[test]
    fn test_zero_periods_is_single_node() {
        let params = ModelParameters {
            initial_price: dec!(120),
            periods: 0,
            ..one_period_params()
        };
        let lattice = BinomialLatticeEngine::new(params).unwrap().run().unwrap();
        assert_eq!(lattice.stock_prices, vec![vec![dec!(120)]]);
        assert_eq!(lattice.option_values, vec![vec![dec!(20)]]);
        assert!(lattice.deltas.is_empty());
        assert!(lattice.etas.is_empty());
        assert_eq!(lattice.initial_hedge(), None);
        assert_eq!(lattice.periods(), 0);
    }

    #[test]
    fn test_layer_shapes() {
        let params = ModelParameters {
            periods: 6,
            ..three_period_params()
        };
        let lattice = BinomialLatticeEngine::new(params).unwrap().run().unwrap();
        assert_eq!(lattice.stock_prices.len(), 7);
        assert_eq!(lattice.option_values.len(), 7);
        assert_eq!(lattice.deltas.len(), 6);
        assert_eq!(lattice.etas.len(), 6);
        for t in 0..=6 {
            assert_eq!(lattice.stock_prices[t].len(), t + 1);
            assert_eq!(lattice.option_values[t].len(), t + 1);
        }
        for t in 0..6 {
            assert_eq!(lattice.deltas[t].len(), t + 1);
            assert_eq!(lattice.etas[t].len(), t + 1);
        }
    }

    #[test]
    fn test_terminal_values_are_call_payoffs() {
        let params = three_period_params();
        let engine = BinomialLatticeEngine::new(params.clone()).unwrap();
        let lattice = engine.run().unwrap();
        for (i, value) in lattice.option_values[3].iter().enumerate() {
            let i = i as u32;
            let spot = params.initial_price
                * checked_pow(params.up_factor, 3 - i).unwrap()
                * checked_pow(params.down_factor, i).unwrap();
            assert_eq!(*value, (spot - params.strike).max(Decimal::ZERO));
        }
    }

    #[test]
    fn test_node_spot_equals_up_child_over_u() {
        let engine = BinomialLatticeEngine::new(three_period_params()).unwrap();
        let lattice = engine.run().unwrap();
        for t in 0..3 {
            for i in 0..=t {
                let reconstructed = lattice.stock_prices[t + 1][i] / dec!(1.1);
                assert!(approx_eq(
                    lattice.stock_prices[t][i],
                    reconstructed,
                    dec!(0.0000000001)
                ));
            }
        }
    }

    #[test]
    fn test_custom_payoff_put() {
        let engine = BinomialLatticeEngine::new(one_period_params()).unwrap();
        let lattice = engine
            .run_with_payoff(|spot| (dec!(100) - spot).max(Decimal::ZERO))
            .unwrap();
        assert_eq!(lattice.option_values[1], vec![dec!(0), dec!(10)]);
        assert_eq!(lattice.price(), dec!(5));
        assert_eq!(lattice.deltas[0][0], dec!(-0.5));
        // eta = (1.1 * 10 - 0.9 * 0) / 0.2 = 55
        assert_eq!(lattice.etas[0][0], dec!(55));
    }

    #[test]
    fn test_put_call_parity() {
        let params = three_period_params();
        let engine = BinomialLatticeEngine::new(params.clone()).unwrap();
        let call = engine.run().unwrap().price();
        let put = engine
            .run_with_payoff(|spot| (params.strike - spot).max(Decimal::ZERO))
            .unwrap()
            .price();
        let discount = checked_pow(Decimal::ONE + params.rate, params.periods).unwrap();
        let rhs = params.initial_price - params.strike / discount;
        assert!(
            approx_eq(call - put, rhs, dec!(0.000000000001)),
            "C - P = {}, S0 - K/(1+r)^N = {rhs}",
            call - put
        );
    }

    #[test]
    fn test_symmetric_tree() {
        // r = 0 and u * d = 1: S_t[i] * S_t[t - i] = S0^2 at every step
        let params = ModelParameters {
            initial_price: dec!(100),
            strike: dec!(100),
            periods: 6,
            up_factor: dec!(1.25),
            down_factor: dec!(0.8),
            rate: dec!(0),
        };
        let lattice = BinomialLatticeEngine::new(params).unwrap().run().unwrap();
        for (t, layer) in lattice.stock_prices.iter().enumerate() {
            for i in 0..=t {
                assert!(approx_eq(
                    layer[i] * layer[t - i],
                    dec!(10000),
                    dec!(0.0000000001)
                ));
            }
            if t % 2 == 0 {
                assert!(approx_eq(layer[t / 2], dec!(100), dec!(0.0000000001)));
            }
        }
    }

    #[test]
    fn test_deltas_bounded_for_call() {
        let params = ModelParameters {
            periods: 8,
            ..three_period_params()
        };
        let lattice = BinomialLatticeEngine::new(params).unwrap().run().unwrap();
        let tol = dec!(0.000000000001);
        for layer in &lattice.deltas {
            for delta in layer {
                assert!(*delta >= -tol && *delta <= Decimal::ONE + tol, "delta {delta}");
            }
        }
        for layer in &lattice.etas {
            for eta in layer {
                assert!(*eta <= tol, "eta {eta}");
            }
        }
    }

    #[test]
    fn test_price_overflow_detected_before_valuation() {
        let params = ModelParameters {
            initial_price: dec!(1000),
            strike: dec!(1000),
            periods: 30,
            up_factor: dec!(10),
            down_factor: dec!(0.5),
            rate: dec!(0),
        };
        let engine = BinomialLatticeEngine::new(params).unwrap();
        match engine.run() {
            Err(LatticeError::NumericRange { context }) => {
                assert!(context.contains("stock price"));
            }
            other => panic!("Expected NumericRange, got {other:?}"),
        }
    }

    #[test]
    fn test_node_formulas_report_overflow() {
        // pi = 2.25, so pi * MAX leaves range
        let engine = BinomialLatticeEngine::new(ModelParameters {
            up_factor: dec!(1.05),
            down_factor: dec!(1.01),
            rate: dec!(0.10),
            ..one_period_params()
        })
        .unwrap();
        assert!(matches!(
            engine.option_value_at_node(Decimal::MAX, dec!(0)),
            Err(LatticeError::NumericRange { .. })
        ));
        assert!(matches!(
            engine.hedge_delta_at_node(Decimal::MAX, Decimal::MIN, dec!(1)),
            Err(LatticeError::NumericRange { .. })
        ));
        assert!(matches!(
            engine.hedge_eta_at_node(Decimal::MIN, Decimal::MAX),
            Err(LatticeError::NumericRange { .. })
        ));
    }

    #[test]
    fn test_step_amplification() {
        let engine = BinomialLatticeEngine::new(one_period_params()).unwrap();
        assert_eq!(engine.step_amplification().unwrap(), dec!(1));

        // pi = (2 - 0.95) / 0.1 = 10.5 -> (10.5 + 9.5) / 2 = 10
        let params = ModelParameters {
            up_factor: dec!(1.05),
            down_factor: dec!(0.95),
            rate: dec!(1),
            ..one_period_params()
        };
        let engine = BinomialLatticeEngine::new(params).unwrap();
        assert_eq!(engine.risk_neutral_probability(), dec!(10.5));
        assert_eq!(engine.step_amplification().unwrap(), dec!(10));
    }

    #[test]
    fn test_arbitrage_model_value_blowup_rejected_before_backward_pass() {
        let params = ModelParameters {
            initial_price: dec!(100),
            strike: dec!(100),
            periods: 100,
            up_factor: dec!(1.05),
            down_factor: dec!(0.95),
            rate: dec!(1),
        };
        let engine = BinomialLatticeEngine::new(params).unwrap();
        assert!(!engine.is_arbitrage_free());
        match engine.run() {
            Err(LatticeError::NumericRange { context }) => {
                assert!(context.contains("backward steps"), "{context}");
            }
            other => panic!("Expected NumericRange, got {other:?}"),
        }
    }

    #[test]
    fn test_arbitrage_put_value_blowup_rejected() {
        let params = ModelParameters {
            initial_price: dec!(100),
            strike: dec!(100),
            periods: 40,
            up_factor: dec!(1.001),
            down_factor: dec!(0.999),
            rate: dec!(0.5),
        };
        let engine = BinomialLatticeEngine::new(params).unwrap();
        let result = engine.run_with_payoff(|spot| (dec!(100) - spot).max(Decimal::ZERO));
        assert!(matches!(result, Err(LatticeError::NumericRange { .. })));
    }

    #[test]
    fn test_multi_period_arbitrage_model_still_prices_when_in_range() {
        // pi = (1.10 - 1.01) / 0.04 = 2.25; amplification (2.25 + 1.25) / 1.1
        let params = ModelParameters {
            periods: 6,
            up_factor: dec!(1.05),
            down_factor: dec!(1.01),
            rate: dec!(0.10),
            ..one_period_params()
        };
        let engine = BinomialLatticeEngine::new(params).unwrap();
        let lattice = engine.run().unwrap();
        assert_eq!(lattice.deltas.len(), 6);
        assert_eq!(lattice.option_values[0].len(), 1);
    }

    #[test]
    fn test_nodes_flatten() {
        let lattice = BinomialLatticeEngine::new(one_period_params())
            .unwrap()
            .run()
            .unwrap();
        let nodes = lattice.nodes();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].step, 0);
        assert_eq!(nodes[0].delta, Some(dec!(0.5)));
        assert_eq!(nodes[2].step, 1);
        assert_eq!(nodes[2].down_moves, 1);
        assert_eq!(nodes[2].stock_price, dec!(90));
        assert_eq!(nodes[2].delta, None);
        assert_eq!(nodes[2].eta, None);
    }

    #[test]
    fn test_run_is_deterministic() {
        let engine = BinomialLatticeEngine::new(three_period_params()).unwrap();
        assert_eq!(engine.run().unwrap(), engine.run().unwrap());
    }
}
