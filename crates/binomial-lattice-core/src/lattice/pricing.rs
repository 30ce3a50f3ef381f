use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::engine::{
    checked_pow, ArbitragePolicy, BinomialLatticeEngine, Lattice, LatticeNode, ModelParameters,
};
use super::payoff::Payoff;
use super::replication::verify_replication;
use crate::types::*;
use crate::LatticeResult;

/// Replication error above which a warning is attached to the output.
const REPLICATION_WARNING_THRESHOLD: Decimal = dec!(0.000000000001);

const METHODOLOGY: &str = "Cox-Ross-Rubinstein binomial lattice (backward induction)";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeInput {
    #[serde(flatten)]
    pub model: ModelParameters,
    #[serde(default)]
    pub payoff: Payoff,
    #[serde(default)]
    pub arbitrage_policy: ArbitragePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeOutput {
    /// Option value at t = 0
    pub price: Money,
    pub risk_neutral_probability: Decimal,
    /// Shares held at t = 0 (None for a zero-period lattice)
    pub initial_delta: Option<Decimal>,
    /// Money-market position at t = 0 (None for a zero-period lattice)
    pub initial_eta: Option<Money>,
    /// Payoff if exercised against today's spot
    pub intrinsic_value: Money,
    /// price - intrinsic_value
    pub time_value: Money,
    /// Price of the opposite vanilla implied by put-call parity
    pub put_call_parity_price: Option<Money>,
    pub max_replication_error: Decimal,
    pub lattice: Lattice,
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

struct Priced {
    engine: BinomialLatticeEngine,
    lattice: Lattice,
    warnings: Vec<String>,
}

fn build_and_run(input: &LatticeInput) -> LatticeResult<Priced> {
    let engine = BinomialLatticeEngine::with_policy(input.model.clone(), input.arbitrage_policy)?;
    let lattice = engine.run_with_payoff(input.payoff.intrinsic_fn(input.model.strike))?;

    let mut warnings = Vec::new();
    if !engine.is_arbitrage_free() {
        warnings.push(format!(
            "Risk-neutral probability {} lies outside [0, 1]: d < 1 + r < u does not hold \
             and the lattice admits arbitrage",
            engine.risk_neutral_probability()
        ));
    }
    if input.model.periods == 0 {
        warnings.push(
            "Zero periods: single-node lattice, value equals the terminal payoff and no hedge is defined"
                .into(),
        );
    }

    Ok(Priced {
        engine,
        lattice,
        warnings,
    })
}

/// (1 + r)^N, `None` when it leaves Decimal range.
fn compound_growth(rate: Rate, periods: u32) -> Option<Decimal> {
    checked_pow(Decimal::ONE + rate, periods)
}

/// C - P = S0 - K / (1 + r)^N, solved for the counterpart of `payoff`.
///
/// `None` for digital payoffs and when the discount factor is out of range.
fn parity_price(model: &ModelParameters, payoff: Payoff, price: Money) -> Option<Money> {
    let pv_strike = model
        .strike
        .checked_div(compound_growth(model.rate, model.periods)?)?;
    let forward_gap = model.initial_price.checked_sub(pv_strike)?;
    match payoff {
        // P = C - S0 + K/(1+r)^N
        Payoff::Call => price.checked_sub(forward_gap),
        // C = P + S0 - K/(1+r)^N
        Payoff::Put => price.checked_add(forward_gap),
        _ => None,
    }
}

fn build_assumptions(input: &LatticeInput, pi: Decimal) -> serde_json::Value {
    serde_json::json!({
        "model": METHODOLOGY,
        "payoff": input.payoff.label(),
        "periods": input.model.periods,
        "up_factor": input.model.up_factor.to_string(),
        "down_factor": input.model.down_factor.to_string(),
        "rate_per_period": input.model.rate.to_string(),
        "risk_neutral_probability": pi.to_string(),
        "arbitrage_policy": input.arbitrage_policy,
    })
}

// ---------------------------------------------------------------------------
// Public API: price_lattice
// ---------------------------------------------------------------------------

pub fn price_lattice(input: &LatticeInput) -> LatticeResult<ComputationOutput<LatticeOutput>> {
    let start = Instant::now();
    let Priced {
        engine,
        lattice,
        mut warnings,
    } = build_and_run(input)?;

    let report = verify_replication(&engine, &lattice);
    if report.max_error() > REPLICATION_WARNING_THRESHOLD {
        warnings.push(format!(
            "Replicating portfolio deviates from option values by up to {}",
            report.max_error()
        ));
    }

    let price = lattice.price();
    let intrinsic_value = input
        .payoff
        .evaluate(input.model.initial_price, input.model.strike);
    let (initial_delta, initial_eta) = match lattice.initial_hedge() {
        Some((delta, eta)) => (Some(delta), Some(eta)),
        None => (None, None),
    };

    let output = LatticeOutput {
        price,
        risk_neutral_probability: engine.risk_neutral_probability(),
        initial_delta,
        initial_eta,
        intrinsic_value,
        time_value: price - intrinsic_value,
        put_call_parity_price: parity_price(&input.model, input.payoff, price),
        max_replication_error: report.max_error(),
        lattice,
    };

    let assumptions = build_assumptions(input, engine.risk_neutral_probability());
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHODOLOGY,
        &assumptions,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Public API: lattice_nodes
// ---------------------------------------------------------------------------

pub fn lattice_nodes(input: &LatticeInput) -> LatticeResult<ComputationOutput<Vec<LatticeNode>>> {
    let start = Instant::now();
    let Priced {
        engine,
        lattice,
        warnings,
    } = build_and_run(input)?;

    let assumptions = build_assumptions(input, engine.risk_neutral_probability());
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        METHODOLOGY,
        &assumptions,
        warnings,
        elapsed,
        lattice.nodes(),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
