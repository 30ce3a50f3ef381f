use napi::Result as NapiResult;
use napi_derive::napi;

use binomial_lattice_core::lattice::pricing::{self, LatticeInput};
use binomial_lattice_core::lattice::replication::{self, ReplicationReport};
use binomial_lattice_core::lattice::BinomialLatticeEngine;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_input(input_json: &str) -> NapiResult<LatticeInput> {
    serde_json::from_str(input_json).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Lattice pricing
// ---------------------------------------------------------------------------

#[napi]
pub fn price_binomial_lattice(input_json: String) -> NapiResult<String> {
    let input = parse_input(&input_json)?;
    let output = pricing::price_lattice(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn binomial_lattice_nodes(input_json: String) -> NapiResult<String> {
    let input = parse_input(&input_json)?;
    let output = pricing::lattice_nodes(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Hedge verification
// ---------------------------------------------------------------------------

#[napi]
pub fn verify_binomial_replication(input_json: String) -> NapiResult<String> {
    let input = parse_input(&input_json)?;
    let engine = BinomialLatticeEngine::with_policy(input.model.clone(), input.arbitrage_policy)
        .map_err(to_napi_error)?;
    let lattice = engine
        .run_with_payoff(input.payoff.intrinsic_fn(input.model.strike))
        .map_err(to_napi_error)?;
    let report: ReplicationReport = replication::verify_replication(&engine, &lattice);
    serde_json::to_string(&report).map_err(to_napi_error)
}
