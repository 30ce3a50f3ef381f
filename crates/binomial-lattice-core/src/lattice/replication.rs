//! Replicating-portfolio verification.
//!
//! At each non-terminal node the position (delta shares, eta in the money
//! market) must:
//! - cost exactly the node's option value: `delta * S + eta = V`,
//! - pay the up child's value after an up move: `delta * S_up + eta * (1 + r) = V_up`,
//! - pay the down child's value after a down move: `delta * S_down + eta * (1 + r) = V_down`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::engine::{BinomialLatticeEngine, Lattice};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationReport {
    /// Non-terminal nodes inspected
    pub nodes_checked: usize,
    /// Largest |portfolio payoff - child value| over both children
    pub max_payoff_error: Decimal,
    /// Largest |portfolio cost - node value|
    pub max_cost_error: Decimal,
}

impl ReplicationReport {
    pub fn max_error(&self) -> Decimal {
        self.max_payoff_error.max(self.max_cost_error)
    }

    pub fn is_replicating(&self, tolerance: Decimal) -> bool {
        self.max_error() <= tolerance
    }
}

pub fn verify_replication(engine: &BinomialLatticeEngine, lattice: &Lattice) -> ReplicationReport {
    let growth = Decimal::ONE + engine.parameters().rate;
    let mut nodes_checked = 0;
    let mut max_payoff_error = Decimal::ZERO;
    let mut max_cost_error = Decimal::ZERO;

    for (t, (deltas, etas)) in lattice.deltas.iter().zip(&lattice.etas).enumerate() {
        let spots = &lattice.stock_prices[t];
        let values = &lattice.option_values[t];
        let next_spots = &lattice.stock_prices[t + 1];
        let next_values = &lattice.option_values[t + 1];

        for (i, (&delta, &eta)) in deltas.iter().zip(etas).enumerate() {
            // Saturating: an out-of-range position shows up as a maximal error.
            let cost = delta.saturating_mul(spots[i]).saturating_add(eta);
            max_cost_error = max_cost_error.max(cost.saturating_sub(values[i]).abs());

            let carried = eta.saturating_mul(growth);
            for child in [i, i + 1] {
                let payoff = delta.saturating_mul(next_spots[child]).saturating_add(carried);
                max_payoff_error =
                    max_payoff_error.max(payoff.saturating_sub(next_values[child]).abs());
            }
            nodes_checked += 1;
        }
    }

    ReplicationReport {
        nodes_checked,
        max_payoff_error,
        max_cost_error,
    }
}
