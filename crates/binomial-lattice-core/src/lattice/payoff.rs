use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::Money;

/// Terminal payoff of a European claim on the lattice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payoff {
    /// max(S - K, 0)
    #[default]
    Call,
    /// max(K - S, 0)
    Put,
    /// Pays `payout` when S > K.
    CashOrNothingCall { payout: Money },
    /// Pays `payout` when S < K.
    CashOrNothingPut { payout: Money },
}

impl Payoff {
    pub fn evaluate(&self, spot: Money, strike: Money) -> Money {
        match *self {
            Payoff::Call => (spot - strike).max(Decimal::ZERO),
            Payoff::Put => (strike - spot).max(Decimal::ZERO),
            Payoff::CashOrNothingCall { payout } => {
                if spot > strike {
                    payout
                } else {
                    Decimal::ZERO
                }
            }
            Payoff::CashOrNothingPut { payout } => {
                if spot < strike {
                    payout
                } else {
                    Decimal::ZERO
                }
            }
        }
    }

    /// Closure form for `BinomialLatticeEngine::run_with_payoff`.
    pub fn intrinsic_fn(self, strike: Money) -> impl Fn(Money) -> Money {
        move |spot| self.evaluate(spot, strike)
    }

    /// The vanilla on the other side of put-call parity, if any.
    pub fn parity_counterpart(&self) -> Option<Payoff> {
        match self {
            Payoff::Call => Some(Payoff::Put),
            Payoff::Put => Some(Payoff::Call),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Payoff::Call => "European call",
            Payoff::Put => "European put",
            Payoff::CashOrNothingCall { .. } => "Cash-or-nothing call",
            Payoff::CashOrNothingPut { .. } => "Cash-or-nothing put",
        }
    }
}
