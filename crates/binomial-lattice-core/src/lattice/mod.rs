//! Multi-period Cox-Ross-Rubinstein lattice.
//!
//! - [`engine`]: forward price lattice and backward induction of option
//!   values, deltas and etas.
//! - [`payoff`]: standard terminal payoffs.
//! - [`replication`]: node-by-node check that the hedge reproduces the
//!   option payoff.
//! - [`pricing`]: envelope API used by the CLI and bindings.

pub mod engine;
pub mod payoff;
pub mod pricing;
pub mod replication;

pub use engine::{ArbitragePolicy, BinomialLatticeEngine, Lattice, LatticeNode, ModelParameters};
pub use payoff::Payoff;
