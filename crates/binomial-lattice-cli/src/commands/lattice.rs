use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde_json::Value;

use binomial_lattice_core::lattice::pricing::{self, LatticeInput};
use binomial_lattice_core::lattice::{ArbitragePolicy, ModelParameters, Payoff};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PayoffKind {
    Call,
    Put,
    DigitalCall,
    DigitalPut,
}

/// Arguments shared by `price` and `nodes`
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct LatticeArgs {
    /// Initial stock price S0
    #[arg(long, alias = "s0")]
    pub spot: Option<Decimal>,

    /// Strike price K
    #[arg(long)]
    pub strike: Option<Decimal>,

    /// Number of periods N
    #[arg(long, default_value = "1")]
    pub periods: u32,

    /// Gross up move per period (e.g. 1.05 for +5%)
    #[arg(long, default_value = "1.05")]
    pub up: Decimal,

    /// Gross down move per period (e.g. 0.95 for -5%)
    #[arg(long, default_value = "0.95")]
    pub down: Decimal,

    /// Riskless rate per period
    #[arg(long, default_value = "0")]
    pub rate: Decimal,

    /// Terminal payoff
    #[arg(long, value_enum, default_value = "call")]
    pub payoff: PayoffKind,

    /// Cash amount paid by digital payoffs
    #[arg(long, default_value = "1")]
    pub payout: Decimal,

    /// Reject parameter sets where d < 1 + r < u fails
    #[arg(long)]
    pub strict: bool,

    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

fn payoff_from_kind(kind: PayoffKind, payout: Decimal) -> Payoff {
    match kind {
        PayoffKind::Call => Payoff::Call,
        PayoffKind::Put => Payoff::Put,
        PayoffKind::DigitalCall => Payoff::CashOrNothingCall { payout },
        PayoffKind::DigitalPut => Payoff::CashOrNothingPut { payout },
    }
}

fn resolve_input(args: &LatticeArgs) -> Result<LatticeInput, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        return input::file::read_json(path);
    }
    if let Some(data) = input::stdin::read_stdin()? {
        return Ok(serde_json::from_value(data)?);
    }
    Ok(LatticeInput {
        model: ModelParameters {
            initial_price: args.spot.ok_or("--spot is required (or provide --input)")?,
            strike: args.strike.ok_or("--strike is required (or provide --input)")?,
            periods: args.periods,
            up_factor: args.up,
            down_factor: args.down,
            rate: args.rate,
        },
        payoff: payoff_from_kind(args.payoff, args.payout),
        arbitrage_policy: if args.strict {
            ArbitragePolicy::Strict
        } else {
            ArbitragePolicy::Warn
        },
    })
}

pub fn run_price(args: LatticeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let lattice_input = resolve_input(&args)?;
    let result = pricing::price_lattice(&lattice_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_nodes(args: LatticeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let lattice_input = resolve_input(&args)?;
    let result = pricing::lattice_nodes(&lattice_input)?;
    Ok(serde_json::to_value(result)?)
}
