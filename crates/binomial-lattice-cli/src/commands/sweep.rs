use clap::Args;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use binomial_lattice_core::lattice::pricing::{self, LatticeInput};

use crate::input;

const SWEEPABLE: [&str; 6] = [
    "initial_price",
    "strike",
    "periods",
    "up_factor",
    "down_factor",
    "rate",
];

/// Arguments for a one-parameter sweep
#[derive(Args)]
pub struct SweepArgs {
    /// Parameter to step, in format name:min:max:step
    /// (e.g. "strike:90:110:5" or "periods:1:50:1")
    #[arg(long)]
    pub var: String,

    /// Path to JSON file with base case lattice inputs
    #[arg(long)]
    pub base_inputs: String,
}

#[derive(Debug, Clone)]
struct SweepVar {
    name: String,
    min: Decimal,
    max: Decimal,
    step: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
struct SweepOutput {
    variable: String,
    results: Vec<SweepRow>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SweepRow {
    value: Decimal,
    price: Decimal,
    initial_delta: Option<Decimal>,
    initial_eta: Option<Decimal>,
    risk_neutral_probability: Decimal,
}

fn parse_sweep_var(spec: &str) -> Result<SweepVar, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 4 {
        return Err(format!("Sweep variable must be name:min:max:step, got '{}'", spec).into());
    }
    if !SWEEPABLE.contains(&parts[0]) {
        return Err(format!(
            "Cannot sweep '{}'. Sweepable parameters: {}",
            parts[0],
            SWEEPABLE.join(", ")
        )
        .into());
    }
    let var = SweepVar {
        name: parts[0].to_string(),
        min: parts[1].parse()?,
        max: parts[2].parse()?,
        step: parts[3].parse()?,
    };
    if var.step <= Decimal::ZERO {
        return Err("Sweep step must be positive".into());
    }
    Ok(var)
}

fn generate_range(var: &SweepVar) -> Vec<Decimal> {
    let mut values = Vec::new();
    let mut current = var.min;
    while current <= var.max {
        values.push(current);
        current += var.step;
    }
    if values.is_empty() {
        values.push(var.min);
    }
    values
}

/// Decimals travel as strings; the period count is a plain integer.
fn set_json_field(
    obj: &mut Value,
    field: &str,
    value: Decimal,
) -> Result<(), Box<dyn std::error::Error>> {
    let encoded = if field == "periods" {
        let periods = value
            .to_u32()
            .ok_or_else(|| format!("periods must be a non-negative integer, got {}", value))?;
        Value::from(periods)
    } else {
        Value::String(value.to_string())
    };
    let map = obj
        .as_object_mut()
        .ok_or("Base inputs must be a JSON object")?;
    map.insert(field.to_string(), encoded);
    Ok(())
}

pub fn run_sweep(args: SweepArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let var = parse_sweep_var(&args.var)?;
    let base_json: Value = input::file::read_json_value(&args.base_inputs)?;

    let mut results = Vec::new();
    for value in generate_range(&var) {
        let mut json = base_json.clone();
        set_json_field(&mut json, &var.name, value)?;
        let lattice_input: LatticeInput = serde_json::from_value(json)?;
        let priced = pricing::price_lattice(&lattice_input)?;
        results.push(SweepRow {
            value,
            price: priced.result.price,
            initial_delta: priced.result.initial_delta,
            initial_eta: priced.result.initial_eta,
            risk_neutral_probability: priced.result.risk_neutral_probability,
        });
    }

    let output = SweepOutput {
        variable: var.name,
        results,
    };
    Ok(serde_json::to_value(output)?)
}
