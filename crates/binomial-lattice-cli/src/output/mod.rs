pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

/// Rows for tabular formats: node lists, sweep results, or the four
/// lattice layers expanded to one row per node.
pub(crate) fn tabular_rows(value: &Value) -> Option<Vec<Value>> {
    let map = value.as_object()?;
    if let Some(Value::Array(results)) = map.get("results") {
        return Some(results.clone());
    }
    match map.get("result")? {
        Value::Array(rows) => Some(rows.clone()),
        Value::Object(result) => lattice_rows(result.get("lattice")?),
        _ => None,
    }
}

fn lattice_rows(lattice: &Value) -> Option<Vec<Value>> {
    let layer = |key: &str| lattice.get(key).and_then(Value::as_array);
    let prices = layer("stock_prices")?;
    let values = layer("option_values")?;
    let deltas = layer("deltas")?;
    let etas = layer("etas")?;

    let cell = |layers: &[Value], step: usize, node: usize| {
        layers
            .get(step)
            .and_then(|l| l.get(node))
            .cloned()
            .unwrap_or(Value::Null)
    };

    let mut rows = Vec::new();
    for (step, price_layer) in prices.iter().enumerate() {
        let width = price_layer.as_array().map_or(0, Vec::len);
        for node in 0..width {
            rows.push(serde_json::json!({
                "step": step,
                "down_moves": node,
                "stock_price": cell(prices, step, node),
                "option_value": cell(values, step, node),
                "delta": cell(deltas, step, node),
                "eta": cell(etas, step, node),
            }));
        }
    }
    Some(rows)
}
