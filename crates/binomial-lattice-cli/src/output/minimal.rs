use serde_json::Value;

/// Print just the option price (or the sweep prices, one per line).
pub fn print_minimal(value: &Value) {
    if let Some(Value::Array(rows)) = value.get("results") {
        for row in rows {
            println!(
                "{}\t{}",
                format_minimal(row.get("value").unwrap_or(&Value::Null)),
                format_minimal(row.get("price").unwrap_or(&Value::Null))
            );
        }
        return;
    }

    let result = value.get("result").unwrap_or(value);
    match result {
        Value::Object(map) => match map.get("price") {
            Some(price) => println!("{}", format_minimal(price)),
            None => println!("{}", format_minimal(result)),
        },
        // Node listing: the root value is the price.
        Value::Array(nodes) => match nodes.first().and_then(|n| n.get("option_value")) {
            Some(root) => println!("{}", format_minimal(root)),
            None => println!("null"),
        },
        other => println!("{}", format_minimal(other)),
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
