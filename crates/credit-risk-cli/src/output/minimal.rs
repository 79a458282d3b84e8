use serde_json::Value;

use super::lookup;

/// Headline fields, first non-null wins.
const PRIORITY_PATHS: [&str; 8] = [
    "pd_stacking",
    "prediction.pd_stacking",
    "pd_change.after",
    "median_time_to_default",
    "risk_tier",
    "c_index",
    "trained",
    "ratios",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if result.is_object() {
        for path in PRIORITY_PATHS {
            if let Some(val) = lookup(result, path).filter(|v| !v.is_null()) {
                println!("{}", format_minimal(val));
                return;
            }
        }
        if let Some((key, val)) = result.as_object().and_then(|m| m.iter().next()) {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    // arrays (hazard ratios, comparisons): one line per entry
    if let Value::Array(items) = result {
        for item in items {
            let label = item
                .get("name")
                .or_else(|| item.get("code"))
                .map(format_minimal)
                .unwrap_or_default();
            let headline = item
                .get("hazard_ratio")
                .or_else(|| item.get("median_time"))
                .map(format_minimal)
                .unwrap_or_else(|| format_minimal(item));
            println!("{label}\t{headline}");
        }
        return;
    }

    println!("{}", format_minimal(result));
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
