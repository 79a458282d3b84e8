pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::{Map, Value};
use std::io::{self, Write};

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Pretty-print JSON to stdout.
fn print_json(value: &Value) {
    let mut out = io::stdout().lock();
    let written = serde_json::to_writer_pretty(&mut out, value)
        .map_err(io::Error::from)
        .and_then(|_| writeln!(out));
    if let Err(e) = written {
        eprintln!("JSON output error: {}", e);
    }
}

/// Scalar and array-of-scalar fields of `map`, with nested objects flattened
/// into dotted keys. Arrays of objects are returned separately as sections.
pub(crate) fn flatten(map: &Map<String, Value>) -> (Vec<(String, Value)>, Vec<(String, Vec<Value>)>) {
    let mut fields = Vec::new();
    let mut sections = Vec::new();
    flatten_into("", map, &mut fields, &mut sections);
    (fields, sections)
}

fn flatten_into(
    prefix: &str,
    map: &Map<String, Value>,
    fields: &mut Vec<(String, Value)>,
    sections: &mut Vec<(String, Vec<Value>)>,
) {
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) => flatten_into(&name, inner, fields, sections),
            Value::Array(items) if items.first().is_some_and(Value::is_object) => {
                sections.push((name, items.clone()))
            }
            _ => fields.push((name, val.clone())),
        }
    }
}

/// Look up a dotted path such as `prediction.pd_stacking`.
pub(crate) fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_objects_and_sections() {
        let value = json!({
            "prediction": {"pd_stacking": 0.12, "risk": {"tier": "high"}},
            "survival_curve": [{"time": 0.0, "survival_prob": 1.0}],
            "warnings": []
        });
        let (fields, sections) = flatten(value.as_object().unwrap());
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["prediction.pd_stacking", "prediction.risk.tier", "warnings"]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].0, "survival_curve");
    }

    #[test]
    fn test_lookup_dotted_path() {
        let value = json!({"pd_change": {"after": 0.3}});
        assert_eq!(lookup(&value, "pd_change.after"), Some(&json!(0.3)));
        assert_eq!(lookup(&value, "pd_change.before"), None);
    }
}
