pub mod config;
pub mod file;
pub mod stdin;

use serde_json::Value;

use credit_risk_core::ratios::RatioVector;

/// JSON from `--input` when given, otherwise from piped stdin.
pub fn read_value(path: Option<&str>, what: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_json_value(path);
    }
    stdin::read_stdin()?.ok_or_else(|| format!("{what} required: pass --input or pipe JSON on stdin").into())
}

/// Raw bytes from `--input` when given, otherwise from piped stdin.
pub fn read_bytes(path: Option<&str>, what: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_bytes(path);
    }
    stdin::read_stdin_bytes()?.ok_or_else(|| format!("{what} required: pass --input or pipe it on stdin").into())
}

/// Accept a bare `{"X_1": ..}` map, an object with a `ratios` field, or the
/// full `extract-ratios` envelope, so commands can be piped together.
pub fn ratios_from_value(value: Value) -> Result<RatioVector, Box<dyn std::error::Error>> {
    let inner = match value {
        Value::Object(mut map) => match map.remove("result") {
            Some(Value::Object(mut result)) => result.remove("ratios").unwrap_or(Value::Object(result)),
            Some(other) => other,
            None => map.remove("ratios").unwrap_or(Value::Object(map)),
        },
        other => other,
    };
    Ok(serde_json::from_value(inner)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use credit_risk_core::ratios::RatioCode;
    use rust_decimal::Decimal;

    fn bare() -> Value {
        let map: serde_json::Map<String, Value> = RatioCode::ALL
            .iter()
            .map(|c| (c.code().to_string(), Value::String("0.5".into())))
            .collect();
        Value::Object(map)
    }

    #[test]
    fn test_ratio_shapes() {
        let expected = Decimal::new(5, 1);
        for value in [
            bare(),
            serde_json::json!({ "ratios": bare() }),
            serde_json::json!({ "result": { "ratios": bare(), "named": [] } }),
        ] {
            let ratios = ratios_from_value(value).unwrap();
            assert_eq!(ratios.get(RatioCode::X7), expected);
        }
    }

    #[test]
    fn test_incomplete_ratios_rejected() {
        assert!(ratios_from_value(serde_json::json!({ "X_1": "0.1" })).is_err());
    }
}
