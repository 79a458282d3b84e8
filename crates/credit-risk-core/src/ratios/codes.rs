use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::error::CreditRiskError;

/// Number of ratios in the model feature vector.
pub const RATIO_COUNT: usize = 14;

/// Decimal places every ratio is rounded to.
pub const RATIO_DECIMALS: u32 = 6;

/// Fixed identifiers of the fourteen ratios. The declaration order is the
/// model feature order and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RatioCode {
    #[serde(rename = "X_1")]
    X1,
    #[serde(rename = "X_2")]
    X2,
    #[serde(rename = "X_3")]
    X3,
    #[serde(rename = "X_4")]
    X4,
    #[serde(rename = "X_5")]
    X5,
    #[serde(rename = "X_6")]
    X6,
    #[serde(rename = "X_7")]
    X7,
    #[serde(rename = "X_8")]
    X8,
    #[serde(rename = "X_9")]
    X9,
    #[serde(rename = "X_10")]
    X10,
    #[serde(rename = "X_11")]
    X11,
    #[serde(rename = "X_12")]
    X12,
    #[serde(rename = "X_13")]
    X13,
    #[serde(rename = "X_14")]
    X14,
}

impl RatioCode {
    pub const ALL: [RatioCode; RATIO_COUNT] = [
        RatioCode::X1,
        RatioCode::X2,
        RatioCode::X3,
        RatioCode::X4,
        RatioCode::X5,
        RatioCode::X6,
        RatioCode::X7,
        RatioCode::X8,
        RatioCode::X9,
        RatioCode::X10,
        RatioCode::X11,
        RatioCode::X12,
        RatioCode::X13,
        RatioCode::X14,
    ];

    /// Zero-based position in the feature vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// One-based ordinal (1..=14).
    pub fn ordinal(self) -> u8 {
        self as u8 + 1
    }

    pub fn code(self) -> &'static str {
        match self {
            RatioCode::X1 => "X_1",
            RatioCode::X2 => "X_2",
            RatioCode::X3 => "X_3",
            RatioCode::X4 => "X_4",
            RatioCode::X5 => "X_5",
            RatioCode::X6 => "X_6",
            RatioCode::X7 => "X_7",
            RatioCode::X8 => "X_8",
            RatioCode::X9 => "X_9",
            RatioCode::X10 => "X_10",
            RatioCode::X11 => "X_11",
            RatioCode::X12 => "X_12",
            RatioCode::X13 => "X_13",
            RatioCode::X14 => "X_14",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RatioCode::X1 => "Gross profit margin",
            RatioCode::X2 => "Pre-tax profit margin",
            RatioCode::X3 => "Pre-tax return on average assets (ROA)",
            RatioCode::X4 => "Pre-tax return on average equity (ROE)",
            RatioCode::X5 => "Debt to assets",
            RatioCode::X6 => "Debt to equity",
            RatioCode::X7 => "Current ratio",
            RatioCode::X8 => "Quick ratio",
            RatioCode::X9 => "Interest coverage",
            RatioCode::X10 => "Debt service coverage",
            RatioCode::X11 => "Cash to equity",
            RatioCode::X12 => "Inventory turnover",
            RatioCode::X13 => "Receivable days",
            RatioCode::X14 => "Asset turnover",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code.trim())
    }

    /// Feature column names in model order.
    pub fn feature_order() -> Vec<String> {
        Self::ALL.iter().map(|c| c.code().to_string()).collect()
    }
}

impl std::fmt::Display for RatioCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A ratio with its human-readable name, for downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRatio {
    pub code: RatioCode,
    pub name: String,
    pub value: Decimal,
}

/// The fourteen ratios, indexed by [`RatioCode`].
///
/// Serializes as a JSON object keyed by code in feature order. Deserializing
/// requires all fourteen codes and rejects unknown keys.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, Decimal>")]
pub struct RatioVector {
    values: [Decimal; RATIO_COUNT],
}

impl RatioVector {
    pub fn zeros() -> Self {
        Self {
            values: [Decimal::ZERO; RATIO_COUNT],
        }
    }

    /// Build from raw values in feature order, rounding each to 6 dp.
    pub fn from_values(values: [Decimal; RATIO_COUNT]) -> Self {
        Self {
            values: values.map(|v| v.round_dp(RATIO_DECIMALS)),
        }
    }

    /// Build from model-space values. Non-finite inputs become zero.
    pub fn from_features(features: &[f64; RATIO_COUNT]) -> Self {
        Self::from_values(features.map(|v| Decimal::from_f64(v).unwrap_or(Decimal::ZERO)))
    }

    pub fn get(&self, code: RatioCode) -> Decimal {
        self.values[code.index()]
    }

    pub fn set(&mut self, code: RatioCode, value: Decimal) {
        self.values[code.index()] = value.round_dp(RATIO_DECIMALS);
    }

    pub fn iter(&self) -> impl Iterator<Item = (RatioCode, Decimal)> + '_ {
        RatioCode::ALL.iter().map(move |&c| (c, self.values[c.index()]))
    }

    /// Model input in the fixed feature order.
    pub fn to_features(&self) -> [f64; RATIO_COUNT] {
        self.values.map(|v| v.to_f64().unwrap_or(0.0))
    }

    pub fn named(&self) -> Vec<NamedRatio> {
        self.iter()
            .map(|(code, value)| NamedRatio {
                code,
                name: code.name().to_string(),
                value,
            })
            .collect()
    }
}

impl Default for RatioVector {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Serialize for RatioVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(RATIO_COUNT))?;
        for (code, value) in self.iter() {
            map.serialize_entry(code.code(), &value)?;
        }
        map.end()
    }
}

impl TryFrom<BTreeMap<String, Decimal>> for RatioVector {
    type Error = CreditRiskError;

    fn try_from(map: BTreeMap<String, Decimal>) -> Result<Self, Self::Error> {
        let unknown: Vec<&str> = map
            .keys()
            .filter(|k| RatioCode::from_code(k).is_none())
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(CreditRiskError::InvalidInput {
                field: "ratios".into(),
                reason: format!("Unknown ratio code(s): {}", unknown.join(", ")),
            });
        }

        let mut values = [Decimal::ZERO; RATIO_COUNT];
        let mut missing = Vec::new();
        for code in RatioCode::ALL {
            match map.get(code.code()) {
                Some(v) => values[code.index()] = *v,
                None => missing.push(code.code()),
            }
        }
        if !missing.is_empty() {
            return Err(CreditRiskError::InvalidInput {
                field: "ratios".into(),
                reason: format!("Missing ratio code(s): {}", missing.join(", ")),
            });
        }
        Ok(Self::from_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_codes_are_in_feature_order() {
        for (i, code) in RatioCode::ALL.iter().enumerate() {
            assert_eq!(code.index(), i);
            assert_eq!(code.ordinal() as usize, i + 1);
            assert_eq!(code.code(), format!("X_{}", i + 1));
        }
    }

    #[test]
    fn test_from_code_roundtrip() {
        assert_eq!(RatioCode::from_code("X_13"), Some(RatioCode::X13));
        assert_eq!(RatioCode::from_code("X_15"), None);
    }

    #[test]
    fn test_set_rounds_to_six_places() {
        let mut v = RatioVector::zeros();
        v.set(RatioCode::X3, dec!(0.05263157894));
        assert_eq!(v.get(RatioCode::X3), dec!(0.052632));
    }

    #[test]
    fn test_serializes_in_feature_order() {
        let mut v = RatioVector::zeros();
        v.set(RatioCode::X1, dec!(0.25));
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.starts_with(r#"{"X_1":"0.25","X_2":"0""#), "{json}");
        let back: RatioVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_deserialize_accepts_numbers() {
        let json = serde_json::json!({
            "X_1": 0.3, "X_2": 0.1, "X_3": 0.05, "X_4": 0.12, "X_5": 0.5,
            "X_6": 1.0, "X_7": 1.5, "X_8": 1.1, "X_9": 4.0, "X_10": 2.0,
            "X_11": 0.2, "X_12": 6.0, "X_13": 45.0, "X_14": 1.2
        });
        let v: RatioVector = serde_json::from_value(json).unwrap();
        assert_eq!(v.get(RatioCode::X13), dec!(45));
    }

    #[test]
    fn test_deserialize_rejects_missing_codes() {
        let json = serde_json::json!({"X_1": 0.3});
        let err = serde_json::from_value::<RatioVector>(json).unwrap_err();
        assert!(err.to_string().contains("X_14"), "{err}");
    }

    #[test]
    fn test_features_follow_code_order() {
        let mut v = RatioVector::zeros();
        v.set(RatioCode::X14, dec!(1.5));
        let f = v.to_features();
        assert_eq!(f[13], 1.5);
        assert_eq!(RatioVector::from_features(&f), v);
    }
}
