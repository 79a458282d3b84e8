//! Labelled training data: fourteen ratios, a default flag and an optional
//! time to default.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::error::CreditRiskError;
use crate::ratios::{RatioCode, RATIO_COUNT};
use crate::CreditRiskResult;

pub const DEFAULT_COLUMN: &str = "default";
pub const MONTHS_COLUMN: &str = "months_to_default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub features: [f64; RATIO_COUNT],
    pub default: bool,
    pub months_to_default: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataset {
    pub observations: Vec<Observation>,
}

impl TrainingDataset {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    pub fn from_csv_path(path: &Path) -> CreditRiskResult<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            CreditRiskError::DatasetSchema(format!("Cannot open '{}': {e}", path.display()))
        })?;
        Self::from_reader(file)
    }

    /// Parse CSV with a header row. Columns `X_1`..`X_14` and `default` are
    /// required; `months_to_default` is optional and may hold empty cells.
    pub fn from_reader<R: io::Read>(reader: R) -> CreditRiskResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h == name);

        let mut missing: Vec<String> = RatioCode::ALL
            .iter()
            .map(|c| c.code())
            .filter(|code| position(*code).is_none())
            .map(String::from)
            .collect();
        if position(DEFAULT_COLUMN).is_none() {
            missing.push(DEFAULT_COLUMN.to_string());
        }
        if !missing.is_empty() {
            return Err(CreditRiskError::DatasetSchema(format!(
                "Missing required column(s): {}",
                missing.join(", ")
            )));
        }

        let feature_columns: Vec<usize> = RatioCode::ALL
            .iter()
            .filter_map(|c| position(c.code()))
            .collect();
        let default_column = position(DEFAULT_COLUMN).unwrap_or_default();
        let months_column = position(MONTHS_COLUMN);

        let mut observations = Vec::new();
        for (i, record) in csv_reader.records().enumerate() {
            let record = record?;
            let line = i + 2;
            let field = |col: usize| record.get(col).unwrap_or("");

            let mut features = [0.0; RATIO_COUNT];
            for (slot, &col) in features.iter_mut().zip(&feature_columns) {
                *slot = parse_number(field(col), &headers[col], line)?;
            }
            let default = match parse_number(field(default_column), DEFAULT_COLUMN, line)? {
                v if v == 0.0 => false,
                v if v == 1.0 => true,
                v => {
                    return Err(CreditRiskError::DatasetSchema(format!(
                        "Line {line}: '{DEFAULT_COLUMN}' must be 0 or 1, got {v}"
                    )))
                }
            };
            let months_to_default = match months_column.map(field) {
                Some(raw) if !raw.is_empty() => Some(parse_number(raw, MONTHS_COLUMN, line)?),
                _ => None,
            };

            observations.push(Observation {
                features,
                default,
                months_to_default,
            });
        }

        Ok(Self { observations })
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn default_count(&self) -> usize {
        self.observations.iter().filter(|o| o.default).count()
    }

    pub fn features(&self) -> Vec<[f64; RATIO_COUNT]> {
        self.observations.iter().map(|o| o.features).collect()
    }

    pub fn labels(&self) -> Vec<bool> {
        self.observations.iter().map(|o| o.default).collect()
    }

    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            observations: indices
                .iter()
                .map(|&i| self.observations[i].clone())
                .collect(),
        }
    }

    /// Each class must hold at least `min_per_class` observations.
    pub fn validate_for_training(&self, min_per_class: usize) -> CreditRiskResult<()> {
        let defaults = self.default_count();
        let healthy = self.len() - defaults;
        if defaults < min_per_class || healthy < min_per_class {
            return Err(CreditRiskError::InsufficientData(format!(
                "Training needs at least {min_per_class} defaulted and {min_per_class} healthy \
                 observations (got {defaults} defaulted, {healthy} healthy)"
            )));
        }
        Ok(())
    }

    /// Stratified train/test index split.
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut test = Vec::new();
        for class in [false, true] {
            let mut idx: Vec<usize> = (0..self.len())
                .filter(|&i| self.observations[i].default == class)
                .collect();
            idx.shuffle(&mut rng);
            let mut n_test = (idx.len() as f64 * test_fraction).round() as usize;
            if idx.len() >= 2 {
                n_test = n_test.clamp(1, idx.len() - 1);
            } else {
                n_test = 0;
            }
            test.extend_from_slice(&idx[..n_test]);
            train.extend_from_slice(&idx[n_test..]);
        }
        train.sort_unstable();
        test.sort_unstable();
        (train, test)
    }
}

fn parse_number(raw: &str, column: &str, line: usize) -> CreditRiskResult<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            CreditRiskError::DatasetSchema(format!(
                "Line {line}: column '{column}' has non-numeric value '{raw}'"
            ))
        })
}

/// Assign every index to one of `k` folds, class by class, so each fold
/// keeps roughly the overall default rate.
pub fn stratified_folds(labels: &[bool], k: usize, seed: u64) -> Vec<Vec<usize>> {
    let k = k.max(2);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds = vec![Vec::new(); k];
    for class in [false, true] {
        let mut idx: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        idx.shuffle(&mut rng);
        for (j, i) in idx.into_iter().enumerate() {
            folds[j % k].push(i);
        }
    }
    for fold in folds.iter_mut() {
        fold.sort_unstable();
    }
    folds
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(extra: &str) -> String {
        let mut cols: Vec<String> = RatioCode::feature_order();
        cols.push(DEFAULT_COLUMN.into());
        if !extra.is_empty() {
            cols.push(extra.into());
        }
        cols.join(",")
    }

    fn row(v: f64, default: u8, months: &str) -> String {
        let mut cells: Vec<String> = (0..RATIO_COUNT).map(|i| (v + i as f64).to_string()).collect();
        cells.push(default.to_string());
        cells.push(months.to_string());
        cells.join(",")
    }

    fn dataset(n: usize) -> TrainingDataset {
        TrainingDataset::new(
            (0..n)
                .map(|i| Observation {
                    features: [i as f64; RATIO_COUNT],
                    default: i % 4 == 0,
                    months_to_default: None,
                })
                .collect(),
        )
    }

    #[test]
    fn test_parse_csv_with_optional_months() {
        let csv = format!(
            "{}\n{}\n{}\n",
            header(MONTHS_COLUMN),
            row(0.5, 1, "14"),
            row(1.0, 0, "")
        );
        let ds = TrainingDataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.observations[0].features[13], 13.5);
        assert!(ds.observations[0].default);
        assert_eq!(ds.observations[0].months_to_default, Some(14.0));
        assert_eq!(ds.observations[1].months_to_default, None);
    }

    #[test]
    fn test_missing_columns_named() {
        let csv = "X_1,X_2,default\n0.1,0.2,0\n";
        match TrainingDataset::from_reader(csv.as_bytes()) {
            Err(CreditRiskError::DatasetSchema(msg)) => {
                assert!(msg.contains("X_3") && msg.contains("X_14"), "{msg}");
                assert!(!msg.contains("X_1,"), "{msg}");
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_non_binary_default_rejected() {
        let bad = format!("{}\n{}\n", header(""), "1,2,3,4,5,6,7,8,9,10,11,12,13,14,2");
        assert!(matches!(
            TrainingDataset::from_reader(bad.as_bytes()),
            Err(CreditRiskError::DatasetSchema(_))
        ));
    }

    #[test]
    fn test_stratified_split_keeps_both_classes() {
        let ds = dataset(40);
        let (train, test) = ds.stratified_split(0.2, 42);
        assert_eq!(train.len() + test.len(), 40);
        assert_eq!(test.len(), 8);
        assert!(test.iter().any(|&i| ds.observations[i].default));
        assert!(test.iter().any(|&i| !ds.observations[i].default));
        assert_eq!(ds.stratified_split(0.2, 42), (train, test));
    }

    #[test]
    fn test_stratified_folds_cover_all() {
        let labels = dataset(23).labels();
        let folds = stratified_folds(&labels, 5, 7);
        let mut all: Vec<usize> = folds.concat();
        all.sort_unstable();
        assert_eq!(all, (0..23).collect::<Vec<_>>());
        assert!(folds.iter().all(|f| !f.is_empty()));
    }

    #[test]
    fn test_validate_for_training() {
        assert!(dataset(40).validate_for_training(5).is_ok());
        assert!(matches!(
            dataset(8).validate_for_training(5),
            Err(CreditRiskError::InsufficientData(_))
        ));
    }
}
