//! Learning primitives shared by the default-probability ensemble and the
//! survival models.

pub mod boosting;
pub mod dataset;
pub mod forest;
pub mod linalg;
pub mod logistic;
pub mod metrics;
pub mod tree;

pub use dataset::{Observation, TrainingDataset};
pub use metrics::ClassificationMetrics;
