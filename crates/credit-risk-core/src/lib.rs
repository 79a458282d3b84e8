//! Corporate credit risk engine.
//!
//! Statements go in, fourteen ratios come out, and the ratios feed a stacked
//! default-probability ensemble and a survival-analysis trio. Everything is
//! plain structured data; presentation lives with the callers.

pub mod error;
pub mod ratios;
pub mod statements;
pub mod types;

#[cfg(feature = "scenarios")]
pub mod scenarios;

#[cfg(any(feature = "default_probability", feature = "survival"))]
pub mod models;

#[cfg(feature = "default_probability")]
pub mod default_probability;

#[cfg(feature = "survival")]
pub mod survival;

#[cfg(feature = "registry")]
pub mod config;

#[cfg(feature = "registry")]
pub mod registry;

pub use error::CreditRiskError;
pub use types::*;

/// Standard result type for all credit-risk operations
pub type CreditRiskResult<T> = Result<T, CreditRiskError>;
