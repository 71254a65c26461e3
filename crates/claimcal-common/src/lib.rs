//! claimcal-common: Shared types, errors, and configuration used across all claimcal crates.

pub mod error;
pub mod entities;
pub mod engine_config;

// Re-export commonly used types
pub use engine_config::{EngineConfig, OptimizerConfig, TargetMetric};
pub use entities::{Claim, RawValue, WeightDefinition, WeightMapping};
pub use error::{CalibrationError, Result};
