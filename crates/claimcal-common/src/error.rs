use thiserror::Error;

/// Errors raised by the recalibration engine.
///
/// Only configuration problems and I/O around the engine are errors.
/// Data-quality anomalies (zero actuals, malformed claims, unrecognised
/// labels) are counted on the result values instead.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Duplicate weight definition for factor '{0}'")]
    DuplicateFactor(String),

    #[error("Invalid weight definition for factor '{factor}': {reason}")]
    InvalidWeightDefinition { factor: String, reason: String },

    #[error("Unknown factor: {0}")]
    UnknownFactor(String),

    #[error("Weight {weight} for factor '{factor}' is outside [{min}, {max}]")]
    WeightOutOfBounds {
        factor: String,
        weight: f64,
        min: f64,
        max: f64,
    },

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CalibrationError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// True for errors detected before any evaluation begins.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateFactor(_)
                | Self::InvalidWeightDefinition { .. }
                | Self::UnknownFactor(_)
                | Self::WeightOutOfBounds { .. }
                | Self::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CalibrationError>;
