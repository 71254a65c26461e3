//! Engine configuration.
//!
//! Every tunable constant of the recalibration engine lives here so it can be
//! supplied from YAML/JSON/TOML instead of being baked into the scoring code.
//! All sections default sensibly; an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::{CalibrationError, Result};

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ordinal label tables used by the factor codec
    #[serde(default)]
    pub codec: CodecConfig,

    /// Before/after comparison settings
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Factor impact scoring
    #[serde(default)]
    pub impact: ImpactConfig,

    /// Recommendation step sizes and confidence tiers
    #[serde(default)]
    pub recommendation: RecommendationConfig,

    /// Shared optimizer settings
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Output options
    #[serde(default)]
    pub output: OutputConfig,
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Ordered label tables. A label at index `i` of an `n`-label scale encodes to
/// `i / (n - 1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Scale name -> labels ordered from lowest to highest
    #[serde(default = "default_scales")]
    pub scales: BTreeMap<String, Vec<String>>,

    /// Factor name -> scale name. Unassigned factors search every scale.
    #[serde(default)]
    pub factor_scales: BTreeMap<String, String>,
}

fn default_scales() -> BTreeMap<String, Vec<String>> {
    let scale = |labels: &[&str]| labels.iter().map(|l| l.to_string()).collect::<Vec<_>>();
    BTreeMap::from([
        ("severity".to_string(), scale(&["None", "Mild", "Moderate", "Severe"])),
        ("level".to_string(), scale(&["Low", "Medium", "High"])),
        ("binary".to_string(), scale(&["No", "Yes"])),
    ])
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            scales: default_scales(),
            factor_scales: BTreeMap::new(),
        }
    }
}

// ── Evaluation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// |Δ percentage error| at or below this many points counts as unchanged
    #[serde(default = "default_deadband")]
    pub unchanged_deadband_pct: f64,
}

fn default_deadband() -> f64 { 1.0 }

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self { unchanged_deadband_pct: default_deadband() }
    }
}

// ── Impact ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactConfig {
    /// impact = |r| × coverage^coverage_exponent
    #[serde(default = "default_coverage_exponent")]
    pub coverage_exponent: f64,
}

fn default_coverage_exponent() -> f64 { 1.0 }

impl Default for ImpactConfig {
    fn default() -> Self {
        Self { coverage_exponent: default_coverage_exponent() }
    }
}

// ── Recommendations ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Suggested delta = r × step_factor × (max_weight - min_weight)
    #[serde(default = "default_step_factor")]
    pub step_factor: f64,

    /// Below this |r| the current weight is held
    #[serde(default = "default_min_abs_correlation")]
    pub min_abs_correlation: f64,

    #[serde(default = "default_high_r")]
    pub high_min_abs_correlation: f64,

    #[serde(default = "default_high_n")]
    pub high_min_samples: usize,

    #[serde(default = "default_medium_r")]
    pub medium_min_abs_correlation: f64,

    #[serde(default = "default_medium_n")]
    pub medium_min_samples: usize,
}

fn default_step_factor() -> f64 { 0.25 }
fn default_min_abs_correlation() -> f64 { 0.05 }
fn default_high_r() -> f64 { 0.3 }
fn default_high_n() -> usize { 30 }
fn default_medium_r() -> f64 { 0.15 }
fn default_medium_n() -> usize { 10 }

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            step_factor: default_step_factor(),
            min_abs_correlation: default_min_abs_correlation(),
            high_min_abs_correlation: default_high_r(),
            high_min_samples: default_high_n(),
            medium_min_abs_correlation: default_medium_r(),
            medium_min_samples: default_medium_n(),
        }
    }
}

// ── Optimizer ─────────────────────────────────────────────────────────────────

/// Metric the optimizer minimizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetMetric {
    Mape,
    Rmse,
    /// mape_weight × MAPE/MAPE_base + rmse_weight × RMSE/RMSE_base
    Weighted { mape_weight: f64, rmse_weight: f64 },
}

impl Default for TargetMetric {
    fn default() -> Self {
        Self::Mape
    }
}

/// Inner search used by the smart strategy once it has picked its top-K factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmartSearchMode {
    HillClimb,
    Grid,
}

impl Default for SmartSearchMode {
    fn default() -> Self {
        Self::HillClimb
    }
}

/// Settings shared by all optimizer strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub target: TargetMetric,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Stop hill-climbing once a full sweep improves the target by less than this
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f64,

    /// Factors held at base_weight
    #[serde(default, alias = "keep_factors_constant")]
    pub keep_constant: BTreeSet<String>,

    /// Multiplier applied to the probe step when moving downhill
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Probe step as a fraction of each factor's (max - min) span
    #[serde(default = "default_step_fraction")]
    pub step_fraction: f64,

    /// Number of intervals per factor; the grid has grid_steps + 1 points per axis
    #[serde(default = "default_grid_steps")]
    pub grid_steps: usize,

    /// Explicit grid subset; all adjustable factors when absent
    #[serde(default)]
    pub grid_factors: Option<Vec<String>>,

    /// Hard cap on grid dimensionality (top-N by impact beyond this)
    #[serde(default = "default_max_grid_factors")]
    pub max_grid_factors: usize,

    /// Hard cap on grid combinations
    #[serde(default = "default_max_grid_evaluations")]
    pub max_grid_evaluations: usize,

    /// Factors kept by the smart strategy
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub smart_search: SmartSearchMode,
}

fn default_max_iterations() -> usize { 50 }
fn default_convergence_threshold() -> f64 { 1e-3 }
fn default_learning_rate() -> f64 { 1.0 }
fn default_step_fraction() -> f64 { 0.05 }
fn default_grid_steps() -> usize { 4 }
fn default_max_grid_factors() -> usize { 4 }
fn default_max_grid_evaluations() -> usize { 20_000 }
fn default_top_k() -> usize { 5 }

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            target: TargetMetric::default(),
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            keep_constant: BTreeSet::new(),
            learning_rate: default_learning_rate(),
            step_fraction: default_step_fraction(),
            grid_steps: default_grid_steps(),
            grid_factors: None,
            max_grid_factors: default_max_grid_factors(),
            max_grid_evaluations: default_max_grid_evaluations(),
            top_k: default_top_k(),
            smart_search: SmartSearchMode::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn with_target(mut self, target: TargetMetric) -> Self {
        self.target = target;
        self
    }

    pub fn keep(mut self, factor: impl Into<String>) -> Self {
        self.keep_constant.insert(factor.into());
        self
    }

    /// Range checks that do not depend on the weight set.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(CalibrationError::config("max_iterations must be at least 1"));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(CalibrationError::config(
                "convergence_threshold must be a non-negative number",
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(CalibrationError::config("learning_rate must be positive"));
        }
        if !(self.step_fraction > 0.0 && self.step_fraction <= 1.0) {
            return Err(CalibrationError::config("step_fraction must lie in (0, 1]"));
        }
        if self.grid_steps == 0 {
            return Err(CalibrationError::config("grid_steps must be at least 1"));
        }
        if self.max_grid_factors == 0 || self.max_grid_evaluations == 0 {
            return Err(CalibrationError::config("grid caps must be at least 1"));
        }
        if self.top_k == 0 {
            return Err(CalibrationError::config("top_k must be at least 1"));
        }
        if let TargetMetric::Weighted { mape_weight, rmse_weight } = self.target {
            let valid = mape_weight.is_finite()
                && rmse_weight.is_finite()
                && mape_weight >= 0.0
                && rmse_weight >= 0.0;
            if !valid || mape_weight + rmse_weight <= 0.0 {
                return Err(CalibrationError::config(
                    "weighted target needs non-negative weights with a positive sum",
                ));
            }
        }
        Ok(())
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of per-claim rows in top-N views
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize { 20 }

impl Default for OutputConfig {
    fn default() -> Self {
        Self { top_n: default_top_n() }
    }
}

// ── Helper Methods ─────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load from YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load from JSON file
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Load from TOML file
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load by file extension (.yaml/.yml, .json, .toml) and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let config = match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml(path)?,
            "json" => Self::from_json(path)?,
            "toml" => Self::from_toml(path)?,
            other => {
                return Err(CalibrationError::config(format!(
                    "unsupported config extension '{other}' for {}",
                    path.display()
                )))
            }
        };
        config.validate()?;
        tracing::debug!(path = %path.display(), "engine configuration loaded");
        Ok(config)
    }

    /// Save to YAML file
    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, labels) in &self.codec.scales {
            if labels.is_empty() {
                return Err(CalibrationError::config(format!("codec scale '{name}' has no labels")));
            }
        }
        for (factor, scale) in &self.codec.factor_scales {
            if !self.codec.scales.contains_key(scale) {
                return Err(CalibrationError::config(format!(
                    "factor '{factor}' references unknown codec scale '{scale}'"
                )));
            }
        }

        let deadband = self.evaluation.unchanged_deadband_pct;
        if !deadband.is_finite() || deadband < 0.0 {
            return Err(CalibrationError::config("unchanged_deadband_pct must be non-negative"));
        }
        let exponent = self.impact.coverage_exponent;
        if !exponent.is_finite() || exponent < 0.0 {
            return Err(CalibrationError::config("coverage_exponent must be non-negative"));
        }

        let rec = &self.recommendation;
        if !rec.step_factor.is_finite() || rec.step_factor <= 0.0 {
            return Err(CalibrationError::config("recommendation step_factor must be positive"));
        }
        if rec.high_min_abs_correlation < rec.medium_min_abs_correlation
            || rec.high_min_samples < rec.medium_min_samples
        {
            return Err(CalibrationError::config(
                "high-confidence thresholds must not be looser than medium-confidence thresholds",
            ));
        }

        self.optimizer.validate()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
