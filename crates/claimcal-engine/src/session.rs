//! Calibration session: one claim set and one weight set, prepared once and
//! queried many times.

use claimcal_common::{
    Claim, EngineConfig, OptimizerConfig, Result, WeightDefinition, WeightMapping,
};
use tracing::info;

use crate::codec::FactorCodec;
use crate::export::export_weights_csv;
use crate::impact::{analyze, ImpactReport};
use crate::metrics::{
    compare, evaluate, evaluate_detailed, AggregateMetrics, Comparison, EvaluationReport,
};
use crate::optimizer::{OptimizationResult, Optimizer, SearchContext, SearchProblem};
use crate::recommend::{recommend, Recommendation};
use crate::scorer::Dataset;
use crate::sensitivity::{linear_sweep, sweep, SensitivityCurve};
use crate::weights::WeightSet;

/// Immutable inputs for every engine operation.
///
/// Weight mappings are scored as given: factors they omit contribute zero,
/// the same as `scorer::predict`. Pass `base_mapping()` (or
/// `WeightSet::complete`) for base weights. Mappings naming unknown factors
/// or carrying out-of-bounds weights are rejected before any evaluation.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    config: EngineConfig,
    codec: FactorCodec,
    weights: WeightSet,
    dataset: Dataset,
}

impl CalibrationSession {
    pub fn new(
        claims: &[Claim],
        definitions: Vec<WeightDefinition>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let codec = FactorCodec::from_config(&config.codec)?;
        let weights = WeightSet::new(definitions)?;
        let dataset = Dataset::prepare(claims, &weights, &codec);
        info!(
            claims = dataset.total_claims(),
            prepared = dataset.claims().len(),
            factors = weights.len(),
            unrecognised_values = dataset.unrecognised_values(),
            "calibration session ready"
        );
        Ok(Self { config, codec, weights, dataset })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn codec(&self) -> &FactorCodec {
        &self.codec
    }

    pub fn weights(&self) -> &WeightSet {
        &self.weights
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn base_mapping(&self) -> WeightMapping {
        self.weights.base_mapping()
    }

    /// Validate a mapping and expand it to a dense vector.
    fn resolve(&self, mapping: &WeightMapping) -> Result<Vec<f64>> {
        self.weights.validate_mapping(mapping)?;
        Ok(self.weights.dense(mapping))
    }

    pub fn evaluate(&self, mapping: &WeightMapping) -> Result<AggregateMetrics> {
        Ok(evaluate(&self.dataset, &self.resolve(mapping)?))
    }

    pub fn evaluate_detailed(&self, mapping: &WeightMapping) -> Result<EvaluationReport> {
        Ok(evaluate_detailed(&self.dataset, &self.resolve(mapping)?))
    }

    pub fn compare(
        &self,
        original: &WeightMapping,
        candidate: &WeightMapping,
    ) -> Result<Comparison> {
        let original = self.resolve(original)?;
        let candidate = self.resolve(candidate)?;
        Ok(compare(
            &self.dataset,
            &original,
            &candidate,
            self.config.evaluation.unchanged_deadband_pct,
        ))
    }

    pub fn impact(&self, mapping: &WeightMapping) -> Result<ImpactReport> {
        Ok(analyze(&self.dataset, &self.resolve(mapping)?, &self.config.impact))
    }

    /// Impact analysis followed by recommendations, both under `mapping`.
    pub fn recommend(&self, mapping: &WeightMapping) -> Result<Vec<Recommendation>> {
        let report = self.impact(mapping)?;
        Ok(self.recommend_from(&report))
    }

    pub fn recommend_from(&self, report: &ImpactReport) -> Vec<Recommendation> {
        recommend(&self.weights, report, &self.config.recommendation)
    }

    pub fn sweep(
        &self,
        mapping: &WeightMapping,
        factor: &str,
        test_weights: &[f64],
    ) -> Result<SensitivityCurve> {
        let dense = self.resolve(mapping)?;
        sweep(&self.dataset, &self.weights, &dense, factor, test_weights)
    }

    /// Sweep `factor` from min_weight to max_weight in `steps` intervals.
    pub fn sweep_linear(
        &self,
        mapping: &WeightMapping,
        factor: &str,
        steps: usize,
    ) -> Result<SensitivityCurve> {
        let idx = self.weights.require(factor)?;
        let values = linear_sweep(self.weights.definition_at(idx), steps);
        self.sweep(mapping, factor, &values)
    }

    pub fn search_problem(&self) -> SearchProblem<'_> {
        SearchProblem {
            dataset: &self.dataset,
            weights: &self.weights,
            impact: &self.config.impact,
        }
    }

    /// Run `optimizer` synchronously with the session's optimizer settings.
    pub fn optimize(&self, optimizer: &dyn Optimizer) -> Result<OptimizationResult> {
        self.optimize_with(optimizer, &self.config.optimizer, &SearchContext::default())
    }

    pub fn optimize_with(
        &self,
        optimizer: &dyn Optimizer,
        config: &OptimizerConfig,
        ctx: &SearchContext,
    ) -> Result<OptimizationResult> {
        optimizer.search(&self.search_problem(), config, ctx)
    }

    pub fn export_csv(&self, mapping: &WeightMapping) -> Result<String> {
        self.weights.validate_mapping(mapping)?;
        export_weights_csv(&self.weights, mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::metrics::evaluate_claims;
    use claimcal_common::CalibrationError;

    fn session() -> CalibrationSession {
        let date = NaiveDate::from_ymd_opt(2024, 2, 2).unwrap();
        let claims = vec![
            Claim::new("c1", 1000.0, 800.0, date).with_factor("attorney", "Yes"),
            Claim::new("c2", 2000.0, 2500.0, date).with_factor("attorney", "No"),
        ];
        let defs = vec![WeightDefinition::new("attorney", 0.0, -0.5, 0.5)];
        CalibrationSession::new(&claims, defs, EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_absent_factors_contribute_zero() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 2).unwrap();
        let claims = vec![Claim::new("c1", 1000.0, 1000.0, date).with_factor("A", "Severe")];
        let defs = vec![WeightDefinition::new("A", 0.3, -0.5, 0.5)];
        let s = CalibrationSession::new(&claims, defs, EngineConfig::default()).unwrap();

        let empty = s.evaluate(&WeightMapping::new()).unwrap();
        assert_eq!(empty.mape, 0.0);
        assert_eq!(empty, evaluate_claims(&claims, &WeightMapping::new(), s.codec()));

        let base = s.evaluate(&s.base_mapping()).unwrap();
        assert!((base.mape - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_session_agrees_with_raw_path_on_partial_mapping() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 2).unwrap();
        let claims = vec![
            Claim::new("c1", 1300.0, 1000.0, date).with_factor("A", "High").with_factor("B", "Yes"),
            Claim::new("c2", 900.0, 1000.0, date).with_factor("A", "Low").with_factor("B", "No"),
            Claim::new("c3", 2100.0, 2000.0, date).with_factor("A", "Medium"),
        ];
        let defs = vec![
            WeightDefinition::new("A", 0.1, -0.5, 0.5),
            WeightDefinition::new("B", 0.2, -0.5, 0.5),
        ];
        let s = CalibrationSession::new(&claims, defs, EngineConfig::default()).unwrap();
        let partial = WeightMapping::new().with("A", 0.25);

        let via_session = s.evaluate(&partial).unwrap();
        let raw = evaluate_claims(&claims, &partial, s.codec());
        assert_eq!(via_session.evaluated_claims, raw.evaluated_claims);
        assert!((via_session.mape - raw.mape).abs() < 1e-9);
        assert!((via_session.rmse - raw.rmse).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_bounds_candidate_rejected() {
        let s = session();
        let candidate = WeightMapping::new().with("attorney", 0.9);
        let err = s.compare(&s.base_mapping(), &candidate).unwrap_err();
        assert!(matches!(err, CalibrationError::WeightOutOfBounds { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_compare_improvement() {
        let s = session();
        let candidate = WeightMapping::new().with("attorney", 0.25);
        let comparison = s.compare(&s.base_mapping(), &candidate).unwrap();
        assert_eq!(comparison.metrics.improved_count, 1);
        assert_eq!(comparison.metrics.unchanged_count, 1);
        assert!((comparison.metrics.mape_after - 12.5).abs() < 1e-9);
    }
}
