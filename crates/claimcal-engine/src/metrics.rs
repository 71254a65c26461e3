//! Metric evaluator: MAPE/RMSE for one weight mapping and the before/after
//! comparison for two.
//!
//! Claims whose actual settlement is zero have no percentage error. They are
//! counted in `total_claims` but excluded from both the MAPE and the RMSE
//! sample, which therefore shrinks silently; `excluded_zero_actual` reports
//! how many were dropped. Every function here is a single O(n) pass.

use std::cmp::Ordering;

use claimcal_common::{Claim, WeightMapping};
use serde::{Deserialize, Serialize};

use crate::codec::FactorCodec;
use crate::scorer::{predict, Dataset, PreparedClaim};

/// Per-claim result under one weight mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimResult {
    pub claim_id: String,
    pub predicted: f64,
    pub actual: f64,
    pub absolute_error: f64,
    /// |predicted - actual| / actual × 100; None when actual is zero
    pub percentage_error: Option<f64>,
    /// actual - predicted
    pub variance: f64,
    /// (actual - predicted) / predicted × 100; None when predicted is zero
    pub variance_pct: Option<f64>,
}

impl ClaimResult {
    pub fn from_prediction(claim_id: &str, predicted: f64, actual: f64) -> Self {
        let absolute_error = (predicted - actual).abs();
        Self {
            claim_id: claim_id.to_string(),
            predicted,
            actual,
            absolute_error,
            percentage_error: percentage_error(predicted, actual),
            variance: actual - predicted,
            variance_pct: variance_pct(predicted, actual),
        }
    }
}

pub fn percentage_error(predicted: f64, actual: f64) -> Option<f64> {
    (actual > 0.0).then(|| (predicted - actual).abs() / actual * 100.0)
}

pub fn variance_pct(predicted: f64, actual: f64) -> Option<f64> {
    (predicted != 0.0).then(|| (actual - predicted) / predicted * 100.0)
}

/// Aggregate error metrics for one mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_claims: usize,
    /// Claims contributing to MAPE/RMSE
    pub evaluated_claims: usize,
    pub excluded_zero_actual: usize,
    pub skipped_malformed: usize,
    pub mape: f64,
    pub rmse: f64,
}

#[derive(Debug, Default)]
struct ErrorAccumulator {
    n: usize,
    excluded: usize,
    sum_pct: f64,
    sum_sq: f64,
}

impl ErrorAccumulator {
    fn push(&mut self, predicted: f64, actual: f64) -> Option<f64> {
        match percentage_error(predicted, actual) {
            Some(pct) => {
                let err = predicted - actual;
                self.n += 1;
                self.sum_pct += pct;
                self.sum_sq += err * err;
                Some(pct)
            }
            None => {
                self.excluded += 1;
                None
            }
        }
    }

    fn finish(&self, total_claims: usize, skipped_malformed: usize) -> AggregateMetrics {
        let (mape, rmse) = if self.n == 0 {
            (0.0, 0.0)
        } else {
            let n = self.n as f64;
            (self.sum_pct / n, (self.sum_sq / n).sqrt())
        };
        AggregateMetrics {
            total_claims,
            evaluated_claims: self.n,
            excluded_zero_actual: self.excluded,
            skipped_malformed,
            mape,
            rmse,
        }
    }
}

/// Metrics for a dense weight vector over a prepared dataset.
pub fn evaluate(dataset: &Dataset, weights: &[f64]) -> AggregateMetrics {
    let mut acc = ErrorAccumulator::default();
    for claim in dataset.claims() {
        acc.push(claim.predict(weights), claim.actual);
    }
    acc.finish(dataset.total_claims(), dataset.skipped_malformed())
}

/// Metrics straight from raw claims, without a prepared dataset.
pub fn evaluate_claims(
    claims: &[Claim],
    weights: &WeightMapping,
    codec: &FactorCodec,
) -> AggregateMetrics {
    let mut acc = ErrorAccumulator::default();
    let mut skipped = 0;
    for claim in claims {
        if !claim.is_well_formed() {
            skipped += 1;
            continue;
        }
        acc.push(predict(claim, weights, codec), claim.actual_settlement);
    }
    acc.finish(claims.len(), skipped)
}

/// Metrics plus every per-claim result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: AggregateMetrics,
    pub results: Vec<ClaimResult>,
}

impl EvaluationReport {
    /// Results with the largest percentage error first.
    pub fn worst(&self, limit: usize) -> Vec<&ClaimResult> {
        let mut rows: Vec<&ClaimResult> = self.results.iter().collect();
        rows.sort_by(|a, b| cmp_desc(a.percentage_error, b.percentage_error));
        rows.truncate(limit);
        rows
    }
}

pub fn evaluate_detailed(dataset: &Dataset, weights: &[f64]) -> EvaluationReport {
    let mut acc = ErrorAccumulator::default();
    let mut results = Vec::with_capacity(dataset.claims().len());
    for claim in dataset.claims() {
        let predicted = claim.predict(weights);
        acc.push(predicted, claim.actual);
        results.push(ClaimResult::from_prediction(&claim.id, predicted, claim.actual));
    }
    EvaluationReport {
        metrics: acc.finish(dataset.total_claims(), dataset.skipped_malformed()),
        results,
    }
}

// ── Comparison ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeClass {
    Improved,
    Degraded,
    Unchanged,
    /// Actual is zero, so no percentage error exists
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimComparison {
    pub claim_id: String,
    pub actual: f64,
    pub original_predicted: f64,
    pub candidate_predicted: f64,
    pub original_pct_error: Option<f64>,
    pub candidate_pct_error: Option<f64>,
    /// original_pct_error - candidate_pct_error; positive means better
    pub improvement_pct: Option<f64>,
    pub change: ChangeClass,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMetrics {
    pub total_claims: usize,
    pub evaluated_claims: usize,
    pub excluded_zero_actual: usize,
    pub skipped_malformed: usize,
    pub mape_before: f64,
    pub mape_after: f64,
    pub rmse_before: f64,
    pub rmse_after: f64,
    pub improved_count: usize,
    pub degraded_count: usize,
    pub unchanged_count: usize,
    /// Mean over evaluated claims of (original - candidate) percentage error
    pub avg_improvement_pct: f64,
    pub deadband_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub metrics: ComparisonMetrics,
    pub results: Vec<ClaimComparison>,
}

impl Comparison {
    /// Claims whose percentage error moved most, in either direction.
    pub fn top_changes(&self, limit: usize) -> Vec<&ClaimComparison> {
        let mut rows: Vec<&ClaimComparison> = self
            .results
            .iter()
            .filter(|r| r.improvement_pct.is_some())
            .collect();
        rows.sort_by(|a, b| {
            cmp_desc(a.improvement_pct.map(f64::abs), b.improvement_pct.map(f64::abs))
        });
        rows.truncate(limit);
        rows
    }

    /// Largest candidate errors first.
    pub fn worst(&self, limit: usize) -> Vec<&ClaimComparison> {
        let mut rows: Vec<&ClaimComparison> = self.results.iter().collect();
        rows.sort_by(|a, b| cmp_desc(a.candidate_pct_error, b.candidate_pct_error));
        rows.truncate(limit);
        rows
    }
}

pub fn classify_change(improvement_pct: f64, deadband_pct: f64) -> ChangeClass {
    if improvement_pct > deadband_pct {
        ChangeClass::Improved
    } else if -improvement_pct > deadband_pct {
        ChangeClass::Degraded
    } else {
        ChangeClass::Unchanged
    }
}

/// Score every claim under both weight vectors in one pass.
pub fn compare(
    dataset: &Dataset,
    original: &[f64],
    candidate: &[f64],
    deadband_pct: f64,
) -> Comparison {
    let mut before = ErrorAccumulator::default();
    let mut after = ErrorAccumulator::default();
    let mut results = Vec::with_capacity(dataset.claims().len());
    let (mut improved, mut degraded, mut unchanged) = (0, 0, 0);
    let mut improvement_sum = 0.0;

    for claim in dataset.claims() {
        let row = compare_claim(claim, original, candidate, deadband_pct);
        before.push(row.original_predicted, claim.actual);
        after.push(row.candidate_predicted, claim.actual);

        if let Some(delta) = row.improvement_pct {
            improvement_sum += delta;
        }
        match row.change {
            ChangeClass::Improved => improved += 1,
            ChangeClass::Degraded => degraded += 1,
            ChangeClass::Unchanged => unchanged += 1,
            ChangeClass::Excluded => {}
        }
        results.push(row);
    }

    let total = dataset.total_claims();
    let skipped = dataset.skipped_malformed();
    let m_before = before.finish(total, skipped);
    let m_after = after.finish(total, skipped);
    let avg_improvement_pct = if m_before.evaluated_claims == 0 {
        0.0
    } else {
        improvement_sum / m_before.evaluated_claims as f64
    };

    Comparison {
        metrics: ComparisonMetrics {
            total_claims: total,
            evaluated_claims: m_before.evaluated_claims,
            excluded_zero_actual: m_before.excluded_zero_actual,
            skipped_malformed: skipped,
            mape_before: m_before.mape,
            mape_after: m_after.mape,
            rmse_before: m_before.rmse,
            rmse_after: m_after.rmse,
            improved_count: improved,
            degraded_count: degraded,
            unchanged_count: unchanged,
            avg_improvement_pct,
            deadband_pct,
        },
        results,
    }
}

fn compare_claim(
    claim: &PreparedClaim,
    original: &[f64],
    candidate: &[f64],
    deadband_pct: f64,
) -> ClaimComparison {
    let original_predicted = claim.predict(original);
    let candidate_predicted = claim.predict(candidate);
    let original_pct_error = percentage_error(original_predicted, claim.actual);
    let candidate_pct_error = percentage_error(candidate_predicted, claim.actual);

    let improvement_pct = original_pct_error.zip(candidate_pct_error).map(|(o, c)| o - c);
    let change = match improvement_pct {
        Some(delta) => classify_change(delta, deadband_pct),
        None => ChangeClass::Excluded,
    };

    ClaimComparison {
        claim_id: claim.id.clone(),
        actual: claim.actual,
        original_predicted,
        candidate_predicted,
        original_pct_error,
        candidate_pct_error,
        improvement_pct,
        change,
    }
}

/// Descending order with `None` last.
fn cmp_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
