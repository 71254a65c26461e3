//! Scoring function and the prepared dataset used by every evaluator.
//!
//! score(c, W)   = Σ W[f] × encode(c[f])      over factors f in W
//! predict(c, W) = base(c) × (1 + score(c, W))
//!
//! A zero base prediction stays zero whatever the score. A score below -1
//! gives a negative prediction, which is scored like any other.

use claimcal_common::{Claim, WeightMapping};
use tracing::warn;

use crate::codec::{Encoding, FactorCodec};
use crate::weights::WeightSet;

/// Adjustment score of one raw claim. Factors absent from the claim or the
/// mapping contribute zero.
pub fn score(claim: &Claim, weights: &WeightMapping, codec: &FactorCodec) -> f64 {
    weights
        .iter()
        .map(|(factor, w)| w * codec.encode(factor, claim.factor(factor)))
        .sum()
}

pub fn predict(claim: &Claim, weights: &WeightMapping, codec: &FactorCodec) -> f64 {
    apply_adjustment(claim.base_prediction, score(claim, weights, codec))
}

/// Multiplicative adjustment of a baseline prediction.
pub fn apply_adjustment(base_prediction: f64, score: f64) -> f64 {
    if base_prediction == 0.0 {
        return 0.0;
    }
    base_prediction * (1.0 + score)
}

// ── Prepared dataset ─────────────────────────────────────────────────────────

/// A claim encoded once against a weight set's factor order.
#[derive(Debug, Clone)]
pub struct PreparedClaim {
    pub id: String,
    pub actual: f64,
    pub base_prediction: f64,
    values: Vec<f64>,
    known: Vec<bool>,
}

impl PreparedClaim {
    /// Dot product of encoded values with a dense weight vector.
    pub fn score(&self, weights: &[f64]) -> f64 {
        self.values.iter().zip(weights).map(|(v, w)| v * w).sum()
    }

    pub fn predict(&self, weights: &[f64]) -> f64 {
        apply_adjustment(self.base_prediction, self.score(weights))
    }

    pub fn value(&self, factor_idx: usize) -> f64 {
        self.values[factor_idx]
    }

    /// False when the claim lacks the factor or its label was unrecognised.
    pub fn is_known(&self, factor_idx: usize) -> bool {
        self.known[factor_idx]
    }
}

/// Claim set encoded for repeated evaluation.
///
/// Encoding happens once here, so each later evaluation is O(n × f)
/// arithmetic with no string lookups.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    factors: Vec<String>,
    claims: Vec<PreparedClaim>,
    total_claims: usize,
    skipped_malformed: usize,
    unrecognised_values: usize,
}

impl Dataset {
    pub fn prepare(claims: &[Claim], weights: &WeightSet, codec: &FactorCodec) -> Self {
        let factors: Vec<String> = weights.factor_names().map(str::to_string).collect();
        let mut prepared = Vec::with_capacity(claims.len());
        let mut skipped_malformed = 0;
        let mut unrecognised_values = 0;

        for claim in claims {
            if !claim.is_well_formed() {
                skipped_malformed += 1;
                continue;
            }

            let mut values = Vec::with_capacity(factors.len());
            let mut known = Vec::with_capacity(factors.len());
            for factor in &factors {
                let encoding = codec.classify(factor, claim.factor(factor));
                if encoding == Encoding::Unrecognised {
                    unrecognised_values += 1;
                }
                values.push(encoding.value());
                known.push(encoding.is_known());
            }

            prepared.push(PreparedClaim {
                id: claim.id.clone(),
                actual: claim.actual_settlement,
                base_prediction: claim.base_prediction,
                values,
                known,
            });
        }

        if skipped_malformed > 0 {
            warn!(skipped_malformed, "claims with invalid amounts skipped");
        }

        Self {
            factors,
            claims: prepared,
            total_claims: claims.len(),
            skipped_malformed,
            unrecognised_values,
        }
    }

    pub fn factors(&self) -> &[String] {
        &self.factors
    }

    pub fn claims(&self) -> &[PreparedClaim] {
        &self.claims
    }

    /// Every claim supplied, including skipped ones.
    pub fn total_claims(&self) -> usize {
        self.total_claims
    }

    pub fn skipped_malformed(&self) -> usize {
        self.skipped_malformed
    }

    pub fn unrecognised_values(&self) -> usize {
        self.unrecognised_values
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use claimcal_common::{RawValue, WeightDefinition};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[test]
    fn test_zero_score_reproduces_baseline() {
        let codec = FactorCodec::default();
        let claim = Claim::new("c1", 1000.0, 1000.0, date()).with_factor("A", "High");
        let weights = WeightMapping::new().with("A", 0.0);
        assert_eq!(score(&claim, &weights, &codec), 0.0);
        assert_eq!(predict(&claim, &weights, &codec), 1000.0);
    }

    #[test]
    fn test_multiplicative_adjustment() {
        let codec = FactorCodec::default();
        let claim = Claim::new("c1", 1000.0, 1000.0, date()).with_factor("A", "High");
        let weights = WeightMapping::new().with("A", 0.2);
        assert!((predict(&claim, &weights, &codec) - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_base_prediction_stays_zero() {
        let codec = FactorCodec::default();
        let claim = Claim::new("c1", 500.0, 0.0, date()).with_factor("A", "Severe");
        let weights = WeightMapping::new().with("A", 0.5);
        assert_eq!(predict(&claim, &weights, &codec), 0.0);
    }

    #[test]
    fn test_large_negative_score_goes_below_zero() {
        let codec = FactorCodec::default();
        let claim = Claim::new("c1", 1000.0, 1000.0, date())
            .with_factor("A", "Severe")
            .with_factor("B", "Severe")
            .with_factor("C", "Severe");
        let weights = WeightMapping::new().with("A", -0.5).with("B", -0.5).with("C", -0.5);
        assert!((score(&claim, &weights, &codec) + 1.5).abs() < 1e-12);
        assert!((predict(&claim, &weights, &codec) + 500.0).abs() < 1e-9);
        assert_eq!(apply_adjustment(1000.0, -1.5), -500.0);
    }

    #[test]
    fn test_factors_outside_mapping_ignored() {
        let codec = FactorCodec::default();
        let claim = Claim::new("c1", 1000.0, 1000.0, date())
            .with_factor("A", "High")
            .with_factor("B", "Severe");
        let weights = WeightMapping::new().with("A", 0.1);
        assert!((score(&claim, &weights, &codec) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_prepared_path_matches_raw_scoring() {
        let codec = FactorCodec::default();
        let set = WeightSet::new(vec![
            WeightDefinition::new("A", 0.1, -0.5, 0.5),
            WeightDefinition::new("B", -0.2, -0.5, 0.5),
        ])
        .unwrap();
        let claims = vec![
            Claim::new("c1", 1000.0, 900.0, date())
                .with_factor("A", "Moderate")
                .with_factor("B", RawValue::Number(0.7)),
            Claim::new("c2", 2000.0, 2100.0, date()).with_factor("B", "Unheard-of"),
            Claim::new("bad", f64::NAN, 100.0, date()),
        ];
        let dataset = Dataset::prepare(&claims, &set, &codec);
        assert_eq!(dataset.total_claims(), 3);
        assert_eq!(dataset.skipped_malformed(), 1);
        assert_eq!(dataset.unrecognised_values(), 1);

        let mapping = set.base_mapping();
        let dense = set.dense(&mapping);
        for (raw, prepared) in claims.iter().zip(dataset.claims()) {
            let expected = predict(raw, &mapping, &codec);
            assert!((prepared.predict(&dense) - expected).abs() < 1e-9);
        }
        assert!(!dataset.claims()[1].is_known(0));
        assert!(!dataset.claims()[1].is_known(1));
    }
}
