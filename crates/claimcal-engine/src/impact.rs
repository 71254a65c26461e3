//! Factor impact analysis.
//!
//! For each factor: Pearson r between the encoded factor value and the
//! claim's signed variance percentage, (actual - predicted) / predicted × 100,
//! under the supplied weights. Claims that lack the factor (or have an
//! unrecognised label, or a zero prediction) are left out of that factor's
//! sample.
//!
//! impact_score = |r| × coverage^coverage_exponent
//!
//! where coverage is the fraction of evaluable claims whose encoded value is
//! non-neutral. With the default exponent of 1 this is the plain product.
//! Fewer than two samples, or zero variance on either axis, leaves r
//! undefined; the record then carries r = 0 and impact 0, never NaN.

use std::collections::BTreeMap;

use claimcal_common::engine_config::ImpactConfig;
use serde::{Deserialize, Serialize};

use crate::codec::{NEUTRAL_TOLERANCE, NEUTRAL_VALUE};
use crate::metrics::variance_pct;
use crate::scorer::Dataset;

/// Streaming bivariate accumulator (Welford) for Pearson correlation.
#[derive(Debug, Clone, Default)]
pub struct Pearson {
    n: usize,
    mean_x: f64,
    mean_y: f64,
    m2_x: f64,
    m2_y: f64,
    c_xy: f64,
}

impl Pearson {
    pub fn push(&mut self, x: f64, y: f64) {
        self.n += 1;
        let n = self.n as f64;
        let dx = x - self.mean_x;
        let dy = y - self.mean_y;
        self.mean_x += dx / n;
        self.mean_y += dy / n;
        self.m2_x += dx * (x - self.mean_x);
        self.m2_y += dy * (y - self.mean_y);
        self.c_xy += dx * (y - self.mean_y);
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn mean_x(&self) -> f64 {
        self.mean_x
    }

    pub fn mean_y(&self) -> f64 {
        self.mean_y
    }

    /// None when undefined (n < 2 or a constant axis).
    pub fn correlation(&self) -> Option<f64> {
        if self.n < 2 || self.m2_x <= f64::EPSILON || self.m2_y <= f64::EPSILON {
            return None;
        }
        let r = self.c_xy / (self.m2_x * self.m2_y).sqrt();
        r.is_finite().then(|| r.clamp(-1.0, 1.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRecord {
    pub factor: String,
    pub current_weight: f64,
    /// Pearson r; 0 when undefined
    pub correlation: f64,
    pub correlation_defined: bool,
    /// Claims in the correlation sample
    pub sample_size: usize,
    /// Fraction of evaluable claims with a non-neutral encoded value
    pub coverage: f64,
    pub impact_score: f64,
    pub mean_encoded_value: f64,
    pub mean_variance_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImpactReport {
    pub records: BTreeMap<String, ImpactRecord>,
    pub evaluated_claims: usize,
}

impl ImpactReport {
    pub fn get(&self, factor: &str) -> Option<&ImpactRecord> {
        self.records.get(factor)
    }

    /// Highest impact first; ties by factor name.
    pub fn ranked(&self) -> Vec<&ImpactRecord> {
        let mut rows: Vec<&ImpactRecord> = self.records.values().collect();
        rows.sort_by(|a, b| {
            b.impact_score
                .partial_cmp(&a.impact_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.factor.cmp(&b.factor))
        });
        rows
    }
}

pub fn impact_score(correlation: f64, coverage: f64, config: &ImpactConfig) -> f64 {
    correlation.abs() * coverage.powf(config.coverage_exponent)
}

/// One pass over the dataset: O(n × f).
pub fn analyze(dataset: &Dataset, weights: &[f64], config: &ImpactConfig) -> ImpactReport {
    let n_factors = dataset.factors().len();
    let mut samples = vec![Pearson::default(); n_factors];
    let mut non_neutral = vec![0usize; n_factors];

    for claim in dataset.claims() {
        let variance = variance_pct(claim.predict(weights), claim.actual);
        for f in 0..n_factors {
            if !claim.is_known(f) {
                continue;
            }
            let value = claim.value(f);
            if (value - NEUTRAL_VALUE).abs() > NEUTRAL_TOLERANCE {
                non_neutral[f] += 1;
            }
            if let Some(v) = variance {
                samples[f].push(value, v);
            }
        }
    }

    let evaluated = dataset.claims().len();
    let records = dataset
        .factors()
        .iter()
        .enumerate()
        .map(|(f, name)| {
            let sample = &samples[f];
            let correlation = sample.correlation();
            let coverage = if evaluated == 0 {
                0.0
            } else {
                non_neutral[f] as f64 / evaluated as f64
            };
            let r = correlation.unwrap_or(0.0);
            let record = ImpactRecord {
                factor: name.clone(),
                current_weight: weights.get(f).copied().unwrap_or(0.0),
                correlation: r,
                correlation_defined: correlation.is_some(),
                sample_size: sample.len(),
                coverage,
                impact_score: impact_score(r, coverage, config),
                mean_encoded_value: sample.mean_x(),
                mean_variance_pct: sample.mean_y(),
            };
            (name.clone(), record)
        })
        .collect();

    ImpactReport { records, evaluated_claims: evaluated }
}
