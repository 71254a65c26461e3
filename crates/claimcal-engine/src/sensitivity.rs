//! One-factor sensitivity sweeps.
//!
//! Each point re-evaluates the full dataset with a single factor moved, so a
//! sweep costs O(steps × n). The caller bounds `steps`.

use claimcal_common::{CalibrationError, Result, WeightDefinition};
use serde::{Deserialize, Serialize};

use crate::metrics::evaluate;
use crate::scorer::Dataset;
use crate::weights::WeightSet;

/// Tolerance when comparing metrics for the optimal point.
const TIE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub weight: f64,
    pub mape: f64,
    pub rmse: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityCurve {
    pub factor: String,
    pub base_weight: f64,
    pub points: Vec<SensitivityPoint>,
    /// Minimum MAPE, then minimum RMSE, then nearest to the starting weight
    pub optimal: Option<SensitivityPoint>,
}

/// `steps` intervals from min_weight to max_weight, both ends included.
pub fn linear_sweep(def: &WeightDefinition, steps: usize) -> Vec<f64> {
    if steps == 0 || def.span() == 0.0 {
        return vec![def.base_weight];
    }
    (0..=steps)
        .map(|i| {
            if i == steps {
                def.max_weight
            } else {
                def.min_weight + def.span() * i as f64 / steps as f64
            }
        })
        .collect()
}

/// Evaluate `weights` with `factor` replaced by each of `test_weights`.
///
/// `weights` is the dense starting vector, normally the base weights.
pub fn sweep(
    dataset: &Dataset,
    set: &WeightSet,
    weights: &[f64],
    factor: &str,
    test_weights: &[f64],
) -> Result<SensitivityCurve> {
    let idx = set.require(factor)?;
    let def = set.definition_at(idx);
    for &w in test_weights {
        def.check(w)?;
    }
    if weights.len() != set.len() {
        return Err(CalibrationError::config(format!(
            "weight vector has {} entries, weight set has {}",
            weights.len(),
            set.len()
        )));
    }

    let mut trial = weights.to_vec();
    let points: Vec<SensitivityPoint> = test_weights
        .iter()
        .map(|&w| {
            trial[idx] = w;
            let metrics = evaluate(dataset, &trial);
            SensitivityPoint { weight: w, mape: metrics.mape, rmse: metrics.rmse }
        })
        .collect();

    let optimal = optimal_point(&points, weights[idx]);
    Ok(SensitivityCurve {
        factor: factor.to_string(),
        base_weight: def.base_weight,
        points,
        optimal,
    })
}

fn optimal_point(points: &[SensitivityPoint], current: f64) -> Option<SensitivityPoint> {
    let mut best: Option<SensitivityPoint> = None;
    for p in points {
        let better = match best {
            None => true,
            Some(b) => {
                if p.mape < b.mape - TIE_TOLERANCE {
                    true
                } else if p.mape > b.mape + TIE_TOLERANCE {
                    false
                } else if p.rmse < b.rmse - TIE_TOLERANCE {
                    true
                } else if p.rmse > b.rmse + TIE_TOLERANCE {
                    false
                } else {
                    (p.weight - current).abs() < (b.weight - current).abs()
                }
            }
        };
        if better {
            best = Some(*p);
        }
    }
    best
}
