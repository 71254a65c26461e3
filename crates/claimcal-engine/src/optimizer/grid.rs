//! Exhaustive grid search.
//!
//! Each grid factor gets `grid_steps + 1` evenly spaced values from
//! min_weight to max_weight inclusive. The grid is the Cartesian product of
//! those axes, so its size is (grid_steps + 1)^k for k factors. Two caps
//! keep that bounded:
//! - at most `max_grid_factors` factors; a larger subset is cut to the
//!   top-N by impact at the base weights
//! - at most `max_grid_evaluations` combinations, otherwise the call is
//!   rejected as a configuration error before anything is evaluated
//!
//! The best combination has the lowest objective; ties go to the one
//! nearest the base weights (L1 distance).

use claimcal_common::{CalibrationError, OptimizerConfig, Result, WeightDefinition};
use tracing::{debug, instrument, warn};

use crate::sensitivity::linear_sweep;

use super::{
    rank_by_impact, OptimizationResult, Optimizer, SearchContext, SearchProblem, SearchRun,
    Termination, TIE_TOLERANCE,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct GridSearch;

impl Optimizer for GridSearch {
    fn name(&self) -> &'static str {
        "grid"
    }

    #[instrument(skip_all, fields(strategy = "grid"))]
    fn search(
        &self,
        problem: &SearchProblem<'_>,
        config: &OptimizerConfig,
        ctx: &SearchContext,
    ) -> Result<OptimizationResult> {
        let (mut run, adjustable) = SearchRun::start(*problem, config, ctx)?;
        let candidates = match &config.grid_factors {
            Some(names) => {
                let mut picked = Vec::with_capacity(names.len());
                for name in names {
                    let idx = problem.weights.require(name)?;
                    if adjustable.contains(&idx) && !picked.contains(&idx) {
                        picked.push(idx);
                    }
                }
                picked.sort_unstable();
                picked
            }
            None => adjustable,
        };
        if run.is_degenerate(&candidates) {
            return run.no_op(self.name());
        }

        let factors = cap_factors(problem, &candidates, config.max_grid_factors);
        let (weights, iterations, termination) = enumerate(&mut run, &factors, config)?;
        run.finish(self.name(), weights, &factors, iterations, termination)
    }
}

/// Grid values for one factor: `steps` intervals, both bounds included.
pub fn grid_axis(def: &WeightDefinition, steps: usize) -> Vec<f64> {
    linear_sweep(def, steps)
}

/// Keep at most `cap` factors, preferring the highest impact.
pub(crate) fn cap_factors(
    problem: &SearchProblem<'_>,
    candidates: &[usize],
    cap: usize,
) -> Vec<usize> {
    if candidates.len() <= cap {
        return candidates.to_vec();
    }
    let mut kept: Vec<usize> = rank_by_impact(problem, candidates)
        .into_iter()
        .take(cap)
        .collect();
    kept.sort_unstable();
    warn!(
        requested = candidates.len(),
        kept = kept.len(),
        "grid factor subset exceeds max_grid_factors; keeping the highest-impact factors"
    );
    kept
}

/// Evaluate every combination over `factors`; other weights stay at base.
pub(crate) fn enumerate(
    run: &mut SearchRun<'_>,
    factors: &[usize],
    config: &OptimizerConfig,
) -> Result<(Vec<f64>, usize, Termination)> {
    let set = run.problem().weights;
    let axes: Vec<Vec<f64>> = factors
        .iter()
        .map(|&f| grid_axis(set.definition_at(f), config.grid_steps))
        .collect();

    let combinations = axes
        .iter()
        .try_fold(1usize, |acc, axis| acc.checked_mul(axis.len()))
        .filter(|&n| n <= config.max_grid_evaluations)
        .ok_or_else(|| {
            CalibrationError::config(format!(
                "grid over {} factors with {} steps exceeds max_grid_evaluations ({})",
                factors.len(),
                config.grid_steps,
                config.max_grid_evaluations
            ))
        })?;
    debug!(factors = factors.len(), combinations, "grid enumeration");

    let base = run.base().to_vec();
    let distance = |weights: &[f64]| -> f64 {
        factors.iter().map(|&f| (weights[f] - base[f]).abs()).sum()
    };

    run.record(0, run.baseline_objective());
    let mut trial = base.clone();
    let mut best: Option<(Vec<f64>, f64, f64)> = None; // (weights, cost, distance)
    let mut odometer = vec![0usize; factors.len()];
    let mut evaluated = 0;

    loop {
        if run.cancelled() {
            let weights = best.map_or(base, |(w, _, _)| w);
            return Ok((weights, evaluated, Termination::Cancelled));
        }

        for (k, &f) in factors.iter().enumerate() {
            trial[f] = axes[k][odometer[k]];
        }
        let cost = run.cost(&trial);
        evaluated += 1;

        let d = distance(&trial);
        let replace = match &best {
            None => true,
            Some((_, best_cost, best_d)) => {
                cost < best_cost - TIE_TOLERANCE
                    || ((cost - best_cost).abs() <= TIE_TOLERANCE && d < *best_d)
            }
        };
        if replace {
            if best.as_ref().map_or(true, |(_, c, _)| cost < c - TIE_TOLERANCE) {
                run.record(evaluated, cost);
            }
            best = Some((trial.clone(), cost, d));
        }

        if !advance(&mut odometer, &axes) {
            break;
        }
    }

    let weights = best.map_or(base, |(w, _, _)| w);
    Ok((weights, evaluated, Termination::Exhausted))
}

/// Step the odometer; false once every combination has been produced.
fn advance(odometer: &mut [usize], axes: &[Vec<f64>]) -> bool {
    for (digit, axis) in odometer.iter_mut().zip(axes).rev() {
        *digit += 1;
        if *digit < axis.len() {
            return true;
        }
        *digit = 0;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_axis_inclusive() {
        let def = WeightDefinition::new("A", 0.0, 0.0, 1.0);
        assert_eq!(grid_axis(&def, 2), vec![0.0, 0.5, 1.0]);
        assert_eq!(grid_axis(&def, 1), vec![0.0, 1.0]);
    }

    #[test]
    fn test_odometer_visits_every_combination() {
        let axes = vec![vec![0.0, 1.0], vec![0.0, 1.0, 2.0]];
        let mut odometer = vec![0, 0];
        let mut seen = vec![odometer.clone()];
        while advance(&mut odometer, &axes) {
            seen.push(odometer.clone());
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.last(), Some(&vec![1, 2]));
    }
}
