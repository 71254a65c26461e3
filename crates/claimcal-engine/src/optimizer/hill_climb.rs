//! Coordinate hill-climbing ("gradient" strategy).
//!
//! Starting from the base weights, each sweep visits every adjustable factor
//! in turn, probes weight ± step (step = step_fraction × span), and moves in
//! the improving direction by step × learning_rate, keeping whichever of the
//! probe and the scaled move scores better. Moves are accepted only when they
//! strictly lower the objective, and weights are clamped to [min, max].
//!
//! This is a local heuristic over a non-convex surface. It reaches a locally
//! improving point from the base weights; it does not promise a global
//! optimum. Sweeps stop at `max_iterations` or once a full sweep improves
//! the objective by no more than `convergence_threshold`.

use claimcal_common::{OptimizerConfig, Result};
use tracing::{debug, instrument};

use super::{OptimizationResult, Optimizer, SearchContext, SearchProblem, SearchRun, Termination};

#[derive(Debug, Clone, Copy, Default)]
pub struct HillClimb;

impl Optimizer for HillClimb {
    fn name(&self) -> &'static str {
        "gradient"
    }

    #[instrument(skip_all, fields(strategy = "gradient"))]
    fn search(
        &self,
        problem: &SearchProblem<'_>,
        config: &OptimizerConfig,
        ctx: &SearchContext,
    ) -> Result<OptimizationResult> {
        let (mut run, adjustable) = SearchRun::start(*problem, config, ctx)?;
        if run.is_degenerate(&adjustable) {
            return run.no_op(self.name());
        }
        let (weights, iterations, termination) = climb(&mut run, &adjustable, config);
        run.finish(self.name(), weights, &adjustable, iterations, termination)
    }
}

/// Hill-climb over `factors` only; every other weight stays at base.
pub(crate) fn climb(
    run: &mut SearchRun<'_>,
    factors: &[usize],
    config: &OptimizerConfig,
) -> (Vec<f64>, usize, Termination) {
    let set = run.problem().weights;
    let mut current = run.base().to_vec();
    let mut current_cost = run.baseline_objective();
    run.record(0, current_cost);

    for sweep in 1..=config.max_iterations {
        if run.cancelled() {
            return (current, sweep - 1, Termination::Cancelled);
        }
        let sweep_start = current_cost;

        for &f in factors {
            let def = set.definition_at(f);
            let step = config.step_fraction * def.span();
            let w = current[f];

            let mut best: Option<(f64, f64, f64)> = None; // (direction, weight, cost)
            for direction in [1.0, -1.0] {
                let probe = def.clamp(w + direction * step);
                if probe == w {
                    continue;
                }
                current[f] = probe;
                let cost = run.cost(&current);
                let threshold = best.map_or(current_cost, |(_, _, c)| c);
                if cost < threshold {
                    best = Some((direction, probe, cost));
                }
            }
            current[f] = w;

            let Some((direction, probe, probe_cost)) = best else {
                continue;
            };
            let moved = def.clamp(w + direction * step * config.learning_rate);
            let (next, next_cost) = if moved != probe {
                current[f] = moved;
                let cost = run.cost(&current);
                if cost < probe_cost {
                    (moved, cost)
                } else {
                    (probe, probe_cost)
                }
            } else {
                (probe, probe_cost)
            };
            current[f] = next;
            current_cost = next_cost;
        }

        let improvement = sweep_start - current_cost;
        run.record(sweep, current_cost);
        debug!(sweep, objective = current_cost, improvement, "hill-climb sweep");
        if improvement <= config.convergence_threshold {
            return (current, sweep, Termination::Converged);
        }
    }

    (current, config.max_iterations, Termination::MaxIterations)
}
