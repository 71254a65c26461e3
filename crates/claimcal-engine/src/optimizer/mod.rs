//! Weight optimizers.
//!
//! Three strategies implement [`Optimizer`]:
//! - [`GridSearch`]: exhaustive Cartesian grid over a capped factor subset
//! - [`HillClimb`]: coordinate descent from the base weights ("gradient")
//! - [`SmartSearch`]: either of the above restricted to the top-K factors by impact
//!
//! All of them minimise the configured [`TargetMetric`] and return a full
//! weight mapping; factors they do not touch stay at base_weight.

mod grid;
mod hill_climb;
mod smart;

pub use grid::{grid_axis, GridSearch};
pub use hill_climb::HillClimb;
pub use smart::SmartSearch;

use std::fmt;
use std::str::FromStr;

use claimcal_common::engine_config::ImpactConfig;
use claimcal_common::{CalibrationError, OptimizerConfig, Result, TargetMetric, WeightMapping};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::impact::analyze;
use crate::metrics::{evaluate, AggregateMetrics};
use crate::scorer::Dataset;
use crate::weights::WeightSet;

/// Objective values closer than this are treated as equal.
pub(crate) const TIE_TOLERANCE: f64 = 1e-9;

// ── Strategy interface ───────────────────────────────────────────────────────

pub trait Optimizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn search(
        &self,
        problem: &SearchProblem<'_>,
        config: &OptimizerConfig,
        ctx: &SearchContext,
    ) -> Result<OptimizationResult>;
}

/// Immutable inputs to one optimization run.
#[derive(Debug, Clone, Copy)]
pub struct SearchProblem<'a> {
    pub dataset: &'a Dataset,
    pub weights: &'a WeightSet,
    pub impact: &'a ImpactConfig,
}

/// Cancellation and progress plumbing for one run.
#[derive(Debug, Default)]
pub struct SearchContext {
    pub cancel: CancellationToken,
    pub progress: Option<watch::Sender<Option<ConvergencePoint>>>,
}

impl SearchContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel, progress: None }
    }

    pub fn with_progress(mut self, tx: watch::Sender<Option<ConvergencePoint>>) -> Self {
        self.progress = Some(tx);
        self
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePoint {
    pub iteration: usize,
    /// Target objective at this point
    pub metric: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Improvement between sweeps fell to the convergence threshold
    Converged,
    MaxIterations,
    /// Every grid combination was evaluated
    Exhausted,
    Cancelled,
    /// Nothing to optimize: no evaluable claims or no adjustable factors
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub strategy: String,
    /// Every factor in the weight set
    pub optimized_weights: WeightMapping,
    /// Factors the strategy was allowed to move
    pub adjusted_factors: Vec<String>,
    pub iterations: usize,
    /// Metric evaluator calls, baseline and final included
    pub evaluations: usize,
    pub baseline_mape: f64,
    pub baseline_rmse: f64,
    pub final_mape: f64,
    pub final_rmse: f64,
    pub baseline_objective: f64,
    pub final_objective: f64,
    /// (baseline - final) / baseline × 100 on the target objective
    pub improvement_pct: f64,
    pub convergence_history: Vec<ConvergencePoint>,
    pub termination: Termination,
}

// ── Strategy selection ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Grid,
    Gradient,
    Smart,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn Optimizer> {
        match self {
            StrategyKind::Grid => Box::new(GridSearch),
            StrategyKind::Gradient => Box::new(HillClimb),
            StrategyKind::Smart => Box::new(SmartSearch),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" => Ok(StrategyKind::Grid),
            "gradient" | "hill_climb" | "hill-climb" => Ok(StrategyKind::Gradient),
            "smart" => Ok(StrategyKind::Smart),
            other => Err(CalibrationError::config(format!("unknown optimizer strategy '{other}'"))),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::Grid => "grid",
            StrategyKind::Gradient => "gradient",
            StrategyKind::Smart => "smart",
        };
        f.write_str(name)
    }
}

// ── Objective ────────────────────────────────────────────────────────────────

/// Scalar the strategies minimise.
///
/// The weighted target divides each metric by its baseline value so MAPE
/// (percent) and RMSE (currency) are on the same scale. A zero baseline
/// leaves that metric unnormalised.
#[derive(Debug, Clone, Copy)]
pub struct Objective {
    target: TargetMetric,
    mape_base: f64,
    rmse_base: f64,
}

impl Objective {
    pub fn new(target: TargetMetric, baseline: &AggregateMetrics) -> Self {
        Self { target, mape_base: baseline.mape, rmse_base: baseline.rmse }
    }

    pub fn value(&self, metrics: &AggregateMetrics) -> f64 {
        match self.target {
            TargetMetric::Mape => metrics.mape,
            TargetMetric::Rmse => metrics.rmse,
            TargetMetric::Weighted { mape_weight, rmse_weight } => {
                mape_weight * normalise(metrics.mape, self.mape_base)
                    + rmse_weight * normalise(metrics.rmse, self.rmse_base)
            }
        }
    }
}

fn normalise(value: f64, base: f64) -> f64 {
    if base > 0.0 {
        value / base
    } else {
        value
    }
}

// ── Shared run state ─────────────────────────────────────────────────────────

/// Factor indices a strategy may move: not held constant and with a
/// non-empty [min, max] range. Unknown names in `keep_constant` are errors.
pub fn adjustable_factors(weights: &WeightSet, config: &OptimizerConfig) -> Result<Vec<usize>> {
    let mut kept = vec![false; weights.len()];
    for name in &config.keep_constant {
        kept[weights.require(name)?] = true;
    }
    Ok((0..weights.len())
        .filter(|&i| !kept[i] && weights.definition_at(i).span() > 0.0)
        .collect())
}

/// Adjustable factors ordered by impact at the base weights, highest first.
pub(crate) fn rank_by_impact(problem: &SearchProblem<'_>, candidates: &[usize]) -> Vec<usize> {
    let report = analyze(problem.dataset, &problem.weights.base_dense(), problem.impact);
    let mut ranked: Vec<usize> = report
        .ranked()
        .into_iter()
        .filter_map(|r| problem.weights.index_of(&r.factor))
        .filter(|i| candidates.contains(i))
        .collect();
    // candidates absent from the report keep their relative order at the end
    for &i in candidates {
        if !ranked.contains(&i) {
            ranked.push(i);
        }
    }
    ranked
}

/// Bookkeeping common to every strategy: objective, evaluation count,
/// convergence history, progress reporting and cancellation.
pub(crate) struct SearchRun<'a> {
    problem: SearchProblem<'a>,
    ctx: &'a SearchContext,
    objective: Objective,
    baseline: AggregateMetrics,
    baseline_objective: f64,
    base_dense: Vec<f64>,
    evaluations: usize,
    history: Vec<ConvergencePoint>,
}

impl<'a> SearchRun<'a> {
    /// Validate the configuration and evaluate the base weights.
    pub(crate) fn start(
        problem: SearchProblem<'a>,
        config: &OptimizerConfig,
        ctx: &'a SearchContext,
    ) -> Result<(Self, Vec<usize>)> {
        config.validate()?;
        let adjustable = adjustable_factors(problem.weights, config)?;

        let base_dense = problem.weights.base_dense();
        let baseline = evaluate(problem.dataset, &base_dense);
        let objective = Objective::new(config.target, &baseline);
        let baseline_objective = objective.value(&baseline);

        let run = Self {
            problem,
            ctx,
            objective,
            baseline,
            baseline_objective,
            base_dense,
            evaluations: 1,
            history: Vec::new(),
        };
        Ok((run, adjustable))
    }

    pub(crate) fn problem(&self) -> &SearchProblem<'a> {
        &self.problem
    }

    pub(crate) fn base(&self) -> &[f64] {
        &self.base_dense
    }

    pub(crate) fn baseline_objective(&self) -> f64 {
        self.baseline_objective
    }

    /// True when the search space or the error sample is empty.
    pub(crate) fn is_degenerate(&self, adjustable: &[usize]) -> bool {
        adjustable.is_empty() || self.baseline.evaluated_claims == 0
    }

    pub(crate) fn cost(&mut self, weights: &[f64]) -> f64 {
        self.evaluations += 1;
        self.objective.value(&evaluate(self.problem.dataset, weights))
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.ctx.cancel.is_cancelled()
    }

    pub(crate) fn record(&mut self, iteration: usize, metric: f64) {
        let point = ConvergencePoint { iteration, metric };
        self.history.push(point);
        if let Some(tx) = &self.ctx.progress {
            tx.send_replace(Some(point));
        }
    }

    /// Base weights unchanged, zero improvement.
    pub(crate) fn no_op(mut self, strategy: &str) -> Result<OptimizationResult> {
        if self.baseline.evaluated_claims == 0 {
            warn!(strategy, "no evaluable claims; returning base weights");
        } else {
            info!(strategy, "no adjustable factors; returning base weights");
        }
        let baseline_objective = self.baseline_objective;
        self.record(0, baseline_objective);
        let weights = self.base_dense.clone();
        self.finish(strategy, weights, &[], 0, Termination::NoOp)
    }

    pub(crate) fn finish(
        mut self,
        strategy: &str,
        weights: Vec<f64>,
        adjusted: &[usize],
        iterations: usize,
        termination: Termination,
    ) -> Result<OptimizationResult> {
        let set = self.problem.weights;
        set.check_dense(&weights)?;

        let final_metrics = evaluate(self.problem.dataset, &weights);
        self.evaluations += 1;
        let final_objective = self.objective.value(&final_metrics);
        let no_baseline = termination == Termination::NoOp || self.baseline_objective <= 0.0;
        let improvement_pct = if no_baseline {
            0.0
        } else {
            (self.baseline_objective - final_objective) / self.baseline_objective * 100.0
        };

        info!(
            strategy,
            iterations,
            evaluations = self.evaluations,
            baseline = self.baseline_objective,
            final_objective,
            ?termination,
            "optimization finished"
        );

        Ok(OptimizationResult {
            strategy: strategy.to_string(),
            optimized_weights: set.to_mapping(&weights),
            adjusted_factors: adjusted
                .iter()
                .map(|&i| set.definition_at(i).factor_name.clone())
                .collect(),
            iterations,
            evaluations: self.evaluations,
            baseline_mape: self.baseline.mape,
            baseline_rmse: self.baseline.rmse,
            final_mape: final_metrics.mape,
            final_rmse: final_metrics.rmse,
            baseline_objective: self.baseline_objective,
            final_objective,
            improvement_pct,
            convergence_history: self.history,
            termination,
        })
    }
}
