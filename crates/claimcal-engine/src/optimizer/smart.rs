//! Smart search: optimize only the top-K factors by impact.
//!
//! Impact is measured once at the base weights. The chosen factors are then
//! searched with hill-climbing or a grid (`smart_search`), and every other
//! weight stays at base_weight.

use claimcal_common::engine_config::SmartSearchMode;
use claimcal_common::{OptimizerConfig, Result};
use tracing::{info, instrument};

use super::grid::{cap_factors, enumerate};
use super::hill_climb::climb;
use super::{
    rank_by_impact, OptimizationResult, Optimizer, SearchContext, SearchProblem, SearchRun,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SmartSearch;

impl Optimizer for SmartSearch {
    fn name(&self) -> &'static str {
        "smart"
    }

    #[instrument(skip_all, fields(strategy = "smart"))]
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

        let mut top: Vec<usize> = rank_by_impact(problem, &adjustable)
            .into_iter()
            .take(config.top_k)
            .collect();
        top.sort_unstable();
        info!(
            selected = top.len(),
            adjustable = adjustable.len(),
            mode = ?config.smart_search,
            "smart search factor subset"
        );

        let (weights, iterations, termination) = match config.smart_search {
            SmartSearchMode::HillClimb => climb(&mut run, &top, config),
            SmartSearchMode::Grid => {
                top = cap_factors(problem, &top, config.max_grid_factors);
                enumerate(&mut run, &top, config)?
            }
        };
        run.finish(self.name(), weights, &top, iterations, termination)
    }
}
