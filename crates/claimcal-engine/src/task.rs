//! Background optimization runs.
//!
//! The search itself is synchronous CPU work, so it runs on tokio's blocking
//! pool. The caller keeps an [`OptimizationHandle`] to watch progress, cancel,
//! and await the result without blocking its own event loop.

use std::sync::Arc;

use claimcal_common::{CalibrationError, OptimizerConfig, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::optimizer::{ConvergencePoint, OptimizationResult, Optimizer, SearchContext};
use crate::session::CalibrationSession;

pub struct OptimizationHandle {
    cancel: CancellationToken,
    progress: watch::Receiver<Option<ConvergencePoint>>,
    join: JoinHandle<Result<OptimizationResult>>,
}

impl OptimizationHandle {
    /// Ask the search to stop at its next iteration boundary. The result
    /// still arrives through [`join`](Self::join), carrying the best weights
    /// found so far.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Latest convergence point; `None` until the search records one.
    pub fn progress(&self) -> watch::Receiver<Option<ConvergencePoint>> {
        self.progress.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn join(self) -> Result<OptimizationResult> {
        self.join
            .await
            .map_err(|e| CalibrationError::Task(e.to_string()))?
    }
}

/// Start `optimizer` on the blocking pool. Must be called from within a
/// tokio runtime.
pub fn spawn_optimization(
    session: Arc<CalibrationSession>,
    optimizer: Box<dyn Optimizer>,
    config: OptimizerConfig,
) -> OptimizationHandle {
    let cancel = CancellationToken::new();
    let (tx, rx) = watch::channel(None);
    let ctx = SearchContext::new(cancel.clone()).with_progress(tx);

    debug!(strategy = optimizer.name(), "spawning optimization");
    let join = tokio::task::spawn_blocking(move || {
        session.optimize_with(optimizer.as_ref(), &config, &ctx)
    });

    OptimizationHandle { cancel, progress: rx, join }
}
