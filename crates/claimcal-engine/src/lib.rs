//! claimcal-engine: Settlement prediction recalibration engine.
//!
//! Scores claims with a multiplicative factor-weight model, measures the
//! prediction error of a weight mapping, explains which factors drive that
//! error, and searches for better weights.

pub mod cancel;
pub mod codec;
pub mod export;
pub mod impact;
pub mod metrics;
pub mod optimizer;
pub mod recommend;
pub mod scorer;
pub mod sensitivity;
pub mod session;
pub mod task;
pub mod weights;

pub use cancel::CancellationToken;
pub use codec::{FactorCodec, NEUTRAL_VALUE};
pub use export::export_weights_csv;
pub use impact::{ImpactRecord, ImpactReport};
pub use metrics::{AggregateMetrics, ClaimResult, Comparison, ComparisonMetrics, EvaluationReport};
pub use optimizer::{
    ConvergencePoint, GridSearch, HillClimb, OptimizationResult, Optimizer, SearchContext,
    SearchProblem, SmartSearch, StrategyKind, Termination,
};
pub use recommend::{Confidence, Direction, Recommendation};
pub use scorer::{predict, score, Dataset};
pub use sensitivity::{SensitivityCurve, SensitivityPoint};
pub use session::CalibrationSession;
pub use task::{spawn_optimization, OptimizationHandle};
pub use weights::WeightSet;
