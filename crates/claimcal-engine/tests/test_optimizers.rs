//! Optimizer strategies end to end through a calibration session.

use claimcal_common::engine_config::SmartSearchMode;
use claimcal_common::{
    CalibrationError, Claim, EngineConfig, OptimizerConfig, TargetMetric, WeightDefinition,
};
use claimcal_engine::{
    CalibrationSession, GridSearch, HillClimb, Optimizer, SearchContext, SmartSearch,
    StrategyKind, Termination,
};
use claimcal_test_utils::pretty_assertions::assert_eq;
use claimcal_test_utils::{fixed_date, standard_definitions, synthetic_claims, true_weights};

fn synthetic_session(count: usize, seed: u64) -> CalibrationSession {
    let claims = synthetic_claims(count, seed, &true_weights(), 0.03);
    CalibrationSession::new(&claims, standard_definitions(), EngineConfig::default()).unwrap()
}

fn strategies() -> Vec<Box<dyn Optimizer>> {
    vec![Box::new(GridSearch), Box::new(HillClimb), Box::new(SmartSearch)]
}

#[test]
fn test_every_strategy_is_deterministic() {
    let session = synthetic_session(200, 8);
    for optimizer in strategies() {
        let first = session.optimize(optimizer.as_ref()).unwrap();
        let second = session.optimize(optimizer.as_ref()).unwrap();
        assert_eq!(first.optimized_weights, second.optimized_weights, "{}", optimizer.name());
        assert_eq!(first.iterations, second.iterations);
        assert_eq!(first.convergence_history, second.convergence_history);
    }
}

#[test]
fn test_every_strategy_respects_bounds() {
    let session = synthetic_session(200, 13);
    for optimizer in strategies() {
        let result = session.optimize(optimizer.as_ref()).unwrap();
        assert_eq!(result.optimized_weights.len(), session.weights().len());
        for def in session.weights().definitions() {
            let w = result.optimized_weights.get(&def.factor_name).unwrap();
            assert!(
                def.contains(w),
                "{} = {w} escaped [{}, {}]",
                def.factor_name,
                def.min_weight,
                def.max_weight
            );
        }
    }
}

#[test]
fn test_hill_climb_improves_on_base() {
    let session = synthetic_session(500, 17);
    let result = session.optimize(&HillClimb).unwrap();
    assert!(result.final_mape < result.baseline_mape);
    assert!(result.improvement_pct > 0.0);
    assert!(result.iterations >= 1);
    assert_eq!(result.convergence_history.len(), result.iterations + 1);
    assert!(result.optimized_weights.get("injury_severity").unwrap() > 0.0);
}

#[test]
fn test_keeping_every_factor_is_a_no_op() {
    let session = synthetic_session(100, 2);
    let mut config = OptimizerConfig::default();
    for def in standard_definitions() {
        config = config.keep(def.factor_name);
    }
    for optimizer in strategies() {
        let result = session
            .optimize_with(optimizer.as_ref(), &config, &SearchContext::default())
            .unwrap();
        assert_eq!(result.optimized_weights, session.base_mapping());
        assert_eq!(result.improvement_pct, 0.0);
        assert_eq!(result.termination, Termination::NoOp);
        assert!(result.adjusted_factors.is_empty());
    }
}

#[test]
fn test_empty_claim_set_is_a_no_op() {
    let session =
        CalibrationSession::new(&[], standard_definitions(), EngineConfig::default()).unwrap();
    for optimizer in strategies() {
        let result = session.optimize(optimizer.as_ref()).unwrap();
        assert_eq!(result.optimized_weights, session.base_mapping());
        assert_eq!(result.improvement_pct, 0.0);
        assert_eq!(result.final_mape, 0.0);
    }
}

#[test]
fn test_unknown_constant_factor_rejected_before_search() {
    let session = synthetic_session(50, 1);
    let config = OptimizerConfig::default().keep("weather");
    for optimizer in strategies() {
        let err = session
            .optimize_with(optimizer.as_ref(), &config, &SearchContext::default())
            .unwrap_err();
        assert!(matches!(err, CalibrationError::UnknownFactor(ref f) if f == "weather"));
    }
}

#[test]
fn test_zero_iterations_rejected() {
    let session = synthetic_session(50, 1);
    let config = OptimizerConfig { max_iterations: 0, ..Default::default() };
    let err = session.optimize_with(&HillClimb, &config, &SearchContext::default()).unwrap_err();
    assert!(err.is_configuration());
}

fn single_factor_session(base_weight: f64, claims: Vec<Claim>) -> CalibrationSession {
    let defs = vec![WeightDefinition::new("A", base_weight, 0.0, 1.0)];
    CalibrationSession::new(&claims, defs, EngineConfig::default()).unwrap()
}

#[test]
fn test_grid_two_steps_picks_minimum() {
    // Best fit at A = 0.5: 1000 × (1 + 0.5) = 1500
    let claims = vec![Claim::new("c1", 1500.0, 1000.0, fixed_date()).with_factor("A", "Yes")];
    let session = single_factor_session(0.0, claims);
    let config = OptimizerConfig { grid_steps: 2, ..Default::default() };
    let result = session
        .optimize_with(&GridSearch, &config, &SearchContext::default())
        .unwrap();

    assert_eq!(result.iterations, 3);
    assert_eq!(result.termination, Termination::Exhausted);
    assert_eq!(result.optimized_weights.get("A"), Some(0.5));
    assert_eq!(result.final_mape, 0.0);
}

#[test]
fn test_grid_ties_resolve_toward_base() {
    // No claim carries A, so every grid point scores the same.
    let claims = vec![
        Claim::new("c1", 1200.0, 1000.0, fixed_date()),
        Claim::new("c2", 900.0, 1000.0, fixed_date()),
    ];
    let config = OptimizerConfig { grid_steps: 2, ..Default::default() };

    let at_half = single_factor_session(0.5, claims.clone())
        .optimize_with(&GridSearch, &config, &SearchContext::default())
        .unwrap();
    assert_eq!(at_half.optimized_weights.get("A"), Some(0.5));

    let near_top = single_factor_session(0.9, claims)
        .optimize_with(&GridSearch, &config, &SearchContext::default())
        .unwrap();
    assert_eq!(near_top.optimized_weights.get("A"), Some(1.0));
}

#[test]
fn test_grid_combination_cap_enforced() {
    let session = synthetic_session(20, 4);
    let config = OptimizerConfig {
        grid_steps: 20,
        max_grid_factors: 4,
        max_grid_evaluations: 1000,
        ..Default::default()
    };
    let err = session.optimize_with(&GridSearch, &config, &SearchContext::default()).unwrap_err();
    assert!(matches!(err, CalibrationError::InvalidConfig(_)));
}

#[test]
fn test_grid_factor_cap_keeps_highest_impact() {
    let session = synthetic_session(400, 23);
    let config = OptimizerConfig { grid_steps: 2, max_grid_factors: 2, ..Default::default() };
    let result = session.optimize_with(&GridSearch, &config, &SearchContext::default()).unwrap();
    assert_eq!(result.adjusted_factors.len(), 2);
    assert!(result.adjusted_factors.contains(&"injury_severity".to_string()));
    assert_eq!(result.iterations, 9);
}

#[test]
fn test_smart_search_leaves_other_factors_at_base() {
    let session = synthetic_session(400, 29);
    for mode in [SmartSearchMode::HillClimb, SmartSearchMode::Grid] {
        let config = OptimizerConfig { top_k: 2, smart_search: mode, ..Default::default() };
        let result = session
            .optimize_with(&SmartSearch, &config, &SearchContext::default())
            .unwrap();
        assert_eq!(result.adjusted_factors.len(), 2);
        for def in session.weights().definitions() {
            if !result.adjusted_factors.contains(&def.factor_name) {
                assert_eq!(result.optimized_weights.get(&def.factor_name), Some(def.base_weight));
            }
        }
    }
}

#[test]
fn test_weighted_target_normalised_to_one_at_base() {
    let session = synthetic_session(200, 31);
    let config = OptimizerConfig::default().with_target(TargetMetric::Weighted {
        mape_weight: 0.7,
        rmse_weight: 0.3,
    });
    let result = session.optimize_with(&HillClimb, &config, &SearchContext::default()).unwrap();
    assert!((result.baseline_objective - 1.0).abs() < 1e-9);
    assert!(result.final_objective <= result.baseline_objective);
}

#[test]
fn test_result_serializes_for_callers() {
    let session = synthetic_session(50, 6);
    let optimizer = "gradient".parse::<StrategyKind>().unwrap().build();
    let result = session.optimize(optimizer.as_ref()).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["strategy"], "gradient");
    assert!(json["optimized_weights"].is_object());
    assert!(json["convergence_history"].is_array());
}
