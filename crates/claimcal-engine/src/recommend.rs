//! Advisory weight adjustments derived from an impact report.
//!
//! Variance is actual - predicted, so a positive r means claims with a high
//! factor value are under-predicted: raise the weight. A negative r means
//! over-prediction: lower it. The suggested delta is
//! r × step_factor × (max_weight - min_weight), clamped into bounds.
//! Nothing here mutates weight state.

use claimcal_common::engine_config::RecommendationConfig;
use serde::{Deserialize, Serialize};

use crate::impact::{ImpactRecord, ImpactReport};
use crate::weights::WeightSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub factor: String,
    pub current_weight: f64,
    pub suggested_weight: f64,
    pub delta: f64,
    pub direction: Direction,
    pub correlation: f64,
    pub sample_size: usize,
    pub impact_score: f64,
    pub confidence: Confidence,
    pub rationale: String,
}

pub fn confidence_tier(record: &ImpactRecord, config: &RecommendationConfig) -> Confidence {
    if !record.correlation_defined {
        return Confidence::Low;
    }
    let r = record.correlation.abs();
    let n = record.sample_size;
    if r > config.high_min_abs_correlation && n >= config.high_min_samples {
        Confidence::High
    } else if r > config.medium_min_abs_correlation && n >= config.medium_min_samples {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// One recommendation per factor in the weight set, highest impact first.
pub fn recommend(
    weights: &WeightSet,
    impacts: &ImpactReport,
    config: &RecommendationConfig,
) -> Vec<Recommendation> {
    impacts
        .ranked()
        .into_iter()
        .filter_map(|record| {
            let def = weights.get(&record.factor)?;
            Some(recommend_one(record, def.min_weight, def.max_weight, config))
        })
        .collect()
}

fn recommend_one(
    record: &ImpactRecord,
    min_weight: f64,
    max_weight: f64,
    config: &RecommendationConfig,
) -> Recommendation {
    let current = record.current_weight;
    let r = record.correlation;
    let confidence = confidence_tier(record, config);

    let actionable = record.correlation_defined && r.abs() >= config.min_abs_correlation;
    let suggested = if actionable {
        let raw_delta = r * config.step_factor * (max_weight - min_weight);
        (current + raw_delta).clamp(min_weight, max_weight)
    } else {
        current
    };
    let delta = suggested - current;

    let direction = if delta > f64::EPSILON {
        Direction::Increase
    } else if delta < -f64::EPSILON {
        Direction::Decrease
    } else {
        Direction::Hold
    };

    let rationale = match (direction, record.correlation_defined) {
        (_, false) => format!(
            "{}: correlation undefined over {} claims; holding weight",
            record.factor, record.sample_size
        ),
        (Direction::Hold, true) if !actionable => format!(
            "{}: |r| = {:.3} below {:.3}; holding weight",
            record.factor,
            r.abs(),
            config.min_abs_correlation
        ),
        (Direction::Hold, true) => format!("{}: already at weight bound", record.factor),
        (Direction::Increase, true) => format!(
            "{}: r = {:+.3} over {} claims, higher values are under-predicted",
            record.factor, r, record.sample_size
        ),
        (Direction::Decrease, true) => format!(
            "{}: r = {:+.3} over {} claims, higher values are over-predicted",
            record.factor, r, record.sample_size
        ),
    };

    Recommendation {
        factor: record.factor.clone(),
        current_weight: current,
        suggested_weight: suggested,
        delta,
        direction,
        correlation: r,
        sample_size: record.sample_size,
        impact_score: record.impact_score,
        confidence,
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimcal_common::WeightDefinition;
    use std::collections::BTreeMap;

    fn record(factor: &str, r: f64, n: usize, current: f64) -> ImpactRecord {
        ImpactRecord {
            factor: factor.to_string(),
            current_weight: current,
            correlation: r,
            correlation_defined: true,
            sample_size: n,
            coverage: 1.0,
            impact_score: r.abs(),
            mean_encoded_value: 0.5,
            mean_variance_pct: 0.0,
        }
    }

    fn report(records: Vec<ImpactRecord>) -> ImpactReport {
        ImpactReport {
            evaluated_claims: records.iter().map(|r| r.sample_size).max().unwrap_or(0),
            records: records.into_iter().map(|r| (r.factor.clone(), r)).collect::<BTreeMap<_, _>>(),
        }
    }

    fn weights() -> WeightSet {
        WeightSet::new(vec![
            WeightDefinition::new("injury", 0.0, -0.5, 0.5),
            WeightDefinition::new("venue", 0.0, -0.5, 0.5),
            WeightDefinition::new("attorney", 0.45, -0.5, 0.5),
        ])
        .unwrap()
    }

    #[test]
    fn test_direction_follows_correlation_sign() {
        let recs = recommend(
            &weights(),
            &report(vec![record("injury", 0.4, 50, 0.0), record("venue", -0.2, 50, 0.0)]),
            &RecommendationConfig::default(),
        );
        let injury = recs.iter().find(|r| r.factor == "injury").unwrap();
        let venue = recs.iter().find(|r| r.factor == "venue").unwrap();
        assert_eq!(injury.direction, Direction::Increase);
        assert!((injury.delta - 0.4 * 0.25 * 1.0).abs() < 1e-12);
        assert_eq!(venue.direction, Direction::Decrease);
        assert!((venue.suggested_weight + 0.05).abs() < 1e-12);
        assert_eq!(recs[0].factor, "injury");
    }

    #[test]
    fn test_suggestion_clamped_to_bounds() {
        let recs = recommend(
            &weights(),
            &report(vec![record("attorney", 0.9, 100, 0.45)]),
            &RecommendationConfig::default(),
        );
        assert_eq!(recs[0].suggested_weight, 0.5);
        assert!((recs[0].delta - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_tiers() {
        let config = RecommendationConfig::default();
        assert_eq!(confidence_tier(&record("a", 0.35, 30, 0.0), &config), Confidence::High);
        assert_eq!(confidence_tier(&record("a", 0.35, 29, 0.0), &config), Confidence::Medium);
        assert_eq!(confidence_tier(&record("a", 0.2, 12, 0.0), &config), Confidence::Medium);
        assert_eq!(confidence_tier(&record("a", 0.1, 500, 0.0), &config), Confidence::Low);

        let mut undefined = record("a", 0.0, 1, 0.0);
        undefined.correlation_defined = false;
        assert_eq!(confidence_tier(&undefined, &config), Confidence::Low);
    }

    #[test]
    fn test_weak_correlation_holds() {
        let recs = recommend(
            &weights(),
            &report(vec![record("venue", 0.01, 200, 0.0)]),
            &RecommendationConfig::default(),
        );
        assert_eq!(recs[0].direction, Direction::Hold);
        assert_eq!(recs[0].suggested_weight, 0.0);
    }
}
