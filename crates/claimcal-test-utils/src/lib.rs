//! claimcal-test-utils: Seeded claim and weight fixtures for tests.
//!
//! Everything here is deterministic for a given seed so integration tests
//! can assert exact values.

use chrono::{Duration, NaiveDate};
use claimcal_common::{Claim, RawValue, WeightDefinition, WeightMapping};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub use pretty_assertions;

pub const SEVERITY: [&str; 4] = ["None", "Mild", "Moderate", "Severe"];
pub const LEVEL: [&str; 3] = ["Low", "Medium", "High"];
pub const BINARY: [&str; 2] = ["No", "Yes"];

pub fn fixed_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Five factors covering every built-in scale plus one numeric factor.
pub fn standard_definitions() -> Vec<WeightDefinition> {
    vec![
        WeightDefinition::new("injury_severity", 0.0, -0.5, 0.8).with_category("medical"),
        WeightDefinition::new("attorney", 0.0, -0.3, 0.6).with_category("legal"),
        WeightDefinition::new("venue_risk", 0.05, -0.4, 0.4).with_category("location"),
        WeightDefinition::new("treatment_delay", 0.0, -0.5, 0.5).with_category("medical"),
        WeightDefinition::new("prior_claims", 0.0, -0.2, 0.3).with_category("history"),
    ]
}

/// Weights the synthetic settlements are generated from.
pub fn true_weights() -> WeightMapping {
    WeightMapping::new()
        .with("injury_severity", 0.4)
        .with("attorney", 0.25)
        .with("venue_risk", -0.1)
        .with("treatment_delay", 0.0)
        .with("prior_claims", 0.1)
}

/// Ordinal position of `label` in `scale`, as the default codec encodes it.
pub fn ordinal(scale: &[&str], label: &str) -> f64 {
    let n = scale.len();
    let i = scale.iter().position(|l| *l == label).unwrap_or(0);
    if n <= 1 {
        1.0
    } else {
        i as f64 / (n - 1) as f64
    }
}

/// `count` claims whose actual settlement is base × (1 + Σ w·x) × noise,
/// with noise uniform in ±`noise` and roughly one factor in ten missing.
pub fn synthetic_claims(
    count: usize,
    seed: u64,
    weights: &WeightMapping,
    noise: f64,
) -> Vec<Claim> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let base = rng.gen_range(5_000.0..50_000.0_f64).round();
            let date = fixed_date() + Duration::days(rng.gen_range(0..365));
            let mut claim = Claim::new(format!("CLM-{i:05}"), 0.0, base, date);
            let mut score = 0.0;

            let mut put =
                |claim: &mut Claim, rng: &mut StdRng, factor: &str, raw: RawValue, encoded: f64| {
                    if rng.gen_bool(0.1) {
                        return;
                    }
                    score += weights.get(factor).unwrap_or(0.0) * encoded;
                    claim.factors.insert(factor.to_string(), raw);
                };

            let severity = SEVERITY[rng.gen_range(0..SEVERITY.len())];
            let encoded = ordinal(&SEVERITY, severity);
            put(&mut claim, &mut rng, "injury_severity", severity.into(), encoded);
            let attorney = BINARY[rng.gen_range(0..BINARY.len())];
            put(&mut claim, &mut rng, "attorney", attorney.into(), ordinal(&BINARY, attorney));
            let venue = LEVEL[rng.gen_range(0..LEVEL.len())];
            put(&mut claim, &mut rng, "venue_risk", venue.into(), ordinal(&LEVEL, venue));
            let delay: f64 = (rng.gen_range(0.0..1.0_f64) * 100.0).round() / 100.0;
            put(&mut claim, &mut rng, "treatment_delay", RawValue::Number(delay), delay);
            let prior = LEVEL[rng.gen_range(0..LEVEL.len())];
            put(&mut claim, &mut rng, "prior_claims", prior.into(), ordinal(&LEVEL, prior));

            let jitter = 1.0 + rng.gen_range(-noise..=noise);
            claim.actual_settlement = (base * (1.0 + score) * jitter).max(0.0).round();
            claim
        })
        .collect()
}

/// Assert two floats agree within `tolerance`.
#[track_caller]
pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_claims_are_reproducible() {
        let a = synthetic_claims(20, 7, &true_weights(), 0.05);
        let b = synthetic_claims(20, 7, &true_weights(), 0.05);
        pretty_assertions::assert_eq!(a, b);
        assert!(a.iter().all(Claim::is_well_formed));
    }

    #[test]
    fn test_ordinal_positions() {
        assert_eq!(ordinal(&SEVERITY, "None"), 0.0);
        assert_eq!(ordinal(&SEVERITY, "Severe"), 1.0);
        assert_eq!(ordinal(&LEVEL, "Medium"), 0.5);
    }
}
