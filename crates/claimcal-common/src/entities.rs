//! Core value types shared by the engine, its tests and the CLI.
//! Claims and weight definitions are read-only once loaded; weight
//! mappings are ephemeral and owned by whoever builds them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CalibrationError, Result};

// ---------------------------------------------------------------------------
// Raw factor values
// ---------------------------------------------------------------------------

/// A claim's raw field value for one factor, as it arrives from the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// `null` or an explicitly unset field.
    Missing,
    Flag(bool),
    Number(f64),
    /// Categorical or ordinal label, e.g. "Moderate".
    Label(String),
}

impl RawValue {
    pub fn label(value: impl Into<String>) -> Self {
        Self::Label(value.into())
    }

    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Label(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Label(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    /// Actual settlement amount (currency, >= 0).
    pub actual_settlement: f64,
    /// Unadjusted model prediction used as the multiplicative anchor.
    pub base_prediction: f64,
    pub claim_date: NaiveDate,
    #[serde(default)]
    pub factors: BTreeMap<String, RawValue>,
}

impl Claim {
    pub fn new(
        id: impl Into<String>,
        actual_settlement: f64,
        base_prediction: f64,
        claim_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            actual_settlement,
            base_prediction,
            claim_date,
            factors: BTreeMap::new(),
        }
    }

    pub fn with_factor(mut self, factor: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.factors.insert(factor.into(), value.into());
        self
    }

    pub fn factor(&self, name: &str) -> Option<&RawValue> {
        self.factors.get(name)
    }

    /// A claim can be evaluated only when both currency amounts are finite and non-negative.
    pub fn is_well_formed(&self) -> bool {
        self.actual_settlement.is_finite()
            && self.actual_settlement >= 0.0
            && self.base_prediction.is_finite()
            && self.base_prediction >= 0.0
    }
}

// ---------------------------------------------------------------------------
// Weight definition
// ---------------------------------------------------------------------------

/// Authoritative bounds and defaults for one adjustable factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightDefinition {
    pub factor_name: String,
    pub base_weight: f64,
    pub min_weight: f64,
    pub max_weight: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Display-only annotation; never read by the engine.
    #[serde(default)]
    pub recommended_weight: Option<f64>,
}

impl WeightDefinition {
    pub fn new(
        factor_name: impl Into<String>,
        base_weight: f64,
        min_weight: f64,
        max_weight: f64,
    ) -> Self {
        Self {
            factor_name: factor_name.into(),
            base_weight,
            min_weight,
            max_weight,
            category: String::new(),
            description: String::new(),
            recommended_weight: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn span(&self) -> f64 {
        self.max_weight - self.min_weight
    }

    pub fn contains(&self, weight: f64) -> bool {
        weight.is_finite() && weight >= self.min_weight && weight <= self.max_weight
    }

    pub fn clamp(&self, weight: f64) -> f64 {
        weight.clamp(self.min_weight, self.max_weight)
    }

    /// Check `min <= base <= max` with all bounds finite.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| CalibrationError::InvalidWeightDefinition {
            factor: self.factor_name.clone(),
            reason: reason.to_string(),
        };

        if self.factor_name.trim().is_empty() {
            return Err(invalid("factor name is empty"));
        }
        let finite = self.base_weight.is_finite()
            && self.min_weight.is_finite()
            && self.max_weight.is_finite();
        if !finite {
            return Err(invalid("weights must be finite"));
        }
        if self.min_weight > self.max_weight {
            return Err(invalid("min_weight exceeds max_weight"));
        }
        if !self.contains(self.base_weight) {
            return Err(invalid("base_weight lies outside [min_weight, max_weight]"));
        }
        Ok(())
    }

    /// Bounds-check a candidate weight for this factor.
    pub fn check(&self, weight: f64) -> Result<()> {
        if self.contains(weight) {
            Ok(())
        } else {
            Err(CalibrationError::WeightOutOfBounds {
                factor: self.factor_name.clone(),
                weight,
                min: self.min_weight,
                max: self.max_weight,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Weight mapping
// ---------------------------------------------------------------------------

/// factor_name -> weight. Ordered so iteration (and serialized output) is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightMapping(BTreeMap<String, f64>);

impl WeightMapping {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, factor: &str) -> Option<f64> {
        self.0.get(factor).copied()
    }

    pub fn set(&mut self, factor: impl Into<String>, weight: f64) {
        self.0.insert(factor.into(), weight);
    }

    pub fn with(mut self, factor: impl Into<String>, weight: f64) -> Self {
        self.set(factor, weight);
        self
    }

    pub fn contains(&self, factor: &str) -> bool {
        self.0.contains_key(factor)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn factors(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<BTreeMap<String, f64>> for WeightMapping {
    fn from(value: BTreeMap<String, f64>) -> Self {
        Self(value)
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for WeightMapping {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_raw_value_deserializes_untagged() {
        let values: Vec<RawValue> = serde_json::from_str(r#"[null, true, 0.4, "Severe"]"#).unwrap();
        assert_eq!(values[0], RawValue::Missing);
        assert_eq!(values[1], RawValue::Flag(true));
        assert_eq!(values[2], RawValue::Number(0.4));
        assert_eq!(values[3], RawValue::label("Severe"));
    }

    #[test]
    fn test_blank_label_counts_as_missing() {
        assert!(RawValue::label("  ").is_missing());
        assert!(!RawValue::label("Mild").is_missing());
    }

    #[test]
    fn test_claim_well_formed() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(Claim::new("c1", 1000.0, 900.0, date).is_well_formed());
        assert!(Claim::new("c2", 0.0, 0.0, date).is_well_formed());
        assert!(!Claim::new("c3", -1.0, 900.0, date).is_well_formed());
        assert!(!Claim::new("c4", 1000.0, f64::NAN, date).is_well_formed());
    }

    #[test]
    fn test_weight_definition_validation() {
        assert!(WeightDefinition::new("injury", 0.1, -0.5, 0.5).validate().is_ok());
        assert!(WeightDefinition::new("injury", 0.9, -0.5, 0.5).validate().is_err());
        assert!(WeightDefinition::new("injury", 0.0, 0.5, -0.5).validate().is_err());
        assert!(WeightDefinition::new("", 0.0, -0.5, 0.5).validate().is_err());
    }

    #[test]
    fn test_check_reports_bounds() {
        let def = WeightDefinition::new("venue", 0.0, -0.2, 0.2);
        match def.check(0.3) {
            Err(CalibrationError::WeightOutOfBounds { factor, min, max, .. }) => {
                assert_eq!(factor, "venue");
                assert_eq!(min, -0.2);
                assert_eq!(max, 0.2);
            }
            other => panic!("expected out-of-bounds error, got {other:?}"),
        }
    }

    #[test]
    fn test_mapping_key_order_is_irrelevant() {
        let a: WeightMapping = vec![("a", 0.1), ("b", 0.2)].into_iter().collect();
        let b: WeightMapping = vec![("b", 0.2), ("a", 0.1)].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_claim_json_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let claim = Claim::new("c1", 1000.0, 900.0, date)
            .with_factor("injury", "Severe")
            .with_factor("delay", RawValue::Number(0.25));
        let json = serde_json::to_string(&claim).unwrap();
        let parsed: Claim = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, claim);
    }
}
