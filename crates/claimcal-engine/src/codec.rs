//! Factor codec: raw claim field values -> bounded numeric contributions.
//!
//! Ordinal labels are looked up in the scales supplied by `CodecConfig`;
//! a label at position `i` of an `n`-label scale encodes to `i / (n - 1)`.
//! Numbers and numeric strings pass through after clamping to [0, 1].
//! Anything else (null, blank, unknown label, NaN) degrades to
//! [`NEUTRAL_VALUE`]; the codec never fails.

use std::collections::HashMap;

use claimcal_common::engine_config::CodecConfig;
use claimcal_common::{CalibrationError, RawValue, Result};

/// Encoding for unset, unknown or unparseable values.
/// Zero means "no adjustment" under the multiplicative scoring model.
pub const NEUTRAL_VALUE: f64 = 0.0;

/// Values closer than this to [`NEUTRAL_VALUE`] count as neutral for coverage.
pub const NEUTRAL_TOLERANCE: f64 = 1e-12;

/// Outcome of encoding one raw value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoding {
    Known(f64),
    /// Field absent, null or blank
    Missing,
    /// Present but matched no scale and is not numeric
    Unrecognised,
}

impl Encoding {
    pub fn value(self) -> f64 {
        match self {
            Encoding::Known(v) => v,
            Encoding::Missing | Encoding::Unrecognised => NEUTRAL_VALUE,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Encoding::Known(_))
    }
}

/// Clamp into the codec's [0, 1] range.
pub fn bound(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
struct OrdinalScale {
    name: String,
    positions: HashMap<String, f64>,
}

impl OrdinalScale {
    fn new(name: &str, labels: &[String]) -> Self {
        let n = labels.len();
        let positions = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let position = if n > 1 { i as f64 / (n - 1) as f64 } else { 1.0 };
                (normalise_label(label), position)
            })
            .collect();
        Self { name: name.to_string(), positions }
    }

    fn lookup(&self, label: &str) -> Option<f64> {
        self.positions.get(label).copied()
    }
}

fn normalise_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Table-driven codec built from configuration.
#[derive(Debug, Clone)]
pub struct FactorCodec {
    scales: Vec<OrdinalScale>,
    factor_scales: HashMap<String, usize>,
}

impl FactorCodec {
    pub fn from_config(config: &CodecConfig) -> Result<Self> {
        let scales: Vec<OrdinalScale> = config
            .scales
            .iter()
            .map(|(name, labels)| OrdinalScale::new(name, labels))
            .collect();

        let mut factor_scales = HashMap::new();
        for (factor, scale_name) in &config.factor_scales {
            let idx = scales
                .iter()
                .position(|s| &s.name == scale_name)
                .ok_or_else(|| {
                    CalibrationError::config(format!(
                        "factor '{factor}' references unknown codec scale '{scale_name}'"
                    ))
                })?;
            factor_scales.insert(factor.clone(), idx);
        }

        Ok(Self { scales, factor_scales })
    }

    /// Encode with the neutral fallback. Total: never fails.
    pub fn encode(&self, factor: &str, raw: Option<&RawValue>) -> f64 {
        self.classify(factor, raw).value()
    }

    pub fn classify(&self, factor: &str, raw: Option<&RawValue>) -> Encoding {
        let raw = match raw {
            Some(raw) if !raw.is_missing() => raw,
            _ => return Encoding::Missing,
        };

        match raw {
            RawValue::Missing => Encoding::Missing,
            RawValue::Flag(flag) => Encoding::Known(if *flag { 1.0 } else { 0.0 }),
            RawValue::Number(n) if n.is_finite() => Encoding::Known(bound(*n)),
            RawValue::Number(_) => Encoding::Unrecognised,
            RawValue::Label(label) => self.classify_label(factor, label),
        }
    }

    fn classify_label(&self, factor: &str, label: &str) -> Encoding {
        let key = normalise_label(label);

        let found = match self.factor_scales.get(factor) {
            Some(&idx) => self.scales[idx].lookup(&key),
            None => self.scales.iter().find_map(|s| s.lookup(&key)),
        };
        if let Some(position) = found {
            return Encoding::Known(position);
        }

        match key.parse::<f64>() {
            Ok(n) if n.is_finite() => Encoding::Known(bound(n)),
            _ => Encoding::Unrecognised,
        }
    }
}

impl Default for FactorCodec {
    fn default() -> Self {
        let config = CodecConfig::default();
        Self {
            scales: config
                .scales
                .iter()
                .map(|(name, labels)| OrdinalScale::new(name, labels))
                .collect(),
            factor_scales: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(s: &str) -> RawValue {
        RawValue::label(s)
    }

    #[test]
    fn test_severity_scale_positions() {
        let codec = FactorCodec::default();
        assert_eq!(codec.encode("injury", Some(&label("None"))), 0.0);
        assert!((codec.encode("injury", Some(&label("Mild"))) - 1.0 / 3.0).abs() < 1e-9);
        assert!((codec.encode("injury", Some(&label("Moderate"))) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(codec.encode("injury", Some(&label("Severe"))), 1.0);
    }

    #[test]
    fn test_labels_are_case_and_whitespace_insensitive() {
        let codec = FactorCodec::default();
        assert_eq!(codec.encode("venue", Some(&label("  high "))), 1.0);
        assert_eq!(codec.encode("venue", Some(&label("MEDIUM"))), 0.5);
    }

    #[test]
    fn test_unknown_and_missing_degrade_to_neutral() {
        let codec = FactorCodec::default();
        assert_eq!(codec.classify("x", None), Encoding::Missing);
        assert_eq!(codec.classify("x", Some(&RawValue::Missing)), Encoding::Missing);
        assert_eq!(codec.classify("x", Some(&label(""))), Encoding::Missing);
        assert_eq!(codec.classify("x", Some(&label("Catastrophic"))), Encoding::Unrecognised);
        assert_eq!(codec.encode("x", Some(&label("Catastrophic"))), NEUTRAL_VALUE);
        assert_eq!(codec.classify("x", Some(&RawValue::Number(f64::NAN))), Encoding::Unrecognised);
    }

    #[test]
    fn test_numbers_are_bounded() {
        let codec = FactorCodec::default();
        assert_eq!(codec.encode("x", Some(&RawValue::Number(0.4))), 0.4);
        assert_eq!(codec.encode("x", Some(&RawValue::Number(7.0))), 1.0);
        assert_eq!(codec.encode("x", Some(&RawValue::Number(-2.0))), 0.0);
        assert_eq!(codec.encode("x", Some(&label("0.25"))), 0.25);
        assert_eq!(codec.encode("x", Some(&RawValue::Flag(true))), 1.0);
    }

    #[test]
    fn test_factor_scale_assignment_restricts_lookup() {
        let mut config = CodecConfig::default();
        config.factor_scales.insert("attorney".into(), "binary".into());
        let codec = FactorCodec::from_config(&config).unwrap();
        assert_eq!(codec.encode("attorney", Some(&label("Yes"))), 1.0);
        // "High" lives on another scale, so it is unrecognised for this factor
        assert_eq!(codec.classify("attorney", Some(&label("High"))), Encoding::Unrecognised);
        assert_eq!(codec.encode("venue", Some(&label("High"))), 1.0);
    }

    #[test]
    fn test_custom_scale_is_injectable() {
        let mut config = CodecConfig::default();
        config.scales.insert(
            "treatment".into(),
            vec!["Outpatient".into(), "Surgery".into(), "Hospitalised".into()],
        );
        let codec = FactorCodec::from_config(&config).unwrap();
        assert_eq!(codec.encode("treatment", Some(&label("Surgery"))), 0.5);
    }

    #[test]
    fn test_unknown_scale_reference_rejected() {
        let mut config = CodecConfig::default();
        config.factor_scales.insert("attorney".into(), "nope".into());
        assert!(FactorCodec::from_config(&config).is_err());
    }
}
