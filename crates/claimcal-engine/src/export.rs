//! CSV view of a weight mapping against its definitions.

use claimcal_common::{CalibrationError, Result, WeightMapping};
use serde::Serialize;

use crate::weights::WeightSet;

#[derive(Debug, Serialize)]
struct WeightRow<'a> {
    factor_name: &'a str,
    category: &'a str,
    base_weight: f64,
    current_weight: f64,
    min_weight: f64,
    max_weight: f64,
}

/// One row per defined factor, in factor-name order. Factors missing from
/// `current` contribute nothing when scored and are written as 0.
pub fn export_weights_csv(weights: &WeightSet, current: &WeightMapping) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for def in weights.definitions() {
        writer.serialize(WeightRow {
            factor_name: &def.factor_name,
            category: &def.category,
            base_weight: def.base_weight,
            current_weight: current.get(&def.factor_name).unwrap_or(0.0),
            min_weight: def.min_weight,
            max_weight: def.max_weight,
        })?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| CalibrationError::Io(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| CalibrationError::config(format!("csv output is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimcal_common::WeightDefinition;

    #[test]
    fn test_export_columns_and_rows() {
        let set = WeightSet::new(vec![
            WeightDefinition::new("venue", 0.05, -0.2, 0.4).with_category("location"),
            WeightDefinition::new("attorney", 0.0, -0.3, 0.6).with_category("legal"),
        ])
        .unwrap();
        let csv = export_weights_csv(&set, &WeightMapping::new().with("attorney", 0.25)).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "factor_name,category,base_weight,current_weight,min_weight,max_weight"
        );
        assert_eq!(lines[1], "attorney,legal,0.0,0.25,-0.3,0.6");
        assert_eq!(lines[2], "venue,location,0.05,0.0,-0.2,0.4");
    }
}
