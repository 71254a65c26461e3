//! Weight set: the authoritative list of adjustable factors and their bounds.
//!
//! Factors are held in name order. Dense weight vectors used by the hot
//! evaluation path follow the same order, so `dense()` / `to_mapping()` are
//! the only places names and positions meet.

use std::collections::HashMap;

use claimcal_common::{CalibrationError, Result, WeightDefinition, WeightMapping};

#[derive(Debug, Clone, Default)]
pub struct WeightSet {
    definitions: Vec<WeightDefinition>,
    index: HashMap<String, usize>,
}

impl WeightSet {
    /// Validate every definition and reject duplicate factor names.
    pub fn new(mut definitions: Vec<WeightDefinition>) -> Result<Self> {
        for def in &definitions {
            def.validate()?;
        }
        definitions.sort_by(|a, b| a.factor_name.cmp(&b.factor_name));

        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if index.insert(def.factor_name.clone(), i).is_some() {
                return Err(CalibrationError::DuplicateFactor(def.factor_name.clone()));
            }
        }

        Ok(Self { definitions, index })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> &[WeightDefinition] {
        &self.definitions
    }

    pub fn definition_at(&self, idx: usize) -> &WeightDefinition {
        &self.definitions[idx]
    }

    pub fn get(&self, factor: &str) -> Option<&WeightDefinition> {
        self.index_of(factor).map(|i| &self.definitions[i])
    }

    pub fn index_of(&self, factor: &str) -> Option<usize> {
        self.index.get(factor).copied()
    }

    /// Index lookup that turns an unknown name into a configuration error.
    pub fn require(&self, factor: &str) -> Result<usize> {
        self.index_of(factor)
            .ok_or_else(|| CalibrationError::UnknownFactor(factor.to_string()))
    }

    pub fn factor_names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.factor_name.as_str())
    }

    /// Every factor at base_weight.
    pub fn base_mapping(&self) -> WeightMapping {
        self.definitions
            .iter()
            .map(|d| (d.factor_name.clone(), d.base_weight))
            .collect()
    }

    pub fn base_dense(&self) -> Vec<f64> {
        self.definitions.iter().map(|d| d.base_weight).collect()
    }

    /// Reject unknown factors and out-of-bounds weights.
    pub fn validate_mapping(&self, mapping: &WeightMapping) -> Result<()> {
        for (factor, weight) in mapping.iter() {
            let def = self
                .get(factor)
                .ok_or_else(|| CalibrationError::UnknownFactor(factor.to_string()))?;
            def.check(weight)?;
        }
        Ok(())
    }

    /// Base mapping with `overrides` applied on top, after validating them.
    pub fn complete(&self, overrides: &WeightMapping) -> Result<WeightMapping> {
        self.validate_mapping(overrides)?;
        let mut mapping = self.base_mapping();
        for (factor, weight) in overrides.iter() {
            mapping.set(factor, weight);
        }
        Ok(mapping)
    }

    /// Positional weights. Factors absent from `mapping` get 0 and contribute
    /// nothing; mapping keys outside the set are ignored.
    pub fn dense(&self, mapping: &WeightMapping) -> Vec<f64> {
        self.definitions
            .iter()
            .map(|d| mapping.get(&d.factor_name).unwrap_or(0.0))
            .collect()
    }

    pub fn to_mapping(&self, dense: &[f64]) -> WeightMapping {
        self.definitions
            .iter()
            .zip(dense)
            .map(|(d, w)| (d.factor_name.clone(), *w))
            .collect()
    }

    /// Bounds-check a dense vector produced by a search.
    pub fn check_dense(&self, dense: &[f64]) -> Result<()> {
        for (def, w) in self.definitions.iter().zip(dense) {
            def.check(*w)?;
        }
        Ok(())
    }
}
