use chrono::NaiveDate;
use derive_builder::Builder;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Result, ScenarioError};
use crate::interventions::InterventionDirective;
use crate::population::{PopulationConfig, PopulationInput, parse_date};
use crate::resolver::EpiInput;
use crate::severity::EpidemiologicalProfile;

pub const VARIANT_LABEL: &str = "p1";

/// Relative transmissibility used for an imported variant when the request
/// gives none.
pub const DEFAULT_VARIANT_REL_BETA: f64 = 0.0208178 / 0.016;

/// Imported cases of a new variant seeded on a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantImport {
    pub label: String,
    pub start_date: NaiveDate,
    pub n_imports: u32,
    pub relative_transmission: f64,
}

impl VariantImport {
    /// `None` unless the request asks for at least one imported case.
    pub fn from_input(population: &PopulationInput, epi: &EpiInput) -> Result<Option<Self>> {
        let n_imports = match population.variant_imports {
            Some(n) if n > 0 => n,
            _ => return Ok(None),
        };
        let start_date = population
            .variant_start_date
            .as_deref()
            .ok_or_else(|| ScenarioError::missing("variant_start_date"))
            .and_then(|raw| parse_date("variant_start_date", raw))?;
        let relative_transmission = epi.variant_rel_beta.unwrap_or(DEFAULT_VARIANT_REL_BETA);
        if !relative_transmission.is_finite() || relative_transmission <= 0.0 {
            return Err(ScenarioError::invalid(
                "variant_rel_beta",
                format!("{relative_transmission} must be positive"),
            ));
        }
        Ok(Some(Self {
            label: VARIANT_LABEL.to_string(),
            start_date,
            n_imports,
            relative_transmission,
        }))
    }
}

/// Everything the engine needs for one run. Built once, never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
#[builder(build_fn(validate = "Self::validate", error = "ScenarioError"))]
pub struct SimulationConfig {
    population: PopulationConfig,
    epidemiology: EpidemiologicalProfile,
    #[builder(default)]
    interventions: Vec<InterventionDirective>,
    #[builder(default, setter(strip_option))]
    variant: Option<VariantImport>,
    #[builder(default)]
    seed: u64,
}

impl SimulationConfigBuilder {
    fn validate(&self) -> Result<()> {
        if let (Some(population), Some(Some(variant))) = (&self.population, &self.variant) {
            if !population.contains(variant.start_date) {
                return Err(ScenarioError::invalid(
                    "variant_start_date",
                    format!(
                        "{} is outside the simulated window {} to {}",
                        variant.start_date,
                        population.start_date(),
                        population.end_date()
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl SimulationConfig {
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::default()
    }

    pub fn population(&self) -> &PopulationConfig {
        &self.population
    }

    pub fn epidemiology(&self) -> &EpidemiologicalProfile {
        &self.epidemiology
    }

    pub fn interventions(&self) -> &[InterventionDirective] {
        &self.interventions
    }

    pub fn variant(&self) -> Option<&VariantImport> {
        self.variant.as_ref()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Hex SHA-256 of the serialized configuration. Identical requests give
    /// identical fingerprints.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn population_input() -> PopulationInput {
        serde_json::from_value(json!({
            "pop_size": 5000,
            "pop_infected": 10,
            "pop_type": "hybrid",
            "contacts": {"h": 3.0, "c": 36.0, "s": 50.0, "w": 20.0},
            "start_day": "2022-01-01",
            "end_day": "2022-01-31",
            "variant_start_day": "2022-01-04",
            "n_import": 3
        }))
        .unwrap()
    }

    #[test]
    fn test_variant_defaults() {
        let variant = VariantImport::from_input(&population_input(), &EpiInput::default())
            .unwrap()
            .unwrap();
        assert_eq!(variant.label, "p1");
        assert_eq!(variant.n_imports, 3);
        assert_eq!(variant.relative_transmission, DEFAULT_VARIANT_REL_BETA);
    }

    #[test]
    fn test_no_variant_without_imports() {
        let mut input = population_input();
        input.variant_imports = Some(0);
        assert_eq!(VariantImport::from_input(&input, &EpiInput::default()).unwrap(), None);
    }

    #[test]
    fn test_variant_outside_window() {
        let mut input = population_input();
        input.variant_start_date = Some("2022-03-01".to_string());
        let variant = VariantImport::from_input(&input, &EpiInput::default()).unwrap().unwrap();
        let err = SimulationConfig::builder()
            .population(PopulationConfig::from_input(&input).unwrap())
            .epidemiology(EpidemiologicalProfile::ENGINE_DEFAULTS)
            .variant(variant)
            .build()
            .unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidInput { ref field, .. } if field == "variant_start_date"));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let build = |seed| {
            SimulationConfig::builder()
                .population(PopulationConfig::from_input(&population_input()).unwrap())
                .epidemiology(EpidemiologicalProfile::ENGINE_DEFAULTS)
                .seed(seed)
                .build()
                .unwrap()
        };
        let a = build(1).fingerprint().unwrap();
        assert_eq!(a, build(1).fingerprint().unwrap());
        assert_ne!(a, build(2).fingerprint().unwrap());
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_missing_epidemiology() {
        let err = SimulationConfig::builder()
            .population(PopulationConfig::from_input(&population_input()).unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidInput { ref field, .. } if field == "epidemiology"));
    }
}
