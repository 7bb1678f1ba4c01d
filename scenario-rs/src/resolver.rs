use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ScenarioError};
use crate::population::{PopulationConfig, PopulationInput};
use crate::severity::{EpidemiologicalProfile, SeverityMode};

/// Epidemiological section of a scenario request.
///
/// With `isUseful` set, the five explicit values are used as given.
/// Otherwise `severity_mode` picks a preset from the severity table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpiInput {
    #[serde(default, rename = "isUseful", alias = "is_useful")]
    pub is_useful: bool,
    #[serde(default)]
    pub severity_mode: Option<String>,
    #[serde(default, alias = "beta")]
    pub transmission_rate: Option<f64>,
    #[serde(default, alias = "rel_symp_prob")]
    pub relative_symptomatic_probability: Option<f64>,
    #[serde(default, alias = "rel_severe_prob")]
    pub relative_severe_probability: Option<f64>,
    #[serde(default, alias = "rel_crit_prob")]
    pub relative_critical_probability: Option<f64>,
    #[serde(default, alias = "rel_death_prob")]
    pub relative_death_probability: Option<f64>,
    /// Relative transmissibility of an imported variant.
    #[serde(default, alias = "rel_beta")]
    pub variant_rel_beta: Option<f64>,
}

/// How the epidemiological profile is produced. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpiStrategy {
    Override(EpidemiologicalProfile),
    Severity(SeverityMode),
}

fn required(field: &str, value: Option<f64>) -> Result<f64> {
    value.ok_or_else(|| ScenarioError::missing(field))
}

impl EpiStrategy {
    pub fn from_input(input: &EpiInput) -> Result<Self> {
        if input.is_useful {
            let profile = EpidemiologicalProfile {
                transmission_rate: required("transmission_rate", input.transmission_rate)?,
                relative_symptomatic_probability: required(
                    "relative_symptomatic_probability",
                    input.relative_symptomatic_probability,
                )?,
                relative_severe_probability: required(
                    "relative_severe_probability",
                    input.relative_severe_probability,
                )?,
                relative_critical_probability: required(
                    "relative_critical_probability",
                    input.relative_critical_probability,
                )?,
                relative_death_probability: required(
                    "relative_death_probability",
                    input.relative_death_probability,
                )?,
            };
            profile.validate()?;
            return Ok(EpiStrategy::Override(profile));
        }

        match input.severity_mode.as_deref().map(str::trim) {
            Some(mode) if !mode.is_empty() => Ok(EpiStrategy::Severity(mode.parse()?)),
            _ => Err(ScenarioError::invalid(
                "severity_mode",
                "no explicit override (isUseful) and no severity mode given",
            )),
        }
    }

    pub fn profile(&self, defaults: &EpidemiologicalProfile) -> EpidemiologicalProfile {
        match self {
            EpiStrategy::Override(profile) => *profile,
            EpiStrategy::Severity(mode) => mode.apply(defaults),
        }
    }
}

/// Merges population and epidemiological input into the values a run is
/// configured with.
#[derive(Debug, Clone)]
pub struct Resolver {
    defaults: EpidemiologicalProfile,
}

impl Resolver {
    /// `defaults` are the engine's own built-in values, read before any
    /// override is applied.
    pub fn new(defaults: EpidemiologicalProfile) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &EpidemiologicalProfile {
        &self.defaults
    }

    pub fn resolve(
        &self,
        population: &PopulationInput,
        epi: &EpiInput,
    ) -> Result<(PopulationConfig, EpidemiologicalProfile)> {
        let config = PopulationConfig::from_input(population)?;
        let strategy = EpiStrategy::from_input(epi)?;
        debug!(?strategy, "resolved epidemiological strategy");
        Ok((config, strategy.profile(&self.defaults)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::{OPTIMISTIC, PESSIMISTIC};
    use serde_json::json;

    fn population() -> PopulationInput {
        serde_json::from_value(json!({
            "pop_size": 5000,
            "pop_infected": 10,
            "pop_type": "hybrid",
            "contacts": {"h": 3.0, "c": 36.0, "s": 50.0, "w": 20.0},
            "start_day": "2022-01-01",
            "end_day": "2022-01-31"
        }))
        .unwrap()
    }

    fn resolver() -> Resolver {
        Resolver::new(EpidemiologicalProfile::ENGINE_DEFAULTS)
    }

    #[test]
    fn test_override_is_verbatim() {
        let epi: EpiInput = serde_json::from_value(json!({
            "isUseful": true,
            "severity_mode": "pessimistic",
            "beta": 0.03,
            "rel_symp_prob": 0.9,
            "rel_severe_prob": 1.1,
            "rel_crit_prob": 1.7,
            "rel_death_prob": 2.5
        }))
        .unwrap();
        let (_, profile) = resolver().resolve(&population(), &epi).unwrap();
        assert_eq!(
            profile,
            EpidemiologicalProfile {
                transmission_rate: 0.03,
                relative_symptomatic_probability: 0.9,
                relative_severe_probability: 1.1,
                relative_critical_probability: 1.7,
                relative_death_probability: 2.5,
            }
        );
    }

    #[test]
    fn test_override_requires_every_field() {
        let epi: EpiInput = serde_json::from_value(json!({
            "isUseful": true,
            "transmission_rate": 0.03,
            "relative_symptomatic_probability": 0.9,
            "relative_severe_probability": 1.1,
            "relative_critical_probability": 1.7
        }))
        .unwrap();
        let err = resolver().resolve(&population(), &epi).unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidInput { ref field, .. } if field == "relative_death_probability"));
    }

    #[test]
    fn test_scaled_modes() {
        let defaults = EpidemiologicalProfile::ENGINE_DEFAULTS;
        for (mode, preset) in [("optimistic", OPTIMISTIC), ("pessimistic", PESSIMISTIC)] {
            let epi: EpiInput =
                serde_json::from_value(json!({"isUseful": false, "severity_mode": mode})).unwrap();
            let (_, profile) = resolver().resolve(&population(), &epi).unwrap();
            assert_eq!(profile.transmission_rate, preset.transmission_rate);
            assert_eq!(
                profile.relative_symptomatic_probability,
                defaults.relative_symptomatic_probability * preset.symptomatic_multiplier
            );
            assert_eq!(
                profile.relative_severe_probability,
                defaults.relative_severe_probability * preset.severe_multiplier
            );
            assert_eq!(
                profile.relative_critical_probability,
                defaults.relative_critical_probability * preset.critical_multiplier
            );
            assert_eq!(
                profile.relative_death_probability,
                defaults.relative_death_probability * preset.death_multiplier
            );
        }
    }

    #[test]
    fn test_default_mode_keeps_engine_defaults() {
        let epi: EpiInput = serde_json::from_value(json!({"severity_mode": "default"})).unwrap();
        let (config, profile) = resolver().resolve(&population(), &epi).unwrap();
        assert_eq!(config.population_size(), 5000);
        assert_eq!(profile.transmission_rate, 0.016);
        let defaults = EpidemiologicalProfile::ENGINE_DEFAULTS;
        assert_eq!(profile.fields()[1..], defaults.fields()[1..]);
    }

    #[test]
    fn test_no_strategy_is_an_error() {
        for epi in [json!({}), json!({"isUseful": false, "severity_mode": ""}), json!({"severity_mode": "grim"})] {
            let epi: EpiInput = serde_json::from_value(epi).unwrap();
            let err = resolver().resolve(&population(), &epi).unwrap_err();
            assert!(matches!(err, ScenarioError::InvalidInput { ref field, .. } if field == "severity_mode"));
        }
    }
}
