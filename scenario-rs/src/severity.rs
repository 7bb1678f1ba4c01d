use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScenarioError};

/// Transmission rate and relative disease-progression probabilities handed
/// to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpidemiologicalProfile {
    pub transmission_rate: f64,
    pub relative_symptomatic_probability: f64,
    pub relative_severe_probability: f64,
    pub relative_critical_probability: f64,
    pub relative_death_probability: f64,
}

impl EpidemiologicalProfile {
    /// Built-in values of the reference engine before any override.
    pub const ENGINE_DEFAULTS: EpidemiologicalProfile = EpidemiologicalProfile {
        transmission_rate: 0.016,
        relative_symptomatic_probability: 1.0,
        relative_severe_probability: 1.0,
        relative_critical_probability: 1.0,
        relative_death_probability: 1.0,
    };

    pub(crate) fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("transmission_rate", self.transmission_rate),
            ("relative_symptomatic_probability", self.relative_symptomatic_probability),
            ("relative_severe_probability", self.relative_severe_probability),
            ("relative_critical_probability", self.relative_critical_probability),
            ("relative_death_probability", self.relative_death_probability),
        ]
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in self.fields() {
            if !value.is_finite() || value <= 0.0 {
                return Err(ScenarioError::invalid(field, format!("{value} must be positive")));
            }
        }
        Ok(())
    }
}

impl Default for EpidemiologicalProfile {
    fn default() -> Self {
        Self::ENGINE_DEFAULTS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityMode {
    Optimistic,
    Default,
    Pessimistic,
}

impl FromStr for SeverityMode {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(SeverityMode::Optimistic),
            "default" => Ok(SeverityMode::Default),
            "pessimistic" => Ok(SeverityMode::Pessimistic),
            other => Err(ScenarioError::invalid(
                "severity_mode",
                format!("unknown severity mode `{other}`"),
            )),
        }
    }
}

impl fmt::Display for SeverityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeverityMode::Optimistic => "optimistic",
            SeverityMode::Default => "default",
            SeverityMode::Pessimistic => "pessimistic",
        };
        f.write_str(name)
    }
}

/// One row of the severity table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityPreset {
    /// Replaces the engine's transmission rate outright.
    pub transmission_rate: f64,
    pub symptomatic_multiplier: f64,
    pub severe_multiplier: f64,
    pub critical_multiplier: f64,
    pub death_multiplier: f64,
}

pub const OPTIMISTIC: SeverityPreset = SeverityPreset {
    transmission_rate: 0.012,
    symptomatic_multiplier: 0.8,
    severe_multiplier: 0.7,
    critical_multiplier: 0.7,
    death_multiplier: 0.6,
};

pub const DEFAULT: SeverityPreset = SeverityPreset {
    transmission_rate: 0.016,
    symptomatic_multiplier: 1.0,
    severe_multiplier: 1.0,
    critical_multiplier: 1.0,
    death_multiplier: 1.0,
};

pub const PESSIMISTIC: SeverityPreset = SeverityPreset {
    transmission_rate: 0.0208178,
    symptomatic_multiplier: 1.2,
    severe_multiplier: 1.3,
    critical_multiplier: 1.4,
    death_multiplier: 1.5,
};

impl SeverityMode {
    pub const fn preset(self) -> &'static SeverityPreset {
        match self {
            SeverityMode::Optimistic => &OPTIMISTIC,
            SeverityMode::Default => &DEFAULT,
            SeverityMode::Pessimistic => &PESSIMISTIC,
        }
    }

    /// Apply this mode on top of the engine defaults.
    ///
    /// The default mode only replaces the transmission rate. The other two
    /// modes replace the transmission rate and scale the four relative
    /// probabilities.
    pub fn apply(self, defaults: &EpidemiologicalProfile) -> EpidemiologicalProfile {
        let preset = self.preset();
        match self {
            SeverityMode::Default => EpidemiologicalProfile {
                transmission_rate: preset.transmission_rate,
                ..*defaults
            },
            SeverityMode::Optimistic | SeverityMode::Pessimistic => EpidemiologicalProfile {
                transmission_rate: preset.transmission_rate,
                relative_symptomatic_probability: defaults.relative_symptomatic_probability
                    * preset.symptomatic_multiplier,
                relative_severe_probability: defaults.relative_severe_probability
                    * preset.severe_multiplier,
                relative_critical_probability: defaults.relative_critical_probability
                    * preset.critical_multiplier,
                relative_death_probability: defaults.relative_death_probability
                    * preset.death_multiplier,
            },
        }
    }
}
