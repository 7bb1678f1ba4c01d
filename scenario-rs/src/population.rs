use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use derive_builder::{Builder, UninitializedFieldError};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScenarioError};

/// Contact layer keys understood by the engine.
pub mod layer {
    pub const HOUSEHOLD: &str = "h";
    pub const COMMUNITY: &str = "c";
    pub const SCHOOL: &str = "s";
    pub const WORKPLACE: &str = "w";
    /// Reserved selector meaning every layer at once.
    pub const ALL: &str = "all";
}

const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| ScenarioError::invalid(field, format!("`{raw}` is not a YYYY-MM-DD date: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopulationTopology {
    Hybrid,
    Random,
    Clustered,
    Synthpops,
}

impl FromStr for PopulationTopology {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(PopulationTopology::Hybrid),
            "random" => Ok(PopulationTopology::Random),
            "clustered" => Ok(PopulationTopology::Clustered),
            "synthpops" => Ok(PopulationTopology::Synthpops),
            other => Err(ScenarioError::invalid(
                "population_topology",
                format!("unknown topology `{other}`"),
            )),
        }
    }
}

impl fmt::Display for PopulationTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PopulationTopology::Hybrid => "hybrid",
            PopulationTopology::Random => "random",
            PopulationTopology::Clustered => "clustered",
            PopulationTopology::Synthpops => "synthpops",
        };
        f.write_str(name)
    }
}

/// Population section of a scenario request, as sent by the dashboard.
///
/// Every field is optional here so that a missing value is reported as an
/// input error naming the field rather than as a generic parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationInput {
    #[serde(default, alias = "pop_size")]
    pub population_size: Option<u64>,
    #[serde(default, alias = "pop_infected")]
    pub initial_infected: Option<u64>,
    #[serde(default, alias = "pop_type")]
    pub population_topology: Option<String>,
    #[serde(default, alias = "contacts")]
    pub contact_rates: Option<BTreeMap<String, f64>>,
    #[serde(default, alias = "start_day")]
    pub start_date: Option<String>,
    #[serde(default, alias = "end_day")]
    pub end_date: Option<String>,
    #[serde(default, alias = "variant_start_day")]
    pub variant_start_date: Option<String>,
    #[serde(default, alias = "n_import")]
    pub variant_imports: Option<u32>,
}

/// Validated population parameters for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
#[builder(build_fn(validate = "Self::validate", error = "ScenarioError"))]
pub struct PopulationConfig {
    population_size: u64,
    initial_infected: u64,
    population_topology: PopulationTopology,
    contact_rates: BTreeMap<String, f64>,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl From<UninitializedFieldError> for ScenarioError {
    fn from(err: UninitializedFieldError) -> Self {
        ScenarioError::missing(err.field_name())
    }
}

impl PopulationConfigBuilder {
    fn validate(&self) -> Result<()> {
        if self.population_size == Some(0) {
            return Err(ScenarioError::invalid("population_size", "must be positive"));
        }
        if let (Some(size), Some(infected)) = (self.population_size, self.initial_infected) {
            if infected > size {
                return Err(ScenarioError::invalid(
                    "initial_infected",
                    format!("{infected} exceeds population size {size}"),
                ));
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end <= start {
                return Err(ScenarioError::invalid(
                    "end_date",
                    format!("{end} must be after start date {start}"),
                ));
            }
        }
        if let Some(rates) = &self.contact_rates {
            for (key, rate) in rates {
                if key.trim().is_empty() || key == layer::ALL {
                    return Err(ScenarioError::invalid(
                        "contact_rates",
                        format!("`{key}` is not a usable layer name"),
                    ));
                }
                if !rate.is_finite() || *rate < 0.0 {
                    return Err(ScenarioError::invalid(
                        "contact_rates",
                        format!("layer `{key}` has invalid contact rate {rate}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl PopulationConfig {
    pub fn builder() -> PopulationConfigBuilder {
        PopulationConfigBuilder::default()
    }

    pub fn from_input(input: &PopulationInput) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(size) = input.population_size {
            builder.population_size(size);
        }
        if let Some(infected) = input.initial_infected {
            builder.initial_infected(infected);
        }
        if let Some(topology) = &input.population_topology {
            builder.population_topology(topology.parse()?);
        }
        if let Some(rates) = &input.contact_rates {
            builder.contact_rates(rates.clone());
        }
        if let Some(start) = &input.start_date {
            builder.start_date(parse_date("start_date", start)?);
        }
        if let Some(end) = &input.end_date {
            builder.end_date(parse_date("end_date", end)?);
        }
        builder.build()
    }

    pub fn population_size(&self) -> u64 {
        self.population_size
    }

    pub fn initial_infected(&self) -> u64 {
        self.initial_infected
    }

    pub fn population_topology(&self) -> PopulationTopology {
        self.population_topology
    }

    pub fn contact_rates(&self) -> &BTreeMap<String, f64> {
        &self.contact_rates
    }

    pub fn contact_rate(&self, layer: &str) -> Option<f64> {
        self.contact_rates.get(layer).copied()
    }

    pub fn has_layer(&self, layer: &str) -> bool {
        self.contact_rates.contains_key(layer)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Number of simulated days, counting both the start and end date.
    pub fn n_days(&self) -> usize {
        (self.end_date - self.start_date).num_days() as usize + 1
    }

    /// Offset of `date` from the start date; negative before the start.
    pub fn day_index(&self, date: NaiveDate) -> i64 {
        (date - self.start_date).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}
