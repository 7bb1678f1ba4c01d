use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ScenarioError};
use crate::population::{PopulationConfig, layer, parse_date};

/// Contact reduction applied to every layer under the positive posture.
pub const POSITIVE_CHANGE_FACTOR: f64 = 0.8;

/// Layers the positive posture restricts, in emission order.
pub const POSITIVE_LAYERS: [&str; 3] = [layer::COMMUNITY, layer::SCHOOL, layer::WORKPLACE];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LayerSelector {
    All,
    Named(String),
}

impl LayerSelector {
    pub fn named(key: impl Into<String>) -> Self {
        LayerSelector::Named(key.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            LayerSelector::All => layer::ALL,
            LayerSelector::Named(key) => key,
        }
    }
}

impl TryFrom<String> for LayerSelector {
    type Error = ScenarioError;

    fn try_from(raw: String) -> Result<Self> {
        let key = raw.trim();
        if key.is_empty() {
            return Err(ScenarioError::invalid("affected_layer", "layer name is empty"));
        }
        if key.eq_ignore_ascii_case(layer::ALL) {
            Ok(LayerSelector::All)
        } else {
            Ok(LayerSelector::Named(key.to_string()))
        }
    }
}

impl From<LayerSelector> for String {
    fn from(selector: LayerSelector) -> Self {
        selector.as_str().to_string()
    }
}

impl fmt::Display for LayerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-scheduled change to a layer's transmission multiplier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterventionDirective {
    active_days: Vec<NaiveDate>,
    affected_layer: LayerSelector,
    change_factors: Vec<f64>,
    plot_visibility: bool,
}

impl InterventionDirective {
    fn new(active_days: Vec<NaiveDate>, affected_layer: LayerSelector, change_factors: Vec<f64>) -> Self {
        Self {
            active_days,
            affected_layer,
            change_factors,
            plot_visibility: true,
        }
    }

    fn hidden(self) -> Self {
        Self {
            plot_visibility: false,
            ..self
        }
    }

    pub fn active_days(&self) -> &[NaiveDate] {
        &self.active_days
    }

    pub fn affected_layer(&self) -> &LayerSelector {
        &self.affected_layer
    }

    pub fn change_factors(&self) -> &[f64] {
        &self.change_factors
    }

    pub fn plot_visibility(&self) -> bool {
        self.plot_visibility
    }

    /// Pairs of (date, factor) in schedule order.
    pub fn schedule(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.active_days.iter().copied().zip(self.change_factors.iter().copied())
    }

    pub fn applies_to(&self, key: &str) -> bool {
        match &self.affected_layer {
            LayerSelector::All => true,
            LayerSelector::Named(name) => name == key,
        }
    }
}

/// One mask-wearing schedule entry as sent by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskEntry {
    #[serde(alias = "days")]
    pub active_days: Vec<String>,
    #[serde(alias = "layer")]
    pub affected_layer: LayerSelector,
    #[serde(alias = "value")]
    pub change_factors: Vec<f64>,
}

/// Policy posture for a scenario. Unrelated to the severity mode even
/// though both arrive as free-form strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioPosture {
    Positive,
    #[default]
    Neutral,
}

impl ScenarioPosture {
    /// Only `positive` selects the blanket reduction. Any other value,
    /// including severity names sent in the same field, means neutral.
    pub fn from_mode(mode: &str) -> Self {
        match mode.trim().to_ascii_lowercase().as_str() {
            "positive" => ScenarioPosture::Positive,
            "" | "neutral" | "none" => ScenarioPosture::Neutral,
            other => {
                debug!(mode = other, "unrecognized scenario posture, using mask schedule");
                ScenarioPosture::Neutral
            }
        }
    }
}

/// Intervention section of a scenario request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterventionInput {
    #[serde(default)]
    pub scenario_mode: Option<String>,
    #[serde(default, alias = "mask_wearing")]
    pub mask_schedule: Option<Vec<MaskEntry>>,
}

impl InterventionInput {
    pub fn posture(&self) -> ScenarioPosture {
        self.scenario_mode
            .as_deref()
            .map_or(ScenarioPosture::Neutral, ScenarioPosture::from_mode)
    }

    pub fn mask_schedule(&self) -> &[MaskEntry] {
        self.mask_schedule.as_deref().unwrap_or_default()
    }
}

fn directive_from_entry(population: &PopulationConfig, index: usize, entry: &MaskEntry) -> Result<InterventionDirective> {
    let field = format!("mask_schedule[{index}]");
    if entry.active_days.len() != entry.change_factors.len() {
        return Err(ScenarioError::invalid(
            field,
            format!(
                "{} active days but {} change factors",
                entry.active_days.len(),
                entry.change_factors.len()
            ),
        ));
    }
    if let Some(factor) = entry.change_factors.iter().find(|f| !f.is_finite() || **f < 0.0) {
        return Err(ScenarioError::invalid(field, format!("invalid change factor {factor}")));
    }
    if let LayerSelector::Named(key) = &entry.affected_layer {
        if !population.has_layer(key) {
            return Err(ScenarioError::invalid(field, format!("unknown contact layer `{key}`")));
        }
    }
    let days = entry
        .active_days
        .iter()
        .map(|day| parse_date(&field, day))
        .collect::<Result<Vec<_>>>()?;
    Ok(InterventionDirective::new(
        days,
        entry.affected_layer.clone(),
        entry.change_factors.clone(),
    ))
}

/// Turn a posture and mask schedule into the directives handed to the engine.
///
/// The positive posture wins over any mask schedule. Every returned
/// directive is hidden from plots.
pub fn build(
    population: &PopulationConfig,
    posture: ScenarioPosture,
    mask_schedule: &[MaskEntry],
) -> Result<Vec<InterventionDirective>> {
    let directives = match posture {
        ScenarioPosture::Positive => {
            if !mask_schedule.is_empty() {
                warn!(
                    entries = mask_schedule.len(),
                    "positive posture selected, ignoring mask schedule"
                );
            }
            for key in POSITIVE_LAYERS.iter().filter(|key| !population.has_layer(key)) {
                warn!(layer = *key, "positive posture targets a layer the population does not have");
            }
            POSITIVE_LAYERS
                .iter()
                .map(|key| {
                    InterventionDirective::new(
                        vec![population.start_date()],
                        LayerSelector::named(*key),
                        vec![POSITIVE_CHANGE_FACTOR],
                    )
                })
                .collect()
        }
        ScenarioPosture::Neutral => mask_schedule
            .iter()
            .enumerate()
            .map(|(i, entry)| directive_from_entry(population, i, entry))
            .collect::<Result<Vec<_>>>()?,
    };

    let directives: Vec<_> = directives.into_iter().map(InterventionDirective::hidden).collect();
    debug!(?posture, count = directives.len(), "built intervention directives");
    Ok(directives)
}
