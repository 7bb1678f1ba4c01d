use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::interventions::InterventionDirective;
use crate::severity::EpidemiologicalProfile;

/// A single time series produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResultSeries {
    pub series_name: String,
    pub display_color: String,
    pub values: Vec<f64>,
}

impl SimulationResultSeries {
    pub fn new(series_name: impl Into<String>, display_color: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            series_name: series_name.into(),
            display_color: display_color.into(),
            values,
        }
    }
}

/// Day-indexed results of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    pub dates: Vec<NaiveDate>,
    pub series: BTreeMap<String, SimulationResultSeries>,
}

impl ResultTable {
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            series: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, series: SimulationResultSeries) {
        self.series.insert(series.series_name.clone(), series);
    }

    pub fn get(&self, name: &str) -> Option<&SimulationResultSeries> {
        self.series.get(name)
    }
}

/// Agent-based simulation engine driven by a resolved configuration.
///
/// An engine keeps mutable state while running, so it is taken by `&mut`
/// and must not be shared between concurrent runs.
pub trait SimulationEngine {
    type Handle;

    /// Built-in epidemiological values, readable without starting a run.
    fn defaults(&self) -> EpidemiologicalProfile;

    fn create(&mut self, config: &SimulationConfig) -> Result<Self::Handle, EngineError>;

    fn apply(&mut self, handle: &mut Self::Handle, interventions: &[InterventionDirective]) -> Result<(), EngineError>;

    fn run(&mut self, handle: Self::Handle) -> Result<ResultTable, EngineError>;
}
