use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{SimulationConfig, VariantImport};
use crate::engine::{ResultTable, SimulationEngine};
use crate::error::{EngineStage, Result, ScenarioError};
use crate::interventions::{self, InterventionInput};
use crate::population::PopulationInput;
use crate::resolver::{EpiInput, Resolver};

/// Raw scenario request as posted by the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRequest {
    #[serde(default, alias = "population")]
    pub sim_pars: PopulationInput,
    #[serde(default, alias = "epidemiology")]
    pub epi_pars: EpiInput,
    #[serde(default, alias = "interventions")]
    pub int_pars: InterventionInput,
}

pub struct Scenario;

impl Scenario {
    /// Resolve a request into a complete configuration. Nothing is sent to
    /// the engine here apart from reading its defaults.
    pub fn prepare<E: SimulationEngine>(request: &ScenarioRequest, engine: &E, seed: u64) -> Result<SimulationConfig> {
        let resolver = Resolver::new(engine.defaults());
        let (population, epidemiology) = resolver.resolve(&request.sim_pars, &request.epi_pars)?;
        let posture = request.int_pars.posture();
        let directives = interventions::build(&population, posture, request.int_pars.mask_schedule())?;

        let mut builder = SimulationConfig::builder();
        builder
            .population(population)
            .epidemiology(epidemiology)
            .interventions(directives)
            .seed(seed);
        if let Some(variant) = VariantImport::from_input(&request.sim_pars, &request.epi_pars)? {
            builder.variant(variant);
        }
        builder.build()
    }

    /// Drive one run of the engine. Engine errors are passed through with
    /// the failing stage attached.
    pub fn run<E: SimulationEngine>(config: &SimulationConfig, engine: &mut E) -> Result<ResultTable> {
        let fingerprint = config.fingerprint()?;
        info!(
            %fingerprint,
            population = config.population().population_size(),
            interventions = config.interventions().len(),
            "starting simulation"
        );
        let mut handle = engine
            .create(config)
            .map_err(|e| ScenarioError::engine(EngineStage::Create, e))?;
        engine
            .apply(&mut handle, config.interventions())
            .map_err(|e| ScenarioError::engine(EngineStage::Apply, e))?;
        let table = engine
            .run(handle)
            .map_err(|e| ScenarioError::engine(EngineStage::Run, e))?;
        info!(days = table.dates.len(), series = table.series.len(), "simulation finished");
        Ok(table)
    }
}
