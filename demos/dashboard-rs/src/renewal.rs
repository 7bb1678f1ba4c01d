use std::collections::BTreeMap;

use epi_scenario::{
    EngineError, EpidemiologicalProfile, InterventionDirective, ResultTable, SimulationConfig,
    SimulationEngine,
};
use rand::{SeedableRng, distr::Distribution, rngs::StdRng};
use rand_distr::Binomial;
use tracing::debug;

use crate::{output::RenewalOutput, parameters::EngineParameters};

/// Stochastic renewal model with layer-specific contact mixing.
pub struct RenewalModel {
    parameters: EngineParameters,
}

pub struct RenewalRun {
    config: SimulationConfig,
    /// Transmission multiplier of each layer, per simulated day.
    layer_multipliers: BTreeMap<String, Vec<f64>>,
    rng: StdRng,
}

fn current_infectious(incidence: &[u64], step: usize, pmf: &[f64]) -> f64 {
    let mut infectious = 0.0;
    for lag in 0..usize::min(step, pmf.len()) {
        infectious += incidence[step - lag - 1] as f64 * pmf[lag];
    }
    infectious
}

fn draw_infections(rng: &mut StdRng, susceptible: u64, pressure: f64) -> Result<u64, EngineError> {
    if susceptible == 0 || pressure <= 0. {
        return Ok(0);
    }
    let p = f64::min(pressure / susceptible as f64, 1.0);
    Ok(Binomial::new(susceptible, p)?.sample(rng))
}

fn progress(rng: &mut StdRng, n: u64, p: f64) -> Result<u64, EngineError> {
    if n == 0 {
        return Ok(0);
    }
    Ok(Binomial::new(n, p.clamp(0., 1.))?.sample(rng))
}

impl RenewalModel {
    pub fn new(parameters: EngineParameters) -> Self {
        Self { parameters }
    }

    /// Reproduction number on `day` for a fully susceptible population.
    pub fn reproduction_number(&self, run: &RenewalRun, day: usize) -> f64 {
        let beta = run.config.epidemiology().transmission_rate;
        run.config
            .population()
            .contact_rates()
            .iter()
            .map(|(layer, contacts)| {
                let layer_beta = self.parameters.layer_beta.get(layer).copied().unwrap_or(1.0);
                let multiplier = run.layer_multipliers.get(layer).map_or(1.0, |m| m[day]);
                beta * contacts * layer_beta * multiplier
            })
            .sum()
    }
}

impl SimulationEngine for RenewalModel {
    type Handle = RenewalRun;

    fn defaults(&self) -> EpidemiologicalProfile {
        EpidemiologicalProfile::ENGINE_DEFAULTS
    }

    fn create(&mut self, config: &SimulationConfig) -> Result<RenewalRun, EngineError> {
        if self.parameters.generation_interval_pmf.is_empty() {
            return Err("generation interval pmf is empty".into());
        }
        let n_days = config.population().n_days();
        let layer_multipliers = config
            .population()
            .contact_rates()
            .keys()
            .map(|layer| (layer.clone(), vec![1.0; n_days]))
            .collect();
        Ok(RenewalRun {
            config: config.clone(),
            layer_multipliers,
            rng: StdRng::seed_from_u64(config.seed()),
        })
    }

    fn apply(&mut self, handle: &mut RenewalRun, interventions: &[InterventionDirective]) -> Result<(), EngineError> {
        let n_days = handle.config.population().n_days();
        for directive in interventions {
            for (date, factor) in directive.schedule() {
                let day = handle.config.population().day_index(date);
                // Changes outside the simulated window have no effect
                if day < 0 || day as usize >= n_days {
                    debug!(%date, layer = %directive.affected_layer(), "change outside simulation window");
                    continue;
                }
                for (layer, multipliers) in handle.layer_multipliers.iter_mut() {
                    if directive.applies_to(layer) {
                        multipliers[day as usize..].fill(factor);
                    }
                }
            }
        }
        Ok(())
    }

    fn run(&mut self, mut handle: RenewalRun) -> Result<ResultTable, EngineError> {
        let population = handle.config.population().clone();
        let profile = *handle.config.epidemiology();
        let n_days = population.n_days();
        let size = population.population_size();
        let variant = handle.config.variant().map(|v| {
            (
                population.day_index(v.start_date) as usize,
                u64::from(v.n_imports),
                v.relative_transmission,
            )
        });
        let pmf = &self.parameters.generation_interval_pmf;

        let mut output = RenewalOutput::new(n_days);
        let mut wild_incidence = vec![0u64; n_days];
        let mut variant_incidence = vec![0u64; n_days];
        let mut cum_infected = 0;
        for step in 0..n_days {
            let susceptible = size - cum_infected;
            let (wild, mut imported) = if step == 0 {
                (population.initial_infected(), 0)
            } else {
                let rt = self.reproduction_number(&handle, step) * susceptible as f64 / size as f64;
                let relative = variant.map_or(1.0, |(_, _, relative)| relative);
                let wild = draw_infections(
                    &mut handle.rng,
                    susceptible,
                    rt * current_infectious(&wild_incidence, step, pmf),
                )?;
                let imported = draw_infections(
                    &mut handle.rng,
                    susceptible - wild,
                    rt * relative * current_infectious(&variant_incidence, step, pmf),
                )?;
                (wild, imported)
            };
            if let Some((day, n_imports, _)) = variant
                && day == step
            {
                imported += u64::min(n_imports, susceptible - wild - imported);
            }
            wild_incidence[step] = wild;
            variant_incidence[step] = imported;

            let infections = wild + imported;
            cum_infected += infections;
            let symptomatic = progress(
                &mut handle.rng,
                infections,
                self.parameters.symptomatic_probability * profile.relative_symptomatic_probability,
            )?;
            let severe = progress(
                &mut handle.rng,
                symptomatic,
                self.parameters.severe_probability * profile.relative_severe_probability,
            )?;
            let critical = progress(
                &mut handle.rng,
                severe,
                self.parameters.critical_probability * profile.relative_critical_probability,
            )?;
            let deaths = progress(
                &mut handle.rng,
                critical,
                self.parameters.death_probability * profile.relative_death_probability,
            )?;
            output.infection_incidence[step] = infections;
            output.severe_incidence[step] = severe;
            output.critical_incidence[step] = critical;
            output.death_incidence[step] = deaths;
        }

        let dates = population.start_date().iter_days().take(n_days).collect();
        Ok(output.into_table(dates))
    }
}

#[cfg(test)]
mod test {
    use epi_scenario::{Scenario, ScenarioRequest, SimulationEngine};
    use serde_json::json;

    use crate::{parameters::EngineParameters, renewal::RenewalModel};

    fn request(int_pars: serde_json::Value) -> ScenarioRequest {
        serde_json::from_value(json!({
            "sim_pars": {
                "pop_size": 5000,
                "pop_infected": 10,
                "pop_type": "hybrid",
                "contacts": {"h": 3, "c": 36, "s": 50, "w": 20},
                "start_day": "2022-01-01",
                "end_day": "2022-01-31",
                "variant_start_day": "2022-01-04",
                "n_import": 3
            },
            "epi_pars": {"severity_mode": "pessimistic"},
            "int_pars": int_pars
        }))
        .unwrap()
    }

    #[test]
    fn test_positive_posture_reduces_transmission() {
        let mut model = RenewalModel::new(EngineParameters::default());

        let config = Scenario::prepare(&request(json!({})), &model, 1).unwrap();
        let open = model.create(&config).unwrap();

        let config = Scenario::prepare(&request(json!({"scenario_mode": "positive"})), &model, 1).unwrap();
        let mut restricted = model.create(&config).unwrap();
        model.apply(&mut restricted, config.interventions()).unwrap();

        let open_r = model.reproduction_number(&open, 5);
        let restricted_r = model.reproduction_number(&restricted, 5);
        // household layer is untouched, so the reduction is less than 20%
        assert!(restricted_r < open_r);
        assert!(restricted_r > 0.8 * open_r);
    }

    #[test]
    fn test_mask_schedule_applies_from_its_day() {
        let mut model = RenewalModel::new(EngineParameters::default());
        let masks = json!({"mask_wearing": [
            {"days": ["2022-01-03", "2022-04-05"], "layer": "h", "value": [0.0, 0.9]}
        ]});
        let config = Scenario::prepare(&request(masks), &model, 1).unwrap();
        let mut run = model.create(&config).unwrap();
        model.apply(&mut run, config.interventions()).unwrap();

        let household = &run.layer_multipliers["h"];
        assert_eq!(household[1], 1.0);
        assert!(household[2..].iter().all(|m| *m == 0.0));
        assert!(run.layer_multipliers["c"].iter().all(|m| *m == 1.0));
    }

    #[test]
    fn test_run_shape_and_bounds() {
        let mut model = RenewalModel::new(EngineParameters::default());
        let config = Scenario::prepare(&request(json!({})), &model, 8675309).unwrap();
        let run = model.create(&config).unwrap();
        let table = model.run(run).unwrap();

        assert_eq!(table.dates.len(), 31);
        assert_eq!(table.series.len(), 8);
        let cum = &table.get("cum_infections").unwrap().values;
        assert_eq!(cum.len(), 31);
        assert!(cum.windows(2).all(|w| w[0] <= w[1]));
        assert!(*cum.last().unwrap() <= 5000.0);
        // initial infections plus the imported variant cases
        assert!(cum[3] >= 13.0);
        let deaths = table.get("cum_deaths").unwrap().values.last().copied().unwrap();
        let severe = table.get("cum_severe").unwrap().values.last().copied().unwrap();
        assert!(deaths <= severe);
    }

    #[test]
    fn test_same_seed_same_result() {
        let mut model = RenewalModel::new(EngineParameters::default());
        let config = Scenario::prepare(&request(json!({})), &model, 42).unwrap();
        let first = model.create(&config).and_then(|run| model.run(run)).unwrap();
        let second = model.create(&config).and_then(|run| model.run(run)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_pmf_fails_on_create() {
        let mut model = RenewalModel::new(EngineParameters {
            generation_interval_pmf: vec![],
            ..Default::default()
        });
        let config = Scenario::prepare(&request(json!({})), &model, 0).unwrap();
        assert!(model.create(&config).is_err());
    }
}
