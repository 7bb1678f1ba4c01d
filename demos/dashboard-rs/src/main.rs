pub mod output;
pub mod parameters;
pub mod renewal;

use std::fs;
use std::path::Path;

use anyhow::Context;
use epi_scenario::{Environment, Scenario, ScenarioRequest, reshape};
use parameters::EngineParameters;
use renewal::RenewalModel;
use tracing_subscriber::EnvFilter;

fn load_environment() -> anyhow::Result<Environment<ScenarioRequest>> {
    let ctx = match std::env::args().nth(1) {
        Some(path) => {
            let raw = fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
            if Path::new(&path).extension().is_some_and(|ext| ext == "toml") {
                Environment::from_toml_str(&raw)?
            } else {
                Environment::from_json_str(&raw)?
            }
        }
        None => Environment::from_stdin()?,
    };
    Ok(ctx.with_input_type::<ScenarioRequest>()?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let ctx = load_environment()?;
    let request = ctx.input.as_ref().context("scenario input is missing")?;

    // Engine tuning is optional and lives next to the scenario input
    let parameters = match ctx.input_json().get("engine") {
        Some(engine) => serde_json::from_value::<EngineParameters>(engine.clone())
            .context("invalid engine parameters")?,
        None => EngineParameters::default(),
    };
    let mut model = RenewalModel::new(parameters);

    let config = Scenario::prepare(request, &model, ctx.seed)?;
    let table = Scenario::run(&config, &mut model)?;
    let payload = reshape(&table)?;
    ctx.write_json("sim_res.json", &payload)?;

    // Full result table as CSV, only when writing to a directory
    if ctx.output_dir().is_some() {
        let names: Vec<&str> = table.series.keys().map(String::as_str).collect();
        let headers: Vec<&str> = ["step", "date"].into_iter().chain(names.iter().copied()).collect();
        let rows: Vec<Vec<String>> = table
            .dates
            .iter()
            .enumerate()
            .map(|(i, date)| {
                let mut row = vec![i.to_string(), date.to_string()];
                row.extend(table.series.values().map(|s| s.values[i].to_string()));
                row
            })
            .collect();
        ctx.write_csv("sim_res.csv", &headers, &rows)?;
    }
    Ok(())
}
