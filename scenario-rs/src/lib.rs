pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod interventions;
pub mod population;
pub mod resolver;
pub mod scenario;
pub mod severity;

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use config::{SimulationConfig, VariantImport};
pub use dashboard::{DashboardPayload, reshape};
pub use engine::{ResultTable, SimulationEngine, SimulationResultSeries};
pub use error::{EngineError, EngineStage, Result, ScenarioError};
pub use interventions::{InterventionDirective, LayerSelector, ScenarioPosture};
pub use population::{PopulationConfig, PopulationTopology};
pub use resolver::{EpiStrategy, Resolver};
pub use scenario::{Scenario, ScenarioRequest};
pub use severity::{EpidemiologicalProfile, SeverityMode};

/// Request envelope: the scenario input plus run settings (seed, output).
pub struct Environment<I = ()> {
    input_json: serde_json::Map<String, Value>,
    pub input: Option<I>,
    pub seed: u64,
    pub replicate: u64,
    output: Value,
}

impl Environment {
    pub fn from_json(data: Value) -> Self {
        let mut input_json = data
            .get("input")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        let seed = input_json
            .remove("seed")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let replicate = input_json
            .remove("replicate")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let output = data.get("output").cloned().unwrap_or(Value::Null);

        Self {
            input_json,
            input: None,
            seed,
            replicate,
            output,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(ScenarioError::invalid("input", "request body is empty"));
        }
        let data: Value = serde_json::from_str(raw)
            .map_err(|e| ScenarioError::invalid("input", format!("malformed JSON: {e}")))?;
        Ok(Self::from_json(data))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let data: Value = toml::from_str(raw)
            .map_err(|e| ScenarioError::invalid("input", format!("malformed TOML: {e}")))?;
        Ok(Self::from_json(data))
    }

    pub fn from_stdin() -> Result<Self> {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        Self::from_json_str(&raw)
    }

    pub fn with_input_type<I: DeserializeOwned>(self) -> Result<Environment<I>> {
        let input_value = Value::Object(self.input_json.clone());
        let input = serde_json::from_value(input_value)
            .map_err(|e| ScenarioError::invalid("input", e.to_string()))?;
        Ok(Environment {
            input_json: self.input_json,
            input: Some(input),
            seed: self.seed,
            replicate: self.replicate,
            output: self.output,
        })
    }
}

impl<I: DeserializeOwned> Environment<I> {
    pub fn load() -> Result<Self> {
        Environment::from_stdin()?.with_input_type::<I>()
    }
}

impl<I> Environment<I> {
    pub fn input_json(&self) -> &serde_json::Map<String, Value> {
        &self.input_json
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        let output = &self.output;

        // Check flat output
        if output.get("spec").and_then(|v| v.as_str()) == Some("filesystem") {
            return output.get("dir").and_then(|v| v.as_str()).map(PathBuf::from);
        }

        // Check profiled output, preferring the default profile
        let profile = output
            .get("profile")
            .and_then(|v| v.as_object())
            .and_then(|profiles| profiles.get("default").or_else(|| profiles.values().next()))?;
        if profile.get("spec").and_then(|v| v.as_str()) == Some("filesystem") {
            return profile.get("dir").and_then(|v| v.as_str()).map(PathBuf::from);
        }

        None
    }

    pub fn write(&self, filename: &str, data: &[u8]) -> Result<()> {
        if let Some(dir) = self.output_dir() {
            fs::create_dir_all(&dir)?;
            fs::write(dir.join(filename), data)?;
        } else {
            io::stdout().write_all(data)?;
        }
        Ok(())
    }

    pub fn write_json<T: Serialize>(&self, filename: &str, value: &T) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)?;
        self.write(filename, &data)
    }

    pub fn write_csv(&self, filename: &str, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
        if let Some(dir) = self.output_dir() {
            fs::create_dir_all(&dir)?;
            let file = fs::File::create(dir.join(filename))?;
            write_rows(csv::Writer::from_writer(file), headers, rows)
        } else {
            write_rows(csv::Writer::from_writer(io::stdout()), headers, rows)
        }
    }
}

fn write_rows<W: Write>(mut wtr: csv::Writer<W>, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_basic() {
        let data = json!({
            "input": {
                "seed": 42,
                "replicate": 1,
                "epi_pars": {"severity_mode": "default"}
            },
            "output": {
                "spec": "filesystem",
                "dir": "/tmp/output"
            }
        });
        let ctx = Environment::from_json(data);
        assert_eq!(ctx.seed, 42);
        assert_eq!(ctx.replicate, 1);
        assert!(ctx.input_json().contains_key("epi_pars"));
        assert!(!ctx.input_json().contains_key("seed"));
        assert!(!ctx.input_json().contains_key("replicate"));
        assert_eq!(ctx.output_dir(), Some(PathBuf::from("/tmp/output")));
    }

    #[test]
    fn test_with_input_type() {
        let data = json!({
            "input": {
                "seed": 42,
                "epi_pars": {"severity_mode": "optimistic"},
                "int_pars": {"scenario_mode": "positive"}
            }
        });
        let ctx = Environment::from_json(data)
            .with_input_type::<ScenarioRequest>()
            .unwrap();
        let request = ctx.input.unwrap();
        assert_eq!(request.epi_pars.severity_mode.as_deref(), Some("optimistic"));
        assert_eq!(request.int_pars.scenario_mode.as_deref(), Some("positive"));
        assert_eq!(ctx.seed, 42);
    }

    #[test]
    fn test_with_input_type_rejects_bad_shape() {
        let data = json!({"input": {"sim_pars": {"pop_size": -5}}});
        let err = Environment::from_json(data)
            .with_input_type::<ScenarioRequest>()
            .err()
            .unwrap();
        assert!(matches!(err, ScenarioError::InvalidInput { .. }));
    }

    #[test]
    fn test_malformed_and_empty_json() {
        assert!(matches!(
            Environment::from_json_str("{not json").err().unwrap(),
            ScenarioError::InvalidInput { .. }
        ));
        assert!(Environment::from_json_str("  ").is_err());
    }

    #[test]
    fn test_from_toml() {
        let raw = r#"
            [input]
            seed = 3

            [input.sim_pars]
            pop_size = 5000
            start_day = "2022-01-01"

            [input.sim_pars.contacts]
            h = 3.0

            [output]
            spec = "filesystem"
            dir = "/tmp/toml-out"
        "#;
        let ctx = Environment::from_toml_str(raw)
            .unwrap()
            .with_input_type::<ScenarioRequest>()
            .unwrap();
        assert_eq!(ctx.seed, 3);
        let request = ctx.input.as_ref().unwrap();
        assert_eq!(request.sim_pars.population_size, Some(5000));
        assert_eq!(request.sim_pars.start_date.as_deref(), Some("2022-01-01"));
        assert_eq!(ctx.output_dir(), Some(PathBuf::from("/tmp/toml-out")));
    }

    #[test]
    fn test_output_dir_profiled() {
        let data = json!({
            "input": {},
            "output": {
                "profile": {
                    "default": {
                        "spec": "filesystem",
                        "dir": "/tmp/profiled"
                    }
                }
            }
        });
        let ctx = Environment::from_json(data);
        assert_eq!(ctx.output_dir(), Some(PathBuf::from("/tmp/profiled")));
    }

    #[test]
    fn test_output_dir_none() {
        let data = json!({
            "input": {},
            "output": {
                "spec": "stdout"
            }
        });
        let ctx = Environment::from_json(data);
        assert_eq!(ctx.output_dir(), None);
    }

    #[test]
    fn test_defaults() {
        let ctx = Environment::from_json(json!({}));
        assert_eq!(ctx.seed, 0);
        assert_eq!(ctx.replicate, 0);
        assert!(ctx.input_json().is_empty());
        assert_eq!(ctx.output_dir(), None);
    }

    #[test]
    fn test_write_to_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data = json!({
            "output": {"spec": "filesystem", "dir": dir.path().to_str().unwrap()}
        });
        let ctx = Environment::from_json(data);
        ctx.write_json("payload.json", &json!({"code": 200})).unwrap();
        ctx.write_csv("series.csv", &["day", "new_infections"], &[vec!["0".to_string(), "10".to_string()]])
            .unwrap();

        let payload = fs::read_to_string(dir.path().join("payload.json")).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&payload).unwrap(), json!({"code": 200}));
        let csv = fs::read_to_string(dir.path().join("series.csv")).unwrap();
        assert_eq!(csv, "day,new_infections\n0,10\n");
    }
}
