use std::collections::BTreeMap;

use serde::Deserialize;

/// Internal settings of the demo engine, read from the optional `engine`
/// object of the request input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineParameters {
    pub generation_interval_pmf: Vec<f64>,
    /// Per-contact transmissibility of each layer relative to the base rate.
    pub layer_beta: BTreeMap<String, f64>,
    pub symptomatic_probability: f64,
    pub severe_probability: f64,
    pub critical_probability: f64,
    pub death_probability: f64,
}

impl Default for EngineParameters {
    fn default() -> Self {
        Self {
            generation_interval_pmf: vec![0., 0., 0.25, 0.5, 0.25],
            layer_beta: BTreeMap::from([
                ("h".to_string(), 3.0),
                ("s".to_string(), 0.6),
                ("w".to_string(), 0.6),
                ("c".to_string(), 0.3),
            ]),
            symptomatic_probability: 0.6,
            severe_probability: 0.2,
            critical_probability: 0.3,
            death_probability: 0.4,
        }
    }
}
