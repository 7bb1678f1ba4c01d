use chrono::NaiveDate;
use epi_scenario::{ResultTable, SimulationResultSeries};

const INFECTIONS_COLOR: &str = "#b62413";
const SEVERE_COLOR: &str = "#c1ad71";
const CRITICAL_COLOR: &str = "#b86113";
const DEATHS_COLOR: &str = "#000000";

#[derive(Default)]
pub struct RenewalOutput {
    pub infection_incidence: Vec<u64>,
    pub severe_incidence: Vec<u64>,
    pub critical_incidence: Vec<u64>,
    pub death_incidence: Vec<u64>,
}

fn cumulative(incidence: &[u64]) -> Vec<f64> {
    incidence
        .iter()
        .scan(0u64, |total, n| {
            *total += n;
            Some(*total as f64)
        })
        .collect()
}

impl RenewalOutput {
    pub fn new(len: usize) -> RenewalOutput {
        RenewalOutput {
            infection_incidence: vec![0; len],
            severe_incidence: vec![0; len],
            critical_incidence: vec![0; len],
            death_incidence: vec![0; len],
        }
    }

    pub fn into_table(self, dates: Vec<NaiveDate>) -> ResultTable {
        let mut table = ResultTable::new(dates);
        for (name, color, incidence) in [
            ("infections", INFECTIONS_COLOR, self.infection_incidence),
            ("severe", SEVERE_COLOR, self.severe_incidence),
            ("critical", CRITICAL_COLOR, self.critical_incidence),
            ("deaths", DEATHS_COLOR, self.death_incidence),
        ] {
            table.insert(SimulationResultSeries::new(
                format!("cum_{name}"),
                color,
                cumulative(&incidence),
            ));
            table.insert(SimulationResultSeries::new(
                format!("new_{name}"),
                color,
                incidence.iter().map(|n| *n as f64).collect(),
            ));
        }
        table
    }
}
