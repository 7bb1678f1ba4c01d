use serde::Serialize;

use crate::engine::ResultTable;
use crate::error::{Result, ScenarioError};

/// (name shown on the dashboard, result series it is read from)
pub const CUMULATIVE_SERIES: [(&str, &str); 4] = [
    ("cum_infection", "cum_infections"),
    ("cum_severe", "cum_severe"),
    ("cum_critical", "cum_critical"),
    ("cum_deaths", "cum_deaths"),
];

pub const NEW_SERIES: [(&str, &str); 4] = [
    ("new_infection", "new_infections"),
    ("new_severe", "new_severe"),
    ("new_critical", "new_critical"),
    ("new_deaths", "new_deaths"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub color: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardData {
    #[serde(rename = "cumData")]
    pub cum_data: Vec<ChartSeries>,
    #[serde(rename = "newData")]
    pub new_data: Vec<ChartSeries>,
    pub date: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardPayload {
    pub code: u16,
    pub data: DashboardData,
}

fn charts(table: &ResultTable, names: &[(&str, &str)]) -> Result<Vec<ChartSeries>> {
    names
        .iter()
        .map(|(name, source)| {
            let series = table
                .get(source)
                .ok_or_else(|| ScenarioError::MissingSeries(source.to_string()))?;
            Ok(ChartSeries {
                name: name.to_string(),
                color: series.display_color.clone(),
                values: series.values.clone(),
            })
        })
        .collect()
}

pub fn reshape(table: &ResultTable) -> Result<DashboardPayload> {
    Ok(DashboardPayload {
        code: 200,
        data: DashboardData {
            cum_data: charts(table, &CUMULATIVE_SERIES)?,
            new_data: charts(table, &NEW_SERIES)?,
            date: table.dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect(),
        },
    })
}
