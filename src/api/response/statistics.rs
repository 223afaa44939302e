use serde::Deserialize;

/* Cumulative generation totals in kWh. */
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gains {
    pub day_generation: Option<f64>,
    pub month_generation: Option<f64>,
    pub year_generation: Option<f64>,
    pub lifetime_generation: Option<f64>,
}
