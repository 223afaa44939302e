use serde::Deserialize;

/* Instantaneous power snapshot. Every field is optional on the wire; power
fields are reported in W or kW depending on firmware. */
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyFlow {
    pub battery_soc: Option<f64>,
    pub battery_power: Option<f64>,
    pub pv_power: Option<f64>,
    pub buy_sell_power: Option<f64>,
    pub load_power: Option<f64>,
}
