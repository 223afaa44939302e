type KWh = f64;

#[derive(Debug, Clone)]
pub struct Api {
    pub api_url: String,
    pub username: String,
    pub password: String,
}

/// Latest live power snapshot of the installation. Power values are kept as
/// reported by the cloud (W or kW); normalization happens at read time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyFlow {
    pub battery_soc: Option<f64>,
    pub battery_power: Option<f64>,
    pub pv_power: Option<f64>,
    pub buy_sell_power: Option<f64>,
    pub load_power: Option<f64>,
}

/// Cumulative generation totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub day: Option<KWh>,
    pub month: Option<KWh>,
    pub year: Option<KWh>,
    pub lifetime: Option<KWh>,
}

/// Most recent successful payloads. Each block is replaced as a whole on a
/// successful fetch and left untouched on a failed one.
#[derive(Debug, Clone, Default)]
pub struct StationData {
    pub energy_flow: Option<EnergyFlow>,
    pub statistics: Option<Generation>,
}

/// Authenticated session state. `token` and `station` are cached for the
/// process lifetime once obtained.
#[derive(Debug)]
pub struct Session {
    pub api: Api,
    pub client: reqwest::Client,
    pub token: Option<String>,
    pub station: Option<String>,
    pub data: StationData,
}
