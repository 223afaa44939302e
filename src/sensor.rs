use crate::model::StationData;

/// Physical unit of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Percent,
    Kw,
    Kwh,
}

/// How consumers should accumulate a reading over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    /// Point-in-time value
    Measurement,
    /// Running total that resets at a period boundary
    Total,
    /// Running total that only grows
    TotalIncreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    BatterySoc,
    BatteryPower,
    PvPower,
    GridPower,
    LoadPower,
    DayGeneration,
    MonthGeneration,
    YearGeneration,
    LifetimeGeneration,
}

pub const SENSORS: [Sensor; 9] = [
    Sensor::BatterySoc,
    Sensor::BatteryPower,
    Sensor::PvPower,
    Sensor::GridPower,
    Sensor::LoadPower,
    Sensor::DayGeneration,
    Sensor::MonthGeneration,
    Sensor::YearGeneration,
    Sensor::LifetimeGeneration,
];

/* The cloud reports power in W or kW depending on firmware; magnitudes above
100 are taken to be W and converted to kW at two decimals. */
fn scale_power(raw: f64) -> f64 {
    if raw.abs() > 100.0 {
        (raw / 1000.0 * 100.0).round() / 100.0
    } else {
        raw
    }
}

impl Sensor {
    pub fn name(&self) -> &'static str {
        match self {
            Sensor::BatterySoc => "battery_soc",
            Sensor::BatteryPower => "battery_power",
            Sensor::PvPower => "pv_power",
            Sensor::GridPower => "grid_power",
            Sensor::LoadPower => "load_power",
            Sensor::DayGeneration => "day_generation",
            Sensor::MonthGeneration => "month_generation",
            Sensor::YearGeneration => "year_generation",
            Sensor::LifetimeGeneration => "lifetime_generation",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Sensor::BatterySoc => "battery state of charge (in %)",
            Sensor::BatteryPower => "battery charge/discharge power (in kW)",
            Sensor::PvPower => "solar array production power (in kW)",
            Sensor::GridPower => "grid import/export power (in kW)",
            Sensor::LoadPower => "household consumption power (in kW)",
            Sensor::DayGeneration => "energy generated in current day (in kWh), resets daily",
            Sensor::MonthGeneration => "energy generated in current month (in kWh), resets monthly",
            Sensor::YearGeneration => "energy generated in current year (in kWh), resets yearly",
            Sensor::LifetimeGeneration => "energy generated over installation lifetime (in kWh)",
        }
    }

    pub fn unit(&self) -> Unit {
        match self {
            Sensor::BatterySoc => Unit::Percent,
            Sensor::BatteryPower | Sensor::PvPower | Sensor::GridPower | Sensor::LoadPower => {
                Unit::Kw
            }
            _ => Unit::Kwh,
        }
    }

    pub fn state_class(&self) -> StateClass {
        match self {
            Sensor::BatterySoc
            | Sensor::BatteryPower
            | Sensor::PvPower
            | Sensor::GridPower
            | Sensor::LoadPower => StateClass::Measurement,
            Sensor::DayGeneration | Sensor::LifetimeGeneration => StateClass::TotalIncreasing,
            Sensor::MonthGeneration | Sensor::YearGeneration => StateClass::Total,
        }
    }

    /// Whether an absent reading keeps its last published value instead of
    /// going unknown.
    pub fn sticky(&self) -> bool {
        matches!(self, Sensor::BatterySoc)
    }

    /// Project the current value of this sensor out of the cached payloads.
    /// Absent source data reads as `None`.
    pub fn read(&self, data: &StationData) -> Option<f64> {
        match self {
            Sensor::BatterySoc => data.energy_flow.as_ref().and_then(|flow| flow.battery_soc),
            Sensor::BatteryPower => data
                .energy_flow
                .as_ref()
                .and_then(|flow| flow.battery_power)
                .map(scale_power),
            Sensor::PvPower => data
                .energy_flow
                .as_ref()
                .and_then(|flow| flow.pv_power)
                .map(scale_power),
            Sensor::GridPower => data
                .energy_flow
                .as_ref()
                .and_then(|flow| flow.buy_sell_power)
                .map(scale_power),
            Sensor::LoadPower => data
                .energy_flow
                .as_ref()
                .and_then(|flow| flow.load_power)
                .map(scale_power),
            Sensor::DayGeneration => data.statistics.as_ref().and_then(|gains| gains.day),
            Sensor::MonthGeneration => data.statistics.as_ref().and_then(|gains| gains.month),
            Sensor::YearGeneration => data.statistics.as_ref().and_then(|gains| gains.year),
            Sensor::LifetimeGeneration => data.statistics.as_ref().and_then(|gains| gains.lifetime),
        }
    }
}
