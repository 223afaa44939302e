use serde::Deserialize;
use serde_json::Value;

/* Station id arrives as a JSON number or a JSON string depending on the
account; both are carried as text. */
#[derive(Debug, Clone)]
pub struct StationId(pub String);

impl<'de> serde::Deserialize<'de> for StationId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(d)?;

        match value {
            Value::Number(n) => Ok(StationId(n.to_string())),
            Value::String(s) => Ok(StationId(s)),
            _ => Err(serde::de::Error::custom(
                "stationId is neither a number nor a string",
            )),
        }
    }
}

#[derive(Deserialize)]
pub struct HomeStation {
    #[serde(rename = "stationId")]
    pub station_id: StationId,
}
