use prometheus::{Encoder, GaugeVec, TextEncoder};
use sigencloud_rs::model::Session;
use sigencloud_rs::sensor::{Sensor, SENSORS};
use std::collections::HashMap;

lazy_static! {
    static ref SENSOR_GAUGES: HashMap<Sensor, GaugeVec> = SENSORS
        .iter()
        .map(|sensor| {
            let gauge = register_gauge_vec!(
                opts!(
                    sensor.name(),
                    sensor.help(),
                    labels! {"device" => "sigenstor_battery",}
                ),
                &["station"],
            )
            .unwrap();
            (*sensor, gauge)
        })
        .collect();
}

/// Project the session's cached payloads into the exporter registry.
///
/// A reading absent from the current payload has its series removed, except
/// the battery charge level which keeps its last published value.
pub fn publish(session: &Session) {
    let station = match session.station.as_ref() {
        Some(station) => station.as_str(),
        None => return,
    };

    for sensor in SENSORS.iter() {
        let gauge = &SENSOR_GAUGES[sensor];
        match sensor.read(&session.data) {
            Some(value) => gauge.with_label_values(&[station]).set(value),
            None if sensor.sticky() => { /* keep last published value */ }
            None => {
                let _ = gauge.remove_label_values(&[station]);
            }
        }
    }
}

/// Read metrics from Prometheus exporter registry.
pub async fn read() -> Result<String, sigencloud_rs::Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .or(Err(sigencloud_rs::Error::FormatError))?;
    String::from_utf8(buffer).or(Err(sigencloud_rs::Error::FormatError))
}
