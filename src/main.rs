#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use config::Config;
use rocket::State;
use sigencloud_rs::api;
use sigencloud_rs::model::Session;
use std::process;
use std::sync::Mutex;
use std::time::Instant;

mod metrics;

const API_URL: &str = "https://api-aus.sigencloud.com";
const DEFAULT_INTERVAL_SECS: i64 = 30;

#[derive(Clone, serde::Deserialize)]
pub struct SigenConfig {
    api_url: String,
    username: String,
    password: String,
    interval: u64,
}

/// Structure containing state for API handlers.
pub struct StateData {
    session: tokio::sync::Mutex<Session>,
    interval: u64,
    /// Timestamp of last refresh attempt
    timestamp: Mutex<Option<Instant>>,
}

impl StateData {
    /// Updates `timestamp` to `now()`.
    fn touch(&self) {
        if let Ok(mut ts) = self.timestamp.lock() {
            *ts = Some(Instant::now());
        } else {
            log::trace!("Unable to lock timestamp mutex, will refresh again")
        }
    }

    /// Checks whether `interval_secs` elapsed since last `touch()`
    fn interval_elapsed(&self, interval_secs: u64) -> bool {
        let elapsed_opt = self
            .timestamp
            .lock()
            .ok()
            .and_then(|a| a.map(|b| b.elapsed().as_secs()));

        if let Some(elapsed) = elapsed_opt {
            elapsed > interval_secs
        } else {
            /* If there is None timestamp/elapsed, always return true to trigger action */
            true
        }
    }
}

pub fn read_settings() -> SigenConfig {
    let mut settings = Config::default();
    settings
        .merge(config::Environment::with_prefix("SIGEN"))
        .unwrap()
        .set_default("api_url", API_URL)
        .unwrap()
        .set_default("interval", DEFAULT_INTERVAL_SECS)
        .unwrap();

    settings.try_into().expect("Configuration error")
}

#[get("/metrics")]
async fn metrics_route(state: &State<StateData>) -> Result<String, api::Error> {
    if state.interval_elapsed(state.interval) {
        let mut session = state.session.lock().await;
        api::refresh(&mut session).await;
        metrics::publish(&session);
        state.touch();
    } else {
        log::info!("interval time not yet elapsed since last run; returning cached result")
    }
    metrics::read().await
}

#[get("/dump-data")]
async fn dump_data_route(state: &State<StateData>) -> Result<String, api::Error> {
    let mut session = state.session.lock().await;
    let dump = api::dump_data(&mut session).await?;

    Ok(format!("{:#?}", dump))
}

#[rocket::main]
async fn main() {
    env_logger::init();

    let settings = read_settings();
    let mut session = match api::session(settings.api_url, settings.username, settings.password) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Unable to build API client: {:?}", e);
            process::exit(1);
        }
    };

    /* Bad credentials should surface at startup, not on first scrape */
    if !api::authenticate(&mut session).await {
        log::error!("Initial authentication failed, refusing to start");
        process::exit(1);
    }

    let state = StateData {
        session: tokio::sync::Mutex::new(session),
        interval: settings.interval,
        timestamp: Mutex::new(None),
    };

    if let Err(e) = rocket::build()
        .manage(state)
        .mount("/", routes![metrics_route, dump_data_route])
        .launch()
        .await
    {
        log::error!("Server failed to launch: {:?}", e);
        process::exit(1);
    }
}
