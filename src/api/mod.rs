pub mod endpoint;
pub mod error;
pub mod response;

use crate::model;
pub use error::Error;
use response::energy_flow;
use response::home_station::HomeStation;
use response::oauth_token::TokenData;
use response::statistics::Gains;
use response::Envelope;
use serde_json::Value;

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/* OAuth client credentials are fixed and identical for every install of the
vendor app; "Basic c2lnZW46c2lnZW4=" is sigen:sigen. */
const BASIC_AUTH: &str = "Basic c2lnZW46c2lnZW4=";
const AUTH_CLIENT_ID: &str = "sigen";
const PROTOCOL_VERSION: &str = "3.4.0";
const TENANT_ID: &str = "1";

const REQUEST_TIMEOUT_SECS: u64 = 10;

/* Session-wide headers expected by the cloud; requests without the app
identity get rejected by the WAF. */
const DEFAULT_HEADERS: [(&str, &str); 10] = [
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
    ),
    ("Accept", "*/*"),
    ("Origin", "https://app-aus.sigencloud.com"),
    ("Referer", "https://app-aus.sigencloud.com/"),
    ("Lang", "en_US"),
    ("Sg-Bui", "1"),
    ("Sg-Env", "1"),
    ("Sg-Pkg", "sigen_app"),
    ("Version", "RELEASE"),
    ("Client-Server", "aus"),
];

/// Build a session with no token, station or data cached yet.
pub fn session(
    api_url: String,
    username: String,
    password: String,
) -> Result<model::Session, Error> {
    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in DEFAULT_HEADERS {
        headers.insert(name, reqwest::header::HeaderValue::from_static(value));
    }

    let client = reqwest::ClientBuilder::new()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .default_headers(headers)
        .build()
        .or(Err(Error::InternalError))?;

    Ok(model::Session {
        api: model::Api {
            api_url,
            username,
            password,
        },
        client,
        token: None,
        station: None,
        data: model::StationData::default(),
    })
}

fn epoch_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| String::from("0"))
}

/// Map non-2xx API response to Error
fn map_api_err(error: reqwest::Error) -> Error {
    match error.status() {
        Some(http::StatusCode::TOO_MANY_REQUESTS) => Error::RateExceeded(error.to_string()),
        Some(http::StatusCode::UNAUTHORIZED) => Error::LoginError(error.to_string()),
        _ => Error::ApiError(error.to_string()),
    }
}

/// Check the application-level `code` of a decoded envelope and extract its
/// `data`. Any non-zero code is an error even under HTTP 200.
fn unwrap_envelope<T>(envelope: Envelope<T>) -> Result<T, Error> {
    /* {"code":10021,"msg":"account or password error","data":null} */
    if envelope.code != 0 {
        return Err(Error::ApiError(format!(
            "Error {}: {}",
            envelope.code,
            envelope
                .msg
                .unwrap_or_else(|| "(no error message received)".to_string())
        )));
    }
    envelope.data.ok_or(Error::UnexpectedApiResponse)
}

/// Exchange credentials for a bearer token and cache it on the session.
/// All failure modes collapse into `false`.
pub async fn authenticate(session: &mut model::Session) -> bool {
    match oauth_token(session).await {
        Ok(token) => {
            log::info!("Authenticated to {}", session.api.api_url);
            session.token = Some(token);
            true
        }
        Err(e) => {
            log::error!("Authentication failed: {:?}", e);
            false
        }
    }
}

async fn oauth_token(session: &model::Session) -> Result<String, Error> {
    let url = format!("{}{}", session.api.api_url, endpoint::OAUTH_TOKEN);

    /* `userDeviceId` only has to be unique per login, the app derives it
    from the wall clock */
    let request_body = HashMap::from([
        ("scope", String::from("server")),
        ("grant_type", String::from("password")),
        ("userDeviceId", epoch_millis()),
        ("username", session.api.username.to_owned()),
        ("password", session.api.password.to_owned()),
    ]);

    let response_text = session
        .client
        .post(url)
        .form(&request_body)
        .header("Authorization", BASIC_AUTH)
        .header("Auth-Client-Id", AUTH_CLIENT_ID)
        .header("Sg-V", PROTOCOL_VERSION)
        .header("Sg-Ts", epoch_millis())
        .send()
        .await
        .map_err(map_api_err)?
        .error_for_status()
        .map_err(map_api_err)?
        .text()
        .await
        .map_err(|e| Error::ApiError(format!("Error reading API response: {}", e)))?;

    log::trace!(
        "endpoint: {}, response_text: {}",
        endpoint::OAUTH_TOKEN,
        response_text
    );

    serde_json::from_str::<Envelope<TokenData>>(&response_text)
        .map_err(|e| Error::InvalidResponse(response_text, e.to_string()))
        .map(unwrap_envelope)?
        .map(|data| data.access_token)
}

/// Authenticated GET returning the envelope's `data` member.
async fn get(
    session: &model::Session,
    endpoint: &endpoint::Endpoint,
    query: &HashMap<&str, String>,
) -> Result<Value, Error> {
    let url = format!("{}{}", session.api.api_url, endpoint);
    let token = session.token.as_ref().ok_or(Error::InternalError)?;

    let response_text = session
        .client
        .get(url)
        .query(query)
        .header("Authorization", format!("Bearer {}", token))
        .header("Auth-Client-Id", AUTH_CLIENT_ID)
        .header("Sg-V", PROTOCOL_VERSION)
        .header("Sg-Ts", epoch_millis())
        .header("TENANT-ID", TENANT_ID)
        .send()
        .await
        .map_err(map_api_err)?
        .error_for_status()
        .map_err(map_api_err)?
        .text()
        .await
        .map_err(|e| Error::ApiError(format!("Error reading API response: {}", e)))?;

    log::trace!(
        "endpoint: {}, query: {:?}, response_text: {}",
        endpoint,
        query,
        response_text
    );

    serde_json::from_str::<Envelope<Value>>(&response_text)
        .map_err(|e| Error::InvalidResponse(response_text, e.to_string()))
        .map(unwrap_envelope)?
}

async fn fetch_station(session: &model::Session) -> Result<String, Error> {
    get(session, endpoint::HOME_STATION, &HashMap::new())
        .await
        .map(serde_json::from_value::<HomeStation>)?
        .or(Err(Error::UnexpectedApiResponse))
        .map(|home| home.station_id.0)
}

async fn fetch_energy_flow(
    session: &model::Session,
    station: &str,
) -> Result<model::EnergyFlow, Error> {
    let query = HashMap::from([
        ("id", String::from(station)),
        ("refreshFlag", String::from("true")),
    ]);

    get(session, endpoint::ENERGY_FLOW, &query)
        .await
        .map(serde_json::from_value::<energy_flow::EnergyFlow>)?
        .or(Err(Error::UnexpectedApiResponse))
        .map(|flow| model::EnergyFlow {
            battery_soc: flow.battery_soc,
            battery_power: flow.battery_power,
            pv_power: flow.pv_power,
            buy_sell_power: flow.buy_sell_power,
            load_power: flow.load_power,
        })
}

async fn fetch_statistics(
    session: &model::Session,
    station: &str,
) -> Result<model::Generation, Error> {
    let query = HashMap::from([("stationId", String::from(station))]);

    get(session, endpoint::STATISTICS, &query)
        .await
        .map(serde_json::from_value::<Gains>)?
        .or(Err(Error::UnexpectedApiResponse))
        .map(|gains| model::Generation {
            day: gains.day_generation,
            month: gains.month_generation,
            year: gains.year_generation,
            lifetime: gains.lifetime_generation,
        })
}

/// Run one best-effort update cycle: authenticate when no token is held,
/// resolve the home station when unknown, then fetch both data payloads.
///
/// Never propagates a failure; on any fault the previously cached payloads
/// stay in place. The token is not invalidated by a rejected data call.
pub async fn refresh(session: &mut model::Session) {
    if session.token.is_none() && !authenticate(session).await {
        return;
    }

    if session.station.is_none() {
        match fetch_station(session).await {
            Ok(station) => {
                log::info!("Resolved home station {}", station);
                session.station = Some(station);
            }
            Err(e) => {
                log::error!("Unable to resolve home station: {:?}", e);
                return;
            }
        }
    }

    let station = match session.station.clone() {
        Some(station) => station,
        None => return,
    };

    match fetch_energy_flow(session, &station).await {
        Ok(flow) => session.data.energy_flow = Some(flow),
        Err(e) => log::error!("Energy flow fetch failed: {:?}", e),
    }

    match fetch_statistics(session, &station).await {
        Ok(gains) => session.data.statistics = Some(gains),
        Err(e) => log::error!("Statistics fetch failed: {:?}", e),
    }
}

/// Fetch both data payloads once and return their raw JSON keyed by name,
/// for discovering fields not yet read anywhere. Unlike `refresh`, errors
/// propagate to the caller.
pub async fn dump_data(
    session: &mut model::Session,
) -> Result<HashMap<&'static str, Value>, Error> {
    if session.token.is_none() && !authenticate(session).await {
        return Err(Error::LoginError(String::from("authentication failed")));
    }

    if session.station.is_none() {
        session.station = Some(fetch_station(session).await?);
    }

    let station = session.station.clone().ok_or(Error::InternalError)?;

    let flow_query = HashMap::from([
        ("id", station.to_owned()),
        ("refreshFlag", String::from("true")),
    ]);
    let gains_query = HashMap::from([("stationId", station)]);

    let mut dump: HashMap<&'static str, Value> = HashMap::new();
    dump.insert(
        "energyflow",
        get(session, endpoint::ENERGY_FLOW, &flow_query).await?,
    );
    dump.insert(
        "statistics",
        get(session, endpoint::STATISTICS, &gains_query).await?,
    );

    Ok(dump)
}

#[cfg(test)]
mod test {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn test_session(server: &ServerGuard) -> model::Session {
        session(
            server.url(),
            String::from("user@example.com"),
            String::from("hunter2"),
        )
        .unwrap()
    }

    fn token_body() -> String {
        serde_json::json!({
            "code": 0,
            "msg": "success",
            "data": {
                "access_token": "test-access-token",
                "token_type": "bearer",
                "expires_in": 43199
            }
        })
        .to_string()
    }

    fn station_body() -> String {
        serde_json::json!({
            "code": 0,
            "msg": "success",
            "data": { "stationId": 20934857, "stationName": "Home" }
        })
        .to_string()
    }

    fn energy_flow_body() -> String {
        serde_json::json!({
            "code": 0,
            "msg": "success",
            "data": {
                "batterySoc": 55.5,
                "batteryPower": -3500.0,
                "pvPower": 6000.0,
                "buySellPower": -2000.0,
                "loadPower": 500.0
            }
        })
        .to_string()
    }

    fn statistics_body(day: f64) -> String {
        serde_json::json!({
            "code": 0,
            "msg": "success",
            "data": {
                "dayGeneration": day,
                "monthGeneration": 305.4,
                "yearGeneration": 3120.8,
                "lifetimeGeneration": 10250.3
            }
        })
        .to_string()
    }

    #[test]
    fn unwrap_envelope_gates_on_code() {
        let ok: Envelope<Value> =
            serde_json::from_value(serde_json::json!({"code": 0, "msg": "success", "data": {"a": 1}}))
                .unwrap();
        assert!(unwrap_envelope(ok).is_ok());

        let rejected: Envelope<Value> = serde_json::from_value(
            serde_json::json!({"code": 10021, "msg": "account or password error", "data": null}),
        )
        .unwrap();
        match unwrap_envelope(rejected) {
            Err(Error::ApiError(msg)) => assert!(msg.contains("10021")),
            other => panic!("unexpected result: {:?}", other),
        }

        let empty: Envelope<Value> =
            serde_json::from_value(serde_json::json!({"code": 0, "msg": "success", "data": null}))
                .unwrap();
        match unwrap_envelope(empty) {
            Err(Error::UnexpectedApiResponse) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn authenticate_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/oauth/token")
            .match_header("authorization", BASIC_AUTH)
            .match_header("auth-client-id", "sigen")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "password".into()),
                Matcher::UrlEncoded("scope".into(), "server".into()),
                Matcher::UrlEncoded("username".into(), "user@example.com".into()),
                Matcher::UrlEncoded("password".into(), "hunter2".into()),
            ]))
            .with_status(200)
            .with_body(token_body())
            .create_async()
            .await;

        let mut session = test_session(&server);
        assert!(authenticate(&mut session).await);
        assert_eq!(Some(String::from("test-access-token")), session.token);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn authenticate_rejected_by_application_code() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/oauth/token")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "code": 10021,
                    "msg": "account or password error",
                    "data": null
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut session = test_session(&server);
        assert!(!authenticate(&mut session).await);
        assert_eq!(None, session.token);
    }

    #[tokio::test]
    async fn refresh_with_failing_authentication_leaves_data_untouched() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/oauth/token")
            .with_status(401)
            .create_async()
            .await;
        let station_mock = server
            .mock("GET", "/device/owner/station/home")
            .expect(0)
            .create_async()
            .await;

        let mut session = test_session(&server);
        session.data.energy_flow = Some(model::EnergyFlow {
            battery_soc: Some(55.0),
            ..Default::default()
        });

        refresh(&mut session).await;

        assert_eq!(None, session.token);
        assert_eq!(None, session.station);
        assert_eq!(
            Some(55.0),
            session.data.energy_flow.as_ref().unwrap().battery_soc
        );
        station_mock.assert_async().await;
    }

    #[tokio::test]
    async fn station_is_resolved_once() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/auth/oauth/token")
            .with_body(token_body())
            .create_async()
            .await;
        let station_mock = server
            .mock("GET", "/device/owner/station/home")
            .match_header("authorization", "Bearer test-access-token")
            .match_header("tenant-id", "1")
            .with_body(station_body())
            .create_async()
            .await;
        server
            .mock("GET", "/device/sigen/station/energyflow/async")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id".into(), "20934857".into()),
                Matcher::UrlEncoded("refreshFlag".into(), "true".into()),
            ]))
            .with_body(energy_flow_body())
            .expect(2)
            .create_async()
            .await;
        server
            .mock("GET", "/data-process/sigen/station/statistics/gains")
            .match_query(Matcher::UrlEncoded("stationId".into(), "20934857".into()))
            .with_body(statistics_body(12.5))
            .expect(2)
            .create_async()
            .await;

        let mut session = test_session(&server);
        refresh(&mut session).await;
        refresh(&mut session).await;

        assert_eq!(Some(String::from("20934857")), session.station);
        assert_eq!(
            Some(-3500.0),
            session.data.energy_flow.as_ref().unwrap().battery_power
        );
        assert_eq!(Some(12.5), session.data.statistics.as_ref().unwrap().day);

        /* both mocks expect exactly one call across the two refreshes */
        token_mock.assert_async().await;
        station_mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_payload() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/oauth/token")
            .with_body(token_body())
            .create_async()
            .await;
        server
            .mock("GET", "/device/owner/station/home")
            .with_body(station_body())
            .create_async()
            .await;
        let flow_mock = server
            .mock("GET", "/device/sigen/station/energyflow/async")
            .match_query(Matcher::Any)
            .with_body(energy_flow_body())
            .create_async()
            .await;
        let gains_mock = server
            .mock("GET", "/data-process/sigen/station/statistics/gains")
            .match_query(Matcher::Any)
            .with_body(statistics_body(12.5))
            .create_async()
            .await;

        let mut session = test_session(&server);
        refresh(&mut session).await;
        assert_eq!(Some(12.5), session.data.statistics.as_ref().unwrap().day);

        /* second cycle: energy flow starts failing, statistics moves on */
        flow_mock.remove_async().await;
        gains_mock.remove_async().await;
        server
            .mock("GET", "/device/sigen/station/energyflow/async")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("GET", "/data-process/sigen/station/statistics/gains")
            .match_query(Matcher::Any)
            .with_body(statistics_body(13.0))
            .create_async()
            .await;

        refresh(&mut session).await;

        let flow = session.data.energy_flow.as_ref().unwrap();
        assert_eq!(Some(55.5), flow.battery_soc);
        assert_eq!(Some(-3500.0), flow.battery_power);
        assert_eq!(Some(13.0), session.data.statistics.as_ref().unwrap().day);
    }

    #[tokio::test]
    async fn rejected_token_is_not_renewed() {
        let mut server = Server::new_async().await;
        let token_mock = server
            .mock("POST", "/auth/oauth/token")
            .with_body(token_body())
            .create_async()
            .await;
        server
            .mock("GET", "/device/owner/station/home")
            .with_body(station_body())
            .create_async()
            .await;
        let flow_mock = server
            .mock("GET", "/device/sigen/station/energyflow/async")
            .match_query(Matcher::Any)
            .with_body(energy_flow_body())
            .create_async()
            .await;
        let gains_mock = server
            .mock("GET", "/data-process/sigen/station/statistics/gains")
            .match_query(Matcher::Any)
            .with_body(statistics_body(12.5))
            .create_async()
            .await;

        let mut session = test_session(&server);
        refresh(&mut session).await;

        flow_mock.remove_async().await;
        gains_mock.remove_async().await;
        server
            .mock("GET", "/device/sigen/station/energyflow/async")
            .match_query(Matcher::Any)
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/data-process/sigen/station/statistics/gains")
            .match_query(Matcher::Any)
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        refresh(&mut session).await;

        assert_eq!(Some(String::from("test-access-token")), session.token);
        assert_eq!(
            Some(55.5),
            session.data.energy_flow.as_ref().unwrap().battery_soc
        );
        assert_eq!(Some(12.5), session.data.statistics.as_ref().unwrap().day);
        /* the rejected calls did not trigger a second token exchange */
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn dump_data_returns_raw_payloads() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/oauth/token")
            .with_body(token_body())
            .create_async()
            .await;
        server
            .mock("GET", "/device/owner/station/home")
            .with_body(station_body())
            .create_async()
            .await;
        server
            .mock("GET", "/device/sigen/station/energyflow/async")
            .match_query(Matcher::Any)
            .with_body(energy_flow_body())
            .create_async()
            .await;
        server
            .mock("GET", "/data-process/sigen/station/statistics/gains")
            .match_query(Matcher::Any)
            .with_body(statistics_body(12.5))
            .create_async()
            .await;

        let mut session = test_session(&server);
        let dump = dump_data(&mut session).await.unwrap();

        assert_eq!(
            Some(55.5),
            dump["energyflow"].get("batterySoc").and_then(Value::as_f64)
        );
        assert_eq!(
            Some(12.5),
            dump["statistics"]
                .get("dayGeneration")
                .and_then(Value::as_f64)
        );
    }
}
