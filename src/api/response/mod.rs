pub mod energy_flow;
pub mod home_station;
pub mod oauth_token;
pub mod statistics;

use serde::Deserialize;

/* Generic response envelope: every endpoint wraps its payload in
{"code": <int>, "msg": <string>, "data": <object>} */
#[derive(Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    pub msg: Option<String>,
    pub data: Option<T>,
}
