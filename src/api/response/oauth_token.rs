use serde::Deserialize;

/* Password-grant token exchange payload. Only the access token is consumed;
the token is kept for the process lifetime so the refresh token is unused. */
#[derive(Deserialize)]
pub struct TokenData {
    pub access_token: String,
}
