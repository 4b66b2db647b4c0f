//! Form strings handed to the engine's script-based authentication.

use url::form_urlencoded::byte_serialize;

use crate::error::{Result, ZapError};
use crate::model::AuthenticationStep;

/// Authentication script installed on the engine side.
pub const AUTH_SCRIPT_NAME: &str = "common-auth-json";
pub const AUTH_METHOD_NAME: &str = "scriptBasedAuthentication";

/// Placeholder identity of the single scan user.
pub const SCAN_USER_NAME: &str = "username";
pub const SCAN_USER_PASSWORD: &str = "password";

pub fn form_encode(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

/// JSON array of steps. `method` and `url` are always present, the other
/// fields only when non-blank.
pub fn steps_json(steps: &[AuthenticationStep]) -> Result<String> {
    serde_json::to_string(steps).map_err(|e| ZapError::Encoding(e.to_string()))
}

/// `scriptName=<script>&AuthenticationSteps=<form-encoded steps JSON>`.
pub fn method_config(steps: &[AuthenticationStep]) -> Result<String> {
    let json = steps_json(steps)?;
    Ok(format!("scriptName={}&AuthenticationSteps={}", AUTH_SCRIPT_NAME, form_encode(&json)))
}

pub fn credentials_config(username: &str, password: &str) -> String {
    format!("Username={}&Password={}", form_encode(username), form_encode(password))
}
