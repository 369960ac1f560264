//! Response envelope handling
//!
//! Every open-apis endpoint answers `{code, msg, data?}`; a non-zero `code` is a
//! failure even when the HTTP status is 200. Error responses with a 4xx status
//! usually carry the same envelope, which is preferred over the bare status.

use super::client::METADATA_TIMEOUT;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Read a response body and fail on a non-zero envelope code
pub async fn read_body(result: Result<Response>) -> Result<JsonValue> {
    read_body_within(result, METADATA_TIMEOUT).await
}

/// [`read_body`] for a request sent with `timeout`
pub async fn read_body_within(result: Result<Response>, timeout: Duration) -> Result<JsonValue> {
    let response = result.map_err(api_error_from_status)?;
    let body: JsonValue = response
        .json()
        .await
        .map_err(|e| body_error(e, timeout))?;
    check_code(&body)?;
    Ok(body)
}

/// Read a response and deserialize its `data` member
pub async fn read_data<T: DeserializeOwned>(result: Result<Response>) -> Result<T> {
    take_data(read_body(result).await?)
}

/// [`read_data`] for a request sent with `timeout`
pub async fn read_data_within<T: DeserializeOwned>(
    result: Result<Response>,
    timeout: Duration,
) -> Result<T> {
    take_data(read_body_within(result, timeout).await?)
}

/// Classify a failure while reading a response body
///
/// The request timeout also bounds the body, so an elapsed timer is reported as
/// [`Error::Timeout`] rather than a decode failure.
pub fn body_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if err.is_decode() {
        Error::decode(format!("invalid JSON response: {err}"))
    } else {
        Error::Http(err)
    }
}

/// Fail with [`Error::Api`] if the envelope reports a non-zero code
pub fn check_code(body: &JsonValue) -> Result<()> {
    let code = body.get("code").and_then(JsonValue::as_i64).unwrap_or(0);
    if code == 0 {
        return Ok(());
    }
    let msg = body
        .get("msg")
        .and_then(JsonValue::as_str)
        .unwrap_or("unknown error");
    Err(Error::api(code, msg))
}

/// Deserialize the `data` member of an envelope (missing `data` reads as null)
pub fn take_data<T: DeserializeOwned>(mut body: JsonValue) -> Result<T> {
    let data = body
        .get_mut("data")
        .map(JsonValue::take)
        .unwrap_or(JsonValue::Null);
    serde_json::from_value(data).map_err(|e| Error::decode(format!("unexpected data shape: {e}")))
}

/// Turn an HTTP status error carrying an envelope into an API error
pub fn api_error_from_status(err: Error) -> Error {
    if let Error::HttpStatus { body, .. } = &err {
        if let Ok(envelope) = serde_json::from_str::<JsonValue>(body) {
            if let Err(api) = check_code(&envelope) {
                return api;
            }
        }
    }
    err
}
