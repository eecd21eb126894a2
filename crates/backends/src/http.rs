//! Minimal JSON-over-HTTP client shared by the backend adapters.

use std::time::Duration;

use notebridge_core::{BackendError, NoteId};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, trace, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A `reqwest` client bound to one API base URL.
#[derive(Clone)]
pub struct JsonClient {
    base_url: String,
    client: reqwest::Client,
}

impl JsonClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and parse the response body as JSON.
    ///
    /// 401/403 map to [`BackendError::AuthenticationFailed`], any other
    /// non-2xx status to [`BackendError::Api`]. A body that is not JSON is
    /// logged and reported as [`BackendError::MalformedResponse`]; an empty
    /// body yields `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: &[(&str, String)],
    ) -> Result<Value, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.clone(), &url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        trace!(%method, %url, "Sending backend request");
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if status == 401 || status == 403 {
            return Err(BackendError::AuthenticationFailed(format!(
                "{method} {path} returned {status}"
            )));
        }

        if !(200..300).contains(&status) {
            warn!(status, %url, body = %text, "Backend returned error");
            return Err(BackendError::Api {
                status_code: status,
                message: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            error!(%url, body = %text, "Wrong JSON answer");
            BackendError::MalformedResponse(format!("{method} {path}: {e}"))
        })
    }
}

/// Decode a JSON value into a typed answer, logging schema mismatches.
pub fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, BackendError> {
    serde_json::from_value(value).map_err(|e| {
        error!(answer = what, error = %e, "Unexpected response schema");
        BackendError::MalformedResponse(format!("{what}: {e}"))
    })
}

/// The `id` of a page or row. Strings must be non-empty; numbers are
/// rendered as decimal. Anything else is a schema mismatch.
pub fn note_id(item: &Value, what: &str) -> Result<NoteId, BackendError> {
    match item.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Ok(NoteId(s.clone())),
        Some(Value::Number(n)) => Ok(NoteId(n.to_string())),
        other => {
            error!(answer = what, id = ?other, "Note without a usable id");
            Err(BackendError::MalformedResponse(format!(
                "{what}: note has no usable id"
            )))
        }
    }
}

/// Loose boolean reading for checkbox-like fields: `true`, non-zero
/// numbers and the strings `"1"` / `"true"` count as set.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// First string of a field that is either a string or an array of strings.
pub fn first_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => items.first().and_then(|v| v.as_str()).map(str::to_string),
        _ => None,
    }
}
