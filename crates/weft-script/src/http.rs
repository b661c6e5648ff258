//! Blocking HTTP helpers exposed to scripts.
//!
//! Requests carry a fixed 30-second deadline independent of run cancellation.
//! Non-string bodies are JSON-encoded; `Content-Type: application/json` is
//! defaulted when the caller supplies no content type.

use std::time::Duration;

use serde_json::{Map, Value, json};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn request(
  method: &str,
  url: &str,
  body: Option<Value>,
  headers: Option<&Map<String, Value>>,
) -> Result<Value, String> {
  let client = reqwest::blocking::Client::builder()
    .timeout(HTTP_TIMEOUT)
    .build()
    .map_err(|e| e.to_string())?;

  let method = reqwest::Method::from_bytes(method.as_bytes())
    .map_err(|_| format!("invalid HTTP method '{method}'"))?;
  let mut request = client.request(method, url);

  let caller_sets_content_type = headers
    .map(|h| h.keys().any(|k| k.eq_ignore_ascii_case("content-type")))
    .unwrap_or(false);

  if let Some(body) = body {
    request = match body {
      Value::String(s) => {
        if caller_sets_content_type {
          request.body(s)
        } else {
          request.header("content-type", "application/json").body(s)
        }
      }
      other => request
        .header("content-type", "application/json")
        .body(serde_json::to_string(&other).map_err(|e| e.to_string())?),
    };
  }

  if let Some(headers) = headers {
    for (key, value) in headers {
      let value = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
      };
      request = request.header(key.as_str(), value);
    }
  }

  let response = request.send().map_err(|e| e.to_string())?;
  let status = response.status().as_u16();

  let mut header_map = Map::new();
  for (name, value) in response.headers() {
    header_map.insert(
      name.to_string(),
      Value::String(value.to_str().unwrap_or_default().to_string()),
    );
  }

  let text = response.text().map_err(|e| e.to_string())?;
  let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

  Ok(json!({
    "status": status,
    "headers": header_map,
    "body": body,
  }))
}
