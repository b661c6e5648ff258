//! The `http_request` node.
//!
//! URL, method, body, and every header are templates rendered against the
//! `data` inputs overlaid by `values` inputs. Bad statuses route to the
//! `error` port instead of failing the run; only transport failures are
//! fatal.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use weft_config::node_type;
use weft_runtime::{
  DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config, port,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_method() -> String {
  "GET".to_string()
}

fn default_timeout() -> u64 {
  DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Deserialize)]
pub struct HttpRequestNode {
  url: String,
  #[serde(default = "default_method")]
  method: String,
  /// Header values are templates.
  #[serde(default)]
  headers: BTreeMap<String, String>,
  /// Body template. When absent on POST/PUT/PATCH, the `data` input is
  /// JSON-encoded as the body.
  #[serde(default)]
  body: Option<String>,
  #[serde(default = "default_timeout")]
  timeout: u64,
  #[serde(default)]
  proxy: Option<String>,
  #[serde(default)]
  insecure_skip_verify: bool,
  /// Additional attempts after a transport failure.
  #[serde(default)]
  retry: u32,
}

impl HttpRequestNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::HTTP_REQUEST, data)
  }

  fn client(&self) -> Result<reqwest::Client, NodeError> {
    let mut builder = reqwest::Client::builder()
      .timeout(Duration::from_secs(self.timeout))
      .danger_accept_invalid_certs(self.insecure_skip_verify);
    if let Some(proxy) = &self.proxy {
      let proxy = reqwest::Proxy::all(proxy)
        .map_err(|e| NodeError::config(format!("invalid proxy '{proxy}': {e}")))?;
      builder = builder.proxy(proxy);
    }
    builder
      .build()
      .map_err(|e| NodeError::runtime(format!("http client: {e}")))
  }
}

#[async_trait]
impl WorkflowNode for HttpRequestNode {
  fn type_name(&self) -> &'static str {
    node_type::HTTP_REQUEST
  }

  async fn validate(&self, _registry: &Registry) -> Result<(), NodeError> {
    if self.url.is_empty() {
      return Err(NodeError::config("http_request requires a url"));
    }
    if let Some(proxy) = &self.proxy {
      reqwest::Proxy::all(proxy)
        .map_err(|e| NodeError::config(format!("invalid proxy '{proxy}': {e}")))?;
    }
    Ok(())
  }

  async fn run(
    &self,
    registry: &Registry,
    inputs: DataMap,
    cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let variables = &registry.services().variables;
    let context = weft_template::overlay_context(&inputs);

    let url = weft_template::render(&self.url, &context, variables)
      .map_err(|e| NodeError::runtime(format!("url template: {e}")))?;
    let method_text = weft_template::render(&self.method, &context, variables)
      .map_err(|e| NodeError::runtime(format!("method template: {e}")))?;
    let method = reqwest::Method::from_bytes(method_text.to_ascii_uppercase().as_bytes())
      .map_err(|_| NodeError::config(format!("invalid HTTP method '{method_text}'")))?;

    let headers = weft_template::render_map(&self.headers, &context, variables)
      .map_err(|e| NodeError::runtime(format!("header template: {e}")))?;

    let body = match &self.body {
      Some(template) => {
        let rendered = weft_template::render(template, &context, variables)
          .map_err(|e| NodeError::runtime(format!("body template: {e}")))?;
        Some(RequestBody::Text(rendered))
      }
      None => {
        let write_method = method == reqwest::Method::POST
          || method == reqwest::Method::PUT
          || method == reqwest::Method::PATCH;
        match (write_method, inputs.get("data")) {
          (true, Some(data)) => Some(RequestBody::Json(data.clone())),
          _ => None,
        }
      }
    };

    let client = self.client()?;
    let attempts = self.retry + 1;
    let mut last_error = String::new();

    for attempt in 0..attempts {
      let mut request = client.request(method.clone(), &url);
      if let Some(body) = &body {
        request = match body {
          RequestBody::Text(text) => request.body(text.clone()),
          RequestBody::Json(value) => request.json(value),
        };
      }
      for (key, value) in &headers {
        request = request.header(key.as_str(), value.as_str());
      }

      let response = tokio::select! {
        result = request.send() => result,
        _ = cancel.cancelled() => return Err(NodeError::runtime("cancelled")),
      };

      match response {
        Ok(response) => {
          let status = response.status().as_u16();

          let mut header_map = DataMap::new();
          for (name, value) in response.headers() {
            header_map.insert(
              name.to_string(),
              Value::String(value.to_str().unwrap_or_default().to_string()),
            );
          }

          let text = response
            .text()
            .await
            .map_err(|e| NodeError::runtime(format!("response read: {e}")))?;
          let parsed: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

          debug!(status, url = %url, "http_request completed");

          let ports = status_ports(status);
          let mut data = inputs;
          data.insert("response".to_string(), parsed);
          data.insert("status_code".to_string(), status.into());
          data.insert("headers".to_string(), Value::Object(header_map));
          return Ok(NodeOutput::selection(data, ports));
        }
        Err(e) => {
          last_error = e.to_string();
          if attempt + 1 < attempts {
            debug!(attempt, url = %url, error = %last_error, "http_request retrying");
          }
        }
      }
    }

    Err(NodeError::runtime(format!("request to {url} failed: {last_error}")))
  }
}

enum RequestBody {
  Text(String),
  Json(Value),
}

/// `always` fires unconditionally; `success` on 2xx; `error` from 400 up.
/// Redirect-range statuses activate neither outcome port.
fn status_ports(status: u16) -> Vec<&'static str> {
  let mut ports = vec![port::ALWAYS];
  if (200..300).contains(&status) {
    ports.push(port::SUCCESS);
  } else if status >= 400 {
    ports.push(port::ERROR);
  }
  ports
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use weft_runtime::Services;

  #[tokio::test]
  async fn test_missing_url_fails_validate() {
    let node = HttpRequestNode::from_data(&{
      let mut data = DataMap::new();
      data.insert("url".to_string(), json!(""));
      data
    })
    .unwrap();
    let registry = Registry::new(Services::default(), DataMap::new());
    assert!(node.validate(&registry).await.unwrap_err().is_config());
  }

  #[tokio::test]
  async fn test_invalid_proxy_fails_validate() {
    let mut data = DataMap::new();
    data.insert("url".to_string(), json!("https://example.test"));
    data.insert("proxy".to_string(), json!("::not a proxy::"));
    let node = HttpRequestNode::from_data(&data).unwrap();
    let registry = Registry::new(Services::default(), DataMap::new());
    assert!(node.validate(&registry).await.unwrap_err().is_config());
  }

  #[test]
  fn test_status_ports_boundaries() {
    assert_eq!(status_ports(200), vec!["always", "success"]);
    assert_eq!(status_ports(299), vec!["always", "success"]);
    // 199 and 3xx fire neither outcome port.
    assert_eq!(status_ports(199), vec!["always"]);
    assert_eq!(status_ports(302), vec!["always"]);
    assert_eq!(status_ports(400), vec!["always", "error"]);
    assert_eq!(status_ports(500), vec!["always", "error"]);
  }

  #[test]
  fn test_defaults() {
    let mut data = DataMap::new();
    data.insert("url".to_string(), json!("https://example.test"));
    let node = HttpRequestNode::from_data(&data).unwrap();
    assert_eq!(node.method, "GET");
    assert_eq!(node.timeout, 30);
    assert_eq!(node.retry, 0);
    assert!(!node.insecure_skip_verify);
  }
}
