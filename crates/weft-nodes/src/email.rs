//! The `email` node: sends one message through a stored SMTP configuration.
//!
//! Send failures route to the `error` port as `status: "failed"`; only a
//! missing or undecodable stored configuration is fatal.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use weft_config::node_type;
use weft_runtime::{
  DataMap, NodeError, NodeOutput, Registry, WorkflowNode, parse_node_config, port,
};

fn default_content_type() -> String {
  "text/plain".to_string()
}

#[derive(Debug, Deserialize)]
pub struct EmailNode {
  /// References a stored node config of type `email`.
  config_id: String,
  #[serde(default)]
  to: String,
  #[serde(default)]
  cc: String,
  #[serde(default)]
  bcc: String,
  #[serde(default)]
  subject: String,
  #[serde(default)]
  body: String,
  #[serde(default)]
  from: String,
  #[serde(default)]
  reply_to: String,
  #[serde(default = "default_content_type")]
  content_type: String,
}

/// Decoded SMTP parameters from the stored node config.
#[derive(Debug, Deserialize)]
struct SmtpParams {
  host: String,
  #[serde(default = "default_smtp_port")]
  port: u16,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
  #[serde(default)]
  from: String,
  #[serde(default)]
  tls: TlsMode,
  #[serde(default)]
  insecure_skip_verify: bool,
  #[serde(default)]
  proxy: Option<String>,
}

fn default_smtp_port() -> u16 {
  587
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TlsMode {
  /// TLS from the first byte (SMTPS).
  Implicit,
  /// Plain connection upgraded via STARTTLS.
  #[default]
  Starttls,
  None,
}

impl EmailNode {
  pub fn from_data(data: &DataMap) -> Result<Self, NodeError> {
    parse_node_config(node_type::EMAIL, data)
  }

  fn smtp_params(&self, registry: &Registry) -> Result<SmtpParams, NodeError> {
    let stored = registry
      .services()
      .node_configs
      .get(&self.config_id)
      .map_err(|_| NodeError::config(format!("unknown node config '{}'", self.config_id)))?;
    if stored.config_type != "email" {
      return Err(NodeError::config(format!(
        "node config '{}' has type '{}', expected 'email'",
        self.config_id, stored.config_type
      )));
    }
    serde_json::from_str(&stored.data)
      .map_err(|e| NodeError::config(format!("invalid email config '{}': {e}", self.config_id)))
  }

  fn transport(&self, params: &SmtpParams) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
    if params.proxy.is_some() {
      // lettre exposes no dial hook for CONNECT tunneling.
      warn!(config_id = %self.config_id, "email proxy configured but not supported; connecting directly");
    }

    let mut builder =
      AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&params.host).port(params.port);

    builder = match params.tls {
      TlsMode::None => builder.tls(Tls::None),
      mode => {
        let tls = TlsParameters::builder(params.host.clone())
          .dangerous_accept_invalid_certs(params.insecure_skip_verify)
          .build()
          .map_err(|e| format!("tls setup: {e}"))?;
        match mode {
          TlsMode::Implicit => builder.tls(Tls::Wrapper(tls)),
          _ => builder.tls(Tls::Required(tls)),
        }
      }
    };

    if !params.username.is_empty() {
      builder = builder.credentials(Credentials::new(
        params.username.clone(),
        params.password.clone(),
      ));
    }

    Ok(builder.build())
  }

  fn build_message(
    &self,
    params: &SmtpParams,
    fields: &RenderedFields,
  ) -> Result<Message, String> {
    let from = if fields.from.is_empty() { &params.from } else { &fields.from };
    let from: Mailbox = from
      .parse()
      .map_err(|e| format!("invalid from address '{from}': {e}"))?;

    let mut builder = Message::builder().from(from).subject(fields.subject.clone());

    if !fields.reply_to.is_empty() {
      builder = builder.reply_to(
        fields
          .reply_to
          .parse()
          .map_err(|e| format!("invalid reply_to address: {e}"))?,
      );
    }
    for to in address_list(&fields.to) {
      builder = builder.to(to.parse().map_err(|e| format!("invalid to address '{to}': {e}"))?);
    }
    for cc in address_list(&fields.cc) {
      builder = builder.cc(cc.parse().map_err(|e| format!("invalid cc address '{cc}': {e}"))?);
    }
    for bcc in address_list(&fields.bcc) {
      builder =
        builder.bcc(bcc.parse().map_err(|e| format!("invalid bcc address '{bcc}': {e}"))?);
    }

    let content_type = ContentType::parse(&self.content_type)
      .map_err(|e| format!("invalid content type '{}': {e}", self.content_type))?;

    builder
      .header(content_type)
      .body(fields.body.clone())
      .map_err(|e| format!("message build: {e}"))
  }
}

struct RenderedFields {
  to: String,
  cc: String,
  bcc: String,
  subject: String,
  body: String,
  from: String,
  reply_to: String,
}

fn address_list(text: &str) -> Vec<&str> {
  text
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect()
}

#[async_trait]
impl WorkflowNode for EmailNode {
  fn type_name(&self) -> &'static str {
    node_type::EMAIL
  }

  async fn validate(&self, registry: &Registry) -> Result<(), NodeError> {
    if self.config_id.is_empty() {
      return Err(NodeError::config("email requires a config_id"));
    }
    self.smtp_params(registry)?;
    Ok(())
  }

  async fn run(
    &self,
    registry: &Registry,
    inputs: DataMap,
    cancel: &CancellationToken,
  ) -> Result<NodeOutput, NodeError> {
    let params = self.smtp_params(registry)?;

    let variables = &registry.services().variables;
    let context = weft_template::overlay_context(&inputs);
    let render = |template: &str, what: &str| {
      weft_template::render(template, &context, variables)
        .map_err(|e| NodeError::runtime(format!("{what} template: {e}")))
    };

    let fields = RenderedFields {
      to: render(&self.to, "to")?,
      cc: render(&self.cc, "cc")?,
      bcc: render(&self.bcc, "bcc")?,
      subject: render(&self.subject, "subject")?,
      body: render(&self.body, "body")?,
      from: render(&self.from, "from")?,
      reply_to: render(&self.reply_to, "reply_to")?,
    };

    let outcome = async {
      let message = self.build_message(&params, &fields)?;
      let transport = self.transport(&params)?;
      tokio::select! {
        result = transport.send(message) => result.map_err(|e| format!("smtp send: {e}")),
        _ = cancel.cancelled() => Err("cancelled".to_string()),
      }
    }
    .await;

    let mut data = DataMap::new();
    let ports = match outcome {
      Ok(_) => {
        debug!(config_id = %self.config_id, "email sent");
        data.insert("status".to_string(), "sent".into());
        vec![port::ALWAYS, port::SUCCESS]
      }
      Err(error) => {
        warn!(config_id = %self.config_id, error = %error, "email send failed");
        data.insert("status".to_string(), "failed".into());
        data.insert("error".to_string(), error.into());
        vec![port::ALWAYS, port::ERROR]
      }
    };

    Ok(NodeOutput::selection(data, ports))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::Arc;
  use weft_runtime::{HostError, NodeConfigLookup, Services, StoredNodeConfig};

  struct OneConfig {
    config_type: &'static str,
    data: &'static str,
  }

  impl NodeConfigLookup for OneConfig {
    fn get(&self, id: &str) -> Result<StoredNodeConfig, HostError> {
      if id == "smtp-main" {
        Ok(StoredNodeConfig {
          id: id.to_string(),
          config_type: self.config_type.to_string(),
          data: self.data.to_string(),
        })
      } else {
        Err(HostError::not_found(format!("node config '{id}'")))
      }
    }
  }

  fn services(config_type: &'static str, data: &'static str) -> Services {
    Services {
      node_configs: Arc::new(OneConfig { config_type, data }),
      ..Services::default()
    }
  }

  fn node(config_id: &str) -> EmailNode {
    let mut data = DataMap::new();
    data.insert("config_id".to_string(), json!(config_id));
    data.insert("to".to_string(), json!("{{ recipient }}"));
    data.insert("subject".to_string(), json!("hello"));
    EmailNode::from_data(&data).unwrap()
  }

  #[tokio::test]
  async fn test_missing_config_fails_validate() {
    let registry = Registry::new(Services::default(), DataMap::new());
    let err = node("smtp-main").validate(&registry).await.unwrap_err();
    assert!(err.is_config());
  }

  #[tokio::test]
  async fn test_wrong_config_type_fails_validate() {
    let registry = Registry::new(
      services("webhook", r#"{"host": "smtp.test"}"#),
      DataMap::new(),
    );
    let err = node("smtp-main").validate(&registry).await.unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("webhook"));
  }

  #[tokio::test]
  async fn test_valid_config_decodes() {
    let registry = Registry::new(
      services(
        "email",
        r#"{"host": "smtp.test", "port": 465, "tls": "implicit", "from": "noreply@test"}"#,
      ),
      DataMap::new(),
    );
    assert!(node("smtp-main").validate(&registry).await.is_ok());
  }

  #[test]
  fn test_address_list_splits_and_trims() {
    assert_eq!(address_list("a@x.y, b@x.y ,,"), vec!["a@x.y", "b@x.y"]);
    assert!(address_list("").is_empty());
  }

  #[test]
  fn test_message_build_uses_config_from_as_fallback() {
    let node = node("smtp-main");
    let params: SmtpParams =
      serde_json::from_str(r#"{"host": "smtp.test", "from": "noreply@test.example"}"#).unwrap();
    let fields = RenderedFields {
      to: "dest@test.example".to_string(),
      cc: String::new(),
      bcc: String::new(),
      subject: "s".to_string(),
      body: "b".to_string(),
      from: String::new(),
      reply_to: String::new(),
    };
    assert!(node.build_message(&params, &fields).is_ok());
  }

  #[test]
  fn test_bad_recipient_is_a_send_failure_not_fatal() {
    let node = node("smtp-main");
    let params: SmtpParams = serde_json::from_str(r#"{"host": "smtp.test"}"#).unwrap();
    let fields = RenderedFields {
      to: "not-an-address".to_string(),
      cc: String::new(),
      bcc: String::new(),
      subject: "s".to_string(),
      body: "b".to_string(),
      from: "noreply@test.example".to_string(),
      reply_to: String::new(),
    };
    assert!(node.build_message(&params, &fields).is_err());
  }
}
