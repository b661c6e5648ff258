//! The per-invocation sandbox.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rquickjs::function::{Func, Opt};
use rquickjs::{Context, Ctx, Error, Exception, Function, Object, Runtime, Value};
use serde_json::Value as JsonValue;

use weft_runtime::{Body, DataMap, VariableStore, as_body_ref};

use crate::convert::{js_to_json, json_to_js};
use crate::error::ScriptError;
use crate::http;

/// Helper wrappers evaluated before user code. Host functions prefixed with
/// `__` are installed from Rust and speak strings/byte arrays only; the
/// user-facing surface is defined here on top of them.
const PRELUDE: &str = r#"
function JSON_stringify(v) {
  const s = JSON.stringify(v);
  return s === undefined ? "null" : s;
}

function __makeBody(id) {
  return {
    __body: true,
    toString: function () { return __bodyString(id); },
    jsonParse: function () { return JSON.parse(__bodyString(id)); },
    toBase64: function () { return __bodyBase64(id); },
    bytes: function () { return new Uint8Array(__bodyBytes(id)); },
    get length() { return __bodyLength(id); },
  };
}

function toString(v) {
  if (v === null || v === undefined) { return ""; }
  if (typeof v === "object" && v.__body) { return v.toString(); }
  if (typeof v === "string") { return v; }
  if (v instanceof Uint8Array) { return __bytesToString(Array.from(v)); }
  if (typeof v === "object") { return JSON_stringify(v); }
  return String(v);
}

function jsonParse(v) { return JSON.parse(toString(v)); }

function btoa(v) {
  if (v instanceof Uint8Array) { return __btoaBytes(Array.from(v)); }
  return __btoa(toString(v));
}

function atob(s) { return __atob(toString(s)); }

function __httpCall(method, url, body, headers) {
  const b = (body === undefined || body === null) ? undefined : JSON_stringify(body);
  const h = (headers === undefined || headers === null) ? undefined : JSON_stringify(headers);
  return JSON.parse(__http(method, url, b, h));
}

function httpGet(url, headers) { return __httpCall("GET", url, undefined, headers); }
function httpPost(url, body, headers) { return __httpCall("POST", url, body, headers); }
function httpPut(url, body, headers) { return __httpCall("PUT", url, body, headers); }
function httpDelete(url, headers) { return __httpCall("DELETE", url, undefined, headers); }

function __kv(pairs) {
  const fields = {};
  for (let i = 0; i + 1 < pairs.length; i += 2) {
    fields[toString(pairs[i])] = pairs[i + 1];
  }
  return JSON_stringify(fields);
}

const log = {
  info: function (msg, ...kv) { __log("info", toString(msg), __kv(kv)); },
  warn: function (msg, ...kv) { __log("warn", toString(msg), __kv(kv)); },
  error: function (msg, ...kv) { __log("error", toString(msg), __kv(kv)); },
  debug: function (msg, ...kv) { __log("debug", toString(msg), __kv(kv)); },
};
"#;

/// A fresh interpreter configuration for one node invocation.
pub struct Sandbox {
  variables: Arc<dyn VariableStore>,
  bodies: HashMap<String, Body>,
}

impl Sandbox {
  pub fn new(variables: Arc<dyn VariableStore>) -> Self {
    Self {
      variables,
      bodies: HashMap::new(),
    }
  }

  /// Make registered byte-stream handles resolvable from scripts.
  pub fn with_bodies(mut self, bodies: HashMap<String, Body>) -> Self {
    self.bodies = bodies;
    self
  }

  /// Evaluate an expression with the given bindings as top-level variables.
  pub fn eval_expression(
    &self,
    expression: &str,
    bindings: &DataMap,
  ) -> Result<JsonValue, ScriptError> {
    self.eval(expression.to_string(), bindings)
  }

  /// Evaluate a function body; wrapped in an IIFE so `return` works.
  pub fn eval_function_body(
    &self,
    body: &str,
    bindings: &DataMap,
  ) -> Result<JsonValue, ScriptError> {
    self.eval(format!("(function () {{\n{body}\n}})()"), bindings)
  }

  fn eval(&self, source: String, bindings: &DataMap) -> Result<JsonValue, ScriptError> {
    let runtime = Runtime::new().map_err(|e| ScriptError::Engine(e.to_string()))?;
    let context = Context::full(&runtime).map_err(|e| ScriptError::Engine(e.to_string()))?;

    context.with(|ctx| {
      self
        .install(&ctx)
        .map_err(|e| engine_or_exception(&ctx, e))?;
      self
        .bind_inputs(&ctx, bindings)
        .map_err(|e| engine_or_exception(&ctx, e))?;

      match ctx.eval::<Value, _>(source.into_bytes()) {
        Ok(value) => js_to_json(&value),
        Err(e) => Err(engine_or_exception(&ctx, e)),
      }
    })
  }

  /// Install host functions and evaluate the prelude.
  fn install(&self, ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let globals = ctx.globals();

    let vars = self.variables.clone();
    globals.set(
      "getVar",
      Func::from(move |fctx: Ctx<'_>, key: String| -> rquickjs::Result<String> {
        match vars.get(&key) {
          Ok(value) => Ok(value),
          Err(e) => Err(Exception::throw_type(&fctx, &format!("getVar: {e}"))),
        }
      }),
    )?;

    globals.set(
      "__btoa",
      Func::from(|s: String| -> String { BASE64.encode(s.as_bytes()) }),
    )?;

    globals.set(
      "__btoaBytes",
      Func::from(|bytes: Vec<u8>| -> String { BASE64.encode(&bytes) }),
    )?;

    globals.set(
      "__atob",
      Func::from(|fctx: Ctx<'_>, s: String| -> rquickjs::Result<String> {
        let bytes = BASE64
          .decode(s.as_bytes())
          .map_err(|e| Exception::throw_type(&fctx, &format!("atob: {e}")))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
      }),
    )?;

    globals.set(
      "__bytesToString",
      Func::from(|bytes: Vec<u8>| -> String {
        String::from_utf8_lossy(&bytes).into_owned()
      }),
    )?;

    globals.set(
      "__http",
      Func::from(
        |fctx: Ctx<'_>,
         method: String,
         url: String,
         body: Opt<String>,
         headers: Opt<String>|
         -> rquickjs::Result<String> {
          let body = match body.0 {
            Some(text) => Some(
              serde_json::from_str::<JsonValue>(&text)
                .map_err(|e| Exception::throw_type(&fctx, &format!("http body: {e}")))?,
            ),
            None => None,
          };
          let headers = match headers.0 {
            Some(text) => match serde_json::from_str::<JsonValue>(&text) {
              Ok(JsonValue::Object(map)) => Some(map),
              Ok(_) => None,
              Err(e) => {
                return Err(Exception::throw_type(&fctx, &format!("http headers: {e}")));
              }
            },
            None => None,
          };

          let response = http::request(&method, &url, body, headers.as_ref())
            .map_err(|e| Exception::throw_message(&fctx, &format!("{method} {url}: {e}")))?;
          serde_json::to_string(&response)
            .map_err(|e| Exception::throw_message(&fctx, &e.to_string()))
        },
      ),
    )?;

    globals.set(
      "__log",
      Func::from(|level: String, message: String, fields: String| {
        match level.as_str() {
          "warn" => tracing::warn!(target: "weft_script", fields = %fields, "{message}"),
          "error" => tracing::error!(target: "weft_script", fields = %fields, "{message}"),
          "debug" => tracing::debug!(target: "weft_script", fields = %fields, "{message}"),
          _ => tracing::info!(target: "weft_script", fields = %fields, "{message}"),
        }
      }),
    )?;

    let bodies = self.bodies.clone();
    globals.set(
      "__bodyString",
      Func::from(move |fctx: Ctx<'_>, id: String| -> rquickjs::Result<String> {
        read_body(&fctx, &bodies, &id).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
      }),
    )?;

    let bodies = self.bodies.clone();
    globals.set(
      "__bodyBase64",
      Func::from(move |fctx: Ctx<'_>, id: String| -> rquickjs::Result<String> {
        read_body(&fctx, &bodies, &id).map(|bytes| BASE64.encode(&*bytes))
      }),
    )?;

    let bodies = self.bodies.clone();
    globals.set(
      "__bodyBytes",
      Func::from(move |fctx: Ctx<'_>, id: String| -> rquickjs::Result<Vec<u8>> {
        read_body(&fctx, &bodies, &id).map(|bytes| bytes.to_vec())
      }),
    )?;

    let bodies = self.bodies.clone();
    globals.set(
      "__bodyLength",
      Func::from(move |fctx: Ctx<'_>, id: String| -> rquickjs::Result<usize> {
        read_body(&fctx, &bodies, &id).map(|bytes| bytes.len())
      }),
    )?;

    ctx.eval::<(), _>(PRELUDE)?;
    Ok(())
  }

  /// Bind each input value as a top-level variable, resolving body
  /// references (recursively) into wrapper objects.
  fn bind_inputs(&self, ctx: &Ctx<'_>, bindings: &DataMap) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    for (key, value) in bindings {
      let js_value = self.bind_value(ctx, value)?;
      globals.set(key.as_str(), js_value)?;
    }
    Ok(())
  }

  fn bind_value<'js>(&self, ctx: &Ctx<'js>, value: &JsonValue) -> rquickjs::Result<Value<'js>> {
    if let Some(id) = as_body_ref(value) {
      if self.bodies.contains_key(id) {
        let make: Function = ctx.globals().get("__makeBody")?;
        return make.call((id.to_string(),));
      }
    }

    match value {
      JsonValue::Object(map) => {
        let object = Object::new(ctx.clone())?;
        for (key, item) in map {
          object.set(key.as_str(), self.bind_value(ctx, item)?)?;
        }
        Ok(object.into_value())
      }
      JsonValue::Array(items) => {
        let array = rquickjs::Array::new(ctx.clone())?;
        for (i, item) in items.iter().enumerate() {
          array.set(i, self.bind_value(ctx, item)?)?;
        }
        Ok(array.into_value())
      }
      other => json_to_js(ctx, other),
    }
  }
}

fn read_body(
  ctx: &Ctx<'_>,
  bodies: &HashMap<String, Body>,
  id: &str,
) -> rquickjs::Result<std::sync::Arc<Vec<u8>>> {
  let body = bodies
    .get(id)
    .ok_or_else(|| Exception::throw_message(ctx, &format!("unknown body '{id}'")))?;
  body
    .bytes()
    .map_err(|e| Exception::throw_message(ctx, &format!("body read: {e}")))
}

/// Turn an interpreter error into a `ScriptError`, pulling the pending
/// exception (message + stack) out of the context when there is one.
fn engine_or_exception(ctx: &Ctx<'_>, error: Error) -> ScriptError {
  if !matches!(error, Error::Exception) {
    return ScriptError::Engine(error.to_string());
  }

  let caught = ctx.catch();
  if let Some(exception) = caught.as_exception() {
    let message = exception
      .message()
      .unwrap_or_else(|| "uncaught exception".to_string());
    match exception.stack() {
      Some(stack) if !stack.is_empty() => ScriptError::Exception(format!("{message}\n{stack}")),
      _ => ScriptError::Exception(message),
    }
  } else {
    match js_to_json(&caught) {
      Ok(value) => ScriptError::Exception(value.to_string()),
      Err(_) => ScriptError::Exception("uncaught exception".to_string()),
    }
  }
}

/// JavaScript truthiness over a converted JSON value.
pub fn is_truthy(value: &JsonValue) -> bool {
  match value {
    JsonValue::Null => false,
    JsonValue::Bool(b) => *b,
    JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
    JsonValue::String(s) => !s.is_empty(),
    JsonValue::Array(_) | JsonValue::Object(_) => true,
  }
}
