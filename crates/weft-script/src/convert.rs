//! JSON ↔ JS value marshaling.

use rquickjs::{Array, Ctx, Object, Type, Value};
use serde_json::{Number, Value as JsonValue};

use crate::error::ScriptError;

/// Build a JS value from a JSON value.
pub fn json_to_js<'js>(ctx: &Ctx<'js>, value: &JsonValue) -> rquickjs::Result<Value<'js>> {
  Ok(match value {
    JsonValue::Null => Value::new_null(ctx.clone()),
    JsonValue::Bool(b) => Value::new_bool(ctx.clone(), *b),
    JsonValue::Number(n) => {
      if let Some(i) = n.as_i64() {
        if let Ok(small) = i32::try_from(i) {
          Value::new_int(ctx.clone(), small)
        } else {
          Value::new_float(ctx.clone(), i as f64)
        }
      } else {
        Value::new_float(ctx.clone(), n.as_f64().unwrap_or(f64::NAN))
      }
    }
    JsonValue::String(s) => {
      rquickjs::String::from_str(ctx.clone(), s)?.into_value()
    }
    JsonValue::Array(items) => {
      let array = Array::new(ctx.clone())?;
      for (i, item) in items.iter().enumerate() {
        array.set(i, json_to_js(ctx, item)?)?;
      }
      array.into_value()
    }
    JsonValue::Object(map) => {
      let object = Object::new(ctx.clone())?;
      for (key, item) in map {
        object.set(key.as_str(), json_to_js(ctx, item)?)?;
      }
      object.into_value()
    }
  })
}

/// Convert a JS value back to JSON.
///
/// `undefined` becomes `null`; functions and symbols are dropped to `null`;
/// non-finite floats become `null` (matching `JSON.stringify` behavior).
pub fn js_to_json(value: &Value) -> Result<JsonValue, ScriptError> {
  Ok(match value.type_of() {
    Type::Uninitialized | Type::Undefined | Type::Null => JsonValue::Null,
    Type::Bool => JsonValue::Bool(value.as_bool().unwrap_or(false)),
    Type::Int => JsonValue::Number(Number::from(value.as_int().unwrap_or(0))),
    Type::Float => {
      let f = value.as_float().unwrap_or(f64::NAN);
      Number::from_f64(f).map(JsonValue::Number).unwrap_or(JsonValue::Null)
    }
    Type::String => {
      let s = value
        .as_string()
        .ok_or_else(|| ScriptError::Convert("string value unavailable".to_string()))?
        .to_string()
        .map_err(|e| ScriptError::Convert(e.to_string()))?;
      JsonValue::String(s)
    }
    Type::Array => {
      let array = value
        .as_array()
        .ok_or_else(|| ScriptError::Convert("array value unavailable".to_string()))?;
      let mut items = Vec::with_capacity(array.len());
      for item in array.iter::<Value>() {
        let item = item.map_err(|e| ScriptError::Convert(e.to_string()))?;
        items.push(js_to_json(&item)?);
      }
      JsonValue::Array(items)
    }
    Type::Object | Type::Exception => {
      let object = value
        .as_object()
        .ok_or_else(|| ScriptError::Convert("object value unavailable".to_string()))?;
      let mut map = serde_json::Map::new();
      for prop in object.props::<String, Value>() {
        let (key, item) = prop.map_err(|e| ScriptError::Convert(e.to_string()))?;
        // Functions inside objects are not data.
        if matches!(item.type_of(), Type::Function | Type::Constructor | Type::Symbol) {
          continue;
        }
        map.insert(key, js_to_json(&item)?);
      }
      JsonValue::Object(map)
    }
    // Functions, symbols, promises, modules have no JSON shape.
    _ => JsonValue::Null,
  })
}
