//! Lazy byte-stream handles.
//!
//! The HTTP request body arrives as a one-shot readable stream. Data maps
//! carry only JSON values, so a stream is registered with the run's
//! [`Registry`](crate::Registry) and referenced as `{"$body": "<id>"}`.
//! The first consumer reads the stream to the end under a one-shot guard;
//! the bytes are memoized so every later call (in any order) sees the same
//! data.

use std::fmt;
use std::io::{self, Read};
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// Key marking a body reference inside a data map.
pub const BODY_KEY: &str = "$body";

enum BodyState {
  Pending(Box<dyn Read + Send>),
  Cached(Arc<Vec<u8>>),
}

/// A cloneable handle over a one-shot byte source.
#[derive(Clone)]
pub struct Body {
  state: Arc<Mutex<BodyState>>,
}

impl Body {
  /// Wrap a readable source. Nothing is read until the first consumer asks.
  pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
    Self {
      state: Arc::new(Mutex::new(BodyState::Pending(Box::new(reader)))),
    }
  }

  /// Wrap bytes that are already in memory.
  pub fn from_bytes(bytes: Vec<u8>) -> Self {
    Self {
      state: Arc::new(Mutex::new(BodyState::Cached(Arc::new(bytes)))),
    }
  }

  /// Read (or reuse) the full contents.
  pub fn bytes(&self) -> io::Result<Arc<Vec<u8>>> {
    let mut state = self.state.lock().expect("body lock poisoned");
    match &mut *state {
      BodyState::Cached(bytes) => Ok(bytes.clone()),
      BodyState::Pending(reader) => {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let bytes = Arc::new(buf);
        *state = BodyState::Cached(bytes.clone());
        Ok(bytes)
      }
    }
  }

  /// The contents decoded as UTF-8, lossily.
  pub fn text(&self) -> io::Result<String> {
    Ok(String::from_utf8_lossy(&self.bytes()?).into_owned())
  }
}

impl fmt::Debug for Body {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock().expect("body lock poisoned");
    match &*state {
      BodyState::Pending(_) => write!(f, "Body(pending)"),
      BodyState::Cached(bytes) => write!(f, "Body({} bytes)", bytes.len()),
    }
  }
}

/// Build the JSON reference value for a registered body.
pub fn body_ref(id: &str) -> Value {
  let mut map = serde_json::Map::new();
  map.insert(BODY_KEY.to_string(), Value::String(id.to_string()));
  Value::Object(map)
}

/// If the value is a body reference, return the referenced id.
pub fn as_body_ref(value: &Value) -> Option<&str> {
  let map = value.as_object()?;
  if map.len() != 1 {
    return None;
  }
  map.get(BODY_KEY)?.as_str()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bytes_memoized_after_first_read() {
    let body = Body::from_reader(io::Cursor::new(b"hello".to_vec()));
    let first = body.bytes().unwrap();
    let second = body.bytes().unwrap();
    assert_eq!(first, second);
    assert_eq!(&**first, b"hello");
  }

  #[test]
  fn test_clones_share_the_cache() {
    let body = Body::from_reader(io::Cursor::new(b"once".to_vec()));
    let other = body.clone();
    assert_eq!(&**other.bytes().unwrap(), b"once");
    // The original sees the cached bytes, not a drained reader.
    assert_eq!(&**body.bytes().unwrap(), b"once");
  }

  #[test]
  fn test_body_ref_round_trip() {
    let value = body_ref("abc");
    assert_eq!(as_body_ref(&value), Some("abc"));
    assert_eq!(as_body_ref(&Value::String("abc".into())), None);
  }
}
