use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
  /// User code threw; the message carries the JS stack trace when available.
  #[error("script exception: {0}")]
  Exception(String),

  /// The interpreter itself failed (setup, parse, out of memory).
  #[error("script engine error: {0}")]
  Engine(String),

  /// A value could not cross the JS/JSON boundary.
  #[error("script value error: {0}")]
  Convert(String),
}
