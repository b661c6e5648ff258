use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
  #[error("invalid cron expression '{expression}': {message}")]
  InvalidExpression { expression: String, message: String },

  #[error("unknown timezone '{0}'")]
  UnknownTimezone(String),

  #[error("trigger store error: {0}")]
  Store(String),
}
