//! Host interfaces consumed by the scheduler.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use weft_runtime::HostError;

/// An enabled cron trigger loaded from the host's trigger store.
#[derive(Debug, Clone)]
pub struct CronTrigger {
  pub id: String,
  pub workflow_id: String,
  pub config: CronConfig,
}

#[derive(Debug, Clone)]
pub struct CronConfig {
  /// A 5-field cron expression.
  pub schedule: String,
  /// IANA zone name; schedules run in UTC when absent.
  pub timezone: Option<String>,
}

#[async_trait]
pub trait TriggerStore: Send + Sync {
  async fn list_enabled_cron(&self) -> Result<Vec<CronTrigger>, HostError>;
}

/// Cluster leader lease. `lock` blocks until the lease is acquired; only the
/// holder runs the schedule.
#[async_trait]
pub trait SchedulerLock: Send + Sync {
  async fn lock(&self) -> Result<(), HostError>;
  async fn unlock(&self);
}

/// Invoked when always-run bookkeeping is finished for a registered run.
pub type RunCleanup = Box<dyn FnOnce() + Send>;

/// A run registered with the host before execution.
pub struct RegisteredRun {
  pub run_id: String,
  /// Child cancellation scope for this run.
  pub cancel: CancellationToken,
  /// Must always be invoked once the run finishes, success or failure.
  pub cleanup: RunCleanup,
}

#[async_trait]
pub trait RunRegistrar: Send + Sync {
  async fn register(&self, workflow_id: &str, source: &str) -> Result<RegisteredRun, HostError>;
}
