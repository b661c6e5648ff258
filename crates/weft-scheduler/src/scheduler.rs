//! The cron scheduler.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use weft_config::node_type;
use weft_engine::Engine;
use weft_runtime::{DataMap, WorkflowStore};

use crate::error::SchedulerError;
use crate::schedule::{build_expression, next_fire, parse_schedule};
use crate::traits::{CronTrigger, RunRegistrar, SchedulerLock, TriggerStore};

const LOCK_RETRY_DELAY: Duration = Duration::from_secs(5);

/// One job in the compiled schedule, for introspection and tests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct JobDescriptor {
  pub trigger_id: String,
  pub expression: String,
}

struct Runner {
  cancel: CancellationToken,
  jobs: Vec<JobDescriptor>,
}

/// Supervises cron-triggered runs: builds one job task per enabled trigger,
/// rebuilds on [`reload`](Scheduler::reload), and optionally gates the whole
/// schedule behind a cluster lease.
pub struct Scheduler {
  engine: Engine,
  triggers: Arc<dyn TriggerStore>,
  workflows: Arc<dyn WorkflowStore>,
  lock: Option<Arc<dyn SchedulerLock>>,
  registrar: StdMutex<Option<Arc<dyn RunRegistrar>>>,
  runner: Mutex<Option<Runner>>,
  supervisor: StdMutex<Option<CancellationToken>>,
}

impl Scheduler {
  pub fn new(
    engine: Engine,
    triggers: Arc<dyn TriggerStore>,
    workflows: Arc<dyn WorkflowStore>,
  ) -> Self {
    Self {
      engine,
      triggers,
      workflows,
      lock: None,
      registrar: StdMutex::new(None),
      runner: Mutex::new(None),
      supervisor: StdMutex::new(None),
    }
  }

  /// Gate the schedule behind a cluster lease: only the lease holder runs it.
  pub fn with_lock(mut self, lock: Arc<dyn SchedulerLock>) -> Self {
    self.lock = Some(lock);
    self
  }

  /// Install the run registrar used to track cron-initiated runs.
  pub fn set_run_registrar(&self, registrar: Arc<dyn RunRegistrar>) {
    *self.registrar.lock().expect("registrar lock poisoned") = Some(registrar);
  }

  /// Start the scheduler under the given cancellation scope.
  ///
  /// Without a lease the schedule starts immediately. With one, a
  /// supervisor task acquires the lease first and releases it on
  /// cancellation; acquisition failures retry after a delay.
  pub async fn start(self: Arc<Self>, cancel: CancellationToken) -> Result<(), SchedulerError> {
    let supervisor = cancel.child_token();
    *self.supervisor.lock().expect("supervisor lock poisoned") = Some(supervisor.clone());

    let Some(lock) = self.lock.clone() else {
      return self.build_and_start().await;
    };

    let scheduler = self;
    tokio::spawn(async move {
      loop {
        tokio::select! {
          _ = supervisor.cancelled() => break,
          result = lock.lock() => match result {
            Ok(()) => {
              info!("scheduler lease acquired");
              if let Err(e) = scheduler.build_and_start().await {
                error!(error = %e, "schedule build failed");
                lock.unlock().await;
                tokio::time::sleep(LOCK_RETRY_DELAY).await;
                continue;
              }
              supervisor.cancelled().await;
              scheduler.stop_runner().await;
              lock.unlock().await;
              info!("scheduler lease released");
              break;
            }
            Err(e) => {
              warn!(error = %e, "scheduler lease acquisition failed, retrying");
              tokio::time::sleep(LOCK_RETRY_DELAY).await;
            }
          },
        }
      }
    });

    Ok(())
  }

  /// Rebuild the schedule from the trigger store. Called after any cron
  /// trigger mutation.
  pub async fn reload(&self) -> Result<(), SchedulerError> {
    info!("reloading cron schedule");
    self.build_and_start().await
  }

  /// Stop the scheduler. Idempotent.
  pub async fn stop(&self) {
    if let Some(token) = self.supervisor.lock().expect("supervisor lock poisoned").take() {
      token.cancel();
    }
    self.stop_runner().await;
  }

  /// The compiled jobs, for introspection.
  pub async fn jobs(&self) -> Vec<JobDescriptor> {
    self
      .runner
      .lock()
      .await
      .as_ref()
      .map(|r| r.jobs.clone())
      .unwrap_or_default()
  }

  async fn stop_runner(&self) {
    if let Some(runner) = self.runner.lock().await.take() {
      runner.cancel.cancel();
    }
  }

  /// Stop the current runner and build a fresh one from the store.
  async fn build_and_start(&self) -> Result<(), SchedulerError> {
    let mut guard = self.runner.lock().await;
    if let Some(old) = guard.take() {
      old.cancel.cancel();
    }

    let triggers = self
      .triggers
      .list_enabled_cron()
      .await
      .map_err(|e| SchedulerError::Store(e.to_string()))?;

    let cancel = CancellationToken::new();
    let mut jobs = Vec::new();

    for trigger in triggers {
      if trigger.config.schedule.trim().is_empty() {
        debug!(trigger_id = %trigger.id, "skipping trigger with empty schedule");
        continue;
      }

      let expression =
        build_expression(&trigger.config.schedule, trigger.config.timezone.as_deref());
      let (schedule, timezone) = match parse_schedule(&expression) {
        Ok(parsed) => parsed,
        Err(e) => {
          warn!(trigger_id = %trigger.id, error = %e, "skipping trigger with invalid schedule");
          continue;
        }
      };

      jobs.push(JobDescriptor {
        trigger_id: trigger.id.clone(),
        expression,
      });
      self.spawn_job(trigger, schedule, timezone, cancel.clone());
    }

    info!(jobs = jobs.len(), "cron schedule built");
    *guard = Some(Runner { cancel, jobs });
    Ok(())
  }

  fn spawn_job(
    &self,
    trigger: CronTrigger,
    schedule: Schedule,
    timezone: Tz,
    cancel: CancellationToken,
  ) {
    let engine = self.engine.clone();
    let workflows = self.workflows.clone();
    let registrar = self
      .registrar
      .lock()
      .expect("registrar lock poisoned")
      .clone();

    tokio::spawn(async move {
      loop {
        let Some(next) = next_fire(&schedule, timezone, Utc::now()) else {
          debug!(trigger_id = %trigger.id, "schedule has no future fire times");
          break;
        };
        let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
          _ = cancel.cancelled() => break,
          _ = tokio::time::sleep(delay) => {
            fire_trigger(&engine, &workflows, registrar.as_deref(), &trigger, &cancel).await;
          }
        }
      }
    });
  }
}

/// Run one cron-triggered workflow execution. Errors are logged, never
/// propagated: a broken workflow must not stop the schedule.
async fn fire_trigger(
  engine: &Engine,
  workflows: &Arc<dyn WorkflowStore>,
  registrar: Option<&dyn RunRegistrar>,
  trigger: &CronTrigger,
  cancel: &CancellationToken,
) {
  let stored = match workflows.get(&trigger.workflow_id).await {
    Ok(stored) => stored,
    Err(e) => {
      warn!(
        trigger_id = %trigger.id,
        workflow_id = %trigger.workflow_id,
        error = %e,
        "cron workflow fetch failed"
      );
      return;
    }
  };

  let graph = match &stored.active_version {
    Some(version) => match workflows.get_version(&stored.id, version).await {
      Ok(graph) => graph,
      Err(e) => {
        warn!(
          workflow_id = %stored.id,
          version = %version,
          error = %e,
          "active version fetch failed, using draft graph"
        );
        stored.graph.clone()
      }
    },
    None => stored.graph.clone(),
  };

  let mut inputs = DataMap::new();
  inputs.insert("trigger_type".to_string(), "cron".into());
  inputs.insert("trigger_id".to_string(), trigger.id.clone().into());
  inputs.insert(
    "triggered_at".to_string(),
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true).into(),
  );
  inputs.insert("schedule".to_string(), trigger.config.schedule.clone().into());
  inputs.insert(
    "timezone".to_string(),
    trigger.config.timezone.clone().unwrap_or_default().into(),
  );

  let (run_cancel, run_id, cleanup) = match registrar {
    Some(registrar) => match registrar.register(&stored.id, "cron").await {
      Ok(run) => (run.cancel, run.run_id, Some(run.cleanup)),
      Err(e) => {
        warn!(workflow_id = %stored.id, error = %e, "cron run registration failed");
        return;
      }
    },
    None => (cancel.child_token(), String::new(), None),
  };

  // Only the cron_trigger nodes belonging to this trigger seed the run.
  let entry_nodes: Vec<String> = graph
    .nodes
    .iter()
    .filter(|n| {
      n.node_type == node_type::CRON_TRIGGER
        && n.data.get("trigger_id").and_then(Value::as_str) == Some(trigger.id.as_str())
    })
    .map(|n| n.id.clone())
    .collect();

  match engine.run(&graph, inputs, &entry_nodes, None, &run_cancel).await {
    Ok(outputs) => {
      info!(
        trigger_id = %trigger.id,
        run_id = %run_id,
        outputs = outputs.len(),
        "cron run completed"
      );
    }
    Err(e) => {
      warn!(trigger_id = %trigger.id, run_id = %run_id, error = %e, "cron run failed");
    }
  }

  if let Some(cleanup) = cleanup {
    cleanup();
  }
}
