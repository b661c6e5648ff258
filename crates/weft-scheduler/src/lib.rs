//! Weft Scheduler
//!
//! Supervises cron-triggered workflow runs. The schedule is built from the
//! host's trigger store, one job task per enabled trigger; `reload` rebuilds
//! it after trigger mutations, and an optional cluster lease keeps exactly
//! one replica's scheduler active.
//!
//! Workflow failures are logged and swallowed: a broken workflow never stops
//! the scheduler loop.

mod error;
mod schedule;
mod scheduler;
mod traits;

pub use error::SchedulerError;
pub use schedule::{build_expression, next_fire, parse_schedule};
pub use scheduler::{JobDescriptor, Scheduler};
pub use traits::{
  CronConfig, CronTrigger, RegisteredRun, RunCleanup, RunRegistrar, SchedulerLock, TriggerStore,
};
