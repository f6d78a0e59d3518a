//! Delayed, cancellable task execution for Quill.
//!
//! A [`TimeScheduler`] keeps a queue of `(run_at, payload)` pairs in its own
//! bucket inside the application store. A [`CronExecutor`] drains the due
//! part of that queue once per block and hands each payload to a
//! [`TaskHandler`], the only path through which scheduled work runs.
//!
//! ```text
//! schedule(run_at, payload) ──► crontask:<id>  +  _i.crontask_runat:<run_at><id>
//!                                        │
//! tick(now) ── due(now) ─────────────────┘
//!     │
//!     └─► per task: StagedStore ─► handler.run() ─► remove entry ─► commit
//! ```

pub mod error;
pub mod executor;
pub mod scheduler;

pub use error::{CronError, CronResult};
pub use executor::{CronExecutor, Fired, TaskHandler, TickReport, DEFAULT_MAX_TASKS_PER_TICK};
pub use scheduler::{ScheduledTask, Scheduler, TaskId, TimeScheduler};
