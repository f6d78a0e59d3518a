use serde::{Deserialize, Serialize};
use tracing::debug;

use quill_store::{Bucket, IndexScan, KvStore, StoreResult};
use quill_types::validation::{require_id, require_time};
use quill_types::{Identifiable, RecordId, UnixTime, Validatable, ValidationErrors};

use crate::error::{CronError, CronResult};

/// Handle returned by [`Scheduler::schedule`] and accepted by
/// [`Scheduler::cancel`].
pub type TaskId = RecordId;

const BUCKET: &str = "crontask";
const RUN_AT_INDEX: &str = "runat";

/// The scheduling contract the application relies on.
///
/// A scheduled payload is delivered at most once, at or after `run_at`, unless
/// it is cancelled first.
pub trait Scheduler: Send + Sync {
    /// Queue `payload` for delivery at `run_at`.
    fn schedule(&self, store: &dyn KvStore, run_at: UnixTime, payload: Vec<u8>)
        -> CronResult<TaskId>;

    /// Remove a queued task. Fails with [`CronError::TaskNotFound`] if the task
    /// is not queued.
    fn cancel(&self, store: &dyn KvStore, task_id: &TaskId) -> CronResult<()>;
}

/// One entry of the scheduler queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: Option<TaskId>,
    pub run_at: UnixTime,
    /// Opaque message bytes handed back to the [`TaskHandler`](crate::TaskHandler).
    pub payload: Vec<u8>,
}

impl Identifiable for ScheduledTask {
    fn id(&self) -> Option<RecordId> {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }
}

impl Validatable for ScheduledTask {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        errs.check("ID", require_id(self.id));
        errs.check("RunAt", require_time(self.run_at));
        errs.into_result()
    }
}

fn run_at_key(task: &ScheduledTask) -> Result<Option<Vec<u8>>, String> {
    task.run_at
        .to_index_bytes()
        .map(|b| Some(b.to_vec()))
        .ok_or_else(|| format!("negative run time {}", task.run_at))
}

/// [`Scheduler`] backed by a bucket in the application store.
///
/// Queue entries are ordered by run time, then by task ID, so tasks due at
/// the same second fire in the order they were scheduled.
#[derive(Debug)]
pub struct TimeScheduler {
    tasks: Bucket<ScheduledTask>,
}

impl TimeScheduler {
    pub fn new() -> CronResult<Self> {
        let tasks = Bucket::new(BUCKET)?.with_index(RUN_AT_INDEX, run_at_key, false)?;
        Ok(Self { tasks })
    }

    /// The queued task with this ID, if any.
    pub fn get(&self, store: &dyn KvStore, task_id: &TaskId) -> CronResult<Option<ScheduledTask>> {
        Ok(self.tasks.get(store, task_id)?)
    }

    /// Whether a task is still queued.
    pub fn is_queued(&self, store: &dyn KvStore, task_id: &TaskId) -> CronResult<bool> {
        Ok(self.tasks.has(store, task_id)?)
    }

    /// Lazy scan of task IDs with `run_at <= now`, earliest first.
    pub fn due_scan<'a>(&self, store: &'a dyn KvStore, now: UnixTime) -> CronResult<IndexScan<'a>> {
        let end = now.add_secs(1).to_index_bytes();
        // A negative `now` has nothing due; an empty range keeps the scan typed.
        let end = end.map(|b| b.to_vec()).unwrap_or_default();
        Ok(self.tasks.query_range(store, RUN_AT_INDEX, &[], Some(&end))?)
    }

    /// Task IDs with `run_at <= now`, earliest first.
    pub fn due(&self, store: &dyn KvStore, now: UnixTime) -> CronResult<Vec<TaskId>> {
        Ok(self.due_scan(store, now)?.ids()?)
    }

    /// Drop a task from the queue after it ran. Returns `false` if it was
    /// already gone.
    pub(crate) fn remove(&self, store: &dyn KvStore, task_id: &TaskId) -> StoreResult<bool> {
        self.tasks.delete(store, task_id)
    }
}

impl Scheduler for TimeScheduler {
    fn schedule(
        &self,
        store: &dyn KvStore,
        run_at: UnixTime,
        payload: Vec<u8>,
    ) -> CronResult<TaskId> {
        if run_at.to_index_bytes().is_none() {
            return Err(CronError::InvalidRunTime(format!("{run_at} is negative")));
        }
        let mut task = ScheduledTask {
            id: None,
            run_at,
            payload,
        };
        let id = self.tasks.put(store, &mut task)?;
        debug!(task = id.sequence(), run_at = run_at.as_secs(), "task scheduled");
        Ok(id)
    }

    fn cancel(&self, store: &dyn KvStore, task_id: &TaskId) -> CronResult<()> {
        if !self.tasks.delete(store, task_id)? {
            return Err(CronError::TaskNotFound(*task_id));
        }
        debug!(task = task_id.sequence(), "task cancelled");
        Ok(())
    }
}
