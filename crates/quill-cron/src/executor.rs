use tracing::{debug, warn};

use quill_store::{KvStore, StagedStore};
use quill_types::UnixTime;

use crate::error::CronResult;
use crate::scheduler::{ScheduledTask, TaskId, TimeScheduler};

/// Upper bound on tasks fired by one [`CronExecutor::tick`] unless configured.
pub const DEFAULT_MAX_TASKS_PER_TICK: usize = 100;

/// Receives the payload of a task that became due.
///
/// `store` is an overlay private to this task: everything written through it
/// is committed together with the removal of the queue entry, or discarded
/// if `run` fails.
pub trait TaskHandler: Send + Sync {
    fn run(&self, store: &dyn KvStore, task: &ScheduledTask, now: UnixTime) -> CronResult<()>;
}

/// Outcome of firing a single task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fired {
    /// The handler succeeded and its writes were committed.
    Completed,
    /// The handler failed; its writes were discarded and the task dropped.
    Failed(String),
    /// The task is queued but its run time is still in the future.
    NotDue,
    /// No such task is queued (already fired, or cancelled).
    Missing,
}

/// Summary of one [`CronExecutor::tick`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub completed: Vec<TaskId>,
    pub failed: Vec<TaskId>,
    /// More due tasks remain beyond the per-tick limit.
    pub has_more: bool,
}

impl TickReport {
    pub fn fired(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}

/// Drives due tasks from a [`TimeScheduler`] into a single [`TaskHandler`].
///
/// This is the only way scheduled payloads are executed, so the handler can
/// expose operations that ordinary transactions never reach.
pub struct CronExecutor<H> {
    scheduler: TimeScheduler,
    handler: H,
    max_tasks_per_tick: usize,
}

impl<H: TaskHandler> CronExecutor<H> {
    pub fn new(handler: H) -> CronResult<Self> {
        Ok(Self {
            scheduler: TimeScheduler::new()?,
            handler,
            max_tasks_per_tick: DEFAULT_MAX_TASKS_PER_TICK,
        })
    }

    pub fn with_max_tasks_per_tick(mut self, max: usize) -> Self {
        self.max_tasks_per_tick = max.max(1);
        self
    }

    pub fn scheduler(&self) -> &TimeScheduler {
        &self.scheduler
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Fire up to `max_tasks_per_tick` tasks due at `now`, earliest first.
    ///
    /// Non-fatal handler failures are recorded in the report. Fatal storage
    /// errors stop the tick and are returned.
    pub fn tick(&self, store: &dyn KvStore, now: UnixTime) -> CronResult<TickReport> {
        // Collect the batch first; firing a task mutates the queue.
        let mut due = self
            .scheduler
            .due_scan(store, now)?
            .take(self.max_tasks_per_tick + 1)
            .collect::<Result<Vec<_>, _>>()?;
        let has_more = due.len() > self.max_tasks_per_tick;
        due.truncate(self.max_tasks_per_tick);

        let mut report = TickReport {
            has_more,
            ..TickReport::default()
        };
        for task_id in due {
            match self.execute(store, &task_id, now)? {
                Fired::Completed => report.completed.push(task_id),
                Fired::Failed(_) => report.failed.push(task_id),
                Fired::NotDue | Fired::Missing => {}
            }
        }
        if report.fired() > 0 {
            debug!(
                now = now.as_secs(),
                completed = report.completed.len(),
                failed = report.failed.len(),
                has_more,
                "cron tick"
            );
        }
        Ok(report)
    }

    /// Fire one task by ID if it is queued and due.
    pub fn execute(&self, store: &dyn KvStore, task_id: &TaskId, now: UnixTime) -> CronResult<Fired> {
        let Some(task) = self.scheduler.get(store, task_id)? else {
            return Ok(Fired::Missing);
        };
        if task.run_at.is_after(&now) {
            return Ok(Fired::NotDue);
        }

        let staged = StagedStore::new(store);
        match self.handler.run(&staged, &task, now) {
            Ok(()) => {
                self.scheduler.remove(&staged, task_id)?;
                staged.commit()?;
                debug!(task = task_id.sequence(), "task completed");
                Ok(Fired::Completed)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                drop(staged);
                warn!(task = task_id.sequence(), error = %e, "task failed; dropping it");
                self.scheduler.remove(store, task_id)?;
                Ok(Fired::Failed(e.to_string()))
            }
        }
    }
}

impl<H> std::fmt::Debug for CronExecutor<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronExecutor")
            .field("max_tasks_per_tick", &self.max_tasks_per_tick)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CronError;
    use crate::scheduler::Scheduler;
    use quill_store::{InMemoryKvStore, StoreError};

    /// Writes `payload` under `out:<payload>`; payload `fail` is rejected
    /// after writing, `fatal` reports a backend failure.
    struct Recorder;

    impl TaskHandler for Recorder {
        fn run(&self, store: &dyn KvStore, task: &ScheduledTask, _now: UnixTime) -> CronResult<()> {
            let mut key = b"out:".to_vec();
            key.extend_from_slice(&task.payload);
            store.set(&key, b"1")?;
            match task.payload.as_slice() {
                b"fail" => Err(CronError::Handler("rejected".into())),
                b"fatal" => Err(StoreError::Backend("disk gone".into()).into()),
                _ => Ok(()),
            }
        }
    }

    fn at(secs: i64) -> UnixTime {
        UnixTime::from_secs(secs)
    }

    fn setup() -> (InMemoryKvStore, CronExecutor<Recorder>) {
        (InMemoryKvStore::new(), CronExecutor::new(Recorder).unwrap())
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    #[test]
    fn tick_fires_only_due_tasks() {
        let (store, exec) = setup();
        let sched = exec.scheduler();
        let due = sched.schedule(&store, at(10), b"a".to_vec()).unwrap();
        let later = sched.schedule(&store, at(20), b"b".to_vec()).unwrap();

        let report = exec.tick(&store, at(15)).unwrap();
        assert_eq!(report.completed, vec![due]);
        assert!(store.get(b"out:a").unwrap().is_some());
        assert!(store.get(b"out:b").unwrap().is_none());
        assert!(sched.is_queued(&store, &later).unwrap());
        assert!(!sched.is_queued(&store, &due).unwrap());
    }

    #[test]
    fn tick_respects_limit() {
        let (store, exec) = setup();
        let exec = exec.with_max_tasks_per_tick(2);
        for p in [b"a", b"b", b"c"] {
            exec.scheduler().schedule(&store, at(1), p.to_vec()).unwrap();
        }
        let first = exec.tick(&store, at(5)).unwrap();
        assert_eq!(first.fired(), 2);
        assert!(first.has_more);

        let second = exec.tick(&store, at(5)).unwrap();
        assert_eq!(second.fired(), 1);
        assert!(!second.has_more);
    }

    #[test]
    fn failed_task_is_discarded_and_dequeued() {
        let (store, exec) = setup();
        let id = exec.scheduler().schedule(&store, at(1), b"fail".to_vec()).unwrap();

        let report = exec.tick(&store, at(1)).unwrap();
        assert_eq!(report.failed, vec![id]);
        assert!(store.get(b"out:fail").unwrap().is_none());
        assert!(!exec.scheduler().is_queued(&store, &id).unwrap());
        assert_eq!(exec.tick(&store, at(2)).unwrap(), TickReport::default());
    }

    #[test]
    fn fatal_error_aborts_tick_and_keeps_task() {
        let (store, exec) = setup();
        let id = exec.scheduler().schedule(&store, at(1), b"fatal".to_vec()).unwrap();
        let err = exec.tick(&store, at(1)).unwrap_err();
        assert!(err.is_fatal());
        assert!(exec.scheduler().is_queued(&store, &id).unwrap());
    }

    // -----------------------------------------------------------------------
    // Execute by ID
    // -----------------------------------------------------------------------

    #[test]
    fn execute_twice_is_missing_second_time() {
        let (store, exec) = setup();
        let id = exec.scheduler().schedule(&store, at(1), b"x".to_vec()).unwrap();
        assert_eq!(exec.execute(&store, &id, at(1)).unwrap(), Fired::Completed);
        assert_eq!(exec.execute(&store, &id, at(1)).unwrap(), Fired::Missing);
    }

    #[test]
    fn execute_cancelled_is_missing() {
        let (store, exec) = setup();
        let id = exec.scheduler().schedule(&store, at(1), b"x".to_vec()).unwrap();
        exec.scheduler().cancel(&store, &id).unwrap();
        assert_eq!(exec.execute(&store, &id, at(5)).unwrap(), Fired::Missing);
        assert!(store.get(b"out:x").unwrap().is_none());
    }

    #[test]
    fn execute_before_run_time_is_not_due() {
        let (store, exec) = setup();
        let id = exec.scheduler().schedule(&store, at(50), b"x".to_vec()).unwrap();
        assert_eq!(exec.execute(&store, &id, at(49)).unwrap(), Fired::NotDue);
        assert!(exec.scheduler().is_queued(&store, &id).unwrap());
    }
}
