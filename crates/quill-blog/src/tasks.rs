//! Scheduled, cancellable article deletion.
//!
//! ```text
//!           schedule                     cancel (owner only)
//!  (none) ───────────► Scheduled ─────────────────────────► Cancelled
//!                          │
//!                          │ run_at reached, cron router
//!                          ▼
//!                        Fired
//! ```
//!
//! The scheduler queue entry and the [`DeleteArticleTask`] record share the
//! task ID. Cancelling removes both; firing removes only the queue entry.

use std::sync::Arc;

use tracing::info;

use quill_cron::{Scheduler, TaskId};
use quill_store::KvStore;
use quill_types::{RecordId, UnixTime};

use crate::buckets::Buckets;
use crate::error::{BlogError, BlogResult};
use crate::handler::Context;
use crate::models::DeleteArticleTask;
use crate::msg::{DeleteArticleMsg, Msg};

pub struct DeleteTaskCoordinator {
    scheduler: Arc<dyn Scheduler>,
    buckets: Arc<Buckets>,
}

impl DeleteTaskCoordinator {
    pub fn new(scheduler: Arc<dyn Scheduler>, buckets: Arc<Buckets>) -> Self {
        Self { scheduler, buckets }
    }

    /// Reject a deletion time that is not strictly after the block time.
    pub fn ensure_future(ctx: &Context, delete_at: UnixTime) -> BlogResult<()> {
        if ctx.in_the_past(delete_at) {
            return Err(BlogError::InvalidState(format!(
                "delete at {delete_at} is not after block time {}",
                ctx.block_time
            )));
        }
        Ok(())
    }

    /// Schedule deletion of `article_id` at `delete_at` on behalf of the main
    /// signer and persist the cancellable task record.
    pub fn schedule(
        &self,
        ctx: &Context,
        store: &dyn KvStore,
        article_id: RecordId,
        delete_at: UnixTime,
    ) -> BlogResult<TaskId> {
        Self::ensure_future(ctx, delete_at)?;
        let owner = ctx.main_signer()?;
        let payload = Msg::DeleteArticle(DeleteArticleMsg { article_id }).encode()?;
        let task_id = self.scheduler.schedule(store, delete_at, payload)?;

        let mut task = DeleteArticleTask {
            id: Some(task_id),
            article_id,
            task_owner: owner,
        };
        self.buckets.delete_tasks.put(store, &mut task)?;
        info!(
            task = task_id.sequence(),
            article = article_id.sequence(),
            delete_at = delete_at.as_secs(),
            "article deletion scheduled"
        );
        Ok(task_id)
    }

    /// Load a task and check that the main signer owns it.
    pub fn authorize_cancel(
        &self,
        ctx: &Context,
        store: &dyn KvStore,
        task_id: &TaskId,
    ) -> BlogResult<DeleteArticleTask> {
        let task = self.buckets.delete_tasks.one(store, task_id)?;
        let signer = ctx.main_signer()?;
        if task.task_owner != signer {
            return Err(BlogError::unauthorized(
                signer,
                format!("cancel delete task {task_id}"),
            ));
        }
        Ok(task)
    }

    /// Cancel a scheduled deletion.
    ///
    /// The scheduler entry goes first; the task record is removed only once
    /// that succeeded, so a failed cancel can be retried.
    pub fn cancel(&self, ctx: &Context, store: &dyn KvStore, task_id: &TaskId) -> BlogResult<()> {
        let task = self.authorize_cancel(ctx, store, task_id)?;
        self.scheduler.cancel(store, task_id)?;
        self.buckets.delete_tasks.delete(store, task_id)?;
        info!(
            task = task_id.sequence(),
            article = task.article_id.sequence(),
            "article deletion cancelled"
        );
        Ok(())
    }

    pub fn task(&self, store: &dyn KvStore, task_id: &TaskId) -> BlogResult<Option<DeleteArticleTask>> {
        Ok(self.buckets.delete_tasks.get(store, task_id)?)
    }
}

impl std::fmt::Debug for DeleteTaskCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteTaskCoordinator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlogConfig;
    use quill_cron::{CronError, CronResult, TimeScheduler};
    use quill_store::InMemoryKvStore;
    use quill_types::Address;

    /// Delegates scheduling but refuses every cancel.
    struct StuckScheduler(TimeScheduler);

    impl Scheduler for StuckScheduler {
        fn schedule(&self, store: &dyn KvStore, run_at: UnixTime, payload: Vec<u8>) -> CronResult<TaskId> {
            self.0.schedule(store, run_at, payload)
        }

        fn cancel(&self, _: &dyn KvStore, _: &TaskId) -> CronResult<()> {
            Err(CronError::Handler("scheduler unavailable".into()))
        }
    }

    fn alice() -> Address {
        Address::from_raw([1; 20])
    }

    fn bob() -> Address {
        Address::from_raw([2; 20])
    }

    fn coordinator(scheduler: Arc<dyn Scheduler>) -> DeleteTaskCoordinator {
        let buckets = Arc::new(Buckets::new(&BlogConfig::default()).unwrap());
        DeleteTaskCoordinator::new(scheduler, buckets)
    }

    fn time_scheduler() -> Arc<dyn Scheduler> {
        Arc::new(TimeScheduler::new().unwrap())
    }

    #[test]
    fn schedule_persists_task_record() {
        let store = InMemoryKvStore::new();
        let coord = coordinator(time_scheduler());
        let ctx = Context::signed(UnixTime::from_secs(10), alice());
        let article = RecordId::from_sequence(4);

        let task_id = coord.schedule(&ctx, &store, article, UnixTime::from_secs(20)).unwrap();
        let task = coord.task(&store, &task_id).unwrap().unwrap();
        assert_eq!(task.article_id, article);
        assert_eq!(task.task_owner, alice());
    }

    #[test]
    fn deadline_not_in_future_rejected() {
        let store = InMemoryKvStore::new();
        let coord = coordinator(time_scheduler());
        let ctx = Context::signed(UnixTime::from_secs(10), alice());
        for t in [5, 10] {
            let err = coord
                .schedule(&ctx, &store, RecordId::from_sequence(1), UnixTime::from_secs(t))
                .unwrap_err();
            assert!(matches!(err, BlogError::InvalidState(_)));
        }
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn only_owner_may_cancel() {
        let store = InMemoryKvStore::new();
        let coord = coordinator(time_scheduler());
        let task_id = coord
            .schedule(
                &Context::signed(UnixTime::from_secs(1), alice()),
                &store,
                RecordId::from_sequence(1),
                UnixTime::from_secs(50),
            )
            .unwrap();

        let err = coord
            .cancel(&Context::signed(UnixTime::from_secs(2), bob()), &store, &task_id)
            .unwrap_err();
        assert!(matches!(err, BlogError::Unauthorized { signer, .. } if signer == bob()));
        assert!(coord.task(&store, &task_id).unwrap().is_some());

        coord
            .cancel(&Context::signed(UnixTime::from_secs(2), alice()), &store, &task_id)
            .unwrap();
        assert!(coord.task(&store, &task_id).unwrap().is_none());
    }

    #[test]
    fn cancel_unknown_task_is_not_found() {
        let store = InMemoryKvStore::new();
        let coord = coordinator(time_scheduler());
        let err = coord
            .cancel(
                &Context::signed(UnixTime::from_secs(2), alice()),
                &store,
                &RecordId::from_sequence(9),
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn failed_scheduler_cancel_keeps_task_record() {
        let store = InMemoryKvStore::new();
        let coord = coordinator(Arc::new(StuckScheduler(TimeScheduler::new().unwrap())));
        let ctx = Context::signed(UnixTime::from_secs(1), alice());
        let task_id = coord
            .schedule(&ctx, &store, RecordId::from_sequence(1), UnixTime::from_secs(50))
            .unwrap();

        assert!(matches!(
            coord.cancel(&ctx, &store, &task_id),
            Err(BlogError::Cron(CronError::Handler(_)))
        ));
        assert!(coord.task(&store, &task_id).unwrap().is_some());
    }
}
