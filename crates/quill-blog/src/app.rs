use std::sync::Arc;

use tracing::info;

use quill_cron::{
    CronExecutor, CronResult, Fired, ScheduledTask, Scheduler, TaskHandler, TaskId, TickReport,
    TimeScheduler,
};
use quill_store::{KvStore, StagedStore};
use quill_types::UnixTime;

use crate::buckets::Buckets;
use crate::config::BlogConfig;
use crate::error::BlogResult;
use crate::handler::{CheckResult, Context, DeliverResult, Router};
use crate::msg::Msg;
use crate::routes::{register_cron_routes, register_routes};
use crate::tasks::DeleteTaskCoordinator;

/// Feeds due scheduler payloads into the cron router.
pub struct CronRouter {
    router: Router,
}

impl CronRouter {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

impl TaskHandler for CronRouter {
    fn run(&self, store: &dyn KvStore, task: &ScheduledTask, now: UnixTime) -> CronResult<()> {
        let msg = Msg::decode(&task.payload)?;
        self.router.deliver(&Context::unsigned(now), store, &msg)?;
        Ok(())
    }
}

/// The blog state machine.
///
/// `deliver` runs a message against a staged overlay of `store` and commits
/// it as one batch when the handler succeeds. `check` never writes.
pub struct BlogApp {
    config: BlogConfig,
    buckets: Arc<Buckets>,
    coordinator: Arc<DeleteTaskCoordinator>,
    router: Router,
    cron: CronExecutor<CronRouter>,
}

impl BlogApp {
    pub fn new(config: BlogConfig) -> BlogResult<Self> {
        let scheduler: Arc<dyn Scheduler> = Arc::new(TimeScheduler::new()?);
        Self::with_scheduler(config, scheduler)
    }

    /// Build the app around a custom scheduler front end.
    ///
    /// Scheduled tasks are still executed from the `crontask` queue, so the
    /// scheduler must store its tasks there.
    pub fn with_scheduler(config: BlogConfig, scheduler: Arc<dyn Scheduler>) -> BlogResult<Self> {
        let buckets = Arc::new(Buckets::new(&config)?);
        let coordinator = Arc::new(DeleteTaskCoordinator::new(scheduler, Arc::clone(&buckets)));

        let mut router = Router::new();
        register_routes(&mut router, &buckets, &coordinator, &config.gas)?;
        let mut cron_router = Router::new();
        register_cron_routes(&mut cron_router, &buckets)?;
        let cron = CronExecutor::new(CronRouter::new(cron_router))?
            .with_max_tasks_per_tick(config.max_tasks_per_tick);

        info!(
            routes = router.paths().count(),
            max_tasks_per_tick = config.max_tasks_per_tick,
            "blog app ready"
        );
        Ok(Self {
            config,
            buckets,
            coordinator,
            router,
            cron,
        })
    }

    pub fn config(&self) -> &BlogConfig {
        &self.config
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    pub fn coordinator(&self) -> &DeleteTaskCoordinator {
        &self.coordinator
    }

    pub fn scheduler(&self) -> &TimeScheduler {
        self.cron.scheduler()
    }

    /// Validate a message and report its gas without changing `store`.
    pub fn check(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        let staged = StagedStore::new(store);
        self.router.check(ctx, &staged, msg)
    }

    /// Execute a message. On error `store` is left exactly as it was.
    pub fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let staged = StagedStore::new(store);
        let result = self.router.deliver(ctx, &staged, msg)?;
        staged.commit()?;
        Ok(result)
    }

    /// Fire scheduled tasks due at `now`. Call once per block.
    pub fn tick(&self, store: &dyn KvStore, now: UnixTime) -> BlogResult<TickReport> {
        Ok(self.cron.tick(store, now)?)
    }

    /// Fire one scheduled task by ID.
    pub fn fire(&self, store: &dyn KvStore, task_id: &TaskId, now: UnixTime) -> BlogResult<Fired> {
        Ok(self.cron.execute(store, task_id, now)?)
    }
}

impl std::fmt::Debug for BlogApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlogApp")
            .field("config", &self.config)
            .field("router", &self.router)
            .field("cron", &self.cron)
            .finish()
    }
}
