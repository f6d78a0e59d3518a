//! End-to-end scenarios for scheduled article deletion.

use quill_blog::msg::{CancelDeleteArticleTaskMsg, CreateArticleMsg, CreateBlogMsg, DeleteArticleMsg};
use quill_blog::{BlogApp, BlogConfig, BlogError, Context, Msg};
use quill_cron::Fired;
use quill_store::{InMemoryKvStore, KvStore};
use quill_types::{Address, RecordId, UnixTime};

const ALICE: Address = Address::from_raw([0xa1; 20]);
const BOB: Address = Address::from_raw([0xb0; 20]);

fn at(secs: i64) -> UnixTime {
    UnixTime::from_secs(secs)
}

fn signed(secs: i64, who: Address) -> Context {
    Context::signed(at(secs), who)
}

struct Fixture {
    app: BlogApp,
    store: InMemoryKvStore,
    blog: RecordId,
}

impl Fixture {
    fn new() -> Self {
        let app = BlogApp::new(BlogConfig::default()).unwrap();
        let store = InMemoryKvStore::new();
        let blog = app
            .deliver(
                &signed(1, ALICE),
                &store,
                &Msg::CreateBlog(CreateBlogMsg {
                    title: "Alice writes".into(),
                    description: "Notes from Alice".into(),
                }),
            )
            .unwrap()
            .data
            .unwrap();
        Self { app, store, blog }
    }

    fn article(&self, now: i64, delete_at: Option<i64>) -> RecordId {
        self.app
            .deliver(
                &signed(now, ALICE),
                &self.store,
                &Msg::CreateArticle(CreateArticleMsg {
                    blog_id: self.blog,
                    title: "An article".into(),
                    content: "Short lived content".into(),
                    delete_at: delete_at.map(at),
                }),
            )
            .unwrap()
            .data
            .unwrap()
    }

    fn exists(&self, article: &RecordId) -> bool {
        self.app.buckets().articles.has(&self.store, article).unwrap()
    }

    /// The single queued task, as scheduled by the last article.
    fn only_task(&self) -> RecordId {
        let due = self.app.scheduler().due(&self.store, at(i64::MAX - 1)).unwrap();
        assert_eq!(due.len(), 1);
        due[0]
    }

    fn cancel(&self, now: i64, who: Address, task_id: RecordId) -> Result<(), BlogError> {
        self.app
            .deliver(
                &signed(now, who),
                &self.store,
                &Msg::CancelDeleteArticleTask(CancelDeleteArticleTaskMsg { task_id }),
            )
            .map(|_| ())
    }
}

#[test]
fn article_is_deleted_when_due() {
    let f = Fixture::new();
    let article = f.article(10, Some(100));
    let task_id = f.only_task();
    assert!(f.app.coordinator().task(&f.store, &task_id).unwrap().is_some());

    let early = f.app.tick(&f.store, at(99)).unwrap();
    assert_eq!(early.fired(), 0);
    assert!(f.exists(&article));

    let report = f.app.tick(&f.store, at(100)).unwrap();
    assert_eq!(report.completed, vec![task_id]);
    assert!(!f.exists(&article));
    assert!(f.app.buckets().articles_by_blog(&f.store, &f.blog).unwrap().is_empty());

    // The task record outlives the firing; the queue entry does not.
    assert!(f.app.coordinator().task(&f.store, &task_id).unwrap().is_some());
    assert!(!f.app.scheduler().is_queued(&f.store, &task_id).unwrap());
}

#[test]
fn firing_twice_is_a_noop() {
    let f = Fixture::new();
    f.article(10, Some(50));
    let task_id = f.only_task();

    assert_eq!(f.app.fire(&f.store, &task_id, at(50)).unwrap(), Fired::Completed);
    let after_first = f.store.snapshot().unwrap();
    assert_eq!(f.app.fire(&f.store, &task_id, at(60)).unwrap(), Fired::Missing);
    assert_eq!(f.store.snapshot().unwrap(), after_first);
}

#[test]
fn cancelled_deletion_never_fires() {
    let f = Fixture::new();
    let article = f.article(10, Some(100));
    let task_id = f.only_task();

    f.cancel(20, ALICE, task_id).unwrap();
    assert!(f.app.coordinator().task(&f.store, &task_id).unwrap().is_none());

    assert_eq!(f.app.tick(&f.store, at(500)).unwrap().fired(), 0);
    assert_eq!(f.app.fire(&f.store, &task_id, at(500)).unwrap(), Fired::Missing);
    assert!(f.exists(&article));
}

#[test]
fn cancel_by_stranger_is_unauthorized() {
    let f = Fixture::new();
    let article = f.article(10, Some(100));
    let task_id = f.only_task();
    let before = f.store.snapshot().unwrap();

    let err = f.cancel(20, BOB, task_id).unwrap_err();
    assert!(matches!(err, BlogError::Unauthorized { signer, .. } if signer == BOB));
    assert_eq!(f.store.snapshot().unwrap(), before);

    f.app.tick(&f.store, at(100)).unwrap();
    assert!(!f.exists(&article));
}

#[test]
fn cancel_twice_is_not_found() {
    let f = Fixture::new();
    f.article(10, Some(100));
    let task_id = f.only_task();
    f.cancel(20, ALICE, task_id).unwrap();
    assert!(f.cancel(21, ALICE, task_id).unwrap_err().is_not_found());
}

#[test]
fn cancel_after_firing_fails_and_keeps_task_record() {
    let f = Fixture::new();
    f.article(10, Some(30));
    let task_id = f.only_task();
    f.app.tick(&f.store, at(30)).unwrap();

    let err = f.cancel(40, ALICE, task_id).unwrap_err();
    assert!(err.is_not_found());
    assert!(f.app.coordinator().task(&f.store, &task_id).unwrap().is_some());
}

#[test]
fn deletion_time_must_be_in_the_future() {
    let f = Fixture::new();
    let before = f.store.snapshot().unwrap();
    for delete_at in [5, 10] {
        let err = f
            .app
            .deliver(
                &signed(10, ALICE),
                &f.store,
                &Msg::CreateArticle(CreateArticleMsg {
                    blog_id: f.blog,
                    title: "An article".into(),
                    content: "Short lived content".into(),
                    delete_at: Some(at(delete_at)),
                }),
            )
            .unwrap_err();
        assert!(matches!(err, BlogError::InvalidState(_)));
    }
    assert_eq!(f.store.snapshot().unwrap(), before);
}

#[test]
fn article_without_deadline_schedules_nothing() {
    let f = Fixture::new();
    f.article(10, None);
    assert!(f.app.scheduler().due(&f.store, at(i64::MAX - 1)).unwrap().is_empty());
}

#[test]
fn manual_delete_before_due_makes_firing_harmless() {
    let f = Fixture::new();
    let article = f.article(10, Some(100));
    let task_id = f.only_task();

    f.app
        .deliver(
            &signed(20, ALICE),
            &f.store,
            &Msg::DeleteArticle(DeleteArticleMsg { article_id: article }),
        )
        .unwrap();
    assert!(!f.exists(&article));

    let report = f.app.tick(&f.store, at(100)).unwrap();
    assert_eq!(report.completed, vec![task_id]);
    assert!(report.failed.is_empty());
}

#[test]
fn scheduled_delete_path_is_not_open_to_transactions() {
    let f = Fixture::new();
    let article = f.article(10, Some(100));
    let msg = Msg::DeleteArticle(DeleteArticleMsg { article_id: article });

    let unsigned = f.app.deliver(&Context::unsigned(at(20)), &f.store, &msg);
    assert!(matches!(unsigned, Err(BlogError::MissingSigner)));
    let stranger = f.app.deliver(&signed(20, BOB), &f.store, &msg);
    assert!(matches!(stranger, Err(BlogError::Unauthorized { .. })));
    assert!(f.exists(&article));
}

#[test]
fn many_deadlines_fire_in_time_order_across_ticks() {
    let f = Fixture::new();
    let late = f.article(10, Some(300));
    let early = f.article(11, Some(100));
    let mid = f.article(12, Some(200));

    f.app.tick(&f.store, at(150)).unwrap();
    assert!(!f.exists(&early));
    assert!(f.exists(&mid) && f.exists(&late));

    f.app.tick(&f.store, at(300)).unwrap();
    assert!(!f.exists(&mid) && !f.exists(&late));
    assert!(f.store.get(&f.app.buckets().articles.record_key(&early)).unwrap().is_none());
}
