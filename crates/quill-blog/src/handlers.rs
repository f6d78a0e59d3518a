//! Handlers for every blog message.
//!
//! Each handler has a `prepare` step shared by `check` and `deliver`: it
//! loads what the message refers to, checks the signer, and builds the records
//! to write. `check` stops there and reports gas; `deliver` writes.

use std::sync::Arc;

use tracing::debug;

use quill_store::KvStore;

use crate::buckets::Buckets;
use crate::config::GasSchedule;
use crate::error::{BlogError, BlogResult};
use crate::handler::{CheckResult, Context, DeliverResult, Handler};
use crate::models::{Article, Blog, Comment, Like, User};
use crate::msg::{CreateArticleMsg, Msg};
use crate::tasks::DeleteTaskCoordinator;

macro_rules! expect_msg {
    ($msg:expr, $variant:ident) => {
        match $msg {
            Msg::$variant(inner) => inner,
            other => {
                return Err(BlogError::UnexpectedMsg {
                    expected: stringify!($variant),
                    got: other.path(),
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// CreateUser
// ---------------------------------------------------------------------------

pub struct CreateUserHandler {
    buckets: Arc<Buckets>,
    gas: u64,
}

impl CreateUserHandler {
    pub fn new(buckets: Arc<Buckets>, gas: &GasSchedule) -> Self {
        Self {
            buckets,
            gas: gas.create_user,
        }
    }

    fn prepare(&self, ctx: &Context, msg: &Msg) -> BlogResult<User> {
        let msg = expect_msg!(msg, CreateUser);
        Ok(User {
            id: None,
            username: msg.username.clone(),
            bio: msg.bio.clone(),
            registered_at: ctx.block_time,
        })
    }
}

impl Handler for CreateUserHandler {
    fn check(&self, ctx: &Context, _store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        self.prepare(ctx, msg)?;
        Ok(CheckResult::gas(self.gas))
    }

    fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let mut user = self.prepare(ctx, msg)?;
        let id = self.buckets.users.put(store, &mut user)?;
        Ok(DeliverResult::id(id))
    }
}

// ---------------------------------------------------------------------------
// CreateBlog
// ---------------------------------------------------------------------------

pub struct CreateBlogHandler {
    buckets: Arc<Buckets>,
    gas: u64,
}

impl CreateBlogHandler {
    pub fn new(buckets: Arc<Buckets>, gas: &GasSchedule) -> Self {
        Self {
            buckets,
            gas: gas.create_blog,
        }
    }

    fn prepare(&self, ctx: &Context, msg: &Msg) -> BlogResult<Blog> {
        let msg = expect_msg!(msg, CreateBlog);
        Ok(Blog {
            id: None,
            owner: ctx.main_signer()?,
            title: msg.title.clone(),
            description: msg.description.clone(),
            created_at: ctx.block_time,
        })
    }
}

impl Handler for CreateBlogHandler {
    fn check(&self, ctx: &Context, _store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        self.prepare(ctx, msg)?;
        Ok(CheckResult::gas(self.gas))
    }

    fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let mut blog = self.prepare(ctx, msg)?;
        let id = self.buckets.blogs.put(store, &mut blog)?;
        Ok(DeliverResult::id(id))
    }
}

// ---------------------------------------------------------------------------
// ChangeBlogOwner
// ---------------------------------------------------------------------------

pub struct ChangeBlogOwnerHandler {
    buckets: Arc<Buckets>,
    gas: u64,
}

impl ChangeBlogOwnerHandler {
    pub fn new(buckets: Arc<Buckets>, gas: &GasSchedule) -> Self {
        Self {
            buckets,
            gas: gas.change_blog_owner,
        }
    }

    fn prepare(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<Blog> {
        let msg = expect_msg!(msg, ChangeBlogOwner);
        let mut blog = self.buckets.blogs.one(store, &msg.blog_id)?;
        let signer = ctx.main_signer()?;
        if blog.owner != signer {
            return Err(BlogError::unauthorized(
                signer,
                format!("change the owner of blog {}", msg.blog_id),
            ));
        }
        blog.owner = msg.new_owner;
        Ok(blog)
    }
}

impl Handler for ChangeBlogOwnerHandler {
    fn check(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        self.prepare(ctx, store, msg)?;
        Ok(CheckResult::gas(self.gas))
    }

    fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let mut blog = self.prepare(ctx, store, msg)?;
        let id = self.buckets.blogs.put(store, &mut blog)?;
        Ok(DeliverResult::id(id))
    }
}

// ---------------------------------------------------------------------------
// CreateArticle
// ---------------------------------------------------------------------------

pub struct CreateArticleHandler {
    buckets: Arc<Buckets>,
    coordinator: Arc<DeleteTaskCoordinator>,
    gas: GasSchedule,
}

impl CreateArticleHandler {
    pub fn new(
        buckets: Arc<Buckets>,
        coordinator: Arc<DeleteTaskCoordinator>,
        gas: &GasSchedule,
    ) -> Self {
        Self {
            buckets,
            coordinator,
            gas: gas.clone(),
        }
    }

    fn prepare<'m>(
        &self,
        ctx: &Context,
        store: &dyn KvStore,
        msg: &'m Msg,
    ) -> BlogResult<(&'m CreateArticleMsg, Article)> {
        let msg = expect_msg!(msg, CreateArticle);
        let blog = self.buckets.blogs.one(store, &msg.blog_id)?;
        let signer = ctx.main_signer()?;
        if blog.owner != signer {
            return Err(BlogError::unauthorized(
                signer,
                format!("post an article to blog {}", msg.blog_id),
            ));
        }
        if let Some(delete_at) = msg.delete_at {
            DeleteTaskCoordinator::ensure_future(ctx, delete_at)?;
        }
        let article = Article {
            id: None,
            blog_id: msg.blog_id,
            owner: signer,
            title: msg.title.clone(),
            content: msg.content.clone(),
            comment_count: 0,
            like_count: 0,
            created_at: ctx.block_time,
            delete_at: msg.delete_at,
        };
        Ok((msg, article))
    }
}

impl Handler for CreateArticleHandler {
    fn check(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        let (msg, _) = self.prepare(ctx, store, msg)?;
        Ok(CheckResult::gas(self.gas.article(msg.content.len())))
    }

    fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let (_, mut article) = self.prepare(ctx, store, msg)?;
        let id = self.buckets.articles.put(store, &mut article)?;
        if let Some(delete_at) = article.delete_at {
            self.coordinator.schedule(ctx, store, id, delete_at)?;
        }
        Ok(DeliverResult::id(id))
    }
}

// ---------------------------------------------------------------------------
// DeleteArticle
// ---------------------------------------------------------------------------

/// Owner-initiated deletion through the main router.
pub struct DeleteArticleHandler {
    buckets: Arc<Buckets>,
}

impl DeleteArticleHandler {
    pub fn new(buckets: Arc<Buckets>) -> Self {
        Self { buckets }
    }

    fn prepare(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<Article> {
        let msg = expect_msg!(msg, DeleteArticle);
        let article = self.buckets.articles.one(store, &msg.article_id)?;
        let signer = ctx.main_signer()?;
        if article.owner != signer {
            return Err(BlogError::unauthorized(
                signer,
                format!("delete article {}", msg.article_id),
            ));
        }
        Ok(article)
    }
}

impl Handler for DeleteArticleHandler {
    fn check(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        self.prepare(ctx, store, msg)?;
        Ok(CheckResult::default())
    }

    fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let article = self.prepare(ctx, store, msg)?;
        let Some(id) = article.id else {
            return Ok(DeliverResult::default());
        };
        self.buckets.articles.delete(store, &id)?;
        Ok(DeliverResult::id(id))
    }
}

// ---------------------------------------------------------------------------
// CancelDeleteArticleTask
// ---------------------------------------------------------------------------

pub struct CancelDeleteArticleTaskHandler {
    coordinator: Arc<DeleteTaskCoordinator>,
}

impl CancelDeleteArticleTaskHandler {
    pub fn new(coordinator: Arc<DeleteTaskCoordinator>) -> Self {
        Self { coordinator }
    }
}

impl Handler for CancelDeleteArticleTaskHandler {
    fn check(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        let msg = expect_msg!(msg, CancelDeleteArticleTask);
        self.coordinator.authorize_cancel(ctx, store, &msg.task_id)?;
        Ok(CheckResult::default())
    }

    fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let msg = expect_msg!(msg, CancelDeleteArticleTask);
        self.coordinator.cancel(ctx, store, &msg.task_id)?;
        Ok(DeliverResult::id(msg.task_id))
    }
}

// ---------------------------------------------------------------------------
// CronDeleteArticle
// ---------------------------------------------------------------------------

/// Scheduled deletion, registered on the cron router only.
///
/// Carries no signer check: the task owner was checked when the deletion was
/// scheduled. A missing article means it is already gone, which is success.
pub struct CronDeleteArticleHandler {
    buckets: Arc<Buckets>,
}

impl CronDeleteArticleHandler {
    pub fn new(buckets: Arc<Buckets>) -> Self {
        Self { buckets }
    }
}

impl Handler for CronDeleteArticleHandler {
    fn check(&self, _ctx: &Context, _store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        expect_msg!(msg, DeleteArticle);
        Ok(CheckResult::default())
    }

    fn deliver(&self, _ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let msg = expect_msg!(msg, DeleteArticle);
        let existed = self.buckets.articles.delete(store, &msg.article_id)?;
        debug!(
            article = msg.article_id.sequence(),
            existed, "scheduled article deletion ran"
        );
        Ok(DeliverResult::id(msg.article_id))
    }
}

// ---------------------------------------------------------------------------
// CreateComment
// ---------------------------------------------------------------------------

pub struct CreateCommentHandler {
    buckets: Arc<Buckets>,
    gas: u64,
}

impl CreateCommentHandler {
    pub fn new(buckets: Arc<Buckets>, gas: &GasSchedule) -> Self {
        Self {
            buckets,
            gas: gas.create_comment,
        }
    }

    fn prepare(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<(Comment, Article)> {
        let msg = expect_msg!(msg, CreateComment);
        let article = self.buckets.articles.one(store, &msg.article_id)?;
        let comment = Comment {
            id: None,
            article_id: msg.article_id,
            owner: ctx.main_signer()?,
            content: msg.content.clone(),
            created_at: ctx.block_time,
        };
        Ok((comment, article))
    }
}

impl Handler for CreateCommentHandler {
    fn check(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        self.prepare(ctx, store, msg)?;
        Ok(CheckResult::gas(self.gas))
    }

    fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let (mut comment, mut article) = self.prepare(ctx, store, msg)?;
        let id = self.buckets.comments.put(store, &mut comment)?;
        article.comment_count += 1;
        self.buckets.articles.put(store, &mut article)?;
        Ok(DeliverResult::id(id))
    }
}

// ---------------------------------------------------------------------------
// CreateLike
// ---------------------------------------------------------------------------

pub struct CreateLikeHandler {
    buckets: Arc<Buckets>,
    gas: u64,
}

impl CreateLikeHandler {
    pub fn new(buckets: Arc<Buckets>, gas: &GasSchedule) -> Self {
        Self {
            buckets,
            gas: gas.create_like,
        }
    }

    fn prepare(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<(Like, Article)> {
        let msg = expect_msg!(msg, CreateLike);
        let article = self.buckets.articles.one(store, &msg.article_id)?;
        let like = Like {
            id: None,
            article_id: msg.article_id,
            owner: ctx.main_signer()?,
            created_at: ctx.block_time,
        };
        Ok((like, article))
    }
}

impl Handler for CreateLikeHandler {
    fn check(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        self.prepare(ctx, store, msg)?;
        Ok(CheckResult::gas(self.gas))
    }

    fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let (mut like, mut article) = self.prepare(ctx, store, msg)?;
        let id = self.buckets.likes.put(store, &mut like)?;
        article.like_count += 1;
        self.buckets.articles.put(store, &mut article)?;
        Ok(DeliverResult::id(id))
    }
}
