//! Router construction.

use std::sync::Arc;

use crate::buckets::Buckets;
use crate::config::GasSchedule;
use crate::error::BlogResult;
use crate::handler::Router;
use crate::handlers::{
    CancelDeleteArticleTaskHandler, ChangeBlogOwnerHandler, CreateArticleHandler,
    CreateBlogHandler, CreateCommentHandler, CreateLikeHandler, CreateUserHandler,
    CronDeleteArticleHandler, DeleteArticleHandler,
};
use crate::msg::Msg;
use crate::tasks::DeleteTaskCoordinator;

/// Register the handlers reachable by ordinary transactions.
pub fn register_routes(
    router: &mut Router,
    buckets: &Arc<Buckets>,
    coordinator: &Arc<DeleteTaskCoordinator>,
    gas: &GasSchedule,
) -> BlogResult<()> {
    router.handle(
        Msg::CREATE_USER,
        Box::new(CreateUserHandler::new(Arc::clone(buckets), gas)),
    )?;
    router.handle(
        Msg::CREATE_BLOG,
        Box::new(CreateBlogHandler::new(Arc::clone(buckets), gas)),
    )?;
    router.handle(
        Msg::CHANGE_BLOG_OWNER,
        Box::new(ChangeBlogOwnerHandler::new(Arc::clone(buckets), gas)),
    )?;
    router.handle(
        Msg::CREATE_ARTICLE,
        Box::new(CreateArticleHandler::new(
            Arc::clone(buckets),
            Arc::clone(coordinator),
            gas,
        )),
    )?;
    router.handle(
        Msg::DELETE_ARTICLE,
        Box::new(DeleteArticleHandler::new(Arc::clone(buckets))),
    )?;
    router.handle(
        Msg::CANCEL_DELETE_ARTICLE_TASK,
        Box::new(CancelDeleteArticleTaskHandler::new(Arc::clone(coordinator))),
    )?;
    router.handle(
        Msg::CREATE_COMMENT,
        Box::new(CreateCommentHandler::new(Arc::clone(buckets), gas)),
    )?;
    router.handle(
        Msg::CREATE_LIKE,
        Box::new(CreateLikeHandler::new(Arc::clone(buckets), gas)),
    )?;
    Ok(())
}

/// Register the handlers reachable only from the cron executor.
pub fn register_cron_routes(router: &mut Router, buckets: &Arc<Buckets>) -> BlogResult<()> {
    router.handle(
        Msg::DELETE_ARTICLE,
        Box::new(CronDeleteArticleHandler::new(Arc::clone(buckets))),
    )
}
