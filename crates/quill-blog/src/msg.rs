//! Messages accepted by the blog application.

use serde::{Deserialize, Serialize};

use quill_cron::TaskId;
use quill_types::{Address, RecordId, UnixTime, Validatable, ValidationErrors};

use crate::error::{BlogError, BlogResult};
use crate::models::{
    check_address, check_bio, check_comment, check_deadline, check_long_text, check_ref,
    check_title, check_username,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserMsg {
    pub username: String,
    pub bio: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBlogMsg {
    pub title: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBlogOwnerMsg {
    pub blog_id: RecordId,
    pub new_owner: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateArticleMsg {
    pub blog_id: RecordId,
    pub title: String,
    pub content: String,
    /// Schedule the article for deletion at this block time.
    pub delete_at: Option<UnixTime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteArticleMsg {
    pub article_id: RecordId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelDeleteArticleTaskMsg {
    pub task_id: TaskId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCommentMsg {
    pub article_id: RecordId,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLikeMsg {
    pub article_id: RecordId,
}

/// Every message the blog routers understand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Msg {
    CreateUser(CreateUserMsg),
    CreateBlog(CreateBlogMsg),
    ChangeBlogOwner(ChangeBlogOwnerMsg),
    CreateArticle(CreateArticleMsg),
    DeleteArticle(DeleteArticleMsg),
    CancelDeleteArticleTask(CancelDeleteArticleTaskMsg),
    CreateComment(CreateCommentMsg),
    CreateLike(CreateLikeMsg),
}

impl Msg {
    pub const CREATE_USER: &'static str = "blog/create_user";
    pub const CREATE_BLOG: &'static str = "blog/create_blog";
    pub const CHANGE_BLOG_OWNER: &'static str = "blog/change_blog_owner";
    pub const CREATE_ARTICLE: &'static str = "blog/create_article";
    pub const DELETE_ARTICLE: &'static str = "blog/delete_article";
    pub const CANCEL_DELETE_ARTICLE_TASK: &'static str = "blog/cancel_delete_article_task";
    pub const CREATE_COMMENT: &'static str = "blog/create_comment";
    pub const CREATE_LIKE: &'static str = "blog/create_like";

    /// Routing path of the message.
    pub fn path(&self) -> &'static str {
        match self {
            Self::CreateUser(_) => Self::CREATE_USER,
            Self::CreateBlog(_) => Self::CREATE_BLOG,
            Self::ChangeBlogOwner(_) => Self::CHANGE_BLOG_OWNER,
            Self::CreateArticle(_) => Self::CREATE_ARTICLE,
            Self::DeleteArticle(_) => Self::DELETE_ARTICLE,
            Self::CancelDeleteArticleTask(_) => Self::CANCEL_DELETE_ARTICLE_TASK,
            Self::CreateComment(_) => Self::CREATE_COMMENT,
            Self::CreateLike(_) => Self::CREATE_LIKE,
        }
    }

    pub fn encode(&self) -> BlogResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| BlogError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> BlogResult<Self> {
        bincode::deserialize(bytes).map_err(|e| BlogError::Codec(e.to_string()))
    }
}

impl Validatable for Msg {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        match self {
            Self::CreateUser(m) => {
                errs.check("Username", check_username(&m.username));
                errs.check("Bio", check_bio(&m.bio));
            }
            Self::CreateBlog(m) => {
                errs.check("Title", check_title(&m.title));
                errs.check("Description", check_long_text(&m.description));
            }
            Self::ChangeBlogOwner(m) => {
                errs.check("BlogID", check_ref(&m.blog_id));
                errs.check("NewOwner", check_address(&m.new_owner));
            }
            Self::CreateArticle(m) => {
                errs.check("BlogID", check_ref(&m.blog_id));
                errs.check("Title", check_title(&m.title));
                errs.check("Content", check_long_text(&m.content));
                errs.check("DeleteAt", check_deadline(m.delete_at));
            }
            Self::DeleteArticle(m) => errs.check("ArticleID", check_ref(&m.article_id)),
            Self::CancelDeleteArticleTask(m) => errs.check("TaskID", check_ref(&m.task_id)),
            Self::CreateComment(m) => {
                errs.check("ArticleID", check_ref(&m.article_id));
                errs.check("Content", check_comment(&m.content));
            }
            Self::CreateLike(m) => errs.check("ArticleID", check_ref(&m.article_id)),
        }
        errs.into_result()
    }
}
