//! Buckets and index extractors for the blog records.
//!
//! | bucket      | index         | key                         | unique |
//! |-------------|---------------|-----------------------------|--------|
//! | `user`      | `username`    | username bytes              | yes    |
//! | `blog`      | `user`        | owner address (20 bytes)    | no     |
//! | `article`   | `blog`        | blog ID (8 bytes)           | no     |
//! | `article`   | `timedblog`   | blog ID ‖ created_at (16)   | no     |
//! | `comment`   | `article`     | article ID                  | no     |
//! | `comment`   | `user`        | owner address               | no     |
//! | `comment`   | `articleuser` | article ID ‖ owner (28)     | no     |
//! | `like`      | `article`     | article ID                  | no     |
//! | `deleteart` | -             |                             |        |

use quill_store::{Bucket, KvStore, StoreResult};
use quill_types::{Address, RecordId, UnixTime};

use crate::config::BlogConfig;
use crate::error::{BlogError, BlogResult};
use crate::models::{Article, Blog, Comment, DeleteArticleTask, Like, User};

/// Compound key ordering one blog's articles by creation time.
///
/// Negative times have no order-preserving unsigned encoding and are rejected.
pub fn build_blog_timed_index(blog_id: &RecordId, created_at: UnixTime) -> Result<Vec<u8>, String> {
    let time = created_at
        .to_index_bytes()
        .ok_or_else(|| format!("cannot index negative time {created_at}"))?;
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(blog_id.as_bytes());
    key.extend_from_slice(&time);
    Ok(key)
}

/// Compound key of one user's comments under one article.
pub fn build_article_user_index(article_id: &RecordId, owner: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(28);
    key.extend_from_slice(article_id.as_bytes());
    key.extend_from_slice(owner.as_bytes());
    key
}

fn user_username(u: &User) -> Result<Option<Vec<u8>>, String> {
    Ok(Some(u.username.as_bytes().to_vec()))
}

fn blog_owner(b: &Blog) -> Result<Option<Vec<u8>>, String> {
    Ok(Some(b.owner.as_bytes().to_vec()))
}

fn article_blog(a: &Article) -> Result<Option<Vec<u8>>, String> {
    Ok(Some(a.blog_id.as_bytes().to_vec()))
}

fn article_timed_blog(a: &Article) -> Result<Option<Vec<u8>>, String> {
    build_blog_timed_index(&a.blog_id, a.created_at).map(Some)
}

fn comment_article(c: &Comment) -> Result<Option<Vec<u8>>, String> {
    Ok(Some(c.article_id.as_bytes().to_vec()))
}

fn comment_owner(c: &Comment) -> Result<Option<Vec<u8>>, String> {
    Ok(Some(c.owner.as_bytes().to_vec()))
}

fn comment_article_user(c: &Comment) -> Result<Option<Vec<u8>>, String> {
    Ok(Some(build_article_user_index(&c.article_id, &c.owner)))
}

fn like_article(l: &Like) -> Result<Option<Vec<u8>>, String> {
    Ok(Some(l.article_id.as_bytes().to_vec()))
}

/// Every bucket the blog application reads or writes.
#[derive(Debug)]
pub struct Buckets {
    pub users: Bucket<User>,
    pub blogs: Bucket<Blog>,
    pub articles: Bucket<Article>,
    pub comments: Bucket<Comment>,
    pub likes: Bucket<Like>,
    pub delete_tasks: Bucket<DeleteArticleTask>,
}

impl Buckets {
    pub fn new(config: &BlogConfig) -> StoreResult<Self> {
        let page = config.scan_page_size;
        Ok(Self {
            users: Bucket::new("user")?
                .with_index("username", user_username, true)?
                .with_page_size(page),
            blogs: Bucket::new("blog")?
                .with_index("user", blog_owner, false)?
                .with_page_size(page),
            articles: Bucket::new("article")?
                .with_index("blog", article_blog, false)?
                .with_index("timedblog", article_timed_blog, false)?
                .with_page_size(page),
            comments: Bucket::new("comment")?
                .with_index("article", comment_article, false)?
                .with_index("user", comment_owner, false)?
                .with_index("articleuser", comment_article_user, false)?
                .with_page_size(page),
            likes: Bucket::new("like")?
                .with_index("article", like_article, false)?
                .with_page_size(page),
            delete_tasks: Bucket::new("deleteart")?.with_page_size(page),
        })
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn user_by_username(&self, store: &dyn KvStore, username: &str) -> StoreResult<Option<User>> {
        self.users
            .one_by_unique(store, "username", username.as_bytes())
    }

    pub fn blogs_by_owner(&self, store: &dyn KvStore, owner: &Address) -> StoreResult<Vec<Blog>> {
        let scan = self.blogs.query(store, "user", owner.as_bytes())?;
        self.blogs.load(store, scan)
    }

    /// Articles of one blog, oldest first.
    pub fn articles_by_blog(&self, store: &dyn KvStore, blog_id: &RecordId) -> StoreResult<Vec<Article>> {
        let scan = self
            .articles
            .query_prefix(store, "timedblog", blog_id.as_bytes())?;
        self.articles.load(store, scan)
    }

    /// Articles of one blog created in `[from, to)`, oldest first.
    pub fn articles_by_blog_between(
        &self,
        store: &dyn KvStore,
        blog_id: &RecordId,
        from: UnixTime,
        to: UnixTime,
    ) -> BlogResult<Vec<Article>> {
        let start = build_blog_timed_index(blog_id, from).map_err(BlogError::InvalidState)?;
        let end = build_blog_timed_index(blog_id, to).map_err(BlogError::InvalidState)?;
        let scan = self
            .articles
            .query_range(store, "timedblog", &start, Some(&end))?;
        Ok(self.articles.load(store, scan)?)
    }

    pub fn comments_by_article(&self, store: &dyn KvStore, article_id: &RecordId) -> StoreResult<Vec<Comment>> {
        let scan = self.comments.query(store, "article", article_id.as_bytes())?;
        self.comments.load(store, scan)
    }

    pub fn comments_by_user(&self, store: &dyn KvStore, owner: &Address) -> StoreResult<Vec<Comment>> {
        let scan = self.comments.query(store, "user", owner.as_bytes())?;
        self.comments.load(store, scan)
    }

    pub fn comments_by_article_user(
        &self,
        store: &dyn KvStore,
        article_id: &RecordId,
        owner: &Address,
    ) -> StoreResult<Vec<Comment>> {
        let key = build_article_user_index(article_id, owner);
        let scan = self.comments.query(store, "articleuser", &key)?;
        self.comments.load(store, scan)
    }

    pub fn likes_by_article(&self, store: &dyn KvStore, article_id: &RecordId) -> StoreResult<Vec<Like>> {
        let scan = self.likes.query(store, "article", article_id.as_bytes())?;
        self.likes.load(store, scan)
    }
}
