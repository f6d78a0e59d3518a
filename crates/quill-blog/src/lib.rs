//! Blog state machine built on the Quill indexed store.
//!
//! The crate wires six record buckets, a message set and their handlers into
//! a [`BlogApp`]. Every delivered message runs against a staged overlay of
//! the application store and is committed as one batch, or not at all.
//!
//! # Routing
//!
//! Two routers are built at start-up:
//!
//! - the **main** router ([`routes::register_routes`]) serves ordinary
//!   transactions;
//! - the **cron** router ([`routes::register_cron_routes`]) is reachable only
//!   through the cron executor and serves scheduled article deletion.
//!
//! The same [`msg::DeleteArticleMsg`] is handled differently by the two: the
//! main router requires the article owner's signature, the cron router does
//! not and treats an already deleted article as done.

pub mod app;
pub mod buckets;
pub mod config;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod models;
pub mod msg;
pub mod routes;
pub mod tasks;

pub use app::BlogApp;
pub use buckets::{build_article_user_index, build_blog_timed_index, Buckets};
pub use config::{BlogConfig, GasSchedule};
pub use error::{BlogError, BlogResult};
pub use handler::{CheckResult, Context, DeliverResult, Handler, Router};
pub use models::{Article, Blog, Comment, DeleteArticleTask, Like, User};
pub use msg::Msg;
pub use tasks::DeleteTaskCoordinator;
