//! Blog record types and their field rules.

use serde::{Deserialize, Serialize};

use quill_types::validation::{check_text, require_id, require_time};
use quill_types::{
    Address, FieldErrorKind, Identifiable, RecordId, UnixTime, Validatable, ValidationErrors,
};

// ---------------------------------------------------------------------------
// Field rules
// ---------------------------------------------------------------------------

pub(crate) fn username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

pub(crate) fn plain_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | ' ')
}

pub(crate) fn title_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, '$' | '@' | '!' | '%' | '*' | '?' | '&' | '#' | '\'' | '^' | '.' | ' ' | '+')
        || (';'..='_').contains(&c)
}

pub(crate) fn check_username(s: &str) -> Result<(), FieldErrorKind> {
    check_text(s, 4, 16, username_char)
}

pub(crate) fn check_bio(s: &str) -> Result<(), FieldErrorKind> {
    if s.is_empty() {
        return Ok(());
    }
    check_text(s, 4, 200, plain_char)
}

pub(crate) fn check_title(s: &str) -> Result<(), FieldErrorKind> {
    check_text(s, 4, 32, title_char)
}

/// Blog descriptions and article bodies.
pub(crate) fn check_long_text(s: &str) -> Result<(), FieldErrorKind> {
    check_text(s, 4, 1000, title_char)
}

pub(crate) fn check_comment(s: &str) -> Result<(), FieldErrorKind> {
    check_text(s, 4, 1000, plain_char)
}

pub(crate) fn check_address(a: &Address) -> Result<(), FieldErrorKind> {
    if a.is_zero() {
        return Err(FieldErrorKind::Empty);
    }
    Ok(())
}

/// A reference to another record. Sequences start at 1, so 0 is unset.
pub(crate) fn check_ref(id: &RecordId) -> Result<(), FieldErrorKind> {
    if id.sequence() == 0 {
        return Err(FieldErrorKind::Empty);
    }
    Ok(())
}

/// An optional deadline must be a valid, non-zero time when present.
pub(crate) fn check_deadline(t: Option<UnixTime>) -> Result<(), FieldErrorKind> {
    match t {
        None => Ok(()),
        Some(t) => require_time(t),
    }
}

macro_rules! identifiable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Identifiable for $ty {
                fn id(&self) -> Option<RecordId> {
                    self.id
                }

                fn set_id(&mut self, id: RecordId) {
                    self.id = Some(id);
                }
            }
        )+
    };
}

identifiable!(User, Blog, Article, Comment, Like, DeleteArticleTask);

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<RecordId>,
    pub username: String,
    pub bio: String,
    pub registered_at: UnixTime,
}

impl Validatable for User {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        errs.check("ID", require_id(self.id));
        errs.check("Username", check_username(&self.username));
        errs.check("Bio", check_bio(&self.bio));
        errs.check("RegisteredAt", require_time(self.registered_at));
        errs.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blog {
    pub id: Option<RecordId>,
    pub owner: Address,
    pub title: String,
    pub description: String,
    pub created_at: UnixTime,
}

impl Validatable for Blog {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        errs.check("ID", require_id(self.id));
        errs.check("Owner", check_address(&self.owner));
        errs.check("Title", check_title(&self.title));
        errs.check("Description", check_long_text(&self.description));
        errs.check("CreatedAt", require_time(self.created_at));
        errs.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: Option<RecordId>,
    pub blog_id: RecordId,
    pub owner: Address,
    pub title: String,
    pub content: String,
    pub comment_count: u64,
    pub like_count: u64,
    pub created_at: UnixTime,
    /// When set, the article is scheduled for deletion at this time.
    pub delete_at: Option<UnixTime>,
}

impl Validatable for Article {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        errs.check("ID", require_id(self.id));
        errs.check("BlogID", check_ref(&self.blog_id));
        errs.check("Owner", check_address(&self.owner));
        errs.check("Title", check_title(&self.title));
        errs.check("Content", check_long_text(&self.content));
        errs.check("CreatedAt", require_time(self.created_at));
        errs.check("DeleteAt", check_deadline(self.delete_at));
        errs.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Option<RecordId>,
    pub article_id: RecordId,
    pub owner: Address,
    pub content: String,
    pub created_at: UnixTime,
}

impl Validatable for Comment {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        errs.check("ID", require_id(self.id));
        errs.check("ArticleID", check_ref(&self.article_id));
        errs.check("Owner", check_address(&self.owner));
        errs.check("Content", check_comment(&self.content));
        errs.check("CreatedAt", require_time(self.created_at));
        errs.into_result()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub id: Option<RecordId>,
    pub article_id: RecordId,
    pub owner: Address,
    pub created_at: UnixTime,
}

impl Validatable for Like {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        errs.check("ID", require_id(self.id));
        errs.check("ArticleID", check_ref(&self.article_id));
        errs.check("Owner", check_address(&self.owner));
        errs.check("CreatedAt", require_time(self.created_at));
        errs.into_result()
    }
}

/// Cancellable handle on a scheduled article deletion.
///
/// `id` is the scheduler task ID, not a value from this bucket's own
/// sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteArticleTask {
    pub id: Option<RecordId>,
    pub article_id: RecordId,
    pub task_owner: Address,
}

impl Validatable for DeleteArticleTask {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::new();
        errs.check("ID", require_id(self.id));
        errs.check("ArticleID", check_ref(&self.article_id));
        errs.check("TaskOwner", check_address(&self.task_owner));
        errs.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::from_raw([7; 20])
    }

    fn article() -> Article {
        Article {
            id: Some(RecordId::from_sequence(1)),
            blog_id: RecordId::from_sequence(1),
            owner: owner(),
            title: "Best hacker's blog".into(),
            content: "Best description ever".into(),
            comment_count: 0,
            like_count: 0,
            created_at: UnixTime::from_secs(100),
            delete_at: None,
        }
    }

    // -----------------------------------------------------------------------
    // Field rules
    // -----------------------------------------------------------------------

    #[test]
    fn username_rules() {
        assert!(check_username("Crypt0_Xin.y-z").is_ok());
        assert!(check_username("ab").is_err());
        assert!(check_username("has space").is_err());
        assert!(check_username("waytoolongusername").is_err());
    }

    #[test]
    fn bio_may_be_empty() {
        assert!(check_bio("").is_ok());
        assert!(check_bio("abc").is_err());
        assert!(check_bio("Hello world").is_ok());
        assert!(check_bio("no-dashes").is_err());
    }

    #[test]
    fn title_charset_includes_punctuation_range() {
        assert!(check_title("Best hacker's blog!").is_ok());
        assert!(check_title("A<B>=C[D]").is_ok());
        assert!(check_title("no~tilde").is_err());
        assert!(check_title("no\"quote").is_err());
    }

    #[test]
    fn comment_is_plain_text() {
        assert!(check_comment("nice post").is_ok());
        assert!(check_comment("nice post!").is_err());
    }

    #[test]
    fn zero_address_is_empty() {
        assert_eq!(check_address(&Address::from_raw([0; 20])), Err(FieldErrorKind::Empty));
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    #[test]
    fn valid_article() {
        assert!(article().validate().is_ok());
    }

    #[test]
    fn article_reports_each_bad_field() {
        let mut a = article();
        a.id = None;
        a.title = "x".into();
        a.created_at = UnixTime::from_secs(0);
        a.delete_at = Some(UnixTime::from_secs(-1));
        let errs = a.validate().unwrap_err();
        assert_eq!(errs.field("ID"), Some(&FieldErrorKind::Empty));
        assert!(matches!(errs.field("Title"), Some(FieldErrorKind::Model(_))));
        assert_eq!(errs.field("CreatedAt"), Some(&FieldErrorKind::Empty));
        assert!(matches!(errs.field("DeleteAt"), Some(FieldErrorKind::Input(_))));
    }

    #[test]
    fn user_requires_registration_time() {
        let u = User {
            id: Some(RecordId::from_sequence(1)),
            username: "alice".into(),
            bio: String::new(),
            registered_at: UnixTime::from_secs(0),
        };
        let errs = u.validate().unwrap_err();
        assert_eq!(errs.fields().len(), 1);
        assert!(errs.field("RegisteredAt").is_some());
    }

    #[test]
    fn task_requires_owner() {
        let t = DeleteArticleTask {
            id: Some(RecordId::from_sequence(3)),
            article_id: RecordId::from_sequence(1),
            task_owner: Address::from_raw([0; 20]),
        };
        assert!(t.validate().unwrap_err().field("TaskOwner").is_some());
    }
}
