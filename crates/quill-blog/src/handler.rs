use std::collections::BTreeMap;

use tracing::debug;

use quill_store::KvStore;
use quill_types::{Address, RecordId, UnixTime, Validatable};

use crate::error::{BlogError, BlogResult};
use crate::msg::Msg;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Per-transaction facts supplied by the enclosing framework.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Context {
    /// Time of the block being executed. All deadline checks use this, never
    /// wall-clock time.
    pub block_time: UnixTime,
    /// Authenticated signers, main signer first.
    pub signers: Vec<Address>,
}

impl Context {
    pub fn new(block_time: UnixTime, signers: Vec<Address>) -> Self {
        Self { block_time, signers }
    }

    /// A context with a single signer.
    pub fn signed(block_time: UnixTime, signer: Address) -> Self {
        Self::new(block_time, vec![signer])
    }

    /// A context without signers, as used for scheduled tasks.
    pub fn unsigned(block_time: UnixTime) -> Self {
        Self::new(block_time, Vec::new())
    }

    pub fn main_signer(&self) -> BlogResult<Address> {
        self.signers.first().copied().ok_or(BlogError::MissingSigner)
    }

    /// Whether `address` signed this transaction.
    pub fn is_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    /// `t` is at or before the block time.
    pub fn in_the_past(&self, t: UnixTime) -> bool {
        !t.is_after(&self.block_time)
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckResult {
    pub gas_allocated: u64,
}

impl CheckResult {
    pub fn gas(gas_allocated: u64) -> Self {
        Self { gas_allocated }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliverResult {
    /// ID of the record the message created or touched, if any.
    pub data: Option<RecordId>,
}

impl DeliverResult {
    pub fn id(id: RecordId) -> Self {
        Self { data: Some(id) }
    }
}

/// Processes one kind of message.
///
/// `check` must not write; `deliver` may write through `store` and relies on
/// the caller to commit or discard on its result.
pub trait Handler: Send + Sync {
    fn check(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult>;

    fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult>;
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Maps message paths to handlers.
///
/// Built once at start-up; a path can be registered only once.
#[derive(Default)]
pub struct Router {
    routes: BTreeMap<&'static str, Box<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, path: &'static str, handler: Box<dyn Handler>) -> BlogResult<()> {
        if self.routes.contains_key(path) {
            return Err(BlogError::DuplicateRoute(path));
        }
        self.routes.insert(path, handler);
        Ok(())
    }

    pub fn has_route(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.routes.keys().copied()
    }

    fn route(&self, msg: &Msg) -> BlogResult<&dyn Handler> {
        self.routes
            .get(msg.path())
            .map(|h| &**h)
            .ok_or_else(|| BlogError::NoRoute(msg.path().to_string()))
    }

    pub fn check(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<CheckResult> {
        let handler = self.route(msg)?;
        msg.validate()?;
        handler.check(ctx, store, msg)
    }

    pub fn deliver(&self, ctx: &Context, store: &dyn KvStore, msg: &Msg) -> BlogResult<DeliverResult> {
        let handler = self.route(msg)?;
        msg.validate()?;
        let result = handler.deliver(ctx, store, msg)?;
        debug!(path = msg.path(), data = ?result.data, "message delivered");
        Ok(result)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::{CreateLikeMsg, DeleteArticleMsg};
    use quill_store::InMemoryKvStore;

    struct Fixed(u64);

    impl Handler for Fixed {
        fn check(&self, _: &Context, _: &dyn KvStore, _: &Msg) -> BlogResult<CheckResult> {
            Ok(CheckResult::gas(self.0))
        }

        fn deliver(&self, _: &Context, _: &dyn KvStore, _: &Msg) -> BlogResult<DeliverResult> {
            Ok(DeliverResult::id(RecordId::from_sequence(self.0)))
        }
    }

    fn like(n: u64) -> Msg {
        Msg::CreateLike(CreateLikeMsg {
            article_id: RecordId::from_sequence(n),
        })
    }

    #[test]
    fn routes_by_path() {
        let store = InMemoryKvStore::new();
        let mut router = Router::new();
        router.handle(Msg::CREATE_LIKE, Box::new(Fixed(7))).unwrap();
        let ctx = Context::unsigned(UnixTime::from_secs(1));

        assert_eq!(router.check(&ctx, &store, &like(1)).unwrap().gas_allocated, 7);
        assert_eq!(
            router.deliver(&ctx, &store, &like(1)).unwrap().data,
            Some(RecordId::from_sequence(7))
        );
    }

    #[test]
    fn unknown_path_is_no_route() {
        let store = InMemoryKvStore::new();
        let router = Router::new();
        let msg = Msg::DeleteArticle(DeleteArticleMsg {
            article_id: RecordId::from_sequence(1),
        });
        let err = router
            .deliver(&Context::unsigned(UnixTime::from_secs(1)), &store, &msg)
            .unwrap_err();
        assert!(matches!(err, BlogError::NoRoute(p) if p == Msg::DELETE_ARTICLE));
    }

    #[test]
    fn invalid_message_never_reaches_handler() {
        let store = InMemoryKvStore::new();
        let mut router = Router::new();
        router.handle(Msg::CREATE_LIKE, Box::new(Fixed(1))).unwrap();
        let err = router
            .check(&Context::unsigned(UnixTime::from_secs(1)), &store, &like(0))
            .unwrap_err();
        assert!(matches!(err, BlogError::Validation(_)));
    }

    #[test]
    fn duplicate_route_rejected() {
        let mut router = Router::new();
        router.handle(Msg::CREATE_LIKE, Box::new(Fixed(1))).unwrap();
        assert!(matches!(
            router.handle(Msg::CREATE_LIKE, Box::new(Fixed(2))),
            Err(BlogError::DuplicateRoute(_))
        ));
    }

    #[test]
    fn context_time_checks() {
        let ctx = Context::signed(UnixTime::from_secs(100), Address::from_raw([1; 20]));
        assert!(ctx.in_the_past(UnixTime::from_secs(100)));
        assert!(ctx.in_the_past(UnixTime::from_secs(99)));
        assert!(!ctx.in_the_past(UnixTime::from_secs(101)));
        assert!(Context::unsigned(UnixTime::from_secs(1)).main_signer().is_err());
    }
}
