//! Indexed object storage for Quill.
//!
//! This crate layers typed record buckets with secondary indexes on top of an
//! ordered byte-keyed store. The store itself is an external collaborator
//! described by the [`KvStore`] trait; everything above it is stateless and
//! keeps its durable state in the store.
//!
//! # Key Layout
//!
//! | key                                        | owner            |
//! |--------------------------------------------|------------------|
//! | `bucket ":" id`                            | [`Bucket`] record |
//! | `"_i." bucket "_" index ":" key [id]`      | index entry      |
//! | `"_s." counter`                            | [`Sequence`]     |
//!
//! Bucket and index names are restricted to `[a-z0-9]` so these prefixes can
//! never overlap.
//!
//! # Design Rules
//!
//! 1. A record and its index entries are written as one [`Operation`] batch.
//! 2. Every check (validation, unique collisions, key extraction) runs before
//!    the batch is built, so a failed put leaves the store untouched.
//! 3. Deleting an absent record succeeds.
//! 4. Index scans page through the store and hold no cursor between calls.
//! 5. All backend errors are propagated, never silently ignored.

pub mod bucket;
pub mod error;
pub mod index;
pub mod iter;
pub mod kv;
pub mod memory;
pub mod sequence;
pub mod staged;

pub use bucket::{Bucket, IndexScan, Model};
pub use error::{StoreError, StoreResult};
pub use index::{Extractor, IndexDelta, IndexSpec};
pub use iter::{prefix_end, RangeIter};
pub use kv::{KvStore, Operation};
pub use memory::InMemoryKvStore;
pub use sequence::Sequence;
pub use staged::StagedStore;
