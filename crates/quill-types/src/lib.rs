//! Foundation types for Quill.
//!
//! Every other Quill crate depends on `quill-types`. The types here carry no
//! storage logic; they fix the byte-level shape of identifiers so that index
//! keys built from them are stable.
//!
//! # Key Types
//!
//! - [`RecordId`]: 8-byte big-endian primary key assigned from a sequence
//! - [`Address`]: 20-byte principal address (record owners, task owners)
//! - [`UnixTime`]: block-time seconds since the UNIX epoch
//! - [`ValidationErrors`]: field-scoped validation failures
//! - [`Identifiable`] / [`Validatable`]: capability traits implemented by records

pub mod address;
pub mod error;
pub mod id;
pub mod temporal;
pub mod validation;

pub use address::Address;
pub use error::TypeError;
pub use id::{Identifiable, RecordId};
pub use temporal::UnixTime;
pub use validation::{FieldError, FieldErrorKind, Validatable, ValidationErrors};
