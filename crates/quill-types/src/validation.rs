//! Field-scoped validation errors.
//!
//! Validation collects every failing field instead of stopping at the first
//! one, so callers can report all problems with a record or message at once.

use std::fmt;

use crate::id::RecordId;
use crate::temporal::UnixTime;

/// Why a single field failed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// A required value is missing.
    Empty,
    /// The value is structurally malformed (wrong length, negative time).
    Input(String),
    /// The value is well formed but violates a model rule.
    Model(String),
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Input(reason) => write!(f, "invalid input: {reason}"),
            Self::Model(reason) => write!(f, "invalid model: {reason}"),
        }
    }
}

/// A failing field and the reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub kind: FieldErrorKind,
}

/// All field errors for one record or message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`.
    pub fn push(&mut self, field: &'static str, kind: FieldErrorKind) {
        self.fields.push(FieldError { field, kind });
    }

    /// Record the outcome of a single check; `Ok` is a no-op.
    pub fn check(&mut self, field: &'static str, result: Result<(), FieldErrorKind>) {
        if let Err(kind) = result {
            self.push(field, kind);
        }
    }

    /// The error recorded for `field`, if any.
    pub fn field(&self, field: &str) -> Option<&FieldErrorKind> {
        self.fields.iter().find(|e| e.field == field).map(|e| &e.kind)
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `Ok(())` if nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed")?;
        for (i, e) in self.fields.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} ({})", e.field, e.kind)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// A value that can check its own fields before it is written.
pub trait Validatable {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

// ---------------------------------------------------------------------------
// Reusable field checks
// ---------------------------------------------------------------------------

/// A required ID must be present.
pub fn require_id(id: Option<RecordId>) -> Result<(), FieldErrorKind> {
    match id {
        Some(_) => Ok(()),
        None => Err(FieldErrorKind::Empty),
    }
}

/// A required timestamp must be non-negative and non-zero.
pub fn require_time(t: UnixTime) -> Result<(), FieldErrorKind> {
    t.validate().map_err(FieldErrorKind::Input)?;
    if t.is_zero() {
        return Err(FieldErrorKind::Empty);
    }
    Ok(())
}

/// `value` has between `min` and `max` characters, all accepted by `allowed`.
pub fn check_text(
    value: &str,
    min: usize,
    max: usize,
    allowed: impl Fn(char) -> bool,
) -> Result<(), FieldErrorKind> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(FieldErrorKind::Model(format!(
            "length {len} outside {min}..={max}"
        )));
    }
    if let Some(bad) = value.chars().find(|c| !allowed(*c)) {
        return Err(FieldErrorKind::Model(format!("forbidden character {bad:?}")));
    }
    Ok(())
}
