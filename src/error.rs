//! Error types for the relist engine.

use thiserror::Error;

/// All possible errors from a keyed list operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// An item with the same selection key is already present.
    /// `index` is the position of the offending item within the input batch
    /// (0 for single-item operations).
    #[error("duplicate selection key at input position {index}")]
    DuplicateKey { index: usize },

    #[error("no existing item matches the selection key")]
    KeyNotFound,

    #[error("index out of range: {index} (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// An untyped-adapter operation was given a value of an incompatible
    /// runtime type.
    #[error("type mismatch: expected {expected}")]
    TypeMismatch { expected: &'static str },

    #[error("reentrant mutation from within a notification handler")]
    Reentrancy,

    /// A deep merge was given a structurally incompatible replacement.
    #[error("invalid merge: {0}")]
    InvalidMerge(String),
}

/// Result type for list operations.
pub type Result<T> = std::result::Result<T, Error>;
