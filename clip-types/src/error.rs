//! Validation errors for cliplink identifiers and kinds.

use thiserror::Error;

/// Errors raised while parsing identifiers or closed-set kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    /// Identifier was empty.
    #[error("{kind} id must not be empty")]
    EmptyId {
        /// Which identifier was being parsed.
        kind: &'static str,
    },

    /// Identifier exceeded its length cap.
    #[error("{kind} id is {len} characters (limit: {max})")]
    IdTooLong {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// Actual length in characters.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Identifier had the wrong format.
    #[error("malformed {kind} id: {value}")]
    MalformedId {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// The offending value.
        value: String,
    },

    /// Value is not a member of the closed set.
    #[error("unknown {kind}: {value}")]
    UnknownKind {
        /// Which kind was being parsed.
        kind: &'static str,
        /// The offending value.
        value: String,
    },
}
