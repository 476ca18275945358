// error.rs — Error types for domains and description parsing.
//
// Everything here is a configuration error from the graph's point of view:
// a malformed description or an unknown tag is reported to whoever asked
// for the parse, never replaced with a default.

use tg_clock::ClockError;
use thiserror::Error;

/// Errors raised while building domains or parsing/exporting descriptions.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A required attribute is absent from a description node.
    #[error("<{node}> is missing attribute '{attribute}'")]
    MissingAttribute { node: String, attribute: String },

    /// An attribute is present but its value cannot be used.
    #[error("<{node}> attribute '{attribute}' = '{value}': {reason}")]
    InvalidAttribute {
        node: String,
        attribute: String,
        value: String,
        reason: String,
    },

    /// No producer is registered for this tag.
    #[error("no domain producer registered for tag '{0}'")]
    UnknownTag(String),

    /// A producer is already registered for this tag.
    #[error("a domain producer is already registered for tag '{0}'")]
    DuplicateTag(String),

    /// A node does not have the expected shape.
    #[error("malformed <{node}>: {reason}")]
    MalformedNode { node: String, reason: String },

    /// A domain (or an intersection of two domains) admits no value.
    #[error("empty domain: {0}")]
    EmptyDomain(String),

    /// Two domains of different kinds were combined.
    #[error("type mismatch on '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// A date or duration could not be converted.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// Failed to serialize/deserialize a description.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
