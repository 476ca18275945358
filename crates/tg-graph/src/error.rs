// error.rs — Error types for the transaction graph.
//
// Three tiers:
// - GraphError: configuration and I/O errors returned to the caller.
// - TimelineFailure: a binding request that the protocol refuses. It is
//   routed to the requesting reactor, never returned to the driver.
// - ReactorFault: raised by a reactor hook; the graph quarantines the reactor.

use tg_clock::ClockError;
use tg_domain::DomainError;
use thiserror::Error;

use crate::timeline::TransactionFlags;

/// Errors returned by graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A reactor with this name is already a member of the graph.
    #[error("{graph}: multiple reactors with the same name \"{reactor}\"")]
    MultipleReactors { graph: String, reactor: String },

    /// No builder is registered for a description tag.
    #[error("{graph}: unknown reactor kind \"{kind}\"")]
    UnknownReactorKind { graph: String, kind: String },

    /// A builder is already registered for this tag.
    #[error("a reactor builder is already registered for kind \"{0}\"")]
    DuplicateReactorKind(String),

    /// The builder rejected a reactor description.
    #[error("{graph}: invalid reactor description: {reason}")]
    InvalidDescription { graph: String, reason: String },

    /// A goal, observation or domain description is malformed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A tick or calendar value is invalid.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize an event or description.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The graph configuration file is not valid TOML.
    #[error("invalid graph configuration {path}: {source}")]
    ConfigParse {
        path: String,
        source: toml::de::Error,
    },

    /// The graph owning the task queue has been dropped.
    #[error("{graph}: task queue is closed")]
    QueueClosed { graph: String },
}

/// A binding request refused by the timeline protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineFailure {
    /// Another reactor already owns the timeline.
    #[error("timeline \"{timeline}\" is already owned by \"{owner}\"")]
    AlreadyOwned { timeline: String, owner: String },

    /// The requester already holds this binding with different flags.
    #[error("timeline \"{timeline}\": binding flags {current} conflict with requested {requested}")]
    FlagConflict {
        timeline: String,
        current: TransactionFlags,
        requested: TransactionFlags,
    },

    /// The requester subscribes to the timeline it tries to own.
    #[error("cannot own timeline \"{timeline}\" while subscribing to it")]
    OwnerIsSubscriber { timeline: String },

    /// The requester owns the timeline it tries to subscribe to.
    #[error("cannot subscribe to timeline \"{timeline}\" while owning it")]
    SubscriberIsOwner { timeline: String },
}

/// An irrecoverable failure raised by a reactor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ReactorFault {
    pub reason: String,
}

impl ReactorFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
