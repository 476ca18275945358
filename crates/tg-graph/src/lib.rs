//! # tg-graph
//!
//! The transaction graph of a tickgraph: reactors exchanging goals and
//! observations over named timelines, synchronized on a shared tick.
//!
//! Each timeline has at most one owner, which posts observations and
//! receives goals, and any number of subscribers. A reactor that fails is
//! put in quarantine: its bindings are released and it stays a member until
//! [`Graph::cleanup`] destroys it.
//!
//! ## Key components
//!
//! - [`Graph`] — the reactor registry and the binding protocol
//! - [`Reactor`] — the trait implemented by every reactor, with its
//!   [`ReactorContext`] for recording commands from inside a hook
//! - [`ReactorFactory`] — tag → builder table used by [`Graph::add_reactor`]
//! - [`Timeline`] / [`Relation`] — the shared state and its subscriptions
//! - [`TimelinesListener`] — observers of the timeline structure
//! - [`GraphEvent`] / [`EventDispatcher`] — structural events and their sinks
//! - [`StrandHandle`] — queues work on a graph from another thread
//! - [`GraphConfig`] — `graph.toml` settings

pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod listener;
pub mod reactor;
pub mod registry;
pub mod strand;
pub mod timeline;

pub use config::GraphConfig;
pub use error::{GraphError, ReactorFault, TimelineFailure};
pub use events::{EventDispatcher, GraphEvent, LogSink, NotificationSink};
pub use graph::Graph;
pub use listener::{ListenerId, TimelinesListener};
pub use reactor::{Command, Reactor, ReactorBuilder, ReactorContext, ReactorFactory, ReactorId};
pub use registry::TimelineRegistry;
pub use strand::{StrandHandle, Task};
pub use timeline::{Owner, Relation, Timeline, TransactionFlags, FAILED_PREDICATE};
