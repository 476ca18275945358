// events.rs — Graph event model and notification dispatch.
//
// Every structural change of the graph is emitted as a GraphEvent.
// Notification sinks (a JSONL log file, a test recorder, a remote monitor)
// subscribe to these events. Sink failures are logged and never stop the
// graph.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tg_clock::Tick;
use uuid::Uuid;

use crate::error::GraphError;
use crate::reactor::ReactorId;
use crate::timeline::TransactionFlags;

/// Events emitted by the graph at structural changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GraphEvent {
    /// A timeline was created.
    TimelineDeclared {
        graph: String,
        timeline: String,
        tick: Tick,
        timestamp: DateTime<Utc>,
    },

    /// A reactor became the owner of a timeline.
    OwnerAssigned {
        graph: String,
        timeline: String,
        reactor: String,
        flags: TransactionFlags,
        timestamp: DateTime<Utc>,
    },

    /// A timeline lost its owner.
    OwnerReleased {
        graph: String,
        timeline: String,
        reactor: String,
        timestamp: DateTime<Utc>,
    },

    /// A reactor subscribed to a timeline.
    RelationConnected {
        graph: String,
        timeline: String,
        reactor: String,
        flags: TransactionFlags,
        timestamp: DateTime<Utc>,
    },

    /// A subscription was dropped.
    RelationDisconnected {
        graph: String,
        timeline: String,
        reactor: String,
        timestamp: DateTime<Utc>,
    },

    /// A reactor joined the graph.
    ReactorCreated {
        graph: String,
        reactor: String,
        reactor_id: ReactorId,
        timestamp: DateTime<Utc>,
    },

    /// A reactor was put in quarantine.
    ReactorQuarantined {
        graph: String,
        reactor: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A reactor was destroyed.
    ReactorDestroyed {
        graph: String,
        reactor: String,
        timestamp: DateTime<Utc>,
    },

    /// A goal reached the owner of its timeline.
    GoalPosted {
        graph: String,
        goal_id: Uuid,
        timeline: String,
        predicate: String,
        requester: String,
        timestamp: DateTime<Utc>,
    },

    /// A goal was recalled.
    GoalRecalled {
        graph: String,
        goal_id: Uuid,
        timeline: String,
        requester: String,
        timestamp: DateTime<Utc>,
    },

    /// A tick was committed and its observations delivered.
    TickCommitted {
        graph: String,
        tick: Tick,
        observations: usize,
        timestamp: DateTime<Utc>,
    },
}

impl GraphEvent {
    /// Get the event type name as a string.
    pub fn event_type(&self) -> &str {
        match self {
            GraphEvent::TimelineDeclared { .. } => "timeline_declared",
            GraphEvent::OwnerAssigned { .. } => "owner_assigned",
            GraphEvent::OwnerReleased { .. } => "owner_released",
            GraphEvent::RelationConnected { .. } => "relation_connected",
            GraphEvent::RelationDisconnected { .. } => "relation_disconnected",
            GraphEvent::ReactorCreated { .. } => "reactor_created",
            GraphEvent::ReactorQuarantined { .. } => "reactor_quarantined",
            GraphEvent::ReactorDestroyed { .. } => "reactor_destroyed",
            GraphEvent::GoalPosted { .. } => "goal_posted",
            GraphEvent::GoalRecalled { .. } => "goal_recalled",
            GraphEvent::TickCommitted { .. } => "tick_committed",
        }
    }

    /// Name of the graph that emitted the event.
    pub fn graph(&self) -> &str {
        match self {
            GraphEvent::TimelineDeclared { graph, .. }
            | GraphEvent::OwnerAssigned { graph, .. }
            | GraphEvent::OwnerReleased { graph, .. }
            | GraphEvent::RelationConnected { graph, .. }
            | GraphEvent::RelationDisconnected { graph, .. }
            | GraphEvent::ReactorCreated { graph, .. }
            | GraphEvent::ReactorQuarantined { graph, .. }
            | GraphEvent::ReactorDestroyed { graph, .. }
            | GraphEvent::GoalPosted { graph, .. }
            | GraphEvent::GoalRecalled { graph, .. }
            | GraphEvent::TickCommitted { graph, .. } => graph,
        }
    }

    pub fn timeline_declared(graph: &str, timeline: &str, tick: Tick) -> Self {
        GraphEvent::TimelineDeclared {
            graph: graph.to_string(),
            timeline: timeline.to_string(),
            tick,
            timestamp: Utc::now(),
        }
    }

    pub fn owner_assigned(
        graph: &str,
        timeline: &str,
        reactor: &str,
        flags: TransactionFlags,
    ) -> Self {
        GraphEvent::OwnerAssigned {
            graph: graph.to_string(),
            timeline: timeline.to_string(),
            reactor: reactor.to_string(),
            flags,
            timestamp: Utc::now(),
        }
    }

    pub fn owner_released(graph: &str, timeline: &str, reactor: &str) -> Self {
        GraphEvent::OwnerReleased {
            graph: graph.to_string(),
            timeline: timeline.to_string(),
            reactor: reactor.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn relation_connected(
        graph: &str,
        timeline: &str,
        reactor: &str,
        flags: TransactionFlags,
    ) -> Self {
        GraphEvent::RelationConnected {
            graph: graph.to_string(),
            timeline: timeline.to_string(),
            reactor: reactor.to_string(),
            flags,
            timestamp: Utc::now(),
        }
    }

    pub fn relation_disconnected(graph: &str, timeline: &str, reactor: &str) -> Self {
        GraphEvent::RelationDisconnected {
            graph: graph.to_string(),
            timeline: timeline.to_string(),
            reactor: reactor.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn reactor_created(graph: &str, reactor: &str, reactor_id: ReactorId) -> Self {
        GraphEvent::ReactorCreated {
            graph: graph.to_string(),
            reactor: reactor.to_string(),
            reactor_id,
            timestamp: Utc::now(),
        }
    }

    pub fn reactor_quarantined(graph: &str, reactor: &str, reason: &str) -> Self {
        GraphEvent::ReactorQuarantined {
            graph: graph.to_string(),
            reactor: reactor.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn reactor_destroyed(graph: &str, reactor: &str) -> Self {
        GraphEvent::ReactorDestroyed {
            graph: graph.to_string(),
            reactor: reactor.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn goal_posted(
        graph: &str,
        goal_id: Uuid,
        timeline: &str,
        predicate: &str,
        requester: &str,
    ) -> Self {
        GraphEvent::GoalPosted {
            graph: graph.to_string(),
            goal_id,
            timeline: timeline.to_string(),
            predicate: predicate.to_string(),
            requester: requester.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn goal_recalled(graph: &str, goal_id: Uuid, timeline: &str, requester: &str) -> Self {
        GraphEvent::GoalRecalled {
            graph: graph.to_string(),
            goal_id,
            timeline: timeline.to_string(),
            requester: requester.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn tick_committed(graph: &str, tick: Tick, observations: usize) -> Self {
        GraphEvent::TickCommitted {
            graph: graph.to_string(),
            tick,
            observations,
            timestamp: Utc::now(),
        }
    }
}

/// Trait for receiving graph events.
pub trait NotificationSink: Send {
    /// Handle an event. Errors are logged but don't stop the graph.
    fn send(&self, event: &GraphEvent) -> Result<(), GraphError>;
}

/// Appends events as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> GraphError {
        GraphError::IoError {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &GraphEvent) -> Result<(), GraphError> {
        let json = serde_json::to_string(event)?;
        // The guard protects no data, so a poisoned lock is still usable.
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| GraphError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        writeln!(file, "{}", json).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

/// Dispatches events to multiple sinks.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Dispatch an event to all sinks.
    pub fn dispatch(&self, event: &GraphEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(event = event.event_type(), "notification sink error: {}", e);
            }
        }
    }
}
