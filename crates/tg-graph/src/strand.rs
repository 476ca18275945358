// strand.rs — The graph's ordered task queue.
//
// Structural mutations run one at a time, in submission order. Reactor
// commands and work submitted from other threads (through a StrandHandle)
// land on the same queue; the driver drains it with `Graph::run_pending`.
// A drain started while another is in progress returns immediately, so a
// task that calls a public graph operation never re-enters the queue.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::error::GraphError;
use crate::graph::Graph;

/// A unit of work run against the graph.
pub type Task = Box<dyn FnOnce(&mut Graph) + Send>;

pub(crate) struct Strand {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    draining: bool,
}

impl Strand {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            draining: false,
        }
    }

    pub(crate) fn handle(&self, graph: &str) -> StrandHandle {
        StrandHandle {
            graph: graph.to_string(),
            sender: self.sender.clone(),
        }
    }

    pub(crate) fn push(&self, task: Task) {
        // The receiver lives as long as self, so the send cannot fail.
        let _ = self.sender.send(task);
    }

    pub(crate) fn next(&self) -> Option<Task> {
        match self.receiver.try_recv() {
            Ok(task) => Some(task),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Enter drain mode. Returns false when a drain is already running.
    pub(crate) fn begin_drain(&mut self) -> bool {
        !std::mem::replace(&mut self.draining, true)
    }

    pub(crate) fn end_drain(&mut self) {
        self.draining = false;
    }
}

/// Submits work to a graph's queue from any thread.
#[derive(Clone)]
pub struct StrandHandle {
    graph: String,
    sender: Sender<Task>,
}

impl StrandHandle {
    /// Queue `task`. It runs on the next `Graph::run_pending`.
    pub fn submit<F>(&self, task: F) -> Result<(), GraphError>
    where
        F: FnOnce(&mut Graph) + Send + 'static,
    {
        self.sender
            .send(Box::new(task))
            .map_err(|_| GraphError::QueueClosed {
                graph: self.graph.clone(),
            })
    }

    /// Name of the graph this handle feeds.
    pub fn graph(&self) -> &str {
        &self.graph
    }
}

impl std::fmt::Debug for StrandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrandHandle")
            .field("graph", &self.graph)
            .finish()
    }
}
