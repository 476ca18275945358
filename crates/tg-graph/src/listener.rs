// listener.rs — Observers of the timeline structure.
//
// A listener is told when a timeline is declared and when a subscriber
// connects or disconnects. Registering a listener does not replay past
// structure; call `Graph::replay_listener` for that.

use std::fmt;

use crate::timeline::{Relation, Timeline};

/// Handle of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Receives timeline structure changes.
pub trait TimelinesListener: Send {
    fn declared(&mut self, timeline: &Timeline);

    fn connected(&mut self, timeline: &Timeline, relation: &Relation);

    fn disconnected(&mut self, _timeline: &Timeline, _relation: &Relation) {}
}
