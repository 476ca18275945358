// timeline.rs — Timelines, relations and the binding protocol.
//
// A timeline has at most one owner and an ordered list of subscriber
// relations. Binding rules enforced here:
// - a second owner is refused (AlreadyOwned)
// - re-binding with different flags is refused (FlagConflict)
// - re-binding with the same flags is accepted and changes nothing
//
// Cross-role checks (an owner may not subscribe to its own timeline and
// vice versa) live in the graph, which knows who is asking.

use std::fmt;

use serde::{Deserialize, Serialize};
use tg_clock::Tick;
use tg_domain::Observation;

use crate::error::TimelineFailure;
use crate::reactor::ReactorId;

/// Predicate posted on a timeline when its owner goes away.
pub const FAILED_PREDICATE: &str = "Failed";

/// Negotiated properties of a binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionFlags {
    /// Subscriber: may post goals. Owner: accepts goals.
    #[serde(default)]
    pub control: bool,
    /// Subscriber must acknowledge every delivered observation.
    #[serde(default)]
    pub acknowledge: bool,
}

impl TransactionFlags {
    /// Goal-posting (or goal-accepting) binding.
    pub fn control() -> Self {
        Self {
            control: true,
            acknowledge: false,
        }
    }

    pub fn with_acknowledge(mut self) -> Self {
        self.acknowledge = true;
        self
    }
}

impl fmt::Display for TransactionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.control, self.acknowledge) {
            (false, false) => write!(f, "{{}}"),
            (true, false) => write!(f, "{{control}}"),
            (false, true) => write!(f, "{{acknowledge}}"),
            (true, true) => write!(f, "{{control, acknowledge}}"),
        }
    }
}

/// The owner of a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Owner {
    reactor: ReactorId,
    name: String,
    flags: TransactionFlags,
}

impl Owner {
    pub fn reactor(&self) -> ReactorId {
        self.reactor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> TransactionFlags {
        self.flags
    }
}

/// A subscriber's binding to one timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    timeline: String,
    subscriber: ReactorId,
    subscriber_name: String,
    flags: TransactionFlags,
    pending_ack: bool,
}

impl Relation {
    pub fn timeline(&self) -> &str {
        &self.timeline
    }

    pub fn subscriber(&self) -> ReactorId {
        self.subscriber
    }

    pub fn subscriber_name(&self) -> &str {
        &self.subscriber_name
    }

    pub fn flags(&self) -> TransactionFlags {
        self.flags
    }

    /// Whether the last delivered observation still awaits acknowledgement.
    pub fn is_pending(&self) -> bool {
        self.pending_ack
    }
}

/// A named channel between one owner and many subscribers.
#[derive(Debug, Clone)]
pub struct Timeline {
    name: String,
    created: Tick,
    owner: Option<Owner>,
    relations: Vec<Relation>,
    pending: Option<Observation>,
    last: Option<(Tick, Observation)>,
}

impl Timeline {
    pub fn new(name: impl Into<String>, created: Tick) -> Self {
        Self {
            name: name.into(),
            created,
            owner: None,
            relations: Vec::new(),
            pending: None,
            last: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tick at which the timeline was first requested.
    pub fn created(&self) -> Tick {
        self.created
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    pub fn is_owned(&self) -> bool {
        self.owner.is_some()
    }

    pub fn owned_by(&self, reactor: ReactorId) -> bool {
        self.owner.as_ref().is_some_and(|o| o.reactor == reactor)
    }

    /// Whether the owner accepts goals.
    pub fn accepts_goals(&self) -> bool {
        self.owner.as_ref().is_some_and(|o| o.flags.control)
    }

    /// Subscriber relations in binding order.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relation(&self, reactor: ReactorId) -> Option<&Relation> {
        self.relations.iter().find(|r| r.subscriber == reactor)
    }

    pub fn subscribed_by(&self, reactor: ReactorId) -> bool {
        self.relation(reactor).is_some()
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Observation posted for the current tick, not yet committed.
    pub fn pending_observation(&self) -> Option<&Observation> {
        self.pending.as_ref()
    }

    /// Last committed observation and the tick it was committed at.
    pub fn last_observation(&self) -> Option<(Tick, &Observation)> {
        self.last.as_ref().map(|(tick, obs)| (*tick, obs))
    }

    /// Make `reactor` the owner.
    ///
    /// Returns `Ok(true)` when ownership changed, `Ok(false)` when the
    /// reactor already owned the timeline with the same flags.
    pub fn assign(
        &mut self,
        reactor: ReactorId,
        name: &str,
        flags: TransactionFlags,
    ) -> Result<bool, TimelineFailure> {
        if let Some(owner) = &self.owner {
            return if owner.reactor != reactor {
                Err(TimelineFailure::AlreadyOwned {
                    timeline: self.name.clone(),
                    owner: owner.name.clone(),
                })
            } else if owner.flags != flags {
                Err(TimelineFailure::FlagConflict {
                    timeline: self.name.clone(),
                    current: owner.flags,
                    requested: flags,
                })
            } else {
                Ok(false)
            };
        }
        self.owner = Some(Owner {
            reactor,
            name: name.to_string(),
            flags,
        });
        Ok(true)
    }

    /// Release ownership held by `reactor`.
    ///
    /// The timeline reports `Failed` at the next commit, replacing anything
    /// the owner posted for the current tick.
    pub fn unassign(&mut self, reactor: ReactorId) -> Option<Owner> {
        if !self.owned_by(reactor) {
            return None;
        }
        self.pending = Some(Observation::new(self.name.clone(), FAILED_PREDICATE));
        self.owner.take()
    }

    /// Add a subscriber relation.
    ///
    /// Returns `Ok(true)` for a new relation, `Ok(false)` when the same
    /// binding already exists.
    pub fn subscribe(
        &mut self,
        reactor: ReactorId,
        name: &str,
        flags: TransactionFlags,
    ) -> Result<bool, TimelineFailure> {
        if let Some(existing) = self.relation(reactor) {
            return if existing.flags == flags {
                Ok(false)
            } else {
                Err(TimelineFailure::FlagConflict {
                    timeline: self.name.clone(),
                    current: existing.flags,
                    requested: flags,
                })
            };
        }
        self.relations.push(Relation {
            timeline: self.name.clone(),
            subscriber: reactor,
            subscriber_name: name.to_string(),
            flags,
            pending_ack: false,
        });
        Ok(true)
    }

    /// Remove the relation of `reactor`, if any.
    pub fn unsubscribe(&mut self, reactor: ReactorId) -> Option<Relation> {
        let pos = self.relations.iter().position(|r| r.subscriber == reactor)?;
        Some(self.relations.remove(pos))
    }

    /// Record the owner's observation for the current tick. Last write wins.
    pub fn post_observation(&mut self, observation: Observation) {
        self.pending = Some(observation);
    }

    /// Commit the pending observation at `tick` and flag relations that
    /// must acknowledge it. Returns the committed observation.
    pub fn commit(&mut self, tick: Tick) -> Option<Observation> {
        let observation = self.pending.take()?;
        self.last = Some((tick, observation.clone()));
        for relation in self.relations.iter_mut().filter(|r| r.flags.acknowledge) {
            relation.pending_ack = true;
        }
        Some(observation)
    }

    /// Clear the pending acknowledgement of `reactor`.
    pub fn acknowledge(&mut self, reactor: ReactorId) -> bool {
        match self.relations.iter_mut().find(|r| r.subscriber == reactor) {
            Some(relation) if relation.pending_ack => {
                relation.pending_ack = false;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ReactorId {
        ReactorId::new(n)
    }

    #[test]
    fn single_owner() {
        let mut tl = Timeline::new("state", 0);
        assert_eq!(tl.assign(id(1), "a", TransactionFlags::default()), Ok(true));
        assert_eq!(tl.assign(id(1), "a", TransactionFlags::default()), Ok(false));
        assert!(matches!(
            tl.assign(id(2), "c", TransactionFlags::default()),
            Err(TimelineFailure::AlreadyOwned { owner, .. }) if owner == "a"
        ));
        assert!(tl.owned_by(id(1)));
    }

    #[test]
    fn flag_conflicts() {
        let mut tl = Timeline::new("state", 0);
        tl.assign(id(1), "a", TransactionFlags::default()).unwrap();
        assert!(matches!(
            tl.assign(id(1), "a", TransactionFlags::control()),
            Err(TimelineFailure::FlagConflict { .. })
        ));

        tl.subscribe(id(2), "b", TransactionFlags::control()).unwrap();
        assert_eq!(tl.subscribe(id(2), "b", TransactionFlags::control()), Ok(false));
        assert!(matches!(
            tl.subscribe(id(2), "b", TransactionFlags::default()),
            Err(TimelineFailure::FlagConflict { .. })
        ));
        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn relations_keep_binding_order() {
        let mut tl = Timeline::new("state", 4);
        for (n, name) in [(3, "c"), (1, "a"), (2, "b")] {
            tl.subscribe(id(n), name, TransactionFlags::default()).unwrap();
        }
        let names: Vec<&str> = tl.relations().iter().map(Relation::subscriber_name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);

        let removed = tl.unsubscribe(id(1)).unwrap();
        assert_eq!(removed.subscriber_name(), "a");
        assert!(tl.unsubscribe(id(1)).is_none());
        assert_eq!(tl.created(), 4);
    }

    #[test]
    fn releasing_the_owner_posts_failed() {
        let mut tl = Timeline::new("state", 0);
        tl.assign(id(1), "a", TransactionFlags::default()).unwrap();
        tl.post_observation(Observation::new("state", "Holds"));
        assert!(tl.unassign(id(2)).is_none());
        assert_eq!(tl.unassign(id(1)).unwrap().name(), "a");
        assert!(!tl.is_owned());
        assert_eq!(tl.pending_observation().unwrap().name(), FAILED_PREDICATE);
    }

    #[test]
    fn commit_moves_pending_and_flags_acknowledgements() {
        let mut tl = Timeline::new("state", 0);
        tl.subscribe(id(2), "b", TransactionFlags::default().with_acknowledge())
            .unwrap();
        tl.subscribe(id(3), "c", TransactionFlags::default()).unwrap();

        assert!(tl.commit(1).is_none());
        tl.post_observation(Observation::new("state", "A"));
        tl.post_observation(Observation::new("state", "B"));
        assert_eq!(tl.commit(2).unwrap().name(), "B");
        assert_eq!(tl.last_observation().map(|(t, o)| (t, o.name())), Some((2, "B")));
        assert!(tl.pending_observation().is_none());

        assert!(tl.relation(id(2)).unwrap().is_pending());
        assert!(!tl.relation(id(3)).unwrap().is_pending());
        assert!(tl.acknowledge(id(2)));
        assert!(!tl.acknowledge(id(2)));
    }

    #[test]
    fn flags_display() {
        assert_eq!(TransactionFlags::default().to_string(), "{}");
        assert_eq!(
            TransactionFlags::control().with_acknowledge().to_string(),
            "{control, acknowledge}"
        );
    }
}
