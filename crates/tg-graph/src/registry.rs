// registry.rs — TimelineRegistry: every timeline the graph has ever declared.
//
// Timelines are kept in creation order (listener replay depends on it) with
// a name index on the side. A timeline is never removed once created.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tg_clock::Tick;

use crate::reactor::ReactorId;
use crate::timeline::Timeline;

#[derive(Debug, Default)]
pub struct TimelineRegistry {
    timelines: Vec<Timeline>,
    by_name: HashMap<String, usize>,
}

impl TimelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of the timeline called `name`, creating it at `tick` when
    /// absent. The flag tells whether it was created by this call.
    pub fn get_or_create(&mut self, name: &str, tick: Tick) -> (usize, bool) {
        match self.by_name.entry(name.to_string()) {
            Entry::Occupied(slot) => (*slot.get(), false),
            Entry::Vacant(slot) => {
                let pos = self.timelines.len();
                self.timelines.push(Timeline::new(name, tick));
                slot.insert(pos);
                (pos, true)
            }
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Timeline> {
        self.position(name).map(|pos| &self.timelines[pos])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Timeline> {
        let pos = self.position(name)?;
        self.timelines.get_mut(pos)
    }

    pub fn at(&self, pos: usize) -> Option<&Timeline> {
        self.timelines.get(pos)
    }

    pub fn at_mut(&mut self, pos: usize) -> Option<&mut Timeline> {
        self.timelines.get_mut(pos)
    }

    /// Timeline at a position handed out by `get_or_create`.
    pub(crate) fn slot(&self, pos: usize) -> &Timeline {
        &self.timelines[pos]
    }

    pub(crate) fn slot_mut(&mut self, pos: usize) -> &mut Timeline {
        &mut self.timelines[pos]
    }

    /// Timelines in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Timeline> {
        self.timelines.iter()
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    /// Total number of subscriber relations.
    pub fn count_relations(&self) -> usize {
        self.timelines.iter().map(Timeline::len).sum()
    }

    /// Positions of the timelines `reactor` is bound to, as owner or subscriber.
    pub fn bound_to(&self, reactor: ReactorId) -> Vec<usize> {
        self.timelines
            .iter()
            .enumerate()
            .filter(|(_, tl)| tl.owned_by(reactor) || tl.subscribed_by(reactor))
            .map(|(pos, _)| pos)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::TransactionFlags;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut registry = TimelineRegistry::new();
        assert_eq!(registry.get_or_create("state", 3), (0, true));
        assert_eq!(registry.get_or_create("state", 9), (0, false));
        assert_eq!(registry.get_or_create("goal", 9), (1, true));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("state").unwrap().created(), 3);
    }

    #[test]
    fn counts_and_bindings() {
        let mut registry = TimelineRegistry::new();
        let (a, _) = registry.get_or_create("a", 0);
        let (b, _) = registry.get_or_create("b", 0);
        let r1 = ReactorId::new(1);
        let r2 = ReactorId::new(2);

        registry.at_mut(a).unwrap().assign(r1, "one", TransactionFlags::default()).unwrap();
        registry.at_mut(a).unwrap().subscribe(r2, "two", TransactionFlags::default()).unwrap();
        registry.at_mut(b).unwrap().subscribe(r2, "two", TransactionFlags::default()).unwrap();

        assert_eq!(registry.count_relations(), 2);
        assert_eq!(registry.bound_to(r1), vec![a]);
        assert_eq!(registry.bound_to(r2), vec![a, b]);
        let names: Vec<&str> = registry.iter().map(Timeline::name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
