// predicate.rs — Predicates, observations and goals.
//
// A predicate is a named state on a timeline ("object") with a set of
// attribute constraints. Observations are predicates reported by the owner
// of a timeline. Goals are predicates requested of the owner, with three
// temporal variables over ticks: start, end, and duration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tg_clock::Tick;
use uuid::Uuid;

use crate::domain::{Domain, Interval};
use crate::error::DomainError;

/// Names reserved for the temporal variables of a goal.
pub const START: &str = "start";
pub const END: &str = "end";
pub const DURATION: &str = "duration";

/// A named state on a timeline, with attribute constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    object: String,
    name: String,
    #[serde(default)]
    attributes: BTreeMap<String, Domain>,
}

impl Predicate {
    pub fn new(object: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// The timeline this predicate belongs to.
    pub fn object(&self) -> &str {
        &self.object
    }

    /// The predicate name (e.g. "Holds").
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&Domain> {
        self.attributes.get(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Domain)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set an attribute, replacing any previous constraint.
    pub fn set_attribute(&mut self, name: impl Into<String>, domain: Domain) {
        self.attributes.insert(name.into(), domain);
    }

    /// Narrow an attribute by intersecting with `domain`.
    pub fn restrict_attribute(&mut self, name: &str, domain: Domain) -> Result<(), DomainError> {
        let restricted = match self.attributes.get(name) {
            Some(current) => current.intersect(&domain, name)?,
            None => domain,
        };
        self.attributes.insert(name.to_string(), restricted);
        Ok(())
    }
}

/// A state report posted by the owner of a timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(flatten)]
    predicate: Predicate,
}

impl Observation {
    pub fn new(timeline: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            predicate: Predicate::new(timeline, name),
        }
    }

    /// Set an attribute and return self.
    pub fn with_attribute(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.predicate.set_attribute(name, domain);
        self
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn predicate_mut(&mut self) -> &mut Predicate {
        &mut self.predicate
    }

    pub fn object(&self) -> &str {
        self.predicate.object()
    }

    pub fn name(&self) -> &str {
        self.predicate.name()
    }

    pub fn attribute(&self, name: &str) -> Option<&Domain> {
        self.predicate.attribute(name)
    }
}

/// A request posted to the owner of a timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    id: Uuid,
    #[serde(flatten)]
    predicate: Predicate,
    start: Interval<Tick>,
    end: Interval<Tick>,
    duration: Interval<Tick>,
}

impl Goal {
    /// Create a goal with unconstrained start/end and the default duration `[1, +inf)`.
    pub fn new(timeline: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            predicate: Predicate::new(timeline, name),
            start: Interval::full(),
            end: Interval::full(),
            duration: Self::default_duration(),
        }
    }

    /// Every goal lasts at least one tick.
    pub fn default_duration() -> Interval<Tick> {
        Interval::at_least(1)
    }

    /// Replace the identifier and return self.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Set an attribute and return self.
    pub fn with_attribute(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.predicate.set_attribute(name, domain);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn predicate_mut(&mut self) -> &mut Predicate {
        &mut self.predicate
    }

    pub fn object(&self) -> &str {
        self.predicate.object()
    }

    pub fn name(&self) -> &str {
        self.predicate.name()
    }

    pub fn attribute(&self, name: &str) -> Option<&Domain> {
        self.predicate.attribute(name)
    }

    pub fn start(&self) -> &Interval<Tick> {
        &self.start
    }

    pub fn end(&self) -> &Interval<Tick> {
        &self.end
    }

    pub fn duration(&self) -> &Interval<Tick> {
        &self.duration
    }

    pub fn restrict_start(&mut self, interval: &Interval<Tick>) -> Result<(), DomainError> {
        self.start = narrow(&self.start, interval, START)?;
        Ok(())
    }

    pub fn restrict_end(&mut self, interval: &Interval<Tick>) -> Result<(), DomainError> {
        self.end = narrow(&self.end, interval, END)?;
        Ok(())
    }

    pub fn restrict_duration(&mut self, interval: &Interval<Tick>) -> Result<(), DomainError> {
        self.duration = narrow(&self.duration, interval, DURATION)?;
        Ok(())
    }

    /// Restrict one of the temporal variables by name.
    ///
    /// Returns `Ok(false)` when `name` is not a temporal variable.
    pub fn restrict_temporal(&mut self, name: &str, domain: &Domain) -> Result<bool, DomainError> {
        if !matches!(name, START | END | DURATION) {
            return Ok(false);
        }
        let interval = domain.as_int().ok_or_else(|| DomainError::TypeMismatch {
            name: name.to_string(),
            expected: "int".to_string(),
            found: domain.type_name().to_string(),
        })?;
        match name {
            START => self.restrict_start(interval)?,
            END => self.restrict_end(interval)?,
            _ => self.restrict_duration(interval)?,
        }
        Ok(true)
    }
}

fn narrow(
    current: &Interval<Tick>,
    requested: &Interval<Tick>,
    name: &str,
) -> Result<Interval<Tick>, DomainError> {
    current
        .intersect(requested)
        .ok_or_else(|| DomainError::EmptyDomain(format!("{name}: {current} ∩ {requested}")))
}
