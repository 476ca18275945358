// exchange.rs — Goal and observation import/export in the Node format.
//
//   <Goal on="drifter" predicate="Track" id="...">
//     <Variable name="center"><float value="36.8"/></Variable>
//     <Variable name="start"><date min="2024-03-01T12:00:00Z"/></Variable>
//   </Goal>
//
// Temporal variables are int domains over ticks; on export they are written
// back as `date` (start/end) and `duration` nodes, and only when they say
// something: start/end when not the full range, duration when it has an
// upper bound or a lower bound other than one tick.

use tg_clock::{Tick, TickClock};
use uuid::Uuid;

use crate::domain::{Bound, Domain, Interval};
use crate::error::DomainError;
use crate::factory::{
    DomainFactory, BOOL_TAG, DATE_TAG, DURATION_TAG, ELEM_TAG, ENUM_TAG, FLOAT_TAG, INT_TAG,
};
use crate::node::Node;
use crate::predicate::{Goal, Observation, Predicate, DURATION, END, START};

pub const GOAL_TAG: &str = "Goal";
pub const OBSERVATION_TAG: &str = "Observation";
pub const VARIABLE_TAG: &str = "Variable";

/// Render a tick interval as a `date` node.
pub fn date_export(clock: &TickClock, interval: &Interval<Tick>) -> Result<Node, DomainError> {
    tick_export(DATE_TAG, interval, |tick| clock.date_str(tick))
}

/// Render a tick interval as a `duration` node.
pub fn duration_export(clock: &TickClock, interval: &Interval<Tick>) -> Result<Node, DomainError> {
    tick_export(DURATION_TAG, interval, |ticks| clock.duration_str(ticks))
}

fn tick_export<F>(tag: &str, interval: &Interval<Tick>, render: F) -> Result<Node, DomainError>
where
    F: Fn(Tick) -> Result<String, tg_clock::ClockError>,
{
    let mut node = Node::new(tag);
    if let Some(tick) = interval.singleton_value() {
        node.set_attr("value", render(tick)?);
        return Ok(node);
    }
    if let Bound::Finite(lo) = interval.lower() {
        node.set_attr("min", render(lo)?);
    }
    if let Bound::Finite(hi) = interval.upper() {
        node.set_attr("max", render(hi)?);
    }
    Ok(node)
}

/// Render a domain as a description node that the default factory reads back.
pub fn domain_export(domain: &Domain) -> Node {
    match domain {
        Domain::Int(interval) => interval_export(INT_TAG, interval),
        Domain::Float(interval) => interval_export(FLOAT_TAG, interval),
        Domain::Bool(value) => {
            let node = Node::new(BOOL_TAG);
            match value {
                Some(v) => node.with_attr("value", v),
                None => node,
            }
        }
        Domain::Enum(symbols) => symbols.iter().fold(Node::new(ENUM_TAG), |node, symbol| {
            node.with_child(Node::new(ELEM_TAG).with_attr("value", symbol))
        }),
    }
}

fn interval_export<T>(tag: &str, interval: &Interval<T>) -> Node
where
    T: Copy + PartialOrd + std::fmt::Display,
{
    let mut node = Node::new(tag);
    if let Some(v) = interval.singleton_value() {
        node.set_attr("value", v);
        return node;
    }
    if let Bound::Finite(lo) = interval.lower() {
        node.set_attr("min", lo);
    }
    if let Bound::Finite(hi) = interval.upper() {
        node.set_attr("max", hi);
    }
    node
}

/// Parse a `Goal` node.
pub fn parse_goal(
    node: &Node,
    factory: &DomainFactory,
    clock: &TickClock,
) -> Result<Goal, DomainError> {
    expect_tag(node, GOAL_TAG)?;
    let mut goal = Goal::new(node.require_attr("on")?, node.require_attr("predicate")?);
    if let Some(raw) = node.attr("id") {
        let id = Uuid::parse_str(raw.trim()).map_err(|e| node.invalid_attr("id", raw, e))?;
        goal = goal.with_id(id);
    }
    for (name, domain) in variables(node, factory, clock)? {
        if !goal.restrict_temporal(&name, &domain)? {
            goal.predicate_mut().restrict_attribute(&name, domain)?;
        }
    }
    tracing::debug!(goal = %goal.id(), on = goal.object(), predicate = goal.name(), "goal parsed");
    Ok(goal)
}

/// Render a goal as a `Goal` node.
pub fn export_goal(goal: &Goal, clock: &TickClock) -> Result<Node, DomainError> {
    let mut node = Node::new(GOAL_TAG)
        .with_attr("on", goal.object())
        .with_attr("predicate", goal.name())
        .with_attr("id", goal.id());
    push_attributes(&mut node, goal.predicate());

    if !goal.start().is_full() {
        node.push_child(variable(START, date_export(clock, goal.start())?));
    }
    if !goal.end().is_full() {
        node.push_child(variable(END, date_export(clock, goal.end())?));
    }
    let duration = goal.duration();
    if duration.has_upper() || duration.lower() != Bound::Finite(1) {
        node.push_child(variable(DURATION, duration_export(clock, duration)?));
    }
    Ok(node)
}

/// Parse an `Observation` node.
pub fn parse_observation(
    node: &Node,
    factory: &DomainFactory,
    clock: &TickClock,
) -> Result<Observation, DomainError> {
    expect_tag(node, OBSERVATION_TAG)?;
    let mut obs = Observation::new(node.require_attr("on")?, node.require_attr("predicate")?);
    for (name, domain) in variables(node, factory, clock)? {
        obs.predicate_mut().restrict_attribute(&name, domain)?;
    }
    Ok(obs)
}

/// Render an observation as an `Observation` node.
pub fn export_observation(obs: &Observation) -> Node {
    let mut node = Node::new(OBSERVATION_TAG)
        .with_attr("on", obs.object())
        .with_attr("predicate", obs.name());
    push_attributes(&mut node, obs.predicate());
    node
}

fn expect_tag(node: &Node, tag: &str) -> Result<(), DomainError> {
    if node.tag == tag {
        Ok(())
    } else {
        Err(DomainError::MalformedNode {
            node: node.tag.clone(),
            reason: format!("expected <{tag}>"),
        })
    }
}

/// Read every `Variable` child as (name, domain).
fn variables(
    node: &Node,
    factory: &DomainFactory,
    clock: &TickClock,
) -> Result<Vec<(String, Domain)>, DomainError> {
    node.children_tagged(VARIABLE_TAG)
        .map(|var| -> Result<(String, Domain), DomainError> {
            let name = var.require_attr("name")?;
            let [value] = var.children.as_slice() else {
                return Err(DomainError::MalformedNode {
                    node: format!("{VARIABLE_TAG} {name}"),
                    reason: format!("expected exactly one domain, found {}", var.children.len()),
                });
            };
            Ok((name.to_string(), factory.produce(value, clock)?))
        })
        .collect()
}

fn push_attributes(node: &mut Node, predicate: &Predicate) {
    for (name, domain) in predicate.attributes() {
        node.push_child(variable(name, domain_export(domain)));
    }
}

fn variable(name: &str, domain: Node) -> Node {
    Node::new(VARIABLE_TAG)
        .with_attr("name", name)
        .with_child(domain)
}
