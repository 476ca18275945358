// reactor.rs — The Reactor trait, its hook context, and reactor builders.
//
// A reactor never touches the graph directly. Each hook receives a
// ReactorContext on which it records commands (provide, use, post, ...).
// When the hook returns, the graph queues the commands on its strand and
// runs them in order, so a hook can never observe the graph half-mutated.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tg_clock::Tick;
use tg_domain::{DomainError, Goal, Node, Observation};

use crate::error::{GraphError, ReactorFault, TimelineFailure};
use crate::timeline::TransactionFlags;

/// Stable handle of a reactor within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactorId(u64);

impl ReactorId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReactorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reactor#{}", self.0)
    }
}

/// A participant of the graph.
///
/// Only `name` is required. Hooks that return `Err(ReactorFault)` (or panic)
/// put the reactor in quarantine.
pub trait Reactor: Send {
    /// Unique name within the graph.
    fn name(&self) -> &str;

    /// Called once after the reactor joins the graph. Declare timelines here.
    fn handle_init(&mut self, _ctx: &mut ReactorContext) -> Result<(), ReactorFault> {
        Ok(())
    }

    /// Called once per synchronization pass.
    fn synchronize(&mut self, _ctx: &mut ReactorContext) -> Result<(), ReactorFault> {
        Ok(())
    }

    /// An observation committed on a timeline this reactor subscribes to.
    fn notify(&mut self, _ctx: &mut ReactorContext, _observation: &Observation) {}

    /// A goal posted on a timeline this reactor owns.
    fn handle_request(&mut self, _ctx: &mut ReactorContext, _goal: &Goal) {}

    /// A goal recalled on a timeline this reactor owns.
    fn handle_recall(&mut self, _ctx: &mut ReactorContext, _goal: &Goal) {}

    /// An ownership request was refused. The return value becomes the
    /// result of the request.
    fn failed_internal(
        &mut self,
        _ctx: &mut ReactorContext,
        _timeline: &str,
        _failure: &TimelineFailure,
    ) -> bool {
        false
    }

    /// A subscription request was refused. The return value becomes the
    /// result of the request.
    fn failed_external(
        &mut self,
        _ctx: &mut ReactorContext,
        _timeline: &str,
        _failure: &TimelineFailure,
    ) -> bool {
        false
    }

    /// Every binding of this reactor has been released. `failed` is false
    /// when the graph is being torn down.
    fn isolated(&mut self, _failed: bool) {}
}

/// A request recorded by a reactor hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Provide {
        timeline: String,
        flags: TransactionFlags,
    },
    Unprovide {
        timeline: String,
    },
    Use {
        timeline: String,
        flags: TransactionFlags,
    },
    Unuse {
        timeline: String,
    },
    Observe(Observation),
    Post(Goal),
    Recall(Goal),
    Acknowledge {
        timeline: String,
    },
}

/// What a hook sees of the graph, and where it records its requests.
#[derive(Debug)]
pub struct ReactorContext {
    reactor: ReactorId,
    name: String,
    tick: Tick,
    commands: Vec<Command>,
}

impl ReactorContext {
    pub(crate) fn new(reactor: ReactorId, name: impl Into<String>, tick: Tick) -> Self {
        Self {
            reactor,
            name: name.into(),
            tick,
            commands: Vec::new(),
        }
    }

    pub fn id(&self) -> ReactorId {
        self.reactor
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Request ownership of a timeline.
    pub fn provide(&mut self, timeline: impl Into<String>, flags: TransactionFlags) {
        self.commands.push(Command::Provide {
            timeline: timeline.into(),
            flags,
        });
    }

    /// Release ownership of a timeline.
    pub fn unprovide(&mut self, timeline: impl Into<String>) {
        self.commands.push(Command::Unprovide {
            timeline: timeline.into(),
        });
    }

    /// Subscribe to a timeline.
    pub fn use_timeline(&mut self, timeline: impl Into<String>, flags: TransactionFlags) {
        self.commands.push(Command::Use {
            timeline: timeline.into(),
            flags,
        });
    }

    /// Drop a subscription.
    pub fn unuse(&mut self, timeline: impl Into<String>) {
        self.commands.push(Command::Unuse {
            timeline: timeline.into(),
        });
    }

    pub fn post_observation(&mut self, observation: Observation) {
        self.commands.push(Command::Observe(observation));
    }

    pub fn post_goal(&mut self, goal: Goal) {
        self.commands.push(Command::Post(goal));
    }

    pub fn recall(&mut self, goal: Goal) {
        self.commands.push(Command::Recall(goal));
    }

    /// Acknowledge the last observation delivered on a timeline.
    pub fn acknowledge(&mut self, timeline: impl Into<String>) {
        self.commands.push(Command::Acknowledge {
            timeline: timeline.into(),
        });
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub(crate) fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// Builds a reactor from its description node.
pub type ReactorBuilder =
    Box<dyn Fn(&Node) -> Result<Box<dyn Reactor>, DomainError> + Send + Sync>;

/// Table of reactor builders keyed by description tag.
#[derive(Default)]
pub struct ReactorFactory {
    builders: BTreeMap<String, ReactorBuilder>,
}

impl ReactorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builder for a new kind.
    pub fn register<F>(&mut self, kind: impl Into<String>, builder: F) -> Result<(), GraphError>
    where
        F: Fn(&Node) -> Result<Box<dyn Reactor>, DomainError> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.builders.contains_key(&kind) {
            return Err(GraphError::DuplicateReactorKind(kind));
        }
        tracing::debug!(kind = %kind, "reactor builder registered");
        self.builders.insert(kind, Box::new(builder));
        Ok(())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.builders.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    /// The builder for a description's tag, if any.
    pub(crate) fn builder(&self, kind: &str) -> Option<&ReactorBuilder> {
        self.builders.get(kind)
    }
}

impl fmt::Debug for ReactorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactorFactory")
            .field("kinds", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(String);

    impl Reactor for Named {
        fn name(&self) -> &str {
            &self.0
        }
    }

    fn build_named(node: &Node) -> Result<Box<dyn Reactor>, DomainError> {
        Ok(Box::new(Named(node.require_attr("name")?.to_string())))
    }

    #[test]
    fn context_records_commands_in_order() {
        let mut ctx = ReactorContext::new(ReactorId::new(3), "nav", 12);
        ctx.provide("position", TransactionFlags::default());
        ctx.use_timeline("waypoint", TransactionFlags::control());
        ctx.post_observation(Observation::new("position", "Holds"));

        assert_eq!(ctx.id(), ReactorId::new(3));
        assert_eq!(ctx.name(), "nav");
        assert_eq!(ctx.current_tick(), 12);
        assert_eq!(ctx.commands().len(), 3);
        assert!(matches!(
            &ctx.commands()[1],
            Command::Use { timeline, flags } if timeline == "waypoint" && flags.control
        ));
    }

    #[test]
    fn factory_rejects_duplicate_kinds() {
        let mut factory = ReactorFactory::new();
        factory.register("Named", build_named).unwrap();
        assert!(factory.contains("Named"));
        assert!(matches!(
            factory.register("Named", build_named),
            Err(GraphError::DuplicateReactorKind(kind)) if kind == "Named"
        ));
        assert_eq!(factory.kinds().collect::<Vec<_>>(), vec!["Named"]);
    }

    #[test]
    fn builder_reports_description_errors() {
        let mut factory = ReactorFactory::new();
        factory.register("Named", build_named).unwrap();
        let builder = factory.builder("Named").unwrap();
        assert!(builder(&Node::new("Named")).is_err());
        let reactor = builder(&Node::new("Named").with_attr("name", "a")).unwrap();
        assert_eq!(reactor.name(), "a");
    }

    #[test]
    fn reactor_id_display() {
        assert_eq!(ReactorId::new(7).to_string(), "reactor#7");
    }
}
