// graph.rs — Graph: the reactor registry and the transaction protocol.
//
// The graph owns every reactor and every timeline. Reactors are addressed
// by ReactorId and kept in insertion order; timelines live in the
// TimelineRegistry and are never removed.
//
// Lifecycle of a reactor:
//   add_reactor / add_existing → active
//   isolate, or a fault in a hook → quarantined (alive, no bindings, keeps its name)
//   kill_reactor, cleanup, clear, drop → destroyed
//
// Called from the driver, every public operation drains the task queue
// before returning, so commands recorded by reactor hooks have been applied
// by the time the caller sees the result. Called from inside a queued task,
// the nested drain is a no-op: the commands run after the current task, in
// submission order, as part of the outer drain.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use chrono::TimeDelta;
use tg_clock::{Tick, TickClock};
use tg_domain::{DomainFactory, Goal, Node, Observation};

use crate::config::GraphConfig;
use crate::error::{GraphError, TimelineFailure};
use crate::events::{EventDispatcher, GraphEvent, LogSink, NotificationSink};
use crate::listener::{ListenerId, TimelinesListener};
use crate::reactor::{Command, Reactor, ReactorContext, ReactorFactory, ReactorId};
use crate::registry::TimelineRegistry;
use crate::strand::{Strand, StrandHandle};
use crate::timeline::{Owner, Relation, Timeline, TransactionFlags};

struct ReactorEntry {
    id: ReactorId,
    name: String,
    reactor: Box<dyn Reactor>,
    quarantined: bool,
}

/// The transaction graph.
pub struct Graph {
    name: String,
    verbose: bool,
    clock: TickClock,
    domains: DomainFactory,
    kinds: ReactorFactory,
    timelines: TimelineRegistry,
    reactors: Vec<ReactorEntry>,
    next_reactor: u64,
    listeners: Vec<(ListenerId, Box<dyn TimelinesListener>)>,
    next_listener: u64,
    events: EventDispatcher,
    strand: Strand,
}

impl Graph {
    /// Create an empty graph with the default domain factories.
    pub fn new(name: impl Into<String>, clock: TickClock) -> Self {
        Self {
            name: name.into(),
            verbose: false,
            clock,
            domains: DomainFactory::with_defaults(),
            kinds: ReactorFactory::new(),
            timelines: TimelineRegistry::new(),
            reactors: Vec::new(),
            next_reactor: 0,
            listeners: Vec::new(),
            next_listener: 0,
            events: EventDispatcher::new(),
            strand: Strand::new(),
        }
    }

    /// Create a graph from its configuration, attaching the event log if one is set.
    pub fn from_config(config: &GraphConfig) -> Result<Self, GraphError> {
        let mut graph = Self::new(config.name.clone(), config.clock()?).with_verbose(config.verbose);
        if let Some(path) = &config.events_log {
            graph.add_sink(Box::new(LogSink::new(path)));
        }
        tracing::info!(
            graph = %graph.name,
            tick_duration = %config.tick_duration,
            initial_tick = config.initial_tick,
            "graph created"
        );
        Ok(graph)
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    // ── Clock ────────────────────────────────────────────────────

    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    pub fn current_tick(&self) -> Tick {
        self.clock.current_tick()
    }

    pub fn has_tick(&self) -> bool {
        self.clock.has_tick()
    }

    pub fn tick_duration(&self) -> TimeDelta {
        self.clock.tick_duration()
    }

    pub fn date_str(&self, tick: Tick) -> Result<String, GraphError> {
        Ok(self.clock.date_str(tick)?)
    }

    pub fn duration_str(&self, ticks: Tick) -> Result<String, GraphError> {
        Ok(self.clock.duration_str(ticks)?)
    }

    pub fn as_date(&self, text: &str) -> Result<Tick, GraphError> {
        Ok(self.clock.as_date(text)?)
    }

    pub fn as_duration(&self, text: &str, round_up: bool) -> Result<Tick, GraphError> {
        Ok(self.clock.as_duration(text, round_up)?)
    }

    /// Advance the clock.
    ///
    /// On a committed tick, every observation posted since the previous
    /// commit is delivered once to each subscriber of its timeline, in
    /// binding order. Subscribers bound with `acknowledge` then owe an
    /// acknowledgement.
    pub fn update_tick(&mut self, value: Tick, committed: bool) -> Result<(), GraphError> {
        self.clock.advance(value, committed)?;
        if committed {
            let mut delivered = 0;
            for pos in 0..self.timelines.len() {
                let timeline = self.timelines.slot_mut(pos);
                let Some(observation) = timeline.commit(value) else {
                    continue;
                };
                let subscribers: Vec<ReactorId> =
                    timeline.relations().iter().map(Relation::subscriber).collect();
                if self.verbose {
                    tracing::info!(graph = %self.name, tick = value, timeline = observation.object(),
                        predicate = observation.name(), subscribers = subscribers.len(), "observation");
                } else {
                    tracing::debug!(graph = %self.name, tick = value, timeline = observation.object(),
                        predicate = observation.name(), subscribers = subscribers.len(), "observation");
                }
                for subscriber in subscribers {
                    self.call_hook(subscriber, "notify", |r, ctx| r.notify(ctx, &observation));
                }
                delivered += 1;
            }
            self.emit(GraphEvent::tick_committed(&self.name, value, delivered));
        }
        self.run_pending();
        Ok(())
    }

    // ── Factories, sinks, queue ──────────────────────────────────

    pub fn domains(&self) -> &DomainFactory {
        &self.domains
    }

    pub fn domains_mut(&mut self) -> &mut DomainFactory {
        &mut self.domains
    }

    pub fn reactor_kinds(&self) -> &ReactorFactory {
        &self.kinds
    }

    pub fn reactor_kinds_mut(&mut self) -> &mut ReactorFactory {
        &mut self.kinds
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.events.add_sink(sink);
    }

    /// A handle other threads can use to queue work on this graph.
    pub fn handle(&self) -> StrandHandle {
        self.strand.handle(&self.name)
    }

    /// Run every queued task in submission order. Returns how many ran.
    ///
    /// A task that panics is logged and skipped; the rest of the queue still runs.
    pub fn run_pending(&mut self) -> usize {
        if !self.strand.begin_drain() {
            return 0;
        }
        let mut ran = 0;
        while let Some(task) = self.strand.next() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(self))) {
                tracing::warn!(graph = %self.name, "queued task panicked: {}", panic_message(payload.as_ref()));
            }
            ran += 1;
        }
        self.strand.end_drain();
        ran
    }

    // ── Reactors ─────────────────────────────────────────────────

    /// Build a reactor from its description and add it to the graph.
    pub fn add_reactor(&mut self, description: &Node) -> Result<ReactorId, GraphError> {
        let builder =
            self.kinds
                .builder(&description.tag)
                .ok_or_else(|| GraphError::UnknownReactorKind {
                    graph: self.name.clone(),
                    kind: description.tag.clone(),
                })?;
        let reactor = builder(description).map_err(|e| GraphError::InvalidDescription {
            graph: self.name.clone(),
            reason: e.to_string(),
        })?;
        if self.find(reactor.name()).is_some() {
            return Err(GraphError::MultipleReactors {
                graph: self.name.clone(),
                reactor: reactor.name().to_string(),
            });
        }
        Ok(self.insert(reactor))
    }

    /// Add an already constructed reactor.
    ///
    /// When a reactor with the same name is already a member, `reactor` is
    /// dropped and the member's id is returned.
    pub fn add_existing(&mut self, reactor: Box<dyn Reactor>) -> ReactorId {
        if let Some(id) = self.find(reactor.name()) {
            tracing::debug!(graph = %self.name, reactor = reactor.name(), "reactor already a member");
            return id;
        }
        self.insert(reactor)
    }

    fn insert(&mut self, reactor: Box<dyn Reactor>) -> ReactorId {
        self.next_reactor += 1;
        let id = ReactorId::new(self.next_reactor);
        let name = reactor.name().to_string();
        self.reactors.push(ReactorEntry {
            id,
            name: name.clone(),
            reactor,
            quarantined: false,
        });
        tracing::info!(graph = %self.name, reactor = %name, %id, "reactor created");
        self.emit(GraphEvent::reactor_created(&self.name, &name, id));

        if let Some(Err(fault)) = self.call_hook(id, "handle_init", |r, ctx| r.handle_init(ctx)) {
            tracing::warn!(graph = %self.name, reactor = %name, "init failed: {}", fault);
            self.quarantine(id, &fault.reason);
        }
        self.run_pending();
        id
    }

    pub fn is_member(&self, id: ReactorId) -> bool {
        self.index(id).is_some()
    }

    /// Position of a reactor in insertion order.
    pub fn index(&self, id: ReactorId) -> Option<usize> {
        self.reactors.iter().position(|entry| entry.id == id)
    }

    pub fn is_isolated(&self, id: ReactorId) -> bool {
        self.index(id)
            .is_some_and(|pos| self.reactors[pos].quarantined)
    }

    /// Quarantined reactors in insertion order.
    pub fn quarantined(&self) -> Vec<ReactorId> {
        self.reactors
            .iter()
            .filter(|entry| entry.quarantined)
            .map(|entry| entry.id)
            .collect()
    }

    /// Every member in insertion order, quarantined ones included.
    pub fn reactor_ids(&self) -> Vec<ReactorId> {
        self.reactors.iter().map(|entry| entry.id).collect()
    }

    pub fn find(&self, name: &str) -> Option<ReactorId> {
        self.reactors
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.id)
    }

    pub fn reactor(&self, id: ReactorId) -> Option<&dyn Reactor> {
        self.index(id).map(|pos| self.reactors[pos].reactor.as_ref())
    }

    /// Number of members, quarantined ones included.
    pub fn len(&self) -> usize {
        self.reactors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactors.is_empty()
    }

    /// Release every binding of a reactor and put it in quarantine.
    ///
    /// Returns false when the reactor is unknown or already quarantined.
    pub fn isolate(&mut self, id: ReactorId) -> bool {
        let done = self.quarantine(id, "isolated");
        self.run_pending();
        done
    }

    /// Destroy a reactor, releasing its bindings first if it still has any.
    pub fn kill_reactor(&mut self, id: ReactorId) -> bool {
        let Some(pos) = self.index(id) else {
            tracing::warn!(graph = %self.name, %id, "cannot kill a reactor that is not a member");
            return false;
        };
        let name = self.reactors[pos].name.clone();
        tracing::warn!(graph = %self.name, reactor = %name, "destroying reactor");
        if !self.reactors[pos].quarantined {
            self.release_bindings(id);
            self.notify_isolated(id, true);
        }
        if let Some(pos) = self.index(id) {
            self.reactors.remove(pos);
        }
        self.emit(GraphEvent::reactor_destroyed(&self.name, &name));
        self.run_pending();
        true
    }

    /// Destroy every quarantined reactor. Returns how many were destroyed.
    pub fn cleanup(&mut self) -> usize {
        let count = self
            .quarantined()
            .into_iter()
            .filter(|id| self.kill_reactor(*id))
            .count();
        if count > 0 {
            tracing::info!(graph = %self.name, count, "quarantine cleaned up");
        }
        count
    }

    /// Disconnect and destroy every reactor, in insertion order.
    pub fn clear(&mut self) {
        for id in self.reactor_ids() {
            let Some(pos) = self.index(id) else {
                continue;
            };
            let name = self.reactors[pos].name.clone();
            tracing::info!(graph = %self.name, reactor = %name, "disconnecting reactor from the graph");
            if !self.reactors[pos].quarantined {
                self.release_bindings(id);
                self.notify_isolated(id, false);
            }
            if let Some(pos) = self.index(id) {
                self.reactors.remove(pos);
            }
            self.emit(GraphEvent::reactor_destroyed(&self.name, &name));
        }
        self.run_pending();
    }

    /// Run one synchronization pass over every active reactor.
    ///
    /// A reactor whose hook fails or panics is quarantined and the pass goes
    /// on. Returns the reactors quarantined by this pass.
    pub fn synchronize(&mut self) -> Vec<ReactorId> {
        let mut faulty = Vec::new();
        for id in self.reactor_ids() {
            if self.active_name(id).is_none() {
                continue;
            }
            match self.call_hook(id, "synchronize", |r, ctx| r.synchronize(ctx)) {
                Some(Ok(())) => {}
                Some(Err(fault)) => {
                    tracing::warn!(graph = %self.name, %id, "synchronization failed: {}", fault);
                    self.quarantine(id, &fault.reason);
                    faulty.push(id);
                }
                // The hook panicked; call_hook already quarantined the reactor.
                None => faulty.push(id),
            }
            self.run_pending();
        }
        faulty
    }

    // ── Timelines ────────────────────────────────────────────────

    /// The timeline called `name`, created at the current tick if absent.
    pub fn get_timeline(&mut self, name: &str) -> &Timeline {
        let pos = self.declare(name);
        self.timelines.slot(pos)
    }

    /// The timeline called `name`, if it exists.
    pub fn timeline(&self, name: &str) -> Option<&Timeline> {
        self.timelines.get(name)
    }

    /// Timelines in creation order.
    pub fn timelines(&self) -> impl Iterator<Item = &Timeline> {
        self.timelines.iter()
    }

    /// Total number of subscriber relations.
    pub fn count_relations(&self) -> usize {
        self.timelines.count_relations()
    }

    /// Make `id` the owner of `name`.
    ///
    /// A refusal is routed to the reactor's `failed_internal`, whose answer
    /// becomes the result.
    pub fn assign(&mut self, id: ReactorId, name: &str, flags: TransactionFlags) -> bool {
        let Some(reactor) = self.active_name(id) else {
            tracing::warn!(graph = %self.name, %id, timeline = name, "assign from an inactive reactor");
            return false;
        };
        let pos = self.declare(name);
        let timeline = self.timelines.slot_mut(pos);
        let outcome = if timeline.subscribed_by(id) {
            Err(TimelineFailure::OwnerIsSubscriber {
                timeline: name.to_string(),
            })
        } else {
            timeline.assign(id, &reactor, flags)
        };

        let done = match outcome {
            Ok(changed) => {
                if changed {
                    tracing::info!(graph = %self.name, timeline = name, reactor = %reactor, %flags, "timeline assigned");
                    self.emit(GraphEvent::owner_assigned(&self.name, name, &reactor, flags));
                }
                true
            }
            Err(failure) => {
                tracing::warn!(graph = %self.name, reactor = %reactor, "{}", failure);
                self.call_hook(id, "failed_internal", |r, ctx| {
                    r.failed_internal(ctx, name, &failure)
                })
                .unwrap_or(false)
            }
        };
        self.run_pending();
        done
    }

    /// Release ownership of `name` held by `id`.
    pub fn unassign(&mut self, id: ReactorId, name: &str) -> bool {
        let done = match self.timelines.position(name) {
            Some(pos) if self.is_member(id) => self.release_owner(pos, id),
            _ => false,
        };
        self.run_pending();
        done
    }

    /// Subscribe `id` to `name`.
    ///
    /// A refusal is routed to the reactor's `failed_external`, whose answer
    /// becomes the result.
    pub fn subscribe(&mut self, id: ReactorId, name: &str, flags: TransactionFlags) -> bool {
        let Some(reactor) = self.active_name(id) else {
            tracing::warn!(graph = %self.name, %id, timeline = name, "subscribe from an inactive reactor");
            return false;
        };
        let pos = self.declare(name);
        let timeline = self.timelines.slot_mut(pos);
        let outcome = if timeline.owned_by(id) {
            Err(TimelineFailure::SubscriberIsOwner {
                timeline: name.to_string(),
            })
        } else {
            timeline.subscribe(id, &reactor, flags)
        };

        let done = match outcome {
            Ok(changed) => {
                if changed {
                    tracing::info!(graph = %self.name, timeline = name, reactor = %reactor, %flags, "timeline subscribed");
                    let timeline = self.timelines.slot(pos);
                    if let Some(relation) = timeline.relation(id) {
                        for (_, listener) in self.listeners.iter_mut() {
                            listener.connected(timeline, relation);
                        }
                    }
                    self.emit(GraphEvent::relation_connected(&self.name, name, &reactor, flags));
                }
                true
            }
            Err(failure) => {
                tracing::warn!(graph = %self.name, reactor = %reactor, "{}", failure);
                self.call_hook(id, "failed_external", |r, ctx| {
                    r.failed_external(ctx, name, &failure)
                })
                .unwrap_or(false)
            }
        };
        self.run_pending();
        done
    }

    /// Drop the subscription of `id` to `name`.
    pub fn unsubscribe(&mut self, id: ReactorId, name: &str) -> bool {
        let done = match self.timelines.position(name) {
            Some(pos) if self.is_member(id) => self.release_relation(pos, id),
            _ => false,
        };
        self.run_pending();
        done
    }

    // ── Observations and goals ───────────────────────────────────

    /// Post the owner's observation for the current tick. Last write wins.
    pub fn post_observation(&mut self, id: ReactorId, observation: Observation) -> bool {
        if self.active_name(id).is_none() {
            tracing::warn!(graph = %self.name, %id, "observation from an inactive reactor");
            return false;
        }
        let Some(timeline) = self.timelines.get_mut(observation.object()) else {
            tracing::warn!(graph = %self.name, timeline = observation.object(), "observation on an undeclared timeline");
            return false;
        };
        if !timeline.owned_by(id) {
            tracing::warn!(graph = %self.name, %id, timeline = observation.object(), "observation from a reactor that does not own the timeline");
            return false;
        }
        tracing::debug!(graph = %self.name, timeline = observation.object(), predicate = observation.name(), "observation posted");
        timeline.post_observation(observation);
        self.run_pending();
        true
    }

    /// Deliver a goal to the owner of its timeline.
    pub fn post_goal(&mut self, id: ReactorId, goal: Goal) -> bool {
        let done = self.route_goal(id, &goal, false);
        self.run_pending();
        done
    }

    /// Deliver a recall to the owner of the goal's timeline.
    pub fn recall(&mut self, id: ReactorId, goal: Goal) -> bool {
        let done = self.route_goal(id, &goal, true);
        self.run_pending();
        done
    }

    fn route_goal(&mut self, id: ReactorId, goal: &Goal, recall: bool) -> bool {
        let Some(requester) = self.active_name(id) else {
            tracing::warn!(graph = %self.name, %id, "goal from an inactive reactor");
            return false;
        };
        let Some(timeline) = self.timelines.get(goal.object()) else {
            tracing::warn!(graph = %self.name, timeline = goal.object(), "goal on an undeclared timeline");
            return false;
        };
        if !timeline.relation(id).is_some_and(|r| r.flags().control) {
            tracing::warn!(graph = %self.name, reactor = %requester, timeline = goal.object(), "requester does not control the timeline");
            return false;
        }
        let Some(owner) = timeline.owner().filter(|o| o.flags().control).map(Owner::reactor) else {
            tracing::warn!(graph = %self.name, timeline = goal.object(), "timeline does not accept goals");
            return false;
        };

        let (handled, event) = if recall {
            (
                self.call_hook(owner, "handle_recall", |r, ctx| r.handle_recall(ctx, goal)),
                GraphEvent::goal_recalled(&self.name, goal.id(), goal.object(), &requester),
            )
        } else {
            (
                self.call_hook(owner, "handle_request", |r, ctx| r.handle_request(ctx, goal)),
                GraphEvent::goal_posted(&self.name, goal.id(), goal.object(), goal.name(), &requester),
            )
        };
        if handled.is_none() {
            return false;
        }
        tracing::debug!(graph = %self.name, goal = %goal.id(), timeline = goal.object(), recall, "goal delivered");
        self.emit(event);
        true
    }

    /// Acknowledge the last observation delivered to `id` on `name`.
    pub fn acknowledge(&mut self, id: ReactorId, name: &str) -> bool {
        let done = self
            .timelines
            .get_mut(name)
            .is_some_and(|timeline| timeline.acknowledge(id));
        self.run_pending();
        done
    }

    /// Relations still owing an acknowledgement, as (timeline, subscriber).
    pub fn pending_acknowledgements(&self) -> Vec<(String, ReactorId)> {
        self.timelines
            .iter()
            .flat_map(|timeline| {
                timeline
                    .relations()
                    .iter()
                    .filter(|r| r.is_pending())
                    .map(move |r| (timeline.name().to_string(), r.subscriber()))
            })
            .collect()
    }

    /// Whether every delivered observation has been acknowledged.
    pub fn is_settled(&self) -> bool {
        self.timelines
            .iter()
            .all(|timeline| timeline.relations().iter().all(|r| !r.is_pending()))
    }

    pub fn parse_goal(&self, node: &Node) -> Result<Goal, GraphError> {
        Ok(tg_domain::parse_goal(node, &self.domains, &self.clock)?)
    }

    pub fn export_goal(&self, goal: &Goal) -> Result<Node, GraphError> {
        Ok(tg_domain::export_goal(goal, &self.clock)?)
    }

    pub fn parse_observation(&self, node: &Node) -> Result<Observation, GraphError> {
        Ok(tg_domain::parse_observation(node, &self.domains, &self.clock)?)
    }

    pub fn export_observation(&self, observation: &Observation) -> Node {
        tg_domain::export_observation(observation)
    }

    // ── Listeners ────────────────────────────────────────────────

    /// Register a listener. Past structure is not replayed.
    pub fn add_listener(&mut self, listener: Box<dyn TimelinesListener>) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, listener));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> Option<Box<dyn TimelinesListener>> {
        let pos = self.listeners.iter().position(|(lid, _)| *lid == id)?;
        Some(self.listeners.remove(pos).1)
    }

    /// Replay every timeline (creation order) and its relations (binding
    /// order) to a registered listener.
    pub fn replay_listener(&mut self, id: ListenerId) -> bool {
        let Some((_, listener)) = self.listeners.iter_mut().find(|(lid, _)| *lid == id) else {
            return false;
        };
        for timeline in self.timelines.iter() {
            listener.declared(timeline);
            for relation in timeline.relations() {
                listener.connected(timeline, relation);
            }
        }
        true
    }

    // ── Internals ────────────────────────────────────────────────

    fn emit(&self, event: GraphEvent) {
        self.events.dispatch(&event);
    }

    /// Name of an active (member, not quarantined) reactor.
    fn active_name(&self, id: ReactorId) -> Option<String> {
        let entry = &self.reactors[self.index(id)?];
        if entry.quarantined {
            tracing::debug!(graph = %self.name, reactor = %entry.name, "request from a quarantined reactor ignored");
            None
        } else {
            Some(entry.name.clone())
        }
    }

    /// Position of `name`, creating and announcing the timeline when absent.
    fn declare(&mut self, name: &str) -> usize {
        let tick = self.clock.current_tick();
        let (pos, created) = self.timelines.get_or_create(name, tick);
        if created {
            tracing::info!(graph = %self.name, timeline = name, tick, "timeline created");
            let timeline = self.timelines.slot(pos);
            for (_, listener) in self.listeners.iter_mut() {
                listener.declared(timeline);
            }
            self.emit(GraphEvent::timeline_declared(&self.name, name, tick));
        }
        pos
    }

    /// Run a reactor hook, then queue the commands it recorded.
    ///
    /// A panic quarantines the reactor and yields `None`, as does an unknown id.
    fn call_hook<R>(
        &mut self,
        id: ReactorId,
        hook: &str,
        f: impl FnOnce(&mut dyn Reactor, &mut ReactorContext) -> R,
    ) -> Option<R> {
        let tick = self.clock.current_tick();
        let pos = self.index(id)?;
        let entry = &mut self.reactors[pos];
        let mut ctx = ReactorContext::new(id, entry.name.clone(), tick);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(entry.reactor.as_mut(), &mut ctx)));
        match outcome {
            Ok(value) => {
                self.enqueue(id, ctx.into_commands());
                Some(value)
            }
            Err(payload) => {
                let reason = format!("panicked in {hook}: {}", panic_message(payload.as_ref()));
                tracing::warn!(graph = %self.name, %id, "{}", reason);
                self.quarantine(id, &reason);
                None
            }
        }
    }

    fn enqueue(&self, id: ReactorId, commands: Vec<Command>) {
        for command in commands {
            self.strand
                .push(Box::new(move |graph: &mut Graph| graph.apply(id, command)));
        }
    }

    fn apply(&mut self, id: ReactorId, command: Command) {
        match command {
            Command::Provide { timeline, flags } => {
                self.assign(id, &timeline, flags);
            }
            Command::Unprovide { timeline } => {
                self.unassign(id, &timeline);
            }
            Command::Use { timeline, flags } => {
                self.subscribe(id, &timeline, flags);
            }
            Command::Unuse { timeline } => {
                self.unsubscribe(id, &timeline);
            }
            Command::Observe(observation) => {
                self.post_observation(id, observation);
            }
            Command::Post(goal) => {
                self.post_goal(id, goal);
            }
            Command::Recall(goal) => {
                self.recall(id, goal);
            }
            Command::Acknowledge { timeline } => {
                self.acknowledge(id, &timeline);
            }
        }
    }

    fn quarantine(&mut self, id: ReactorId, reason: &str) -> bool {
        let Some(pos) = self.index(id) else {
            return false;
        };
        if self.reactors[pos].quarantined {
            return false;
        }
        self.reactors[pos].quarantined = true;
        let name = self.reactors[pos].name.clone();
        tracing::info!(graph = %self.name, reactor = %name, reason, "putting reactor in quarantine");
        self.release_bindings(id);
        self.emit(GraphEvent::reactor_quarantined(&self.name, &name, reason));
        self.notify_isolated(id, true);
        true
    }

    fn release_bindings(&mut self, id: ReactorId) {
        for pos in self.timelines.bound_to(id) {
            self.release_owner(pos, id);
            self.release_relation(pos, id);
        }
    }

    fn release_owner(&mut self, pos: usize, id: ReactorId) -> bool {
        let Some(timeline) = self.timelines.at_mut(pos) else {
            return false;
        };
        let Some(owner) = timeline.unassign(id) else {
            return false;
        };
        tracing::info!(graph = %self.name, timeline = timeline.name(), reactor = owner.name(), "timeline released");
        let event = GraphEvent::owner_released(&self.name, timeline.name(), owner.name());
        self.emit(event);
        true
    }

    fn release_relation(&mut self, pos: usize, id: ReactorId) -> bool {
        let Some(timeline) = self.timelines.at_mut(pos) else {
            return false;
        };
        let Some(relation) = timeline.unsubscribe(id) else {
            return false;
        };
        let timeline: &Timeline = timeline;
        tracing::info!(graph = %self.name, timeline = timeline.name(), reactor = relation.subscriber_name(), "subscription dropped");
        for (_, listener) in self.listeners.iter_mut() {
            listener.disconnected(timeline, &relation);
        }
        let event =
            GraphEvent::relation_disconnected(&self.name, timeline.name(), relation.subscriber_name());
        self.emit(event);
        true
    }

    fn notify_isolated(&mut self, id: ReactorId, failed: bool) {
        let Some(pos) = self.index(id) else {
            return;
        };
        let entry = &mut self.reactors[pos];
        if panic::catch_unwind(AssertUnwindSafe(|| entry.reactor.isolated(failed))).is_err() {
            tracing::warn!(graph = %self.name, reactor = %entry.name, "panicked in isolated");
        }
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("tick", &self.clock.current_tick())
            .field("reactors", &self.reactors.len())
            .field("quarantined", &self.quarantined().len())
            .field("timelines", &self.timelines.len())
            .field("relations", &self.count_relations())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tg_domain::{Domain, DomainError};

    use crate::error::ReactorFault;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Reactor driven by a script of timelines to provide/use at init.
    struct Scripted {
        name: String,
        provides: Vec<(String, TransactionFlags)>,
        uses: Vec<(String, TransactionFlags)>,
        log: Log,
        tolerate: bool,
    }

    impl Scripted {
        fn new(name: &str, log: &Log) -> Self {
            Self {
                name: name.to_string(),
                provides: Vec::new(),
                uses: Vec::new(),
                log: log.clone(),
                tolerate: false,
            }
        }

        fn provides(mut self, timeline: &str, flags: TransactionFlags) -> Self {
            self.provides.push((timeline.to_string(), flags));
            self
        }

        fn uses(mut self, timeline: &str, flags: TransactionFlags) -> Self {
            self.uses.push((timeline.to_string(), flags));
            self
        }

        fn record(&self, line: String) {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, line));
        }
    }

    impl Reactor for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        fn handle_init(&mut self, ctx: &mut ReactorContext) -> Result<(), ReactorFault> {
            for (timeline, flags) in &self.provides {
                ctx.provide(timeline.clone(), *flags);
            }
            for (timeline, flags) in &self.uses {
                ctx.use_timeline(timeline.clone(), *flags);
            }
            Ok(())
        }

        fn notify(&mut self, _ctx: &mut ReactorContext, observation: &Observation) {
            self.record(format!("notify {}.{}", observation.object(), observation.name()));
        }

        fn handle_request(&mut self, _ctx: &mut ReactorContext, goal: &Goal) {
            self.record(format!("request {}.{}", goal.object(), goal.name()));
        }

        fn handle_recall(&mut self, _ctx: &mut ReactorContext, goal: &Goal) {
            self.record(format!("recall {}.{}", goal.object(), goal.name()));
        }

        fn failed_internal(
            &mut self,
            _ctx: &mut ReactorContext,
            timeline: &str,
            _failure: &TimelineFailure,
        ) -> bool {
            self.record(format!("failed_internal {timeline}"));
            self.tolerate
        }

        fn failed_external(
            &mut self,
            _ctx: &mut ReactorContext,
            timeline: &str,
            _failure: &TimelineFailure,
        ) -> bool {
            self.record(format!("failed_external {timeline}"));
            self.tolerate
        }

        fn isolated(&mut self, failed: bool) {
            self.record(format!("isolated {failed}"));
        }
    }

    fn graph() -> Graph {
        Graph::new("test", TickClock::new(TimeDelta::seconds(1)).unwrap())
    }

    fn lines(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn init_commands_are_applied_before_add_returns() {
        let log = Log::default();
        let mut g = graph();
        let a = g.add_existing(Box::new(
            Scripted::new("a", &log).provides("state", TransactionFlags::control()),
        ));
        let b = g.add_existing(Box::new(
            Scripted::new("b", &log).uses("state", TransactionFlags::default()),
        ));

        let state = g.timeline("state").unwrap();
        assert!(state.owned_by(a));
        assert!(state.subscribed_by(b));
        assert_eq!(g.count_relations(), 1);
        assert_eq!(g.index(b), Some(1));
    }

    #[test]
    fn add_existing_returns_the_member_on_name_conflict() {
        let log = Log::default();
        let mut g = graph();
        let first = g.add_existing(Box::new(Scripted::new("a", &log)));
        let second = g.add_existing(Box::new(Scripted::new("a", &log)));
        assert_eq!(first, second);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn add_reactor_uses_the_registered_builder() {
        let log = Log::default();
        let mut g = graph();
        let shared = log.clone();
        g.reactor_kinds_mut()
            .register("Scripted", move |node: &Node| -> Result<Box<dyn Reactor>, DomainError> {
                Ok(Box::new(Scripted::new(node.require_attr("name")?, &shared)))
            })
            .unwrap();

        let id = g
            .add_reactor(&Node::new("Scripted").with_attr("name", "a"))
            .unwrap();
        assert_eq!(g.reactor(id).unwrap().name(), "a");

        assert!(matches!(
            g.add_reactor(&Node::new("Scripted").with_attr("name", "a")),
            Err(GraphError::MultipleReactors { reactor, .. }) if reactor == "a"
        ));
        assert!(matches!(
            g.add_reactor(&Node::new("Scripted")),
            Err(GraphError::InvalidDescription { .. })
        ));
        assert!(matches!(
            g.add_reactor(&Node::new("Sonar").with_attr("name", "s")),
            Err(GraphError::UnknownReactorKind { kind, .. }) if kind == "Sonar"
        ));
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn cross_role_bindings_are_refused() {
        let log = Log::default();
        let mut g = graph();
        let a = g.add_existing(Box::new(
            Scripted::new("a", &log).provides("state", TransactionFlags::default()),
        ));
        assert!(!g.subscribe(a, "state", TransactionFlags::default()));

        let b = g.add_existing(Box::new(
            Scripted::new("b", &log).uses("goal", TransactionFlags::default()),
        ));
        assert!(!g.assign(b, "goal", TransactionFlags::default()));
        assert_eq!(
            lines(&log),
            vec!["a:failed_external state".to_string(), "b:failed_internal goal".to_string()]
        );
    }

    #[test]
    fn failure_hook_answer_is_the_result() {
        let log = Log::default();
        let mut g = graph();
        g.add_existing(Box::new(
            Scripted::new("a", &log).provides("state", TransactionFlags::default()),
        ));
        let mut tolerant = Scripted::new("c", &log);
        tolerant.tolerate = true;
        let c = g.add_existing(Box::new(tolerant));

        assert!(g.assign(c, "state", TransactionFlags::default()));
        assert!(!g.timeline("state").unwrap().owned_by(c));
    }

    #[test]
    fn unassign_posts_failed_at_next_commit() {
        let log = Log::default();
        let mut g = graph();
        let a = g.add_existing(Box::new(
            Scripted::new("a", &log).provides("state", TransactionFlags::default()),
        ));
        g.add_existing(Box::new(
            Scripted::new("b", &log).uses("state", TransactionFlags::default()),
        ));

        assert!(g.unassign(a, "state"));
        assert!(!g.unassign(a, "state"));
        g.update_tick(1, true).unwrap();
        assert_eq!(lines(&log), vec!["b:notify state.Failed".to_string()]);
    }

    #[test]
    fn only_the_owner_posts_observations() {
        let log = Log::default();
        let mut g = graph();
        let a = g.add_existing(Box::new(
            Scripted::new("a", &log).provides("state", TransactionFlags::default()),
        ));
        let b = g.add_existing(Box::new(
            Scripted::new("b", &log).uses("state", TransactionFlags::default()),
        ));

        assert!(!g.post_observation(b, Observation::new("state", "Holds")));
        assert!(!g.post_observation(a, Observation::new("unknown", "Holds")));
        assert!(g.post_observation(a, Observation::new("state", "Holds")));
        assert!(g.timeline("state").unwrap().pending_observation().is_some());
    }

    #[test]
    fn goals_need_control_on_both_ends() {
        let log = Log::default();
        let mut g = graph();
        g.add_existing(Box::new(
            Scripted::new("planner", &log).provides("nav", TransactionFlags::control()),
        ));
        let user = g.add_existing(Box::new(
            Scripted::new("user", &log).uses("nav", TransactionFlags::control()),
        ));
        let watcher = g.add_existing(Box::new(
            Scripted::new("watcher", &log).uses("nav", TransactionFlags::default()),
        ));
        g.add_existing(Box::new(
            Scripted::new("logger", &log).provides("log", TransactionFlags::default()),
        ));
        let writer = g.add_existing(Box::new(
            Scripted::new("writer", &log).uses("log", TransactionFlags::control()),
        ));

        let goal = Goal::new("nav", "GoTo").with_attribute("x", Domain::float(1.0));
        assert!(g.post_goal(user, goal.clone()));
        assert!(g.recall(user, goal.clone()));
        assert!(!g.post_goal(watcher, goal));
        assert!(!g.post_goal(writer, Goal::new("log", "Write")));
        assert_eq!(
            lines(&log),
            vec!["planner:request nav.GoTo".to_string(), "planner:recall nav.GoTo".to_string()]
        );
    }

    #[test]
    fn acknowledgements_are_tracked_per_relation() {
        let log = Log::default();
        let mut g = graph();
        let a = g.add_existing(Box::new(
            Scripted::new("a", &log).provides("state", TransactionFlags::default()),
        ));
        let b = g.add_existing(Box::new(
            Scripted::new("b", &log).uses("state", TransactionFlags::default().with_acknowledge()),
        ));

        assert!(g.is_settled());
        g.post_observation(a, Observation::new("state", "Holds"));
        g.update_tick(1, true).unwrap();
        assert_eq!(g.pending_acknowledgements(), vec![("state".to_string(), b)]);
        assert!(g.acknowledge(b, "state"));
        assert!(g.is_settled());
    }

    #[test]
    fn isolate_twice_is_a_no_op() {
        let log = Log::default();
        let mut g = graph();
        let a = g.add_existing(Box::new(Scripted::new("a", &log)));
        assert!(g.isolate(a));
        assert!(!g.isolate(a));
        assert!(g.is_isolated(a));
        assert_eq!(g.quarantined(), vec![a]);
        assert_eq!(lines(&log), vec!["a:isolated true".to_string()]);
    }

    #[test]
    fn quarantined_reactor_keeps_its_name_and_cannot_bind() {
        let log = Log::default();
        let mut g = graph();
        let a = g.add_existing(Box::new(Scripted::new("a", &log)));
        g.isolate(a);
        assert_eq!(g.add_existing(Box::new(Scripted::new("a", &log))), a);
        assert!(!g.assign(a, "state", TransactionFlags::default()));
        assert!(g.timeline("state").is_none());
    }

    #[test]
    fn kill_reactor_unbinds_and_removes() {
        let log = Log::default();
        let mut g = graph();
        let a = g.add_existing(Box::new(
            Scripted::new("a", &log).uses("state", TransactionFlags::default()),
        ));
        assert!(g.kill_reactor(a));
        assert!(!g.kill_reactor(a));
        assert!(!g.is_member(a));
        assert_eq!(g.count_relations(), 0);
        assert!(g.timeline("state").is_some());
    }

    #[test]
    fn clear_tears_down_in_insertion_order() {
        let log = Log::default();
        let mut g = graph();
        g.add_existing(Box::new(Scripted::new("a", &log)));
        let b = g.add_existing(Box::new(Scripted::new("b", &log)));
        g.add_existing(Box::new(Scripted::new("c", &log)));
        g.isolate(b);
        log.lock().unwrap().clear();

        g.clear();
        assert!(g.is_empty());
        assert_eq!(
            lines(&log),
            vec!["a:isolated false".to_string(), "c:isolated false".to_string()]
        );
    }

    #[test]
    fn panicking_hook_quarantines_the_reactor() {
        struct Panicky;
        impl Reactor for Panicky {
            fn name(&self) -> &str {
                "panicky"
            }
            fn synchronize(&mut self, _ctx: &mut ReactorContext) -> Result<(), ReactorFault> {
                panic!("sensor exploded");
            }
        }

        let mut g = graph();
        let p = g.add_existing(Box::new(Panicky));
        assert_eq!(g.synchronize(), vec![p]);
        assert!(g.is_isolated(p));
        assert_eq!(g.cleanup(), 1);
    }

    #[test]
    fn strand_handle_submits_from_another_thread() {
        let log = Log::default();
        let mut g = graph();
        let a = g.add_existing(Box::new(Scripted::new("a", &log)));
        let handle = g.handle();

        std::thread::spawn(move || {
            handle
                .submit(move |graph: &mut Graph| {
                    graph.assign(a, "depth", TransactionFlags::default());
                })
                .unwrap();
        })
        .join()
        .unwrap();

        assert!(g.timeline("depth").is_none());
        assert_eq!(g.run_pending(), 1);
        assert!(g.timeline("depth").unwrap().owned_by(a));
    }

    #[test]
    fn panicking_task_does_not_block_the_queue() {
        let log = Log::default();
        let mut g = graph();
        let handle = g.handle();
        handle
            .submit(|_: &mut Graph| panic!("task exploded"))
            .unwrap();
        handle
            .submit(|graph: &mut Graph| {
                graph.get_timeline("after");
            })
            .unwrap();

        assert_eq!(g.run_pending(), 2);
        assert!(g.timeline("after").is_some());

        let a = g.add_existing(Box::new(
            Scripted::new("a", &log).provides("state", TransactionFlags::default()),
        ));
        assert!(g.timeline("state").unwrap().owned_by(a));
    }

    #[test]
    fn handle_reports_a_dropped_graph() {
        let handle = graph().handle();
        assert!(matches!(
            handle.submit(|_: &mut Graph| {}),
            Err(GraphError::QueueClosed { graph }) if graph == "test"
        ));
    }

    #[test]
    fn backward_tick_is_rejected() {
        let mut g = graph();
        g.update_tick(5, true).unwrap();
        assert!(matches!(g.update_tick(4, true), Err(GraphError::Clock(_))));
        assert_eq!(g.current_tick(), 5);
        assert!(g.has_tick());
    }
}
