//! Actor System Core
//!
//! The [`ActorSystem`] owns every actor context, the dispatcher pools, the
//! routing table and the timer service. It drives the spawn and stop
//! protocols and resolves where each message goes.
//!
//! # Hierarchy
//!
//! Every actor has a parent. Actors spawned without an explicit parent live
//! under the root guardian, so stopping the root (which [`ActorSystem::shutdown`]
//! does) stops everything. An actor's termination completes only after its
//! own final scheduling pass and the termination of all of its children.
//!
//! # Routing
//!
//! - destination system is this system: direct enqueue through the local driver
//! - otherwise: the driver registered for `(system, channel)` in the routing table
//! - no route: `NotDelivered(NoRoute)`
//!
//! Published messages are additionally copied to every matching typed
//! subscriber in the destination system.
//!
//! # Blocking
//!
//! [`ActorSystem::shutdown`] blocks the calling thread until the hierarchy has
//! terminated. Never call it from a reaction.

use crate::completion::Completion;
use crate::config::ActorConfig;
use crate::context::ActorContext;
use crate::dispatcher::Dispatcher;
use crate::driver::{Destination, Driver, LocalDriver};
use crate::error::{DriverError, NotDeliveredReason, Result, SpawnError, SystemError};
use crate::identity::{ActorId, ChannelId, ChannelProperties, SystemId};
use crate::message::{AckingPolicy, ActorInit, DeliveryStatus, Message, Payload, SendMode};
use crate::reactions::Reactions;
use crate::reference::{ActorRef, SystemRef};
use crate::routing::RoutingTable;
use crate::subscription::SubscriberIndex;
use crate::timer::{TimerHandle, TimerService};
use dashmap::DashMap;
use reactor_config::SystemConfig;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// System-wide counters
#[derive(Debug, Default)]
pub struct SystemMetrics {
    pub actors_spawned: AtomicU64,
    pub actors_stopped: AtomicU64,
    pub messages_processed: AtomicU64,
    pub total_processing_time_ns: AtomicU64,

    // Faults
    pub reaction_failures: AtomicU64,
    pub spurious_messages: AtomicU64,

    // Delivery
    pub deliveries_rejected: AtomicU64,
    pub messages_published: AtomicU64,
    pub acks_expired: AtomicU64,
}

impl SystemMetrics {
    pub fn record_message_handled(&self, duration: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let count = self.messages_processed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_processing_time_ns.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    pub fn snapshot(&self) -> SystemStats {
        let spawned = self.actors_spawned.load(Ordering::Relaxed);
        let stopped = self.actors_stopped.load(Ordering::Relaxed);
        SystemStats {
            actors_spawned: spawned,
            actors_stopped: stopped,
            live_actors: spawned.saturating_sub(stopped),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
            reaction_failures: self.reaction_failures.load(Ordering::Relaxed),
            spurious_messages: self.spurious_messages.load(Ordering::Relaxed),
            deliveries_rejected: self.deliveries_rejected.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            acks_expired: self.acks_expired.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SystemMetrics`]
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStats {
    pub actors_spawned: u64,
    pub actors_stopped: u64,
    pub live_actors: u64,
    pub messages_processed: u64,
    pub avg_processing_time_ns: f64,
    pub reaction_failures: u64,
    pub spurious_messages: u64,
    pub deliveries_rejected: u64,
    pub messages_published: u64,
    pub acks_expired: u64,
}

struct PendingAck {
    completion: Completion<DeliveryStatus>,
    timer: Option<TimerHandle>,
}

pub(crate) struct SystemInner {
    id: SystemId,
    config: SystemConfig,
    local_ref: SystemRef,
    local_driver: Arc<LocalDriver>,
    dispatchers: HashMap<String, Arc<Dispatcher>>,
    contexts: DashMap<ActorId, Arc<ActorContext>>,
    routing: RoutingTable,
    drivers: DashMap<ChannelId, Arc<dyn Driver>>,
    subscribers: SubscriberIndex,
    pending_acks: DashMap<u64, PendingAck>,
    timer: TimerService,
    generation: AtomicU64,
    sequence: AtomicU64,
    root: OnceLock<ActorRef>,
    shutting_down: AtomicBool,
    metrics: Arc<SystemMetrics>,
}

impl SystemInner {
    pub(crate) fn id(&self) -> &SystemId {
        &self.id
    }

    pub(crate) fn timer(&self) -> &TimerService {
        &self.timer
    }

    pub(crate) fn subscribers(&self) -> &SubscriberIndex {
        &self.subscribers
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn context(&self, id: &ActorId) -> Option<Arc<ActorContext>> {
        self.contexts.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn message(
        &self,
        sender: &ActorRef,
        destination: &ActorRef,
        payload: Payload,
        mode: SendMode,
        acking: AckingPolicy,
    ) -> Message {
        Message::new(
            sender.clone(),
            destination.clone(),
            self.next_sequence(),
            self.id.clone(),
            acking,
            mode,
            payload,
        )
    }

    // ---- spawn / stop ----

    fn spawn_under(
        self: &Arc<Self>,
        parent: Option<&Arc<ActorContext>>,
        reactions: Reactions,
        config: ActorConfig,
    ) -> std::result::Result<ActorRef, SpawnError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(SpawnError::SystemStopped);
        }
        let dispatcher = self
            .dispatchers
            .get(&config.dispatcher_name)
            .cloned()
            .ok_or_else(|| SpawnError::UnknownDispatcher {
                name: config.dispatcher_name.clone(),
            })?;
        if let Some(parent) = parent {
            if parent.is_stopping() {
                return Err(SpawnError::ParentNotAlive {
                    parent: parent.id().clone(),
                });
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let id = ActorId::new(config.name.as_str(), generation);
        let self_ref = ActorRef::new(id.clone(), self.local_ref.clone());
        let parent_ref = parent
            .map(|p| p.self_ref().clone())
            .unwrap_or_else(ActorRef::none);

        let ctx = Arc::new(ActorContext::new(
            self_ref.clone(),
            parent_ref,
            (config.mailbox_factory)(),
            reactions,
            dispatcher,
            config.subscriptions.clone(),
            Arc::downgrade(self),
        ));

        // Init is queued before the actor becomes reachable, so it always runs first
        let init = self.message(
            &ActorRef::none(),
            &self_ref,
            Payload::new(ActorInit),
            SendMode::Tell,
            AckingPolicy::None,
        );
        if let Err(reason) = ctx.mailbox().enqueue(init.clone()) {
            warn!(actor_id = %id, %reason, "Init message rejected by mailbox");
        }

        let weak_ctx = Arc::downgrade(&ctx);
        ctx.mailbox().attach(Arc::new(move || {
            if let Some(ctx) = weak_ctx.upgrade() {
                ctx.schedule();
            }
        }));

        let register = || {
            self.local_driver.log(&init);
            self.contexts.insert(id.clone(), Arc::clone(&ctx));
            self.subscribers.add(&self_ref, &config.subscriptions);
        };
        match parent {
            Some(parent) => parent.add_child(&config.name, &ctx, register)?,
            None => register(),
        }
        self.metrics.actors_spawned.fetch_add(1, Ordering::Relaxed);

        debug!(
            actor_id = %id,
            system_id = %self.id,
            dispatcher = %config.dispatcher_name,
            "Spawned actor"
        );

        ctx.schedule();
        Ok(self_ref)
    }

    fn spawn_child(
        self: &Arc<Self>,
        parent: &ActorRef,
        reactions: Reactions,
        config: ActorConfig,
    ) -> std::result::Result<ActorRef, SpawnError> {
        let not_alive = || SpawnError::ParentNotAlive {
            parent: parent.id().clone(),
        };
        if parent.system_ref().system_id() != &self.id {
            return Err(not_alive());
        }
        let parent_ctx = self.context(parent.id()).ok_or_else(not_alive)?;
        self.spawn_under(Some(&parent_ctx), reactions, config)
    }

    pub(crate) fn spawn_root_child(
        self: &Arc<Self>,
        reactions: Reactions,
        config: ActorConfig,
    ) -> std::result::Result<ActorRef, SpawnError> {
        let root = self.root.get().cloned().ok_or(SpawnError::SystemStopped)?;
        self.spawn_child(&root, reactions, config)
    }

    pub(crate) fn stop(self: &Arc<Self>, id: &ActorId) -> Completion<()> {
        match self.context(id) {
            Some(ctx) => self.stop_context(&ctx),
            None => Completion::completed(()),
        }
    }

    fn stop_context(&self, ctx: &Arc<ActorContext>) -> Completion<()> {
        if ctx.request_stop() {
            debug!(actor_id = %ctx.id(), "Stopping actor");
            ctx.schedule();
        }
        ctx.termination()
    }

    /// Runs on the dispatcher after the final pass of a stopping actor
    pub(crate) fn finish_stop(self: &Arc<Self>, ctx: &Arc<ActorContext>) {
        let children = ctx.seal_children();
        let remaining = Arc::new(AtomicUsize::new(children.len() + 1));
        let system = Arc::downgrade(self);
        let stopped = Arc::clone(ctx);

        let child_done: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                match system.upgrade() {
                    Some(system) => system.remove_terminated(&stopped),
                    None => stopped.complete_termination(),
                }
            }
        });

        for child in children {
            let done = Arc::clone(&child_done);
            self.stop_context(&child).on_complete(move |_| done());
        }
        child_done();
    }

    fn remove_terminated(&self, ctx: &Arc<ActorContext>) {
        self.contexts.remove(ctx.id());
        if let Some(parent) = self.context(ctx.parent().id()) {
            parent.remove_child(ctx.self_ref());
        }
        self.subscribers.remove(ctx.self_ref(), &ctx.subscriptions());

        let drivers: Vec<Arc<dyn Driver>> = self
            .drivers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for driver in drivers {
            driver.stop(ctx.id());
        }

        self.metrics.actors_stopped.fetch_add(1, Ordering::Relaxed);
        debug!(actor_id = %ctx.id(), system_id = %self.id, "Actor terminated");
        ctx.complete_termination();
    }

    // ---- routing ----

    fn find_remote_route(&self, system: &SystemId, channel: &ChannelId) -> Option<SystemRef> {
        self.routing
            .find(system, channel)
            .or_else(|| self.routing.find_any(system))
    }

    pub(crate) fn route(self: &Arc<Self>, message: Message) -> DeliveryStatus {
        let destination = message.destination().clone();
        let target_system = destination.system_ref().system_id();

        let status = if target_system == &self.id {
            self.deliver_local(message)
        } else {
            match self.find_remote_route(target_system, destination.system_ref().channel_id()) {
                Some(route) => route
                    .driver()
                    .send(Destination::Remote(&destination), message),
                None => DeliveryStatus::NotDelivered(NotDeliveredReason::no_route(
                    target_system,
                    destination.system_ref().channel_id(),
                )),
            }
        };

        if let DeliveryStatus::NotDelivered(reason) = &status {
            self.metrics.deliveries_rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                destination = %destination,
                category = reason.category(),
                %reason,
                "Message not delivered"
            );
        }
        status
    }

    fn deliver_local(self: &Arc<Self>, message: Message) -> DeliveryStatus {
        let Some(ctx) = self.context(message.destination().id()) else {
            return DeliveryStatus::NotDelivered(NotDeliveredReason::NoSuchActor {
                actor: message.destination().id().clone(),
            });
        };

        let published = (message.mode() == SendMode::Publish).then(|| message.clone());
        let status = self.local_driver.send(Destination::Local(&ctx), message);
        if let Some(message) = published {
            self.fan_out(&message);
        }
        status
    }

    fn fan_out(&self, message: &Message) {
        self.metrics.messages_published.fetch_add(1, Ordering::Relaxed);
        let local_origin = message.origin() == &self.id;

        for subscriber in self.subscribers.matching(message.tag(), local_origin) {
            if &subscriber == message.destination() {
                continue;
            }
            let Some(ctx) = self.context(subscriber.id()) else {
                continue;
            };
            let copy = message.redirected(subscriber.clone());
            if let DeliveryStatus::NotDelivered(reason) =
                self.local_driver.send(Destination::Local(&ctx), copy)
            {
                debug!(subscriber = %subscriber, %reason, "Subscriber copy not delivered");
            }
        }
    }

    pub(crate) fn route_acknowledged(self: &Arc<Self>, message: Message) -> Completion<DeliveryStatus> {
        let destination = message.destination().clone();
        let target = destination.system_ref();

        if target.system_id() == &self.id {
            return Completion::completed(acknowledged(self.route(message)));
        }
        let requires_ack = self
            .find_remote_route(target.system_id(), target.channel_id())
            .is_some_and(|route| route.driver().requires_acknowledgment());
        if !requires_ack {
            return Completion::completed(self.route(message));
        }

        let sequence = message.sequence();
        let completion = Completion::new();
        self.pending_acks.insert(
            sequence,
            PendingAck {
                completion: completion.clone(),
                timer: None,
            },
        );

        let timeout = self.config.ack_timeout();
        let system = Arc::downgrade(self);
        let timer = self.timer.schedule_once(timeout, move || {
            if let Some(system) = system.upgrade() {
                system.expire_ack(sequence, timeout);
            }
        });
        match self.pending_acks.get_mut(&sequence) {
            Some(mut pending) => pending.timer = Some(timer),
            // Already acknowledged
            None => timer.cancel(),
        }

        let status = self.route(message);
        if status != DeliveryStatus::Delivered {
            self.resolve_ack(sequence, status);
        }
        completion
    }

    fn resolve_ack(&self, sequence: u64, status: DeliveryStatus) -> bool {
        let Some((_, pending)) = self.pending_acks.remove(&sequence) else {
            return false;
        };
        if let Some(timer) = pending.timer {
            timer.cancel();
        }
        pending.completion.complete(status);
        true
    }

    fn expire_ack(&self, sequence: u64, timeout: Duration) {
        if self.resolve_ack(
            sequence,
            DeliveryStatus::NotDelivered(NotDeliveredReason::ack_timeout(timeout)),
        ) {
            self.metrics.acks_expired.fetch_add(1, Ordering::Relaxed);
            warn!(sequence, timeout_ms = timeout.as_millis() as u64, "Acknowledgment timed out");
        }
    }
}

fn acknowledged(status: DeliveryStatus) -> DeliveryStatus {
    match status {
        DeliveryStatus::Delivered => DeliveryStatus::Acknowledged,
        other => other,
    }
}

/// Handle on a running actor system; cheap to clone
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

/// Non-owning handle, for drivers and other long-lived callbacks
#[derive(Clone)]
pub struct WeakActorSystem {
    inner: Weak<SystemInner>,
}

impl WeakActorSystem {
    pub fn upgrade(&self) -> Option<ActorSystem> {
        self.inner.upgrade().map(ActorSystem::from_inner)
    }
}

impl ActorSystem {
    /// Start dispatchers, the timer service and the root guardian
    pub fn new(config: SystemConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| SystemError::configuration(format!("{:#}", e)))?;

        let metrics = Arc::new(SystemMetrics::default());
        let mut dispatchers = HashMap::with_capacity(config.dispatchers.len());
        for dispatcher in &config.dispatchers {
            dispatchers.insert(
                dispatcher.name.clone(),
                Dispatcher::start(dispatcher, &config.name, Arc::clone(&metrics))?,
            );
        }
        let timer = TimerService::start(&config.name, config.timer_threads)?;
        let local_driver = Arc::new(match &config.message_log {
            Some(path) => LocalDriver::with_message_log(path)?,
            None => LocalDriver::new(),
        });
        let root_dispatcher = config
            .dispatchers
            .first()
            .map(|d| d.name.clone())
            .ok_or_else(|| SystemError::configuration("no dispatcher configured"))?;

        let id = SystemId::new(config.name.as_str());
        let inner = Arc::new_cyclic(|weak| SystemInner {
            local_ref: SystemRef::new(
                id.clone(),
                Arc::clone(&local_driver) as Arc<dyn Driver>,
                weak.clone(),
            ),
            id,
            config,
            local_driver: Arc::clone(&local_driver),
            dispatchers,
            contexts: DashMap::new(),
            routing: RoutingTable::new(),
            drivers: DashMap::new(),
            subscribers: SubscriberIndex::default(),
            pending_acks: DashMap::new(),
            timer,
            generation: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
            root: OnceLock::new(),
            shutting_down: AtomicBool::new(false),
            metrics,
        });
        let system = Self { inner };
        system.register_driver(local_driver)?;

        let guardian = Reactions::builder()
            .default_reaction(|ctx: &ActorContext, message: &Message| {
                debug!(actor_id = %ctx.id(), tag = %message.tag(), "Message for root guardian dropped");
            })
            .build();
        let root = system
            .inner
            .spawn_under(None, guardian, ActorConfig::new("root").with_dispatcher(root_dispatcher))
            .map_err(|e| SystemError::configuration(e.to_string()))?;
        let _ = system.inner.root.set(root);

        info!(
            system_id = %system.inner.id,
            dispatchers = system.inner.dispatchers.len(),
            "Actor system started"
        );
        Ok(system)
    }

    /// System with default settings under `name`
    pub fn with_name(name: impl Into<String>) -> Result<Self> {
        Self::new(SystemConfig::new(name))
    }

    pub(crate) fn from_inner(inner: Arc<SystemInner>) -> Self {
        Self { inner }
    }

    pub fn downgrade(&self) -> WeakActorSystem {
        WeakActorSystem {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn id(&self) -> &SystemId {
        self.inner.id()
    }

    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    /// Reference other systems use to reach this one locally
    pub fn local_ref(&self) -> &SystemRef {
        &self.inner.local_ref
    }

    /// The root guardian
    pub fn root(&self) -> ActorRef {
        self.inner.root.get().cloned().unwrap_or_else(ActorRef::none)
    }

    pub fn timer(&self) -> &TimerService {
        self.inner.timer()
    }

    pub fn metrics(&self) -> Arc<SystemMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn stats(&self) -> SystemStats {
        self.inner.metrics.snapshot()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::Acquire)
    }

    // ---- lifecycle ----

    /// Spawn under the root guardian
    pub fn spawn(
        &self,
        reactions: Reactions,
        config: ActorConfig,
    ) -> std::result::Result<ActorRef, SpawnError> {
        self.inner.spawn_root_child(reactions, config)
    }

    /// Spawn under `parent`, which must be a live local actor
    pub fn spawn_child(
        &self,
        parent: &ActorRef,
        reactions: Reactions,
        config: ActorConfig,
    ) -> std::result::Result<ActorRef, SpawnError> {
        self.inner.spawn_child(parent, reactions, config)
    }

    /// Stop an actor and its subtree; stopping twice returns the same signal
    ///
    /// Unknown or already terminated actors yield a completed signal.
    pub fn stop(&self, id: &ActorId) -> Completion<()> {
        self.inner.stop(id)
    }

    pub(crate) fn finish_stop(&self, ctx: &Arc<ActorContext>) {
        self.inner.finish_stop(ctx);
    }

    pub fn is_alive(&self, id: &ActorId) -> bool {
        self.inner.contexts.contains_key(id)
    }

    pub fn actor_count(&self) -> usize {
        self.inner.contexts.len()
    }

    pub fn actor_ref(&self, id: &ActorId) -> Option<ActorRef> {
        self.inner.context(id).map(|ctx| ctx.self_ref().clone())
    }

    pub fn find_child(&self, parent: &ActorId, name: &str) -> Option<ActorRef> {
        self.inner.context(parent).and_then(|ctx| ctx.child(name))
    }

    /// Stop the hierarchy, then dispatchers, drivers and timers
    ///
    /// Waits up to the configured shutdown timeout for the hierarchy to
    /// terminate. Calling it again is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.shutting_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!(system_id = %inner.id, actors = inner.contexts.len(), "Shutting down actor system");

        let timeout = inner.config.shutdown_timeout();
        let terminated = match inner.root.get() {
            Some(root) => inner.stop(root.id()).wait_timeout(timeout).is_some(),
            None => true,
        };

        let sequences: Vec<u64> = inner.pending_acks.iter().map(|entry| *entry.key()).collect();
        for sequence in sequences {
            inner.resolve_ack(
                sequence,
                DeliveryStatus::NotDelivered(NotDeliveredReason::driver(
                    &ChannelId::local(),
                    "actor system shut down",
                )),
            );
        }

        let drivers: Vec<Arc<dyn Driver>> = inner
            .drivers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for driver in drivers {
            driver.shutdown();
        }
        for dispatcher in inner.dispatchers.values() {
            dispatcher.shutdown();
        }
        inner.timer.shutdown();

        if terminated {
            info!(system_id = %inner.id, "Actor system shutdown complete");
            Ok(())
        } else {
            warn!(
                system_id = %inner.id,
                remaining = inner.contexts.len(),
                "Actor hierarchy did not terminate in time"
            );
            Err(SystemError::ShutdownTimeout {
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    // ---- drivers and routes ----

    /// Initialize `driver` and make its channel available for routes
    pub fn register_driver(&self, driver: Arc<dyn Driver>) -> std::result::Result<(), DriverError> {
        let channel = driver.channel_id();
        if self.inner.drivers.contains_key(&channel) {
            return Err(DriverError::AlreadyRegistered { channel });
        }
        driver.initialize(self)?;
        match self.inner.drivers.entry(channel.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(DriverError::AlreadyRegistered { channel });
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(driver);
            }
        }
        debug!(system_id = %self.inner.id, %channel, "Registered driver");
        Ok(())
    }

    /// Remove a driver, its routes, and shut it down
    pub fn unregister_driver(&self, channel: &ChannelId) -> Option<Arc<dyn Driver>> {
        let (_, driver) = self.inner.drivers.remove(channel)?;
        self.flush_routes_for_channel(channel);
        driver.shutdown();
        Some(driver)
    }

    /// Reach `system` over the registered driver of `channel`
    pub fn register_new_route(
        &self,
        system: SystemId,
        channel: &ChannelId,
    ) -> std::result::Result<SystemRef, DriverError> {
        let driver = self
            .inner
            .drivers
            .get(channel)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| DriverError::UnknownChannel {
                channel: channel.clone(),
            })?;
        let system_ref = SystemRef::new(system, driver, Arc::downgrade(&self.inner));
        self.inner.routing.register(system_ref.clone());
        Ok(system_ref)
    }

    /// No-op when the route does not exist
    pub fn unregister_route(&self, system: &SystemId, channel: &ChannelId) {
        self.inner.routing.unregister(system, channel);
    }

    /// Drop every route served by `channel`, e.g. after its connection was lost
    pub fn flush_routes_for_channel(&self, channel: &ChannelId) -> Vec<SystemId> {
        let flushed = self.inner.routing.flush_channel(channel);
        if !flushed.is_empty() {
            info!(%channel, routes = flushed.len(), "Flushed routes");
        }
        flushed
    }

    pub fn find_route(&self, system: &SystemId, channel: &ChannelId) -> Option<SystemRef> {
        self.inner.routing.find(system, channel)
    }

    /// System reference for decoded actor references
    pub(crate) fn resolve_system_ref(
        &self,
        system: SystemId,
        channel: ChannelId,
        properties: ChannelProperties,
    ) -> SystemRef {
        if system == self.inner.id {
            return self.inner.local_ref.clone();
        }
        self.inner
            .find_remote_route(&system, &channel)
            .unwrap_or_else(|| {
                SystemRef::unresolved(system, channel, properties, Arc::downgrade(&self.inner))
            })
    }

    // ---- driver-facing surface ----

    /// Hand a message that arrived over a channel to its local destination
    ///
    /// Published messages are fanned out to local subscribers as well. The
    /// returned status is what the driver should acknowledge to the origin.
    pub fn deliver_inbound(&self, message: Message) -> DeliveryStatus {
        self.inner.route(message)
    }

    /// Resolve a pending acknowledged send; returns false for unknown sequences
    pub fn acknowledge(&self, sequence: u64, status: DeliveryStatus) -> bool {
        let resolved = self.inner.resolve_ack(sequence, acknowledged(status));
        if !resolved {
            debug!(sequence, "Acknowledgment for unknown or expired send");
        }
        resolved
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("id", &self.inner.id)
            .field("actors", &self.inner.contexts.len())
            .field("routes", &self.inner.routing.len())
            .finish()
    }
}
