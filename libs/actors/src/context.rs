//! Actor context
//!
//! One [`ActorContext`] exists per spawned actor. It owns the mailbox, the
//! reaction table and the hierarchy links, and it is the handle reactions use
//! to talk back to the system.

use crate::completion::Completion;
use crate::config::ActorConfig;
use crate::dispatcher::Dispatcher;
use crate::error::SpawnError;
use crate::identity::ActorId;
use crate::mailbox::Mailbox;
use crate::message::{DeliveryStatus, Message};
use crate::reactions::{ReactionResult, Reactions};
use crate::reference::ActorRef;
use crate::subscription::TypedSubscription;
use crate::system::{ActorSystem, SystemInner};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Children by name; sealed once the owner's stop cascade has taken its snapshot
#[derive(Default)]
struct ChildSet {
    by_name: HashMap<Arc<str>, Arc<ActorContext>>,
    sealed: bool,
}

pub struct ActorContext {
    self_ref: ActorRef,
    parent: ActorRef,
    mailbox: Arc<dyn Mailbox>,
    /// Only locked by the thread holding the scheduling flag
    reactions: Mutex<Reactions>,
    children: Mutex<ChildSet>,
    dispatcher: Arc<Dispatcher>,
    scheduled: AtomicBool,
    stop_requested: AtomicBool,
    finalized: AtomicBool,
    last_sender: Mutex<ActorRef>,
    subscriptions: RwLock<Vec<TypedSubscription>>,
    termination: Completion<()>,
    system: Weak<SystemInner>,
}

impl ActorContext {
    pub(crate) fn new(
        self_ref: ActorRef,
        parent: ActorRef,
        mailbox: Arc<dyn Mailbox>,
        reactions: Reactions,
        dispatcher: Arc<Dispatcher>,
        subscriptions: Vec<TypedSubscription>,
        system: Weak<SystemInner>,
    ) -> Self {
        Self {
            self_ref,
            parent,
            mailbox,
            reactions: Mutex::new(reactions),
            children: Mutex::new(ChildSet::default()),
            dispatcher,
            scheduled: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            last_sender: Mutex::new(ActorRef::none()),
            subscriptions: RwLock::new(subscriptions),
            termination: Completion::new(),
            system,
        }
    }

    pub fn id(&self) -> &ActorId {
        self.self_ref.id()
    }

    pub fn self_ref(&self) -> &ActorRef {
        &self.self_ref
    }

    /// [`ActorRef::none`] for the root guardian
    pub fn parent(&self) -> &ActorRef {
        &self.parent
    }

    /// Sender of the message being processed
    pub fn sender(&self) -> ActorRef {
        self.last_sender.lock().clone()
    }

    pub fn children(&self) -> Vec<ActorRef> {
        self.children
            .lock()
            .by_name
            .values()
            .map(|child| child.self_ref().clone())
            .collect()
    }

    pub fn child(&self, name: &str) -> Option<ActorRef> {
        self.children
            .lock()
            .by_name
            .get(name)
            .map(|child| child.self_ref().clone())
    }

    pub fn mailbox(&self) -> &Arc<dyn Mailbox> {
        &self.mailbox
    }

    pub fn dispatcher_name(&self) -> &str {
        self.dispatcher.name()
    }

    /// Owning system, unless it has already been dropped
    pub fn system(&self) -> Option<ActorSystem> {
        self.system.upgrade().map(ActorSystem::from_inner)
    }

    pub fn is_stopping(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Completes once this actor and its whole subtree have terminated
    pub fn termination(&self) -> Completion<()> {
        self.termination.clone()
    }

    /// Answer the sender of the current message
    pub fn reply<T: Any + Send + Sync>(&self, payload: T) -> DeliveryStatus {
        self.sender().tell(&self.self_ref, payload)
    }

    pub fn areply<T: Any + Send + Sync>(&self, payload: T) -> Completion<DeliveryStatus> {
        self.sender().atell(&self.self_ref, payload)
    }

    /// Answer the sender of the current message on behalf of `sender`
    pub fn reply_as<T: Any + Send + Sync>(&self, sender: &ActorRef, payload: T) -> DeliveryStatus {
        self.sender().tell(sender, payload)
    }

    pub fn areply_as<T: Any + Send + Sync>(
        &self,
        sender: &ActorRef,
        payload: T,
    ) -> Completion<DeliveryStatus> {
        self.sender().atell(sender, payload)
    }

    pub fn self_tell<T: Any + Send + Sync>(&self, payload: T) -> DeliveryStatus {
        self.self_ref.tell(&self.self_ref, payload)
    }

    pub fn spawn_child(
        &self,
        reactions: Reactions,
        config: ActorConfig,
    ) -> Result<ActorRef, SpawnError> {
        match self.system() {
            Some(system) => system.spawn_child(&self.self_ref, reactions, config),
            None => Err(SpawnError::SystemStopped),
        }
    }

    /// Request termination of this actor and its subtree
    pub fn stop(&self) -> Completion<()> {
        match self.system.upgrade() {
            Some(system) => system.stop(self.id()),
            None => self.termination(),
        }
    }

    pub fn subscriptions(&self) -> Vec<TypedSubscription> {
        self.subscriptions.read().clone()
    }

    /// Replace this actor's typed subscriptions
    pub fn set_subscriptions(&self, subscriptions: Vec<TypedSubscription>) {
        let mut current = self.subscriptions.write();
        if let Some(system) = self.system.upgrade() {
            system.subscribers().remove(&self.self_ref, &current);
            system.subscribers().add(&self.self_ref, &subscriptions);
        }
        *current = subscriptions;
    }

    /// Enqueue and make sure the actor gets scheduled
    pub(crate) fn deliver(self: &Arc<Self>, message: Message) -> DeliveryStatus {
        match self.mailbox.enqueue(message) {
            Ok(()) => {
                self.schedule();
                DeliveryStatus::Delivered
            }
            Err(reason) => DeliveryStatus::NotDelivered(reason),
        }
    }

    /// Hand the context to its dispatcher unless it is already scheduled
    pub(crate) fn schedule(self: &Arc<Self>) {
        if self.finalized.load(Ordering::Acquire) {
            return;
        }
        if self
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.dispatcher.dispatch(Arc::clone(self));
        }
    }

    /// Clear the scheduling flag at the end of a batch
    pub(crate) fn release(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    /// Returns false if the stop was already requested
    pub(crate) fn request_stop(&self) -> bool {
        !self.stop_requested.swap(true, Ordering::AcqRel)
    }

    /// Returns true exactly once, for the final scheduling pass
    pub(crate) fn begin_finalize(&self) -> bool {
        !self.finalized.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    pub(crate) fn react(&self, message: Message) -> ReactionResult {
        *self.last_sender.lock() = message.sender().clone();
        self.reactions.lock().react(self, &message)
    }

    pub(crate) fn complete_termination(&self) {
        self.termination.complete(());
    }

    /// Claim `name` for `child` and run `register` while the claim is held
    ///
    /// Fails without side effects once the child set is sealed or the name is
    /// taken.
    pub(crate) fn add_child(
        &self,
        name: &str,
        child: &Arc<ActorContext>,
        register: impl FnOnce(),
    ) -> Result<(), SpawnError> {
        let mut children = self.children.lock();
        if children.sealed {
            return Err(SpawnError::ParentNotAlive {
                parent: self.id().clone(),
            });
        }
        if children.by_name.contains_key(name) {
            return Err(SpawnError::NameConflict {
                parent: self.id().clone(),
                name: name.to_string(),
            });
        }
        register();
        children.by_name.insert(Arc::from(name), Arc::clone(child));
        Ok(())
    }

    pub(crate) fn remove_child(&self, child: &ActorRef) {
        let mut children = self.children.lock();
        if children
            .by_name
            .get(child.id().name())
            .is_some_and(|existing| existing.self_ref() == child)
        {
            children.by_name.remove(child.id().name());
        }
    }

    /// Refuse further children and return the current ones
    pub(crate) fn seal_children(&self) -> Vec<Arc<ActorContext>> {
        let mut children = self.children.lock();
        children.sealed = true;
        children.by_name.values().cloned().collect()
    }
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("id", self.id())
            .field("parent", self.parent.id())
            .field("dispatcher", &self.dispatcher.name())
            .field("mailbox_size", &self.mailbox.size())
            .field("children", &self.children.lock().by_name.len())
            .field("stopping", &self.is_stopping())
            .finish()
    }
}
