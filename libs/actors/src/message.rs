//! Messages and delivery outcomes
//!
//! A [`Message`] carries a type-erased [`Payload`]; the payload's [`TypeTag`]
//! selects the reaction that handles it on the receiving side.

use crate::error::NotDeliveredReason;
use crate::identity::SystemId;
use crate::reference::ActorRef;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Stable runtime type identifier of a payload
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased, cheaply clonable message body
#[derive(Clone)]
pub struct Payload {
    tag: TypeTag,
    value: Arc<dyn Any + Send + Sync>,
}

impl Payload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            tag: TypeTag::of::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn is<T: Any>(&self) -> bool {
        self.tag.id == TypeId::of::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Shared handle on the value if the type matches
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload<{}>", self.tag.name)
    }
}

/// Whether the sender wants an acknowledgment of the mailbox enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AckingPolicy {
    #[default]
    None,
    OneToOne,
}

/// Whether subscribers of the payload type see a copy of the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SendMode {
    /// Destination only
    #[default]
    Tell,
    /// Destination plus every matching typed subscriber
    Publish,
}

/// Routed envelope
#[derive(Debug, Clone)]
pub struct Message {
    sender: ActorRef,
    destination: ActorRef,
    sequence: u64,
    origin: SystemId,
    acking: AckingPolicy,
    mode: SendMode,
    payload: Payload,
}

impl Message {
    pub fn new(
        sender: ActorRef,
        destination: ActorRef,
        sequence: u64,
        origin: SystemId,
        acking: AckingPolicy,
        mode: SendMode,
        payload: Payload,
    ) -> Self {
        Self {
            sender,
            destination,
            sequence,
            origin,
            acking,
            mode,
            payload,
        }
    }

    pub fn sender(&self) -> &ActorRef {
        &self.sender
    }

    pub fn destination(&self) -> &ActorRef {
        &self.destination
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// System in which the message was created
    pub fn origin(&self) -> &SystemId {
        &self.origin
    }

    pub fn acking_policy(&self) -> AckingPolicy {
        self.acking
    }

    pub fn mode(&self) -> SendMode {
        self.mode
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn tag(&self) -> TypeTag {
        self.payload.tag
    }

    /// Same message re-addressed to another destination, used by fan-out
    pub(crate) fn redirected(&self, destination: ActorRef) -> Self {
        Self {
            destination,
            mode: SendMode::Tell,
            acking: AckingPolicy::None,
            ..self.clone()
        }
    }
}

/// Outcome of a send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Enqueued in the destination mailbox
    Delivered,
    /// Enqueued and confirmed by the destination system
    Acknowledged,
    NotDelivered(NotDeliveredReason),
}

impl DeliveryStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered | Self::Acknowledged)
    }

    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged)
    }

    pub fn reason(&self) -> Option<&NotDeliveredReason> {
        match self {
            Self::NotDelivered(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<Result<(), NotDeliveredReason>> for DeliveryStatus {
    fn from(result: Result<(), NotDeliveredReason>) -> Self {
        match result {
            Ok(()) => Self::Delivered,
            Err(reason) => Self::NotDelivered(reason),
        }
    }
}

/// First message every actor receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActorInit;

/// Delivered during the final scheduling pass of a stopping actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActorStop;
