//! Location-transparent references
//!
//! An [`ActorRef`] pairs an actor identity with the [`SystemRef`] of the
//! system hosting it. Sends route through the system the reference was
//! obtained from (its gateway): same system identity means direct mailbox
//! delivery, anything else goes through the routing table.

use crate::completion::Completion;
use crate::driver::{Destination, Driver, NullDriver};
use crate::error::CodecError;
use crate::identity::{ActorId, ChannelId, ChannelProperties, SystemId};
use crate::message::{AckingPolicy, DeliveryStatus, Message, Payload, SendMode};
use crate::system::{ActorSystem, SystemInner};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, Weak};

/// Leading byte of every encoded reference
pub const REFERENCE_CODEC_VERSION: u8 = 1;

/// Address of an actor system over one channel
///
/// Equality only considers the system identity and the channel identity.
#[derive(Clone)]
pub struct SystemRef {
    system_id: SystemId,
    channel_id: ChannelId,
    properties: Arc<ChannelProperties>,
    driver: Arc<dyn Driver>,
    gateway: Weak<SystemInner>,
}

impl SystemRef {
    pub(crate) fn new(system_id: SystemId, driver: Arc<dyn Driver>, gateway: Weak<SystemInner>) -> Self {
        Self {
            system_id,
            channel_id: driver.channel_id(),
            properties: Arc::new(driver.channel_properties()),
            driver,
            gateway,
        }
    }

    /// Reference to a system no route is known for yet; sends fail until one is registered
    pub(crate) fn unresolved(
        system_id: SystemId,
        channel_id: ChannelId,
        properties: ChannelProperties,
        gateway: Weak<SystemInner>,
    ) -> Self {
        Self {
            system_id,
            channel_id,
            properties: Arc::new(properties),
            driver: NullDriver::instance(),
            gateway,
        }
    }

    /// System reference behind [`ActorRef::none`]
    pub fn none() -> Self {
        static NONE: OnceLock<SystemRef> = OnceLock::new();
        NONE.get_or_init(|| SystemRef::new(SystemId::none(), NullDriver::instance(), Weak::new()))
            .clone()
    }

    pub fn system_id(&self) -> &SystemId {
        &self.system_id
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    pub fn channel_properties(&self) -> &ChannelProperties {
        &self.properties
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn is_none(&self) -> bool {
        self.system_id.is_none()
    }

    pub(crate) fn gateway(&self) -> Option<Arc<SystemInner>> {
        self.gateway.upgrade()
    }
}

impl PartialEq for SystemRef {
    fn eq(&self, other: &Self) -> bool {
        self.system_id == other.system_id && self.channel_id == other.channel_id
    }
}

impl Eq for SystemRef {}

impl Hash for SystemRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.system_id.hash(state);
        self.channel_id.hash(state);
    }
}

impl fmt::Debug for SystemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRef")
            .field("system_id", &self.system_id)
            .field("channel_id", &self.channel_id)
            .field("properties", &self.properties)
            .finish()
    }
}

impl fmt::Display for SystemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.system_id, self.channel_id)
    }
}

/// Immutable capability to send messages to one actor
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ActorRef {
    id: ActorId,
    system_ref: SystemRef,
}

#[derive(Serialize, Deserialize)]
struct EncodedRef {
    actor: ActorId,
    system: SystemId,
    channel: ChannelId,
    properties: ChannelProperties,
}

impl ActorRef {
    pub fn new(id: ActorId, system_ref: SystemRef) -> Self {
        Self { id, system_ref }
    }

    /// The no-target reference: every send fails with a routing error
    pub fn none() -> Self {
        static NONE: OnceLock<ActorRef> = OnceLock::new();
        NONE.get_or_init(|| ActorRef::new(ActorId::none(), SystemRef::none()))
            .clone()
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn system_ref(&self) -> &SystemRef {
        &self.system_ref
    }

    pub fn is_none(&self) -> bool {
        self.id.is_none()
    }

    /// Deliver to this actor only
    pub fn tell<T: Any + Send + Sync>(&self, sender: &ActorRef, payload: T) -> DeliveryStatus {
        self.send(sender, Payload::new(payload), SendMode::Tell)
    }

    /// Deliver to this actor and to every matching subscriber of `T`
    pub fn publish<T: Any + Send + Sync>(&self, sender: &ActorRef, payload: T) -> DeliveryStatus {
        self.send(sender, Payload::new(payload), SendMode::Publish)
    }

    /// [`tell`](Self::tell), resolved once the destination system confirms the enqueue
    pub fn atell<T: Any + Send + Sync>(
        &self,
        sender: &ActorRef,
        payload: T,
    ) -> Completion<DeliveryStatus> {
        self.send_acknowledged(sender, Payload::new(payload), SendMode::Tell)
    }

    /// [`publish`](Self::publish), resolved once the destination system confirms the enqueue
    pub fn apublish<T: Any + Send + Sync>(
        &self,
        sender: &ActorRef,
        payload: T,
    ) -> Completion<DeliveryStatus> {
        self.send_acknowledged(sender, Payload::new(payload), SendMode::Publish)
    }

    pub(crate) fn send(&self, sender: &ActorRef, payload: Payload, mode: SendMode) -> DeliveryStatus {
        match self.system_ref.gateway() {
            Some(system) => {
                let message = system.message(sender, self, payload, mode, AckingPolicy::None);
                system.route(message)
            }
            None => self.send_detached(sender, payload, mode),
        }
    }

    pub(crate) fn send_acknowledged(
        &self,
        sender: &ActorRef,
        payload: Payload,
        mode: SendMode,
    ) -> Completion<DeliveryStatus> {
        match self.system_ref.gateway() {
            Some(system) => {
                let message = system.message(sender, self, payload, mode, AckingPolicy::OneToOne);
                system.route_acknowledged(message)
            }
            None => Completion::completed(self.send_detached(sender, payload, mode)),
        }
    }

    /// Send without a live gateway: only the reference's own driver is left
    fn send_detached(&self, sender: &ActorRef, payload: Payload, mode: SendMode) -> DeliveryStatus {
        let message = Message::new(
            sender.clone(),
            self.clone(),
            0,
            SystemId::none(),
            AckingPolicy::None,
            mode,
            payload,
        );
        self.system_ref.driver.send(Destination::Remote(self), message)
    }

    /// Versioned binary form, for embedding references in remote payloads
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let encoded = EncodedRef {
            actor: self.id.clone(),
            system: self.system_ref.system_id.clone(),
            channel: self.system_ref.channel_id.clone(),
            properties: (*self.system_ref.properties).clone(),
        };
        let body = bincode::serialize(&encoded).map_err(|e| CodecError::Malformed {
            message: e.to_string(),
        })?;

        let mut bytes = Vec::with_capacity(body.len() + 1);
        bytes.push(REFERENCE_CODEC_VERSION);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Rebuild a reference inside `system`
    ///
    /// The driver is resolved from the routing table; without a route the
    /// reference gets the null driver and sends fail until one is registered.
    pub fn decode(bytes: &[u8], system: &ActorSystem) -> Result<Self, CodecError> {
        let (&version, body) = bytes.split_first().ok_or(CodecError::Empty)?;
        if version != REFERENCE_CODEC_VERSION {
            return Err(CodecError::UnsupportedVersion { version });
        }
        let encoded: EncodedRef = bincode::deserialize(body).map_err(|e| CodecError::Malformed {
            message: e.to_string(),
        })?;

        let system_ref = system.resolve_system_ref(encoded.system, encoded.channel, encoded.properties);
        Ok(Self::new(encoded.actor, system_ref))
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorRef({} @ {})", self.id, self.system_ref)
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.system_ref.system_id)
    }
}
