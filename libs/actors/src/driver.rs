//! Delivery drivers
//!
//! A [`Driver`] moves messages over one channel. The kernel ships two: the
//! [`LocalDriver`] for in-process delivery and the [`NullDriver`] behind the
//! no-target reference. Remote channels implement the same trait and feed
//! arriving messages back through [`ActorSystem::deliver_inbound`].

use crate::context::ActorContext;
use crate::error::{DriverError, NotDeliveredReason, Result, SystemError};
use crate::identity::{ActorId, ChannelId, ChannelProperties};
use crate::message::{DeliveryStatus, Message};
use crate::reference::ActorRef;
use crate::system::ActorSystem;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Where a driver must put a message
pub enum Destination<'a> {
    /// Actor living in this process
    Local(&'a Arc<ActorContext>),
    /// Actor behind another system
    Remote(&'a ActorRef),
}

/// Channel capability used by system references
pub trait Driver: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    fn channel_properties(&self) -> ChannelProperties {
        ChannelProperties::new()
    }

    /// Called once when the driver is registered with a system
    ///
    /// Drivers that need to call back into the system should keep
    /// [`ActorSystem::downgrade`] rather than a strong handle.
    fn initialize(&self, _system: &ActorSystem) -> std::result::Result<(), DriverError> {
        Ok(())
    }

    fn send(&self, destination: Destination<'_>, message: Message) -> DeliveryStatus;

    /// Whether delivery is confirmed later through [`ActorSystem::acknowledge`]
    fn requires_acknowledgment(&self) -> bool {
        false
    }

    /// A local actor terminated; drop any state kept for it
    fn stop(&self, _actor: &ActorId) {}

    /// The owning system is shutting down
    fn shutdown(&self) {}
}

/// In-process delivery straight into the destination mailbox
///
/// With a message log configured every local delivery is appended to it,
/// one line per message.
pub struct LocalDriver {
    channel: ChannelId,
    log: Option<Mutex<LineWriter<File>>>,
    log_path: Option<PathBuf>,
}

impl LocalDriver {
    pub fn new() -> Self {
        Self {
            channel: ChannelId::local(),
            log: None,
            log_path: None,
        }
    }

    /// Local driver appending every delivery to `path`
    pub fn with_message_log(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| SystemError::MessageLog {
                path: path.display().to_string(),
                source,
            })?;
        debug!(path = %path.display(), "Logging local deliveries");
        Ok(Self {
            channel: ChannelId::local(),
            log: Some(Mutex::new(LineWriter::new(file))),
            log_path: Some(path.to_path_buf()),
        })
    }

    pub fn message_log(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub(crate) fn log(&self, message: &Message) {
        let Some(log) = &self.log else {
            return;
        };
        let result = writeln!(
            log.lock(),
            "{} {} -> {} {}",
            message.sequence(),
            message.sender().id(),
            message.destination().id(),
            message.tag()
        );
        if let Err(e) = result {
            warn!(error = %e, "Message log write failed");
        }
    }
}

impl Default for LocalDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for LocalDriver {
    fn channel_id(&self) -> ChannelId {
        self.channel.clone()
    }

    fn send(&self, destination: Destination<'_>, message: Message) -> DeliveryStatus {
        match destination {
            Destination::Local(ctx) => {
                self.log(&message);
                ctx.deliver(message)
            }
            Destination::Remote(target) => DeliveryStatus::NotDelivered(
                NotDeliveredReason::driver(
                    &self.channel,
                    format!("{} is not a local actor", target),
                ),
            ),
        }
    }
}

/// Driver of the no-target reference: every send fails with a routing error
#[derive(Debug, Default)]
pub struct NullDriver;

impl NullDriver {
    /// The shared instance
    pub fn instance() -> Arc<dyn Driver> {
        static NULL_DRIVER: OnceLock<Arc<dyn Driver>> = OnceLock::new();
        Arc::clone(NULL_DRIVER.get_or_init(|| Arc::new(NullDriver)))
    }
}

impl Driver for NullDriver {
    fn channel_id(&self) -> ChannelId {
        ChannelId::none()
    }

    fn send(&self, _destination: Destination<'_>, message: Message) -> DeliveryStatus {
        DeliveryStatus::NotDelivered(NotDeliveredReason::no_route(
            message.destination().system_ref().system_id(),
            &ChannelId::none(),
        ))
    }
}
