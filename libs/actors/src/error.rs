//! Actor Kernel Error Types
//!
//! Every recoverable failure is a value: deliveries report a
//! [`NotDeliveredReason`], spawns a [`SpawnError`], asks an [`AskError`].
//! Only [`SystemError`] can abort startup.

use crate::identity::{ActorId, ChannelId, SystemId};
use std::time::Duration;
use thiserror::Error;

/// Why a message did not reach a mailbox
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotDeliveredReason {
    /// No driver is registered for the destination system/channel
    #[error("no route to system {system} over channel {channel}")]
    NoRoute { system: SystemId, channel: ChannelId },

    /// Destination system is known but the actor is not (or no longer) alive
    #[error("no such actor {actor}")]
    NoSuchActor { actor: ActorId },

    /// Bounded mailbox at capacity
    #[error("mailbox full (capacity {capacity})")]
    MailboxFull { capacity: usize },

    /// Backpressured mailbox did not grant space in time
    #[error("backpressure timeout after {timeout_ms}ms")]
    BackpressureTimeout { timeout_ms: u64 },

    /// Mailbox closed, usually because the actor is stopping
    #[error("mailbox closed")]
    MailboxClosed,

    /// Acknowledged delivery got no acknowledgment in time
    #[error("acknowledgment timeout after {timeout_ms}ms")]
    AckTimeout { timeout_ms: u64 },

    /// Driver-specific failure
    #[error("driver {channel} failed: {message}")]
    Driver { channel: ChannelId, message: String },
}

impl NotDeliveredReason {
    pub fn no_route(system: &SystemId, channel: &ChannelId) -> Self {
        Self::NoRoute {
            system: system.clone(),
            channel: channel.clone(),
        }
    }

    pub fn backpressure_timeout(timeout: Duration) -> Self {
        Self::BackpressureTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn ack_timeout(timeout: Duration) -> Self {
        Self::AckTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn driver(channel: &ChannelId, message: impl Into<String>) -> Self {
        Self::Driver {
            channel: channel.clone(),
            message: message.into(),
        }
    }

    /// Short label used in logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            Self::NoRoute { .. } => "routing",
            Self::NoSuchActor { .. } => "routing",
            Self::MailboxFull { .. } => "mailbox",
            Self::BackpressureTimeout { .. } => "mailbox",
            Self::MailboxClosed => "mailbox",
            Self::AckTimeout { .. } => "acknowledgment",
            Self::Driver { .. } => "driver",
        }
    }
}

/// Failure to create an actor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// Parent already has a live child with this name
    #[error("actor name '{name}' already used under parent {parent}")]
    NameConflict { parent: ActorId, name: String },

    /// Actor configuration refers to a dispatcher that was never configured
    #[error("unknown dispatcher '{name}'")]
    UnknownDispatcher { name: String },

    /// Parent is unknown or already stopping
    #[error("parent {parent} is not alive")]
    ParentNotAlive { parent: ActorId },

    /// The system is shutting down
    #[error("actor system is shutting down")]
    SystemStopped,
}

/// Failure of a request/reply exchange
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AskError {
    /// No reply within the deadline
    #[error("no reply within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A reply arrived with the wrong type
    #[error("received {received} instead of {expected}")]
    TypeMismatch {
        expected: &'static str,
        received: &'static str,
    },

    /// The request could not be delivered
    #[error("request not delivered: {0}")]
    Delivery(NotDeliveredReason),

    /// The ephemeral ask actor could not be spawned
    #[error("ask could not start: {0}")]
    Spawn(SpawnError),

    /// The caller dropped interest before the ask resolved
    #[error("ask cancelled")]
    Cancelled,
}

/// Driver lifecycle failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("driver {channel} failed to initialize: {message}")]
    Initialization { channel: ChannelId, message: String },

    #[error("a driver for channel {channel} is already registered")]
    AlreadyRegistered { channel: ChannelId },

    #[error("no driver registered for channel {channel}")]
    UnknownChannel { channel: ChannelId },
}

/// Failure to decode an encoded [`ActorRef`](crate::ActorRef)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty reference encoding")]
    Empty,

    #[error("unsupported reference encoding version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("malformed reference encoding: {message}")]
    Malformed { message: String },
}

/// Unrecoverable system-level errors
#[derive(Error, Debug)]
pub enum SystemError {
    /// Invalid configuration handed to the kernel
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Dispatcher worker threads could not be created
    #[error("dispatcher '{dispatcher}' could not start its workers: {source}")]
    DispatcherInit {
        dispatcher: String,
        #[source]
        source: std::io::Error,
    },

    /// Timer service runtime could not be created
    #[error("timer service could not start: {source}")]
    TimerInit {
        #[source]
        source: std::io::Error,
    },

    /// Message log could not be opened
    #[error("message log {path} could not be opened: {source}")]
    MessageLog {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The actor hierarchy did not terminate in time
    #[error("shutdown timed out after {timeout_ms}ms")]
    ShutdownTimeout { timeout_ms: u64 },
}

impl SystemError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Result type alias for system operations
pub type Result<T, E = SystemError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_categories() {
        let route = NotDeliveredReason::no_route(&SystemId::none(), &ChannelId::none());
        assert_eq!(route.category(), "routing");
        assert_eq!(NotDeliveredReason::MailboxClosed.category(), "mailbox");
        assert_eq!(
            NotDeliveredReason::backpressure_timeout(Duration::from_millis(20)),
            NotDeliveredReason::BackpressureTimeout { timeout_ms: 20 }
        );
    }

    #[test]
    fn test_error_formatting() {
        let err = SpawnError::NameConflict {
            parent: ActorId::new("root", 1),
            name: "worker".into(),
        };
        assert_eq!(
            err.to_string(),
            "actor name 'worker' already used under parent root#1"
        );

        let ask = AskError::TypeMismatch {
            expected: "u32",
            received: "alloc::string::String",
        };
        assert!(ask.to_string().contains("instead of u32"));
    }
}
