//! Actor configuration
//!
//! System-level settings live in `reactor-config` and are re-exported here.

use crate::mailbox::{self, MailboxFactory};
use crate::subscription::TypedSubscription;
use std::fmt;

pub use reactor_config::{
    load_config, DispatcherConfig, SystemConfig, DEFAULT_ACK_TIMEOUT_MS, DEFAULT_BATCH_SIZE,
    DEFAULT_DISPATCHER_NAME, DEFAULT_DISPATCHER_THREADS, DEFAULT_SHUTDOWN_TIMEOUT_MS,
};

/// Per-actor spawn settings
#[derive(Clone)]
pub struct ActorConfig {
    pub name: String,
    pub dispatcher_name: String,
    pub mailbox_factory: MailboxFactory,
    pub subscriptions: Vec<TypedSubscription>,
}

impl ActorConfig {
    /// Unbounded mailbox on the default dispatcher, no subscriptions
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dispatcher_name: DEFAULT_DISPATCHER_NAME.to_string(),
            mailbox_factory: mailbox::unbounded(),
            subscriptions: Vec::new(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher_name: impl Into<String>) -> Self {
        self.dispatcher_name = dispatcher_name.into();
        self
    }

    pub fn with_mailbox(mut self, mailbox_factory: MailboxFactory) -> Self {
        self.mailbox_factory = mailbox_factory;
        self
    }

    pub fn with_subscriptions(mut self, subscriptions: Vec<TypedSubscription>) -> Self {
        self.subscriptions = subscriptions;
        self
    }
}

impl fmt::Debug for ActorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorConfig")
            .field("name", &self.name)
            .field("dispatcher_name", &self.dispatcher_name)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}
