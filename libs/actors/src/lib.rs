//! Actor Execution Kernel
//!
//! Independently addressed actors exchange asynchronous messages, run on
//! named dispatcher pools with a single-writer guarantee, and form
//! hierarchies whose termination cascades from the leaves up.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐      ┌────────────────────────┐
//! │         ActorSystem          │      │       Drivers          │
//! │                              │      │                        │
//! │  ActorRef::tell ──► route ───┼──────┼─► LocalDriver          │
//! │                      │       │      │   (mailbox enqueue)    │
//! │            routing table     │      │                        │
//! │         (system, channel) ───┼──────┼─► remote channel       │
//! │                              │      │   (deliver_inbound on  │
//! │  Dispatcher "default"        │      │    the peer system)    │
//! │   worker ◄── work queue ◄────┼──────┼── schedule(ctx)        │
//! │   worker    (ActorContext)   │      │                        │
//! └──────────────────────────────┘      └────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use reactor_actors::{ActorConfig, ActorContext, ActorRef, ActorSystem, Reactions};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let system = ActorSystem::with_name("example")?;
//!
//! let echo = Reactions::builder()
//!     .react(|ctx: &ActorContext, text: &String| {
//!         ctx.reply(text.clone());
//!     })
//!     .build();
//! let actor = system.spawn(echo, ActorConfig::new("echo"))?;
//!
//! let reply: String = actor
//!     .ask("hello".to_string(), Duration::from_secs(1), "greeting")
//!     .await?;
//! assert_eq!(reply, "hello");
//!
//! system.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod ask;
pub mod completion;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod identity;
pub mod mailbox;
pub mod message;
pub mod reactions;
pub mod reference;
pub mod routing;
pub mod subscription;
pub mod system;
pub mod timer;

pub use ask::AskFuture;
pub use completion::Completion;
pub use config::{ActorConfig, DispatcherConfig, SystemConfig};
pub use context::ActorContext;
pub use driver::{Destination, Driver, LocalDriver, NullDriver};
pub use error::{
    AskError, CodecError, DriverError, NotDeliveredReason, Result, SpawnError, SystemError,
};
pub use identity::{ActorId, ChannelId, ChannelProperties, SystemId};
pub use mailbox::{
    BackpressuringMailbox, BoundedMailbox, Mailbox, MailboxFactory, UnboundedMailbox,
};
pub use message::{
    AckingPolicy, ActorInit, ActorStop, DeliveryStatus, Message, Payload, SendMode, TypeTag,
};
pub use reactions::{ReactionOutcome, Reactions, ReactionsBuilder};
pub use reference::{ActorRef, SystemRef};
pub use routing::RoutingTable;
pub use subscription::{SubscriptionPolicy, TypedSubscription};
pub use system::{ActorSystem, SystemMetrics, SystemStats, WeakActorSystem};
pub use timer::{TimerHandle, TimerService};
