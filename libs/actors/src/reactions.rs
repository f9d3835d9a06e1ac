//! Reaction tables
//!
//! An actor's behaviour is a table from payload type to handler, built once
//! with [`ReactionsBuilder`] and immutable afterwards. Dispatch is a single
//! `TypeId` lookup with an optional catch-all.

use crate::context::ActorContext;
use crate::message::{ActorInit, ActorStop, Message};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

type Handler = Box<dyn FnMut(&ActorContext, &Message) -> Result<(), String> + Send>;

/// Return values a reaction may produce
///
/// Reactions returning `()` always succeed; reactions returning a `Result`
/// report their error to the dispatcher, which logs and counts it.
pub trait ReactionOutcome {
    fn into_outcome(self) -> Result<(), String>;
}

impl ReactionOutcome for () {
    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: fmt::Display> ReactionOutcome for Result<(), E> {
    fn into_outcome(self) -> Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}

/// What happened when a message was handed to the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionResult {
    Handled,
    /// The reaction returned an error
    Failed(String),
    /// The reaction panicked
    Panicked(String),
    /// No typed reaction and no default reaction
    Unhandled,
}

/// Immutable type-tag → handler table
pub struct Reactions {
    handlers: HashMap<TypeId, Handler>,
    default: Option<Handler>,
}

impl Reactions {
    pub fn builder() -> ReactionsBuilder {
        ReactionsBuilder::default()
    }

    /// A table that ignores everything
    pub fn empty() -> Self {
        Self::builder().build()
    }

    pub fn handles(&self, type_id: TypeId) -> bool {
        self.handlers.contains_key(&type_id)
    }

    /// Run the reaction selected by the message's payload type
    ///
    /// Lifecycle payloads only reach an explicitly declared reaction, never
    /// the default one. Panics are contained here.
    pub(crate) fn react(&mut self, ctx: &ActorContext, message: &Message) -> ReactionResult {
        let type_id = message.tag().id();
        let handler = match self.handlers.get_mut(&type_id) {
            Some(handler) => handler,
            None if is_lifecycle(type_id) => return ReactionResult::Handled,
            None => match self.default.as_mut() {
                Some(handler) => handler,
                None => return ReactionResult::Unhandled,
            },
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(ctx, message))) {
            Ok(Ok(())) => ReactionResult::Handled,
            Ok(Err(error)) => ReactionResult::Failed(error),
            Err(panic) => ReactionResult::Panicked(panic_message(panic.as_ref())),
        }
    }
}

impl fmt::Debug for Reactions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactions")
            .field("typed", &self.handlers.len())
            .field("default", &self.default.is_some())
            .finish()
    }
}

fn is_lifecycle(type_id: TypeId) -> bool {
    type_id == TypeId::of::<ActorInit>() || type_id == TypeId::of::<ActorStop>()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Builder for [`Reactions`]
#[derive(Default)]
pub struct ReactionsBuilder {
    handlers: HashMap<TypeId, Handler>,
    default: Option<Handler>,
}

impl ReactionsBuilder {
    /// Handle payloads of type `T`; a later registration for the same type replaces this one
    pub fn react<T, F, R>(mut self, mut reaction: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnMut(&ActorContext, &T) -> R + Send + 'static,
        R: ReactionOutcome,
    {
        let handler: Handler = Box::new(move |ctx, message| {
            match message.payload().downcast_ref::<T>() {
                Some(payload) => reaction(ctx, payload).into_outcome(),
                None => Err(format!(
                    "payload {} does not match reaction type {}",
                    message.tag(),
                    std::any::type_name::<T>()
                )),
            }
        });
        self.handlers.insert(TypeId::of::<T>(), handler);
        self
    }

    /// Handle every payload type without a typed reaction
    pub fn default_reaction<F, R>(mut self, mut reaction: F) -> Self
    where
        F: FnMut(&ActorContext, &Message) -> R + Send + 'static,
        R: ReactionOutcome,
    {
        self.default = Some(Box::new(move |ctx, message| {
            reaction(ctx, message).into_outcome()
        }));
        self
    }

    pub fn build(self) -> Reactions {
        Reactions {
            handlers: self.handlers,
            default: self.default,
        }
    }
}
