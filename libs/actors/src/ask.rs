//! Request/reply on top of plain messaging
//!
//! Each ask spawns a short-lived actor under the root guardian. It publishes
//! the request with itself as sender, then waits for exactly one outcome:
//!
//! ```text
//! Initializing --request rejected----------------------> Done (Delivery)
//! Initializing --request delivered--> AwaitingReply
//! AwaitingReply --reply of the expected type-----------> Done (Ok)
//! AwaitingReply --reply of any other type--------------> Done (TypeMismatch)
//! AwaitingReply --timer--------------------------------> Done (Timeout)
//! any state     --caller dropped the future------------> Done (Cancelled)
//! ```
//!
//! Every transition into `Done` cancels the timer and stops the actor; the
//! caller's future resolves once the actor has terminated.

use crate::completion::Completion;
use crate::config::ActorConfig;
use crate::context::ActorContext;
use crate::error::{AskError, NotDeliveredReason};
use crate::message::{ActorInit, DeliveryStatus, Message, Payload, SendMode};
use crate::reactions::Reactions;
use crate::reference::ActorRef;
use crate::timer::TimerHandle;
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::debug;

type AskOutcome<R> = Result<R, AskError>;

/// Fired by the ask timer
#[derive(Debug, Clone, Copy)]
struct AskTimedOut;

/// Sent when the caller drops an unresolved [`AskFuture`]
#[derive(Debug, Clone, Copy)]
struct AskCancelled;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AskState {
    Initializing,
    AwaitingReply,
    Done,
}

struct Coordinator<R> {
    state: AskState,
    target: ActorRef,
    request: Option<Payload>,
    timeout: Duration,
    timer: Option<TimerHandle>,
    caller: Completion<AskOutcome<R>>,
}

impl<R: Clone + Send + 'static> Coordinator<R> {
    fn on_init(&mut self, ctx: &ActorContext) {
        let Some(request) = self.request.take() else {
            return;
        };
        match self.target.send(ctx.self_ref(), request, SendMode::Publish) {
            DeliveryStatus::NotDelivered(reason) => {
                self.finish(ctx, Err(AskError::Delivery(reason)));
            }
            _ => {
                self.state = AskState::AwaitingReply;
                let me = ctx.self_ref().clone();
                self.timer = ctx.system().map(|system| {
                    system.timer().schedule_once(self.timeout, move || {
                        // Rejected by the closed mailbox once the ask is over
                        let _ = me.tell(&ActorRef::none(), AskTimedOut);
                    })
                });
            }
        }
    }

    fn on_reply(&mut self, ctx: &ActorContext, message: &Message) {
        if self.state != AskState::AwaitingReply {
            return;
        }
        let outcome = match message.payload().downcast_ref::<R>() {
            Some(reply) => Ok(reply.clone()),
            None => Err(AskError::TypeMismatch {
                expected: std::any::type_name::<R>(),
                received: message.tag().name(),
            }),
        };
        self.finish(ctx, outcome);
    }

    fn on_timeout(&mut self, ctx: &ActorContext) {
        if self.state == AskState::AwaitingReply {
            let timeout_ms = self.timeout.as_millis() as u64;
            self.finish(ctx, Err(AskError::Timeout { timeout_ms }));
        }
    }

    fn on_cancel(&mut self, ctx: &ActorContext) {
        if self.state != AskState::Done {
            self.finish(ctx, Err(AskError::Cancelled));
        }
    }

    fn finish(&mut self, ctx: &ActorContext, outcome: AskOutcome<R>) {
        self.state = AskState::Done;
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        debug!(actor_id = %ctx.id(), success = outcome.is_ok(), "Ask resolved");

        let caller = self.caller.clone();
        ctx.stop().on_complete(move |_| {
            caller.complete(outcome);
        });
    }
}

fn coordinator_reactions<R>(coordinator: Coordinator<R>) -> Reactions
where
    R: Any + Clone + Send + Sync,
{
    let coordinator = Arc::new(Mutex::new(coordinator));
    let on_init = Arc::clone(&coordinator);
    let on_timeout = Arc::clone(&coordinator);
    let on_cancel = Arc::clone(&coordinator);

    Reactions::builder()
        .react(move |ctx: &ActorContext, _: &ActorInit| on_init.lock().on_init(ctx))
        .react(move |ctx: &ActorContext, _: &AskTimedOut| on_timeout.lock().on_timeout(ctx))
        .react(move |ctx: &ActorContext, _: &AskCancelled| on_cancel.lock().on_cancel(ctx))
        .default_reaction(move |ctx: &ActorContext, message: &Message| {
            coordinator.lock().on_reply(ctx, message)
        })
        .build()
}

impl ActorRef {
    /// Send `request` and resolve with the first reply, as long as it is an `R`
    ///
    /// `name` only labels the ephemeral actor in logs.
    pub fn ask<R, T>(&self, request: T, timeout: Duration, name: &str) -> AskFuture<R>
    where
        R: Any + Clone + Send + Sync,
        T: Any + Send + Sync,
    {
        let caller = Completion::new();
        let Some(system) = self.system_ref().gateway() else {
            caller.complete(Err(AskError::Delivery(NotDeliveredReason::no_route(
                self.system_ref().system_id(),
                self.system_ref().channel_id(),
            ))));
            return AskFuture::resolved(caller);
        };

        let coordinator = Coordinator {
            state: AskState::Initializing,
            target: self.clone(),
            request: Some(Payload::new(request)),
            timeout,
            timer: None,
            caller: caller.clone(),
        };
        let actor_name = format!(
            "ask|{}|{}|{}|{}",
            name,
            self.id(),
            std::any::type_name::<R>(),
            system.next_sequence()
        );

        match system.spawn_root_child(coordinator_reactions(coordinator), ActorConfig::new(actor_name)) {
            Ok(ephemeral) => AskFuture {
                outcome: caller,
                ephemeral: Some(ephemeral),
            },
            Err(e) => {
                caller.complete(Err(AskError::Spawn(e)));
                AskFuture::resolved(caller)
            }
        }
    }
}

/// Pending outcome of [`ActorRef::ask`]
///
/// Dropping it before it resolves cancels the ask.
pub struct AskFuture<R> {
    outcome: Completion<AskOutcome<R>>,
    ephemeral: Option<ActorRef>,
}

impl<R: Clone + Send + 'static> AskFuture<R> {
    fn resolved(outcome: Completion<AskOutcome<R>>) -> Self {
        Self {
            outcome,
            ephemeral: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_completed()
    }

    pub fn try_get(&self) -> Option<AskOutcome<R>> {
        self.outcome.try_get()
    }

    /// Blocking wait; never call this from a reaction
    pub fn wait_timeout(&self, timeout: Duration) -> Option<AskOutcome<R>> {
        self.outcome.wait_timeout(timeout)
    }

    /// The underlying completion, detached from cancel-on-drop
    pub fn into_completion(mut self) -> Completion<AskOutcome<R>> {
        self.ephemeral = None;
        self.outcome.clone()
    }
}

impl<R: Clone> Future for AskFuture<R> {
    type Output = AskOutcome<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome).poll(cx)
    }
}

impl<R> Drop for AskFuture<R> {
    fn drop(&mut self) {
        if let Some(ephemeral) = self.ephemeral.take() {
            if !self.outcome.is_completed() {
                let _ = ephemeral.tell(&ActorRef::none(), AskCancelled);
            }
        }
    }
}
