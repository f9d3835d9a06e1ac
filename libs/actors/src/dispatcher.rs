//! Dispatcher pools
//!
//! A dispatcher is a named pool of OS threads sharing one work queue of
//! scheduled actor contexts. The scheduling flag on each context guarantees a
//! context sits in at most one queue slot, so at most one worker runs an
//! actor's reactions at any instant.

use crate::context::ActorContext;
use crate::error::{Result, SystemError};
use crate::message::{ActorStop, AckingPolicy, Message, Payload, SendMode};
use crate::reactions::ReactionResult;
use crate::reference::ActorRef;
use crate::system::SystemMetrics;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use reactor_config::DispatcherConfig;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

enum WorkItem {
    Run(Arc<ActorContext>),
    Shutdown,
}

pub struct Dispatcher {
    name: String,
    batch_size: usize,
    queue: Sender<WorkItem>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start `thread_count` named workers
    pub(crate) fn start(
        config: &DispatcherConfig,
        system_name: &str,
        metrics: Arc<SystemMetrics>,
    ) -> Result<Arc<Self>> {
        let (queue, receiver) = crossbeam_channel::unbounded();
        let dispatcher = Arc::new(Self {
            name: config.name.clone(),
            batch_size: config.batch_size,
            queue,
            workers: Mutex::new(Vec::with_capacity(config.thread_count)),
        });

        for index in 0..config.thread_count {
            let receiver = receiver.clone();
            let metrics = Arc::clone(&metrics);
            let batch_size = config.batch_size;
            let handle = thread::Builder::new()
                .name(format!("{}-{}-{}", system_name, config.name, index))
                .spawn(move || worker_loop(receiver, batch_size, metrics))
                .map_err(|source| SystemError::DispatcherInit {
                    dispatcher: config.name.clone(),
                    source,
                })?;
            dispatcher.workers.lock().push(handle);
        }

        info!(
            dispatcher = %config.name,
            threads = config.thread_count,
            batch_size = config.batch_size,
            "Dispatcher started"
        );
        Ok(dispatcher)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Queue a context whose scheduling flag the caller just acquired
    pub(crate) fn dispatch(&self, ctx: Arc<ActorContext>) {
        if self.queue.send(WorkItem::Run(ctx)).is_err() {
            // Only possible once every worker has exited
            debug!(dispatcher = %self.name, "Dispatch after dispatcher shutdown");
        }
    }

    /// Stop and join the workers; contexts still queued are dropped
    pub(crate) fn shutdown(&self) {
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for _ in &workers {
            let _ = self.queue.send(WorkItem::Shutdown);
        }

        let current = thread::current().id();
        for worker in workers {
            // A worker cannot join itself; it exits after its current batch
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!(dispatcher = %self.name, "Dispatcher worker exited with a panic");
            }
        }
        info!(dispatcher = %self.name, "Dispatcher stopped");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name)
            .field("batch_size", &self.batch_size)
            .field("workers", &self.workers.lock().len())
            .finish()
    }
}

fn worker_loop(receiver: Receiver<WorkItem>, batch_size: usize, metrics: Arc<SystemMetrics>) {
    while let Ok(item) = receiver.recv() {
        match item {
            WorkItem::Run(ctx) => run_batch(&ctx, batch_size, &metrics),
            WorkItem::Shutdown => break,
        }
    }
}

/// One scheduling pass over a context
fn run_batch(ctx: &Arc<ActorContext>, batch_size: usize, metrics: &SystemMetrics) {
    let mut processed = 0;
    while processed < batch_size && !ctx.is_stopping() {
        let Some(message) = ctx.mailbox().dequeue() else {
            break;
        };
        invoke(ctx, message, metrics);
        processed += 1;
    }

    if ctx.is_stopping() && ctx.begin_finalize() {
        finalize(ctx, metrics);
        ctx.release();
        return;
    }

    ctx.release();
    if !ctx.is_finalized() && (!ctx.mailbox().is_empty() || ctx.is_stopping()) {
        ctx.schedule();
    }
}

fn invoke(ctx: &ActorContext, message: Message, metrics: &SystemMetrics) {
    let tag = message.tag();
    let started = Instant::now();
    match ctx.react(message) {
        ReactionResult::Handled => {}
        ReactionResult::Failed(reason) => {
            metrics.reaction_failures.fetch_add(1, Ordering::Relaxed);
            error!(actor_id = %ctx.id(), %tag, %reason, "Reaction failed");
        }
        ReactionResult::Panicked(reason) => {
            metrics.reaction_failures.fetch_add(1, Ordering::Relaxed);
            error!(actor_id = %ctx.id(), %tag, %reason, "Reaction panicked");
        }
        ReactionResult::Unhandled => {
            metrics.spurious_messages.fetch_add(1, Ordering::Relaxed);
            warn!(actor_id = %ctx.id(), %tag, "Spurious message, no reaction matches");
        }
    }
    metrics.record_message_handled(started.elapsed());
}

/// Final pass of a stopping actor
fn finalize(ctx: &Arc<ActorContext>, metrics: &SystemMetrics) {
    let stop = Message::new(
        ActorRef::none(),
        ctx.self_ref().clone(),
        0,
        ctx.self_ref().system_ref().system_id().clone(),
        AckingPolicy::None,
        SendMode::Tell,
        Payload::new(ActorStop),
    );
    invoke(ctx, stop, metrics);
    ctx.mailbox().close();

    match ctx.system() {
        Some(system) => system.finish_stop(ctx),
        None => ctx.complete_termination(),
    }
}
