//! Mailbox family
//!
//! Per-actor inbound queues. Every variant keeps `dequeue` non-blocking so a
//! dispatcher worker never stalls on an empty or backpressured mailbox; only
//! the producer side of [`BackpressuringMailbox`] may wait.
//!
//! - [`UnboundedMailbox`]: accepts until closed
//! - [`BoundedMailbox`]: tail-drops beyond a fixed capacity
//! - [`BackpressuringMailbox`]: releases messages against consumer-granted credit

use crate::error::NotDeliveredReason;
use crate::message::{ActorInit, ActorStop, Message};
use parking_lot::{Condvar, Mutex};
use std::any::{Any, TypeId};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Callback a mailbox uses to ask for its owner to be scheduled
pub type MailboxWakeup = Arc<dyn Fn() + Send + Sync>;

/// Builds one fresh mailbox per spawned actor
pub type MailboxFactory = Arc<dyn Fn() -> Arc<dyn Mailbox> + Send + Sync>;

/// Capability surface shared by all mailbox variants
pub trait Mailbox: Send + Sync {
    /// Accept or reject a message; rejection never panics
    fn enqueue(&self, message: Message) -> Result<(), NotDeliveredReason>;

    /// Next message in FIFO order, without blocking
    fn dequeue(&self) -> Option<Message>;

    /// Messages ready for the owner to dequeue
    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Reject every further enqueue and drop what is still queued
    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Called once at spawn with a callback rescheduling the owning actor
    ///
    /// Only mailboxes that make messages visible outside of `enqueue` need it.
    fn attach(&self, _wakeup: MailboxWakeup) {}
}

/// Factory for [`UnboundedMailbox`], the default
pub fn unbounded() -> MailboxFactory {
    Arc::new(|| Arc::new(UnboundedMailbox::new()) as Arc<dyn Mailbox>)
}

/// Factory for [`BoundedMailbox`] with the given capacity
pub fn bounded(capacity: usize) -> MailboxFactory {
    Arc::new(move || Arc::new(BoundedMailbox::new(capacity)) as Arc<dyn Mailbox>)
}

/// Factory handing out an existing mailbox, e.g. a [`BackpressuringMailbox`]
/// the caller keeps a handle on to grant credit
///
/// The factory is meant for a single spawn: the mailbox is shared, not copied.
pub fn shared(mailbox: Arc<dyn Mailbox>) -> MailboxFactory {
    Arc::new(move || Arc::clone(&mailbox))
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<Message>,
    closed: bool,
}

/// Mailbox that accepts until closed
#[derive(Default)]
pub struct UnboundedMailbox {
    state: Mutex<QueueState>,
}

impl UnboundedMailbox {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Mailbox for UnboundedMailbox {
    fn enqueue(&self, message: Message) -> Result<(), NotDeliveredReason> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(NotDeliveredReason::MailboxClosed);
        }
        state.queue.push_back(message);
        Ok(())
    }

    fn dequeue(&self) -> Option<Message> {
        self.state.lock().queue.pop_front()
    }

    fn size(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.queue.clear();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Fixed-capacity mailbox; enqueue beyond capacity is rejected immediately
pub struct BoundedMailbox {
    capacity: usize,
    state: Mutex<QueueState>,
}

impl BoundedMailbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                queue: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Mailbox for BoundedMailbox {
    fn enqueue(&self, message: Message) -> Result<(), NotDeliveredReason> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(NotDeliveredReason::MailboxClosed);
        }
        if state.queue.len() >= self.capacity {
            trace!(capacity = self.capacity, tag = %message.tag(), "Bounded mailbox full, dropping");
            return Err(NotDeliveredReason::MailboxFull {
                capacity: self.capacity,
            });
        }
        state.queue.push_back(message);
        Ok(())
    }

    fn dequeue(&self) -> Option<Message> {
        self.state.lock().queue.pop_front()
    }

    fn size(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.queue.clear();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

struct CreditState {
    /// Accepted but not yet released to the consumer
    pending: VecDeque<Message>,
    credits: u64,
    closed: bool,
}

/// Demand-driven mailbox
///
/// Wraps a [`BoundedMailbox`] the owner drains. Messages reach it only
/// against credit granted with [`request`](Self::request); without credit
/// they wait in a pending buffer of `buffer_size` entries, and once that is
/// full producers block for at most `timeout` before failing with
/// [`NotDeliveredReason::BackpressureTimeout`].
///
/// Payload types in the exemption set skip credit and the pending buffer and
/// go straight to the wrapped mailbox, still subject to its capacity.
/// [`ActorInit`] and [`ActorStop`] are always exempt.
pub struct BackpressuringMailbox {
    inner: BoundedMailbox,
    buffer_size: usize,
    timeout: Duration,
    exempt: HashSet<TypeId>,
    state: Mutex<CreditState>,
    space_available: Condvar,
    wakeup: Mutex<Option<MailboxWakeup>>,
}

impl BackpressuringMailbox {
    /// Wrapped mailbox and pending buffer both hold `capacity` messages;
    /// initial credit is zero
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        let mut exempt = HashSet::new();
        exempt.insert(TypeId::of::<ActorInit>());
        exempt.insert(TypeId::of::<ActorStop>());

        Self {
            inner: BoundedMailbox::new(capacity),
            buffer_size: capacity,
            timeout,
            exempt,
            state: Mutex::new(CreditState {
                pending: VecDeque::new(),
                credits: 0,
                closed: false,
            }),
            space_available: Condvar::new(),
            wakeup: Mutex::new(None),
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_initial_credit(self, credits: u64) -> Self {
        self.state.lock().credits = credits;
        self
    }

    /// Let payloads of type `T` bypass credit checks
    pub fn with_exempt<T: Any>(mut self) -> Self {
        self.exempt.insert(TypeId::of::<T>());
        self
    }

    pub fn is_exempt(&self, message: &Message) -> bool {
        self.exempt.contains(&message.tag().id())
    }

    pub fn available_credit(&self) -> u64 {
        self.state.lock().credits
    }

    /// Messages accepted but still waiting for credit
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Grant `n` more deliveries and release buffered messages against them
    ///
    /// Returns how many buffered messages were released. Messages that find
    /// the wrapped mailbox full stay buffered with their credit unspent.
    pub fn request(&self, n: u64) -> usize {
        let released = {
            let mut state = self.state.lock();
            if state.closed {
                return 0;
            }
            state.credits = state.credits.saturating_add(n);
            self.release(&mut state)
        };
        self.after_release(released);
        released
    }

    fn has_room(&self) -> bool {
        self.inner.size() < self.inner.capacity()
    }

    /// Move pending messages into the wrapped mailbox while credit and room last
    fn release(&self, state: &mut CreditState) -> usize {
        let mut released = 0;
        while state.credits > 0 && self.has_room() {
            let Some(message) = state.pending.pop_front() else {
                break;
            };
            if let Err(reason) = self.inner.enqueue(message.clone()) {
                trace!(%reason, "Release deferred");
                state.pending.push_front(message);
                break;
            }
            state.credits -= 1;
            released += 1;
        }
        released
    }

    fn after_release(&self, released: usize) {
        if released > 0 {
            self.space_available.notify_all();
            if let Some(wakeup) = self.wakeup.lock().clone() {
                wakeup();
            }
        }
    }
}

impl Mailbox for BackpressuringMailbox {
    fn enqueue(&self, message: Message) -> Result<(), NotDeliveredReason> {
        if self.is_exempt(&message) {
            if self.state.lock().closed {
                return Err(NotDeliveredReason::MailboxClosed);
            }
            return self.inner.enqueue(message);
        }

        let deadline = Instant::now() + self.timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(NotDeliveredReason::MailboxClosed);
            }
            // Enqueue under the credit lock so a concurrent release cannot overtake
            if state.credits > 0 && state.pending.is_empty() && self.has_room() {
                self.inner.enqueue(message)?;
                state.credits -= 1;
                return Ok(());
            }
            if state.pending.len() < self.buffer_size {
                state.pending.push_back(message);
                return Ok(());
            }
            if self
                .space_available
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Err(NotDeliveredReason::backpressure_timeout(self.timeout));
            }
        }
    }

    fn dequeue(&self) -> Option<Message> {
        let message = self.inner.dequeue()?;
        let released = {
            let mut state = self.state.lock();
            if state.pending.is_empty() {
                0
            } else {
                self.release(&mut state)
            }
        };
        if released > 0 {
            self.space_available.notify_all();
        }
        Some(message)
    }

    /// Released messages only; see [`pending`](Self::pending)
    fn size(&self) -> usize {
        self.inner.size()
    }

    fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
            state.pending.clear();
        }
        self.space_available.notify_all();
        self.inner.close();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn attach(&self, wakeup: MailboxWakeup) {
        *self.wakeup.lock() = Some(wakeup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SystemId;
    use crate::message::{AckingPolicy, Payload, SendMode};
    use crate::reference::ActorRef;

    fn message<T: Any + Send + Sync>(value: T) -> Message {
        Message::new(
            ActorRef::none(),
            ActorRef::none(),
            0,
            SystemId::none(),
            AckingPolicy::None,
            SendMode::Tell,
            Payload::new(value),
        )
    }

    fn next_u32(mailbox: &dyn Mailbox) -> Option<u32> {
        mailbox
            .dequeue()
            .and_then(|m| m.payload().downcast_ref::<u32>().copied())
    }

    #[test]
    fn test_unbounded_fifo_and_close() {
        let mailbox = UnboundedMailbox::new();
        for i in 0..100u32 {
            mailbox.enqueue(message(i)).unwrap();
        }
        assert_eq!(mailbox.size(), 100);
        for i in 0..100u32 {
            assert_eq!(next_u32(&mailbox), Some(i));
        }
        assert!(mailbox.dequeue().is_none());

        mailbox.close();
        assert!(mailbox.is_closed());
        assert_eq!(
            mailbox.enqueue(message(1u32)),
            Err(NotDeliveredReason::MailboxClosed)
        );
    }

    #[test]
    fn test_bounded_tail_drop() {
        let mailbox = BoundedMailbox::new(2);
        mailbox.enqueue(message(1u32)).unwrap();
        mailbox.enqueue(message(2u32)).unwrap();
        assert_eq!(
            mailbox.enqueue(message(3u32)),
            Err(NotDeliveredReason::MailboxFull { capacity: 2 })
        );
        assert_eq!(next_u32(&mailbox), Some(1));
        mailbox.enqueue(message(4u32)).unwrap();
        assert_eq!(next_u32(&mailbox), Some(2));
        assert_eq!(next_u32(&mailbox), Some(4));
    }

    #[test]
    fn test_backpressure_buffers_without_credit() {
        let mailbox = BackpressuringMailbox::new(2, Duration::from_millis(20));
        mailbox.enqueue(message(1u32)).unwrap();
        mailbox.enqueue(message(2u32)).unwrap();

        // Nothing is visible to the consumer before credit is granted
        assert!(mailbox.dequeue().is_none());
        assert!(mailbox.is_empty());
        assert_eq!(mailbox.pending(), 2);

        let started = Instant::now();
        assert_eq!(
            mailbox.enqueue(message(3u32)),
            Err(NotDeliveredReason::BackpressureTimeout { timeout_ms: 20 })
        );
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_request_releases_in_order() {
        let mailbox = BackpressuringMailbox::new(3, Duration::from_millis(10));
        for i in 0..3u32 {
            mailbox.enqueue(message(i)).unwrap();
        }
        assert_eq!(mailbox.request(2), 2);
        assert_eq!(mailbox.available_credit(), 0);
        assert_eq!(mailbox.pending(), 1);

        // Two slots freed in the buffer
        mailbox.enqueue(message(3u32)).unwrap();
        mailbox.enqueue(message(4u32)).unwrap();
        assert!(mailbox.enqueue(message(5u32)).is_err());

        assert_eq!(next_u32(&mailbox), Some(0));
        assert_eq!(next_u32(&mailbox), Some(1));
        assert!(mailbox.dequeue().is_none());

        mailbox.request(10);
        for expected in 2..5u32 {
            assert_eq!(next_u32(&mailbox), Some(expected));
        }
        assert_eq!(mailbox.available_credit(), 7);
    }

    #[test]
    fn test_exempt_messages_bypass_credit() {
        let mailbox = BackpressuringMailbox::new(1, Duration::from_millis(5)).with_exempt::<&'static str>();
        mailbox.enqueue(message(1u32)).unwrap();

        // Exempt payloads are visible immediately, with zero credit
        mailbox.enqueue(message("control")).unwrap();
        let first = mailbox.dequeue().unwrap();
        assert_eq!(first.payload().downcast_ref::<&str>(), Some(&"control"));
        mailbox.enqueue(message(ActorInit)).unwrap();
        assert!(mailbox.dequeue().unwrap().payload().is::<ActorInit>());
        assert_eq!(mailbox.pending(), 1);

        // ...but still bounded by the wrapped mailbox
        mailbox.enqueue(message("a")).unwrap();
        assert_eq!(
            mailbox.enqueue(message("b")),
            Err(NotDeliveredReason::MailboxFull { capacity: 1 })
        );
    }

    #[test]
    fn test_close_releases_waiting_producer() {
        let mailbox = Arc::new(BackpressuringMailbox::new(1, Duration::from_secs(10)));
        mailbox.enqueue(message(1u32)).unwrap();

        let producer = Arc::clone(&mailbox);
        let handle = std::thread::spawn(move || producer.enqueue(message(2u32)));
        std::thread::sleep(Duration::from_millis(30));
        mailbox.close();

        assert_eq!(handle.join().unwrap(), Err(NotDeliveredReason::MailboxClosed));
        assert_eq!(mailbox.enqueue(message(3u32)), Err(NotDeliveredReason::MailboxClosed));
        assert_eq!(mailbox.request(5), 0);
    }

    #[test]
    fn test_request_wakes_owner() {
        let woken = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mailbox = BackpressuringMailbox::new(4, Duration::from_millis(5));
        let counter = Arc::clone(&woken);
        mailbox.attach(Arc::new(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));

        assert_eq!(mailbox.request(1), 0);
        assert_eq!(woken.load(std::sync::atomic::Ordering::SeqCst), 0);

        // With credit and nothing pending, the message goes straight through
        mailbox.enqueue(message(1u32)).unwrap();
        assert_eq!(next_u32(&mailbox), Some(1));

        mailbox.enqueue(message(2u32)).unwrap();
        assert_eq!(mailbox.request(1), 1);
        assert_eq!(woken.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_waits_for_room_in_full_mailbox() {
        let mailbox = BackpressuringMailbox::new(2, Duration::from_millis(10));
        mailbox.enqueue(message(0u32)).unwrap();
        mailbox.enqueue(message(1u32)).unwrap();
        assert_eq!(mailbox.request(2), 2);
        mailbox.enqueue(message(2u32)).unwrap();
        mailbox.enqueue(message(3u32)).unwrap();

        // The wrapped mailbox is full: credit stays unspent, nothing is lost
        assert_eq!(mailbox.request(2), 0);
        assert_eq!(mailbox.available_credit(), 2);
        assert_eq!(mailbox.pending(), 2);

        // Each dequeue frees a slot for the next buffered message
        let drained: Vec<u32> = std::iter::from_fn(|| next_u32(&mailbox)).collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
        assert_eq!(mailbox.pending(), 0);
        assert_eq!(mailbox.available_credit(), 0);
    }

    #[test]
    fn test_credit_kept_when_wrapped_mailbox_full() {
        let mailbox = BackpressuringMailbox::new(1, Duration::from_millis(10));
        mailbox.request(5);
        mailbox.enqueue(message(1u32)).unwrap();
        assert_eq!(mailbox.available_credit(), 4);

        // No room: the message waits in the buffer and keeps its credit
        mailbox.enqueue(message(2u32)).unwrap();
        assert_eq!(mailbox.available_credit(), 4);
        assert_eq!(mailbox.pending(), 1);

        assert_eq!(next_u32(&mailbox), Some(1));
        assert_eq!(mailbox.available_credit(), 3);
        assert_eq!(next_u32(&mailbox), Some(2));

        // Buffer full as well: the producer times out
        mailbox.enqueue(message(3u32)).unwrap();
        mailbox.enqueue(message(4u32)).unwrap();
        assert_eq!(
            mailbox.enqueue(message(5u32)),
            Err(NotDeliveredReason::backpressure_timeout(Duration::from_millis(10)))
        );
        assert_eq!(mailbox.available_credit(), 2);
    }
}
