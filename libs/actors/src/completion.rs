//! One-shot completions
//!
//! [`Completion`] is the kernel's promise type: it is completed exactly once,
//! can be awaited (or blocked on) by any number of holders, and runs
//! registered continuations on the completing thread.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

type Continuation<T> = Box<dyn FnOnce(&T) + Send>;

struct State<T> {
    value: Option<T>,
    wakers: Vec<Waker>,
    continuations: Vec<Continuation<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    completed: Condvar,
}

/// Write-once result shared between producers and any number of waiters
///
/// Failures are carried in `T` itself (for instance `Result<R, AskError>`),
/// which keeps the type usable for outcomes that cannot fail, like a
/// termination signal.
pub struct Completion<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + 'static> Completion<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    value: None,
                    wakers: Vec::new(),
                    continuations: Vec::new(),
                }),
                completed: Condvar::new(),
            }),
        }
    }

    /// An already completed instance
    pub fn completed(value: T) -> Self {
        let completion = Self::new();
        completion.complete(value);
        completion
    }

    /// Complete with `value`; returns false (and drops `value`) if already completed
    pub fn complete(&self, value: T) -> bool {
        let (wakers, continuations) = {
            let mut state = self.inner.state.lock();
            if state.value.is_some() {
                return false;
            }
            state.value = Some(value.clone());
            (
                std::mem::take(&mut state.wakers),
                std::mem::take(&mut state.continuations),
            )
        };

        self.inner.completed.notify_all();
        for waker in wakers {
            waker.wake();
        }
        for continuation in continuations {
            continuation(&value);
        }
        true
    }

    pub fn try_get(&self) -> Option<T> {
        self.inner.state.lock().value.clone()
    }

    /// Run `continuation` once the value is available
    ///
    /// Runs immediately on the calling thread when already completed,
    /// otherwise on the thread that completes.
    pub fn on_complete(&self, continuation: impl FnOnce(&T) + Send + 'static) {
        let value = {
            let mut state = self.inner.state.lock();
            match &state.value {
                Some(value) => value.clone(),
                None => {
                    state.continuations.push(Box::new(continuation));
                    return;
                }
            }
        };
        continuation(&value);
    }

    /// Block the calling thread until completed or `timeout` elapses
    ///
    /// Never call this from a reaction: it parks a dispatcher worker.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while state.value.is_none() {
            if self.inner.completed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.value.clone()
    }
}

impl<T> Completion<T> {
    pub fn is_completed(&self) -> bool {
        self.inner.state.lock().value.is_some()
    }
}

impl<T: Clone + Send + 'static> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Future for Completion<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = self.inner.state.lock();
        if let Some(value) = &state.value {
            return Poll::Ready(value.clone());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T: fmt::Debug> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Completion")
            .field("value", &state.value)
            .finish()
    }
}
