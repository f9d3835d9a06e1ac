//! Timer service
//!
//! Delayed and periodic tasks run on a small dedicated tokio runtime, never
//! on dispatcher workers. Tasks should only send messages: anything heavier
//! belongs in a reaction.

use crate::error::{Result, SystemError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Cancellable handle on a scheduled task
#[derive(Debug)]
pub struct TimerHandle {
    task: Option<AbortHandle>,
}

impl TimerHandle {
    /// Handle of a task that was never scheduled
    pub fn inert() -> Self {
        Self { task: None }
    }

    /// Prevent any further run; cancelling twice is harmless
    pub fn cancel(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// Cancelled, or a one-shot task that already ran
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, AbortHandle::is_finished)
    }
}

pub struct TimerService {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    stopped: AtomicBool,
}

impl TimerService {
    pub(crate) fn start(system_name: &str, threads: usize) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(threads.max(1))
            .thread_name(format!("{}-timer", system_name))
            .enable_time()
            .build()
            .map_err(|source| SystemError::TimerInit { source })?;
        info!(threads, "Timer service started");

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Run `task` once after `delay`
    pub fn schedule_once<F>(&self, delay: Duration, task: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(async move {
            time::sleep(delay).await;
            task();
        })
    }

    /// Run `task` every `period`, first after one period; late ticks are caught up
    pub fn schedule_at_fixed_rate<F>(&self, period: Duration, mut task: F) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        self.spawn(async move {
            let mut ticks = time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                ticks.tick().await;
                task();
            }
        })
    }

    /// Run `task` after `initial_delay`, then again `delay` after each run completes
    pub fn schedule_with_fixed_delay<F>(
        &self,
        initial_delay: Duration,
        delay: Duration,
        mut task: F,
    ) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        self.spawn(async move {
            time::sleep(initial_delay).await;
            loop {
                task();
                time::sleep(delay).await;
            }
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Drop every pending task; later schedules return inert handles
    pub(crate) fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(runtime) = self.runtime.lock().take() {
            // Never blocks, so it is safe from async contexts and timer tasks
            runtime.shutdown_background();
        }
        debug!("Timer service stopped");
    }

    fn spawn<F>(&self, future: F) -> TimerHandle
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.is_stopped() {
            return TimerHandle::inert();
        }
        TimerHandle {
            task: Some(self.handle.spawn(future).abort_handle()),
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for TimerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerService")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
