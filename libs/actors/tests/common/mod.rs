//! Shared helpers for kernel integration tests

#![allow(dead_code)]

use reactor_actors::{ActorSystem, DispatcherConfig, SystemConfig};
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Upper bound for anything that should happen "soon"
pub const WAIT: Duration = Duration::from_secs(5);

/// Initialize tracing for tests (safe to call from every test)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

/// System with one "default" dispatcher of `threads` workers
pub fn system_with(name: &str, threads: usize, batch_size: usize) -> ActorSystem {
    init_tracing();
    ActorSystem::new(
        SystemConfig::new(name).with_dispatcher(DispatcherConfig::new("default", threads, batch_size)),
    )
    .expect("actor system should start")
}

pub fn system(name: &str) -> ActorSystem {
    system_with(name, 4, 64)
}

/// Collect exactly `count` items or fail
pub fn collect<T>(rx: &Receiver<T>, count: usize) -> Vec<T> {
    (0..count)
        .map(|i| {
            rx.recv_timeout(WAIT)
                .unwrap_or_else(|_| panic!("timed out waiting for item {} of {}", i + 1, count))
        })
        .collect()
}
