//! # Reactor Configuration
//!
//! Configuration surfaces consumed by the actor kernel. The kernel never parses
//! files itself: it receives a [`SystemConfig`] built here, either from code or
//! through [`load_config`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reactor_config::{load_config, DispatcherConfig, SystemConfig};
//!
//! // Build in code
//! let config = SystemConfig::new("orders")
//!     .with_dispatcher(DispatcherConfig::new("io", 2, 64));
//! config.validate().unwrap();
//!
//! // Or load `reactor.toml` with REACTOR_* environment overrides
//! let loaded = load_config(Some("reactor.toml".as_ref())).unwrap();
//! ```

pub mod system_config;

// Re-export commonly used types
pub use system_config::{
    load_config, DispatcherConfig, SystemConfig, DEFAULT_ACK_TIMEOUT_MS, DEFAULT_BATCH_SIZE,
    DEFAULT_DISPATCHER_NAME, DEFAULT_DISPATCHER_THREADS, DEFAULT_SHUTDOWN_TIMEOUT_MS,
};
