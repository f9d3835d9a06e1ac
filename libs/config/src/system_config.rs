//! System Configuration Module
//!
//! Provides the configuration structures handed to the actor kernel at startup
//! and a loader that layers a TOML file with `REACTOR_` environment overrides.

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Name of the dispatcher used when an actor does not ask for a specific one
pub const DEFAULT_DISPATCHER_NAME: &str = "default";
/// Worker threads of the default dispatcher
pub const DEFAULT_DISPATCHER_THREADS: usize = 4;
/// Messages a worker drains from one actor before yielding it
pub const DEFAULT_BATCH_SIZE: usize = 1_000;
/// How long an acknowledged send waits for the remote acknowledgment
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 5_000;
/// How long `shutdown` waits for the actor hierarchy to terminate
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// One named pool of dispatcher worker threads
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Pool name actors refer to in their configuration
    pub name: String,
    /// Number of worker threads; bounds the parallelism of the pool
    pub thread_count: usize,
    /// Maximum reactions run for one actor before the worker yields it
    pub batch_size: usize,
}

impl DispatcherConfig {
    pub fn new(name: impl Into<String>, thread_count: usize, batch_size: usize) -> Self {
        Self {
            name: name.into(),
            thread_count,
            batch_size,
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_DISPATCHER_NAME,
            DEFAULT_DISPATCHER_THREADS,
            DEFAULT_BATCH_SIZE,
        )
    }
}

/// Main actor system configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SystemConfig {
    /// System name; part of the system identity
    pub name: String,

    /// Dispatcher pools created at startup
    pub dispatchers: Vec<DispatcherConfig>,

    /// Threads of the timer service runtime
    pub timer_threads: usize,

    /// Acknowledged sends fail with an ack timeout after this many milliseconds
    pub ack_timeout_ms: u64,

    /// Upper bound for a graceful shutdown
    pub shutdown_timeout_ms: u64,

    /// When set, every local delivery is appended to this file
    pub message_log: Option<PathBuf>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "reactor".to_string(),
            dispatchers: vec![DispatcherConfig::default()],
            timer_threads: 1,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            message_log: None,
        }
    }
}

impl SystemConfig {
    /// Default configuration under a different system name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a dispatcher, replacing an existing one with the same name
    pub fn with_dispatcher(mut self, dispatcher: DispatcherConfig) -> Self {
        self.dispatchers.retain(|d| d.name != dispatcher.name);
        self.dispatchers.push(dispatcher);
        self
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_message_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.message_log = Some(path.into());
        self
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Get the configuration of a named dispatcher
    pub fn dispatcher(&self, name: &str) -> Option<&DispatcherConfig> {
        self.dispatchers.iter().find(|d| d.name == name)
    }

    /// Load configuration from a TOML file with environment overrides
    ///
    /// Environment variables use the `REACTOR_` prefix and `__` as the nesting
    /// separator, e.g. `REACTOR_ACK_TIMEOUT_MS=250`.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading actor system config: {:?}", path);

        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix("REACTOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Parse configuration from a TOML string, without environment overrides
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Expand environment variables in path values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        if let Some(log) = &self.message_log {
            let raw = log.to_string_lossy();
            let expanded =
                shellexpand::env(raw.as_ref()).context("Failed to expand message log path")?;
            self.message_log = Some(PathBuf::from(expanded.as_ref()));
        }
        Ok(())
    }

    /// Reject configurations the kernel cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("system name must not be empty");
        }
        if self.dispatchers.is_empty() {
            bail!("at least one dispatcher must be configured");
        }
        if self.timer_threads == 0 {
            bail!("timer_threads must be greater than zero");
        }

        let mut seen = HashSet::new();
        for dispatcher in &self.dispatchers {
            if dispatcher.name.trim().is_empty() {
                bail!("dispatcher name must not be empty");
            }
            if !seen.insert(dispatcher.name.as_str()) {
                bail!("duplicate dispatcher name '{}'", dispatcher.name);
            }
            if dispatcher.thread_count == 0 {
                bail!("dispatcher '{}' needs at least one thread", dispatcher.name);
            }
            if dispatcher.batch_size == 0 {
                bail!("dispatcher '{}' needs a batch size above zero", dispatcher.name);
            }
        }

        debug!(
            system = %self.name,
            dispatchers = self.dispatchers.len(),
            "Actor system configuration validated"
        );
        Ok(())
    }
}

/// Convenience function: load, expand and validate
///
/// Without a path the built-in defaults are used (still validated).
pub fn load_config(path: Option<&Path>) -> Result<SystemConfig> {
    let mut config = match path {
        Some(path) => SystemConfig::load(path)?,
        None => SystemConfig::default(),
    };
    config.expand_env_vars()?;
    config.validate()?;
    Ok(config)
}
