//! Centralized configuration for proxybar.
//!
//! Compile-time defaults live as associated constants; [`SupervisorConfig`]
//! carries the values a running supervisor actually uses.

use crate::error::{Result, SupervisorError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "AntiGravity Claude Proxy";
    pub const PROGRAM: &'static str = "antigravity-claude-proxy";
    pub const FALLBACK_RUNNER: &'static str = "npx";
    pub const RUNTIME: &'static str = "node";
    pub const START_ARG: &'static str = "start";
    pub const DEFAULT_PORT: u16 = 8080;
}

/// Timing and sizing for the process supervisor.
pub struct SupervisorDefaults;

impl SupervisorDefaults {
    pub const CONFIRM_DELAY: Duration = Duration::from_secs(2);
    pub const STOP_GRACE: Duration = Duration::from_secs(2);
    pub const LOG_CAPACITY: usize = 500;
    pub const ERROR_TAIL_LINES: usize = 5;
    /// How long the exit watcher waits for output readers to drain.
    pub const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;
    /// Inherited `PATH` substitute when the parent has none.
    pub const FALLBACK_PATH: &'static str = "/usr/bin:/bin";
}

/// Shared directory and path configurations.
pub struct PathsConfig;

impl PathsConfig {
    pub const CONFIG_DIR_NAME: &'static str = "proxybar";
    pub const SETTINGS_FILENAME: &'static str = "settings.json";
    pub const PATH_LOOKUP_PROGRAM: &'static str = "/usr/bin/which";
    pub const NVM_VERSIONS_DIR: &'static str = ".nvm/versions/node";
}

/// A TCP port in the range 1-65535.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    pub fn new(value: u16) -> Result<Self> {
        if value == 0 {
            return Err(SupervisorError::InvalidPort(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Port {
    type Error = SupervisorError;

    fn try_from(value: u16) -> Result<Self> {
        Port::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

impl Default for Port {
    fn default() -> Self {
        Port(AppConfig::DEFAULT_PORT)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Runtime configuration for a [`crate::Supervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Dedicated executable name, tried first.
    pub program: String,
    /// Generic runner invoked as `<runner> <program> <args..>` when the
    /// dedicated executable is missing.
    pub fallback_runner: Option<String>,
    /// Runtime whose directory is prepended to the child's `PATH`.
    pub runtime: Option<String>,
    /// Arguments passed after the program.
    pub start_args: Vec<String>,
    /// Command-line substring identifying orphaned instances; `None` disables
    /// orphan cleanup.
    pub orphan_pattern: Option<String>,
    pub confirm_delay: Duration,
    pub stop_grace: Duration,
    pub log_capacity: usize,
    pub error_tail_lines: usize,
}

impl SupervisorConfig {
    /// Configuration for an arbitrary program with default timing.
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            orphan_pattern: Some(program.clone()),
            program,
            fallback_runner: None,
            runtime: None,
            start_args: vec![AppConfig::START_ARG.to_string()],
            confirm_delay: SupervisorDefaults::CONFIRM_DELAY,
            stop_grace: SupervisorDefaults::STOP_GRACE,
            log_capacity: SupervisorDefaults::LOG_CAPACITY,
            error_tail_lines: SupervisorDefaults::ERROR_TAIL_LINES,
        }
    }

    /// Set the fallback runner.
    pub fn with_fallback_runner(mut self, runner: impl Into<String>) -> Self {
        self.fallback_runner = Some(runner.into());
        self
    }

    /// Set the runtime used for `PATH` augmentation.
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    /// Replace the start arguments.
    pub fn with_start_args(mut self, args: Vec<String>) -> Self {
        self.start_args = args;
        self
    }

    /// Set or disable the orphan cleanup pattern.
    pub fn with_orphan_pattern(mut self, pattern: Option<String>) -> Self {
        self.orphan_pattern = pattern;
        self
    }

    /// Set the startup confirmation window.
    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    /// Set the grace period between SIGTERM and SIGKILL.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Set the log buffer capacity.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig::new(AppConfig::PROGRAM)
            .with_fallback_runner(AppConfig::FALLBACK_RUNNER)
            .with_runtime(AppConfig::RUNTIME)
    }
}
