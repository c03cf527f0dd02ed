//! Proxybar Core - process supervision for a local proxy server.
//!
//! Finds `antigravity-claude-proxy` (or `npx`) across the usual Node.js
//! install layouts, runs it on a chosen port, captures its output into a
//! bounded log, and publishes state changes to any shell built on top.
//!
//! # Example
//!
//! ```rust,ignore
//! use proxybar_core::{Settings, Supervisor};
//!
//! let settings = Settings::load(&Settings::default_path()?)?;
//! let supervisor = Supervisor::with_defaults();
//! supervisor.start(settings.port.get()).await?;
//! println!("{}", settings.webui_url());
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logs;
pub mod platform;
pub mod process;
pub mod settings;

pub use config::{AppConfig, Port, SupervisorConfig, SupervisorDefaults};
pub use error::{Result, SupervisorError};
pub use events::{StatusPublisher, SupervisorEvent};
pub use logs::{LogBuffer, LogEntry};
pub use process::{
    CommandResolver, LaunchPlan, Phase, ResolutionSource, ResolvedCommand, Supervisor,
    SupervisorStatus,
};
pub use settings::Settings;
