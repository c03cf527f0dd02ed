//! Supervision of the proxy server process.
//!
//! # Startup Sequence
//!
//! 1. **Orphan cleanup** - SIGTERM stale instances left by a previous session
//! 2. **Resolution** - dedicated executable, then the fallback runner
//! 3. **Environment** - `PORT` plus the runtime directory on `PATH`
//! 4. **Confirmation** - the child must survive a short window
//!
//! # Example
//!
//! ```rust,no_run
//! use proxybar_core::Supervisor;
//!
//! #[tokio::main]
//! async fn main() -> proxybar_core::Result<()> {
//!     let supervisor = Supervisor::with_defaults();
//!     let mut events = supervisor.subscribe();
//!
//!     supervisor.start(8080).await?;
//!     while let Ok(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!     supervisor.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod environment;
mod launcher;
mod output;
mod resolver;
mod supervisor;

pub use environment::{build_child_env, child_env_from_current};
pub use launcher::{is_installed, plan_launch, LaunchPlan};
pub use output::{normalize_line, OutputCapture, OutputLine};
pub use resolver::{CommandResolver, ResolutionSource, ResolvedCommand};
pub use supervisor::{Phase, Supervisor, SupervisorStatus};
