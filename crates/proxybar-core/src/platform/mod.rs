//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here rather than in the
//! supervisor:
//! - `paths` - Tool install locations and the settings directory
//! - `permissions` - Executable-bit checks
//! - `process` - Liveness, termination signals, process-table scans

pub mod paths;
pub mod permissions;
pub mod process;

pub use paths::{candidate_bin_dirs, config_dir, home_dir, nvm_versions_dir, settings_path};
pub use permissions::{is_executable, set_executable};
pub use process::{find_processes_by_cmdline, is_process_alive, send_terminate, terminate_matching};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}
