//! Platform-specific path utilities.
//!
//! Knows where Node.js tooling usually lands and where proxybar keeps its
//! settings.

use crate::config::PathsConfig;
use crate::error::{Result, SupervisorError};
use std::path::{Path, PathBuf};

/// System-wide binary directories, highest precedence first.
pub const SYSTEM_BIN_DIRS: &[&str] = &["/usr/local/bin", "/opt/homebrew/bin", "/usr/bin"];

/// Per-user directories written by Node version managers and global package
/// installs, relative to the home directory, in precedence order.
pub const USER_BIN_DIRS: &[&str] = &[
    ".volta/bin",        // Volta
    ".fnm/current/bin",  // fnm
    ".asdf/shims",       // asdf
    ".npm-global/bin",   // npm global prefix
    ".pnpm-global/bin",  // pnpm global
    ".yarn/bin",         // Yarn global
    "node_modules/.bin", // home-level node_modules
];

/// The user's home directory.
///
/// Uses the `dirs` crate, which reads `HOME` on Linux/macOS.
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}

/// Ordered candidate directories for executable lookup.
///
/// System directories always come first; per-user directories are appended
/// only when `home` is known.
pub fn candidate_bin_dirs(home: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = SYSTEM_BIN_DIRS.iter().map(PathBuf::from).collect();
    if let Some(home) = home {
        dirs.extend(USER_BIN_DIRS.iter().map(|rel| home.join(rel)));
    }
    dirs
}

/// nvm's per-version install root (`~/.nvm/versions/node`).
pub fn nvm_versions_dir(home: &Path) -> PathBuf {
    home.join(PathsConfig::NVM_VERSIONS_DIR)
}

/// Get the proxybar configuration directory.
///
/// # Platform Behavior
/// - **Linux**: `~/.config/proxybar` (XDG_CONFIG_HOME)
/// - **Windows**: `%APPDATA%\proxybar`
/// - **macOS**: `~/Library/Application Support/proxybar`
pub fn config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| SupervisorError::Config {
        message: "Could not determine platform config directory".to_string(),
    })?;
    Ok(config_dir.join(PathsConfig::CONFIG_DIR_NAME))
}

/// Path to the persisted settings file.
pub fn settings_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(PathsConfig::SETTINGS_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_dirs_order() {
        let home = PathBuf::from("/home/tester");
        let dirs = candidate_bin_dirs(Some(&home));

        assert_eq!(dirs[0], PathBuf::from("/usr/local/bin"));
        assert_eq!(dirs[1], PathBuf::from("/opt/homebrew/bin"));
        assert_eq!(dirs[2], PathBuf::from("/usr/bin"));
        assert_eq!(dirs[3], home.join(".volta/bin"));
        assert_eq!(dirs.last(), Some(&home.join("node_modules/.bin")));
        assert_eq!(dirs.len(), SYSTEM_BIN_DIRS.len() + USER_BIN_DIRS.len());
    }

    #[test]
    fn test_candidate_dirs_without_home() {
        let dirs = candidate_bin_dirs(None);
        assert_eq!(dirs.len(), SYSTEM_BIN_DIRS.len());
    }

    #[test]
    fn test_nvm_versions_dir() {
        let dir = nvm_versions_dir(Path::new("/home/tester"));
        assert_eq!(dir, PathBuf::from("/home/tester/.nvm/versions/node"));
    }

    #[test]
    fn test_settings_path_ends_with_file() {
        if let Ok(path) = settings_path() {
            assert!(path.ends_with("proxybar/settings.json"), "{:?}", path);
        }
    }
}
