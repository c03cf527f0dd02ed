//! Executable discovery across Node.js install layouts.
//!
//! # Resolution Strategy
//!
//! First match wins:
//! 1. **Known directories** - system-wide bins, then version-manager bins
//! 2. **nvm versions** - newest version directory first
//! 3. **PATH lookup** - `which <name>` as a subprocess

use crate::config::PathsConfig;
use crate::platform;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Where a command was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// One of the fixed candidate directories.
    KnownDirectory,
    /// A versioned install under the version-manager root.
    VersionManager,
    /// Output of the PATH-lookup program.
    PathLookup,
}

/// A resolved executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub path: PathBuf,
    pub source: ResolutionSource,
}

/// Locates executables by name.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    /// Candidate base directories, probed in order.
    search_dirs: Vec<PathBuf>,
    /// Directory whose children are version-named installs.
    version_root: Option<PathBuf>,
    /// Binary subpath inside each version directory.
    version_bin_subdir: PathBuf,
    /// PATH-lookup program (e.g. `/usr/bin/which`).
    path_lookup: Option<PathBuf>,
}

impl CommandResolver {
    /// Resolver with the standard locations for the current user.
    pub fn from_env() -> Self {
        let home = platform::home_dir();
        Self {
            search_dirs: platform::candidate_bin_dirs(home.as_deref()),
            version_root: home.as_deref().map(platform::nvm_versions_dir),
            version_bin_subdir: PathBuf::from("bin"),
            path_lookup: Some(PathBuf::from(PathsConfig::PATH_LOOKUP_PROGRAM)),
        }
    }

    /// Resolver that probes nothing until configured.
    pub fn empty() -> Self {
        Self {
            search_dirs: Vec::new(),
            version_root: None,
            version_bin_subdir: PathBuf::from("bin"),
            path_lookup: None,
        }
    }

    /// Replace the candidate directories.
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Set the version-manager root.
    pub fn with_version_root(mut self, root: impl AsRef<Path>) -> Self {
        self.version_root = Some(root.as_ref().to_path_buf());
        self
    }

    /// Set the PATH-lookup program.
    pub fn with_path_lookup(mut self, program: impl AsRef<Path>) -> Self {
        self.path_lookup = Some(program.as_ref().to_path_buf());
        self
    }

    /// Disable the PATH-lookup fallback.
    pub fn without_path_lookup(mut self) -> Self {
        self.path_lookup = None;
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Resolve `name` to an executable path.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.locate(name).map(|found| found.path)
    }

    /// Resolve `name`, reporting which strategy matched.
    pub fn locate(&self, name: &str) -> Option<ResolvedCommand> {
        if name.trim().is_empty() {
            return None;
        }

        if let Some(path) = self.probe_known_dirs(name) {
            return Some(ResolvedCommand {
                path,
                source: ResolutionSource::KnownDirectory,
            });
        }

        if let Some(path) = self.probe_version_root(name) {
            return Some(ResolvedCommand {
                path,
                source: ResolutionSource::VersionManager,
            });
        }

        if let Some(path) = self.probe_path_lookup(name) {
            return Some(ResolvedCommand {
                path,
                source: ResolutionSource::PathLookup,
            });
        }

        debug!("Could not resolve command '{}'", name);
        None
    }

    fn probe_known_dirs(&self, name: &str) -> Option<PathBuf> {
        self.search_dirs
            .iter()
            .map(|base| base.join(name))
            .find(|candidate| platform::is_executable(candidate))
    }

    /// Newest version wins; versions are compared as plain strings.
    fn probe_version_root(&self, name: &str) -> Option<PathBuf> {
        let root = self.version_root.as_ref()?;
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("No version directory at {}: {}", root.display(), e);
                return None;
            }
        };

        let mut versions: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        versions.sort_unstable_by(|a, b| b.cmp(a));

        versions
            .iter()
            .map(|version| root.join(version).join(&self.version_bin_subdir).join(name))
            .find(|candidate| platform::is_executable(candidate))
    }

    fn probe_path_lookup(&self, name: &str) -> Option<PathBuf> {
        let lookup = self.path_lookup.as_ref()?;
        let output = match Command::new(lookup)
            .arg(name)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(o) => o,
            Err(e) => {
                debug!("Failed to run {}: {}", lookup.display(), e);
                return None;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }
}

impl Default for CommandResolver {
    fn default() -> Self {
        Self::from_env()
    }
}
