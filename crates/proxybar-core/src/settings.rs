//! Persisted user preferences.
//!
//! Stored as pretty JSON. Writes go to a temp file that is synced and then
//! renamed over the target, so a crash never leaves a half-written file.

use crate::config::Port;
use crate::error::{Result, SupervisorError};
use crate::platform;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

fn default_auto_start() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub port: Port,
    /// Start the server when the shell launches.
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: Port::default(),
            auto_start: default_auto_start(),
        }
    }
}

impl Settings {
    /// `<config dir>/proxybar/settings.json`.
    pub fn default_path() -> Result<PathBuf> {
        platform::settings_path()
    }

    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(SupervisorError::io_with_path(e, path)),
        };

        serde_json::from_str(&contents).map_err(|e| SupervisorError::Json {
            message: format!("Failed to parse {}: {}", path.display(), e),
            source: Some(e),
        })
    }

    /// Write settings to `path` atomically, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SupervisorError::io_with_path(e, parent))?;
        }

        let serialized = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| SupervisorError::io_with_path(e, &temp_path))?;
            file.write_all(serialized.as_bytes())
                .map_err(|e| SupervisorError::io_with_path(e, &temp_path))?;
            file.sync_all()
                .map_err(|e| SupervisorError::io_with_path(e, &temp_path))?;
        }

        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(SupervisorError::io_with_path(e, path));
        }

        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<()> {
        self.port = Port::new(port)?;
        Ok(())
    }

    /// Address of the proxy's web console.
    pub fn webui_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load(&temp_dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.port.get(), 8080);
        assert!(settings.auto_start);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.set_port(9090).unwrap();
        settings.auto_start = false;
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_partial_and_unknown_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, r#"{"port": 3000, "theme": "dark"}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.port.get(), 3000);
        assert!(settings.auto_start);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, r#"{"port": 0}"#).unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(SupervisorError::Json { .. })
        ));

        let mut settings = Settings::default();
        assert!(settings.set_port(0).is_err());
        assert_eq!(settings.port.get(), 8080);
    }

    #[test]
    fn test_webui_url() {
        let mut settings = Settings::default();
        settings.set_port(4321).unwrap();
        assert_eq!(settings.webui_url(), "http://localhost:4321");
    }
}
