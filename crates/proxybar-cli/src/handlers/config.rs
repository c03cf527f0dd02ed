//! Settings subcommands.

use anyhow::{Context, Result};
use clap::Subcommand;
use proxybar_core::Settings;
use std::path::Path;
use tracing::info;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the current settings as JSON
    Show,
    /// Save a new server port
    SetPort { port: u16 },
    /// Enable or disable starting the server on launch
    AutoStart {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

pub fn apply(path: &Path, action: ConfigAction) -> Result<()> {
    let mut settings = Settings::load(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            return Ok(());
        }
        ConfigAction::SetPort { port } => {
            settings.set_port(port)?;
            info!("Port set to {}", settings.port);
        }
        ConfigAction::AutoStart { enabled } => {
            settings.auto_start = enabled;
            info!("Auto-start {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    settings
        .save(path)
        .with_context(|| format!("Failed to save settings to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_port_and_auto_start_persist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        apply(&path, ConfigAction::SetPort { port: 9191 }).unwrap();
        apply(&path, ConfigAction::AutoStart { enabled: false }).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.port.get(), 9191);
        assert!(!settings.auto_start);
    }

    #[test]
    fn test_invalid_port_leaves_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        assert!(apply(&path, ConfigAction::SetPort { port: 0 }).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_show_does_not_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        apply(&path, ConfigAction::Show).unwrap();
        assert!(!path.exists());
    }
}
