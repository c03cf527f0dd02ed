//! Platform-specific file permission handling.

use crate::error::{Result, SupervisorError};
use std::path::Path;
use tracing::debug;

/// Check whether `path` is a regular file the current user could execute.
///
/// # Platform Behavior
/// - **Linux/macOS**: Regular file with any execute bit set
/// - **Windows**: Regular file with an executable extension (.exe, .bat, .cmd, .ps1, .com)
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(windows)]
    {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                matches!(ext.as_str(), "exe" | "bat" | "cmd" | "ps1" | "com")
            })
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        true
    }
}

/// Make a file executable (mode 0o755 on Unix, no-op elsewhere).
pub fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata =
            std::fs::metadata(path).map_err(|e| SupervisorError::io_with_path(e, path))?;
        let mut permissions = metadata.permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| SupervisorError::io_with_path(e, path))?;
        debug!("Set executable permissions on: {}", path.display());
    }

    #[cfg(not(unix))]
    {
        if !path.exists() {
            return Err(SupervisorError::io_with_path(
                std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                path,
            ));
        }
        debug!("Skipping executable bit for: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn test_is_executable_unix() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("server");
        File::create(&file_path).unwrap();

        assert!(!is_executable(&file_path));
        set_executable(&file_path).unwrap();
        assert!(is_executable(&file_path));
    }

    #[test]
    fn test_directory_is_not_executable() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!is_executable(temp_dir.path()));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        assert!(!is_executable(&missing));
        assert!(set_executable(&missing).is_err());
    }
}
