//! Platform-specific process management.
//!
//! Liveness checks, graceful termination, and command-line scans used by
//! orphan cleanup. Forced kills go through the owned child handle instead.

use crate::error::{Result, SupervisorError};
use tracing::debug;

/// Check if a process with the given PID is alive.
///
/// # Platform Behavior
/// - **Linux/macOS**: `kill(pid, 0)`; `EPERM` still means the process exists
/// - **Windows**: Looks the PID up with `tasklist`
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    #[cfg(windows)]
    {
        use std::process::Command;

        let output = Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid), "/NH", "/FO", "CSV"])
            .output();
        match output {
            Ok(o) => String::from_utf8_lossy(&o.stdout).contains(&format!("\"{}\"", pid)),
            Err(e) => {
                debug!("Failed to run tasklist: {}", e);
                false
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        tracing::warn!("Process alive check not implemented for this platform");
        let _ = pid;
        true
    }
}

/// Ask a process to exit.
///
/// # Platform Behavior
/// - **Linux/macOS**: Sends SIGTERM; a process that is already gone is success
/// - **Windows**: `taskkill /PID {pid} /T` without `/F`
pub fn send_terminate(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid)
            .map_err(|_| SupervisorError::Config {
                message: format!("PID {} out of range", pid),
            })?;

        debug!("Sending SIGTERM to process {}", pid);
        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(SupervisorError::Config {
                message: format!("Failed to send SIGTERM to {}: {}", pid, e),
            }),
        }
    }

    #[cfg(windows)]
    {
        use std::process::Command;

        debug!("Terminating process {} with taskkill", pid);
        let output = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/T"])
            .output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() || stderr.contains("not found") {
            Ok(())
        } else {
            Err(SupervisorError::Config {
                message: format!("taskkill failed for {}: {}", pid, stderr.trim()),
            })
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(SupervisorError::Config {
            message: format!("Process termination not implemented for this platform (pid {})", pid),
        })
    }
}

/// Scan for processes matching a pattern in their command line.
///
/// # Platform Behavior
/// - **Linux/macOS**: Uses `ps -eo pid=,args=`
/// - **Windows**: Uses `wmic process get processid,commandline`
///
/// Returns a list of (pid, cmdline) tuples.
pub fn find_processes_by_cmdline(pattern: &str) -> Vec<(u32, String)> {
    #[cfg(unix)]
    {
        find_processes_unix(pattern)
    }

    #[cfg(windows)]
    {
        find_processes_windows(pattern)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pattern;
        vec![]
    }
}

/// Send a graceful termination signal to every process whose command line
/// contains `pattern`. The current process is never signalled.
///
/// Best effort: failures are logged and skipped. Returns how many processes
/// were signalled.
pub fn terminate_matching(pattern: &str) -> usize {
    if pattern.trim().is_empty() {
        return 0;
    }

    let own_pid = std::process::id();
    let mut signalled = 0;

    for (pid, cmdline) in find_processes_by_cmdline(pattern) {
        if pid == own_pid {
            continue;
        }
        debug!("Found orphan {} matching '{}': {}", pid, pattern, cmdline);
        match send_terminate(pid) {
            Ok(()) => signalled += 1,
            Err(e) => debug!("Ignoring orphan cleanup failure for {}: {}", pid, e),
        }
    }

    signalled
}

#[cfg(unix)]
fn find_processes_unix(pattern: &str) -> Vec<(u32, String)> {
    use std::process::{Command, Stdio};

    let output = match Command::new("ps")
        .args(["-eo", "pid=,args="])
        .stderr(Stdio::null())
        .output()
    {
        Ok(o) => o,
        Err(e) => {
            debug!("Failed to run ps: {}", e);
            return vec![];
        }
    };

    if !output.status.success() {
        return vec![];
    }

    parse_ps_output(&String::from_utf8_lossy(&output.stdout), pattern)
}

/// Parse `pid args...` lines, keeping those whose args contain `pattern`
/// (case-insensitive).
#[cfg_attr(not(unix), allow(dead_code))]
fn parse_ps_output(stdout: &str, pattern: &str) -> Vec<(u32, String)> {
    let pattern_lower = pattern.to_lowercase();

    stdout
        .lines()
        .filter_map(|line| {
            let (pid, cmdline) = line.trim().split_once(char::is_whitespace)?;
            let pid: u32 = pid.trim().parse().ok()?;
            let cmdline = cmdline.trim();

            if cmdline.to_lowercase().contains(&pattern_lower) {
                Some((pid, cmdline.to_string()))
            } else {
                None
            }
        })
        .collect()
}

#[cfg(windows)]
fn find_processes_windows(pattern: &str) -> Vec<(u32, String)> {
    use std::process::Command;

    let output = match Command::new("wmic")
        .args(["process", "get", "processid,commandline", "/format:csv"])
        .output()
    {
        Ok(o) => o,
        Err(e) => {
            debug!("Failed to run wmic: {}", e);
            return vec![];
        }
    };

    if !output.status.success() {
        return vec![];
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let pattern_lower = pattern.to_lowercase();

    stdout
        .lines()
        .skip(1) // header
        .filter_map(|line| {
            // CSV format: Node,CommandLine,ProcessId
            let parts: Vec<&str> = line.trim().split(',').collect();
            if parts.len() < 3 {
                return None;
            }
            let cmdline = parts[1];
            let pid: u32 = parts[parts.len() - 1].trim().parse().ok()?;
            cmdline
                .to_lowercase()
                .contains(&pattern_lower)
                .then(|| (pid, cmdline.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_process_alive_self() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn test_is_process_alive_nonexistent() {
        assert!(!is_process_alive(4_000_000_000));
    }

    #[test]
    fn test_parse_ps_output() {
        let stdout = "  101 /bin/sh /tmp/x/antigravity-claude-proxy start\n\
                      202 node /usr/lib/node_modules/npm/bin/npx-cli.js Antigravity-Claude-Proxy start\n\
                      303 /usr/bin/sleep 30\n\
                      garbage\n";
        let found = parse_ps_output(stdout, "antigravity-claude-proxy");
        let pids: Vec<u32> = found.iter().map(|(pid, _)| *pid).collect();
        assert_eq!(pids, vec![101, 202]);
        assert!(found[0].1.ends_with("start"));
    }

    #[test]
    fn test_terminate_matching_empty_pattern() {
        assert_eq!(terminate_matching("   "), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_matching_signals_orphan() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::{Duration, Instant};

        let temp_dir = tempfile::TempDir::new().unwrap();
        let name = format!("orphan-probe-{}", std::process::id());
        let script = temp_dir.path().join(&name);
        std::fs::write(&script, "#!/bin/sh\nwhile true; do sleep 1; done\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut child = std::process::Command::new(&script).spawn().unwrap();
        // Give ps a chance to see the shell.
        std::thread::sleep(Duration::from_millis(200));

        assert!(terminate_matching(&name) >= 1);

        let start = Instant::now();
        let mut exited = false;
        while start.elapsed() < Duration::from_secs(5) {
            if child.try_wait().unwrap().is_some() {
                exited = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        if !exited {
            child.kill().ok();
        }
        assert!(exited, "orphan should exit after SIGTERM");
    }
}
