//! Launch planning and child spawning.

use crate::config::{Port, SupervisorConfig};
use crate::error::{Result, SupervisorError};
use crate::process::environment::child_env_from_current;
use crate::process::resolver::CommandResolver;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// What will be executed for one start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchPlan {
    /// Executable to spawn: the dedicated binary or the fallback runner.
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Runtime whose directory goes first on the child's `PATH`.
    pub runtime: Option<PathBuf>,
    /// True when the program is started through the fallback runner.
    pub via_runner: bool,
}

impl LaunchPlan {
    /// Build the command with stdin closed and both output streams piped.
    ///
    /// The child is killed if its handle is dropped.
    pub fn command(&self, port: Port) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args)
            .env_clear()
            .envs(child_env_from_current(self.runtime.as_deref(), port))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    pub fn spawn(&self, program: &str, port: Port) -> Result<Child> {
        debug!(
            "Spawning {} {} on port {}",
            self.executable.display(),
            self.args.join(" "),
            port
        );
        self.command(port)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: program.to_string(),
                source,
            })
    }
}

/// Resolve the executable, runner fallback, and runtime for `config`.
///
/// Runs the PATH-lookup subprocess when the fixed locations miss, so call it
/// off the async executor.
pub fn plan_launch(config: &SupervisorConfig, resolver: &CommandResolver) -> Result<LaunchPlan> {
    let runtime = config
        .runtime
        .as_deref()
        .and_then(|name| resolver.resolve(name));

    if let Some(executable) = resolver.resolve(&config.program) {
        info!("Using {} at {}", config.program, executable.display());
        return Ok(LaunchPlan {
            executable,
            args: config.start_args.clone(),
            runtime,
            via_runner: false,
        });
    }

    if let Some(runner) = config.fallback_runner.as_deref() {
        if let Some(executable) = resolver.resolve(runner) {
            info!(
                "{} not found directly, using {} at {}",
                config.program,
                runner,
                executable.display()
            );
            let mut args = Vec::with_capacity(config.start_args.len() + 1);
            args.push(config.program.clone());
            args.extend(config.start_args.iter().cloned());
            return Ok(LaunchPlan {
                executable,
                args,
                runtime,
                via_runner: true,
            });
        }
    }

    Err(SupervisorError::NotInstalled {
        program: config.program.clone(),
    })
}

/// Whether either the program or its runner can be resolved.
pub fn is_installed(config: &SupervisorConfig, resolver: &CommandResolver) -> bool {
    resolver.resolve(&config.program).is_some()
        || config
            .fallback_runner
            .as_deref()
            .is_some_and(|runner| resolver.resolve(runner).is_some())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::platform;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn make_script(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        platform::set_executable(path).unwrap();
    }

    fn resolver_for(dir: &Path) -> CommandResolver {
        CommandResolver::empty()
            .with_search_dirs(vec![dir.to_path_buf()])
            .without_path_lookup()
    }

    #[test]
    fn test_direct_plan() {
        let temp_dir = TempDir::new().unwrap();
        make_script(&temp_dir.path().join("proxy-direct"), "exit 0");
        make_script(&temp_dir.path().join("node"), "exit 0");

        let config = SupervisorConfig::new("proxy-direct").with_runtime("node");
        let plan = plan_launch(&config, &resolver_for(temp_dir.path())).unwrap();

        assert_eq!(plan.executable, temp_dir.path().join("proxy-direct"));
        assert_eq!(plan.args, vec!["start".to_string()]);
        assert_eq!(plan.runtime, Some(temp_dir.path().join("node")));
        assert!(!plan.via_runner);
    }

    #[test]
    fn test_runner_fallback_plan() {
        let temp_dir = TempDir::new().unwrap();
        make_script(&temp_dir.path().join("npx"), "exit 0");

        let config = SupervisorConfig::new("proxy-missing").with_fallback_runner("npx");
        let plan = plan_launch(&config, &resolver_for(temp_dir.path())).unwrap();

        assert_eq!(plan.executable, temp_dir.path().join("npx"));
        assert_eq!(
            plan.args,
            vec!["proxy-missing".to_string(), "start".to_string()]
        );
        assert!(plan.runtime.is_none());
        assert!(plan.via_runner);
        assert!(is_installed(&config, &resolver_for(temp_dir.path())));
    }

    #[test]
    fn test_nothing_resolvable() {
        let temp_dir = TempDir::new().unwrap();
        let config = SupervisorConfig::new("proxy-missing").with_fallback_runner("npx-missing");

        let err = plan_launch(&config, &resolver_for(temp_dir.path())).unwrap_err();
        assert!(matches!(err, SupervisorError::NotInstalled { ref program } if program == "proxy-missing"));
        assert!(!is_installed(&config, &resolver_for(temp_dir.path())));
    }

    #[tokio::test]
    async fn test_spawned_child_sees_port() {
        let temp_dir = TempDir::new().unwrap();
        make_script(&temp_dir.path().join("print-port"), "echo \"port=$PORT arg=$1\"");

        let config = SupervisorConfig::new("print-port");
        let plan = plan_launch(&config, &resolver_for(temp_dir.path())).unwrap();
        let child = plan.spawn("print-port", Port::new(9191).unwrap()).unwrap();
        let output = child.wait_with_output().await.unwrap();

        assert!(output.status.success());
        assert_eq!(
            String::from_utf8_lossy(&output.stdout).trim(),
            "port=9191 arg=start"
        );
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let plan = LaunchPlan {
            executable: PathBuf::from("/nonexistent/proxybar-test-binary"),
            args: vec![],
            runtime: None,
            via_runner: false,
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = runtime
            .block_on(async { plan.spawn("missing", Port::default()) })
            .unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn { .. }));
    }
}
