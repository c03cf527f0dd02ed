//! Child environment construction.

use crate::config::{Port, SupervisorDefaults};
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use tracing::warn;

pub const PORT_VAR: &str = "PORT";
pub const PATH_VAR: &str = "PATH";

/// Build the environment for the supervised child.
///
/// Starts from `inherited` unchanged, sets `PORT`, and when `runtime` is known
/// prepends its directory to `PATH` so `#!/usr/bin/env node` scripts find it.
pub fn build_child_env<I>(
    inherited: I,
    runtime: Option<&Path>,
    port: Port,
) -> HashMap<OsString, OsString>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    let mut env: HashMap<OsString, OsString> = inherited.into_iter().collect();
    env.insert(PORT_VAR.into(), port.to_string().into());

    if let Some(runtime_dir) = runtime.and_then(Path::parent) {
        let current = env
            .get(OsStr::new(PATH_VAR))
            .cloned()
            .unwrap_or_else(|| SupervisorDefaults::FALLBACK_PATH.into());

        let mut entries = vec![runtime_dir.to_path_buf()];
        entries.extend(std::env::split_paths(&current));
        match std::env::join_paths(entries) {
            Ok(joined) => {
                env.insert(PATH_VAR.into(), joined);
            }
            Err(e) => warn!(
                "Leaving PATH unchanged, cannot prepend {}: {}",
                runtime_dir.display(),
                e
            ),
        }
    }

    env
}

/// [`build_child_env`] over the current process environment.
pub fn child_env_from_current(runtime: Option<&Path>, port: Port) -> HashMap<OsString, OsString> {
    build_child_env(std::env::vars_os(), runtime, port)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> Vec<(OsString, OsString)> {
        vec![
            ("PATH".into(), "/usr/bin:/bin".into()),
            ("HOME".into(), "/home/tester".into()),
            ("PORT".into(), "1".into()),
        ]
    }

    #[test]
    fn test_sets_port_and_keeps_rest() {
        let env = build_child_env(base_env(), None, Port::new(9090).unwrap());

        assert_eq!(env.get(OsStr::new("PORT")), Some(&OsString::from("9090")));
        assert_eq!(env.get(OsStr::new("HOME")), Some(&OsString::from("/home/tester")));
        assert_eq!(env.get(OsStr::new("PATH")), Some(&OsString::from("/usr/bin:/bin")));
        assert_eq!(env.len(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_prepends_runtime_dir() {
        let runtime = Path::new("/home/tester/.nvm/versions/node/v20.1.0/bin/node");
        let env = build_child_env(base_env(), Some(runtime), Port::new(8080).unwrap());

        assert_eq!(
            env.get(OsStr::new("PATH")),
            Some(&OsString::from(
                "/home/tester/.nvm/versions/node/v20.1.0/bin:/usr/bin:/bin"
            ))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_path_uses_fallback() {
        let inherited = vec![("HOME".into(), "/home/tester".into())];
        let env = build_child_env(
            inherited,
            Some(Path::new("/opt/node/bin/node")),
            Port::new(8080).unwrap(),
        );

        assert_eq!(
            env.get(OsStr::new("PATH")),
            Some(&OsString::from("/opt/node/bin:/usr/bin:/bin"))
        );
    }

    #[test]
    fn test_missing_path_without_runtime_stays_missing() {
        let inherited = vec![("HOME".into(), "/home/tester".into())];
        let env = build_child_env(inherited, None, Port::new(8080).unwrap());
        assert!(env.get(OsStr::new("PATH")).is_none());
    }

    #[test]
    fn test_current_env_is_inherited() {
        let env = child_env_from_current(None, Port::new(4000).unwrap());
        let expected = std::env::vars_os().filter(|(k, _)| k != "PORT").count() + 1;
        assert_eq!(env.len(), expected);
    }
}
