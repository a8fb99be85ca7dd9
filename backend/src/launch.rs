//! Executable resolution and subprocess launching.
//!
//! Tools are resolved against an augmented search path: the process
//! `PATH` with configured extra directories (and optionally the
//! standard Haskell install locations) prepended. The computed path is
//! an owned, immutable snapshot swapped atomically on configuration
//! change, so callers never observe a half-updated path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, RwLock};

use tokio::process::{Child, Command};

use crate::config::BackendConfig;

/// Failure to start a subprocess.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("'{command}' was not found on the configured search path")]
    NotFound { command: String },
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Spawns tools with piped stdio, resolving them against the
/// augmented search path.
pub struct Launcher {
    search_path: RwLock<Arc<OsString>>,
}

impl Launcher {
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            search_path: RwLock::new(Arc::new(augmented_path(config))),
        }
    }

    /// Recompute the search-path snapshot after a configuration change.
    pub fn reconfigure(&self, config: &BackendConfig) {
        let snapshot = Arc::new(augmented_path(config));
        match self.search_path.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    /// Current search-path snapshot (the `PATH` value used for spawns).
    #[must_use]
    pub fn search_path(&self) -> Arc<OsString> {
        match self.search_path.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Resolve `command` and spawn it in `cwd` with stdin, stdout and
    /// stderr piped. The child is killed if its handle is dropped
    /// while still running.
    pub fn spawn(
        &self,
        command: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<Child, LaunchError> {
        let path = self.search_path();
        let resolved = which::which_in(command, Some(path.as_os_str()), cwd).map_err(|_| {
            LaunchError::NotFound {
                command: command.to_string(),
            }
        })?;

        tracing::debug!(command = %resolved.display(), cwd = %cwd.display(), "spawning tool");

        Command::new(&resolved)
            .args(args)
            .current_dir(cwd)
            .env("PATH", path.as_os_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                command: command.to_string(),
                source,
            })
    }
}

/// Compute the augmented `PATH` value: configured extra directories,
/// then the standard install locations when enabled, then the process
/// `PATH`. Directories that do not exist are dropped.
fn augmented_path(config: &BackendConfig) -> OsString {
    let mut dirs: Vec<PathBuf> = config
        .add_to_path
        .iter()
        .filter(|dir| dir.is_dir())
        .cloned()
        .collect();

    if config.add_standard_dirs
        && let Some(home) = dirs::home_dir()
    {
        for standard in [home.join(".local/bin"), home.join(".cabal/bin")] {
            if standard.is_dir() {
                dirs.push(standard);
            }
        }
    }

    let env_path = std::env::var_os("PATH").unwrap_or_default();
    dirs.extend(std::env::split_paths(&env_path));

    // join_paths only fails on entries containing the separator; fall
    // back to the unmodified environment PATH in that case.
    std::env::join_paths(dirs).unwrap_or(env_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_is_not_found() {
        let launcher = Launcher::new(&BackendConfig::default());
        let err = launcher
            .spawn("hsmod-no-such-tool", &[], Path::new("."))
            .unwrap_err();
        assert!(matches!(err, LaunchError::NotFound { .. }));
    }

    #[test]
    fn augmented_path_keeps_env_path() {
        let path = augmented_path(&BackendConfig::default());
        assert_eq!(path, std::env::var_os("PATH").unwrap_or_default());
    }

    #[test]
    fn augmented_path_prepends_existing_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BackendConfig {
            add_to_path: vec![tmp.path().to_path_buf(), PathBuf::from("/no/such/dir")],
            ..BackendConfig::default()
        };
        let path = augmented_path(&config);
        let first = std::env::split_paths(&path).next().unwrap();
        assert_eq!(first, tmp.path());
        let entries: Vec<PathBuf> = std::env::split_paths(&path).collect();
        assert!(!entries.contains(&PathBuf::from("/no/such/dir")));
    }

    #[test]
    fn reconfigure_swaps_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let launcher = Launcher::new(&BackendConfig::default());
        let before = launcher.search_path();

        launcher.reconfigure(&BackendConfig {
            add_to_path: vec![tmp.path().to_path_buf()],
            ..BackendConfig::default()
        });
        let after = launcher.search_path();

        assert_ne!(before, after);
        let first = std::env::split_paths(after.as_os_str()).next().unwrap();
        assert_eq!(first, tmp.path());
    }
}
