//! Project → session registry.
//!
//! Sessions are created lazily on first file association and live
//! until backend shutdown. A dead session is never restarted
//! implicitly; it must be removed and re-added.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::launch::{LaunchError, Launcher};
use crate::session::Session;

/// Maps a project identifier to its running [`Session`].
///
/// All map mutation goes through one async mutex, so concurrent
/// first-use of the same project cannot create duplicate sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `project`, starting one if none exists.
    ///
    /// Idempotent: an existing session is returned as-is, never
    /// restarted. On startup failure nothing is stored, so a later
    /// call can retry.
    pub async fn ensure(
        &self,
        launcher: &Launcher,
        project: &str,
        project_dir: &Path,
        opt_args: &[String],
    ) -> Result<Arc<Session>, LaunchError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(project) {
            return Ok(existing.clone());
        }
        let session = Arc::new(Session::start(launcher, project, project_dir, opt_args)?);
        sessions.insert(project.to_string(), session.clone());
        Ok(session)
    }

    pub async fn get(&self, project: &str) -> Option<Arc<Session>> {
        self.sessions.lock().await.get(project).cloned()
    }

    /// Shut down and discard the session for `project`, if any.
    pub async fn remove(&self, project: &str) {
        let session = self.sessions.lock().await.remove(project);
        if let Some(session) = session {
            session.shutdown().await;
        }
    }

    /// Shut down and discard every session.
    pub async fn remove_all(&self) {
        let sessions = std::mem::take(&mut *self.sessions.lock().await);
        for session in sessions.into_values() {
            session.shutdown().await;
        }
    }

    #[cfg(test)]
    pub(crate) async fn insert_for_test(&self, project: &str, session: Arc<Session>) {
        self.sessions
            .lock()
            .await
            .insert(project.to_string(), session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[tokio::test]
    async fn get_returns_none_for_unknown_project() {
        let registry = SessionRegistry::new();
        assert!(registry.get("unknown").await.is_none());
    }

    #[tokio::test]
    async fn ensure_fails_cleanly_when_tool_is_missing() {
        let registry = SessionRegistry::new();
        // Spawning in a directory that does not exist fails even if a
        // ghc-mod binary happens to be installed.
        let launcher = Launcher::new(&BackendConfig::default());
        let err = registry
            .ensure(&launcher, "proj", Path::new("/nonexistent-project"), &[])
            .await;
        assert!(err.is_err());
        // Startup failure leaves the registry entry absent.
        assert!(registry.get("proj").await.is_none());
    }

    #[tokio::test]
    async fn remove_shuts_down_and_discards() {
        let registry = SessionRegistry::new();
        let session = Arc::new(Session::dead("proj"));
        registry.insert_for_test("proj", session.clone()).await;
        assert!(registry.get("proj").await.is_some());

        registry.remove("proj").await;
        assert!(registry.get("proj").await.is_none());
        assert!(!session.is_alive().await);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.remove("proj").await;
        registry.remove("proj").await;
    }

    #[tokio::test]
    async fn remove_all_drains_every_project() {
        let registry = SessionRegistry::new();
        registry
            .insert_for_test("a", Arc::new(Session::dead("a")))
            .await;
        registry
            .insert_for_test("b", Arc::new(Session::dead("b")))
            .await;

        registry.remove_all().await;
        assert!(registry.get("a").await.is_none());
        assert!(registry.get("b").await.is_none());
    }
}
