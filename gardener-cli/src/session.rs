//! On-disk bearer token storage for the Gardener CLI.

use crate::CliResult;
use gardener_core::{GardenerError, SessionStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Stored CLI auth session on disk.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    access_token: String,
}

/// Session persisted as JSON so tokens survive between invocations.
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    token: Mutex<Option<String>>,
}

impl FileSession {
    /// Load the session stored at `path`, or start signed out when absent.
    pub fn open(path: PathBuf) -> gardener_core::Result<Self> {
        let token = match std::fs::read(&path) {
            Ok(bytes) => {
                let stored: StoredSession = serde_json::from_slice(&bytes)?;
                Some(stored.access_token).filter(|token| !token.trim().is_empty())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            token: Mutex::new(token),
        })
    }

    /// Location of the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for FileSession {
    fn token(&self) -> Option<String> {
        self.slot().clone()
    }

    fn store(&self, token: &str) -> gardener_core::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(&StoredSession {
            access_token: token.to_string(),
        })?;
        std::fs::write(&self.path, payload)?;
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> gardener_core::Result<()> {
        *self.slot() = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(GardenerError::Io(err)),
        }
    }
}

/// Resolve the local path where the session token is stored.
pub fn auth_store_path(auth_path: Option<PathBuf>) -> CliResult<PathBuf> {
    if let Some(path) = auth_path {
        return Ok(path);
    }
    if let Ok(path) = std::env::var("GARDENER_AUTH_PATH") {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    if let Ok(base) = std::env::var("XDG_CONFIG_HOME") {
        if !base.trim().is_empty() {
            return Ok(PathBuf::from(base).join("gardener").join("auth.json"));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.trim().is_empty() {
            return Ok(PathBuf::from(home).join(".config/gardener/auth.json"));
        }
    }
    Err("unable to resolve auth storage path".into())
}
