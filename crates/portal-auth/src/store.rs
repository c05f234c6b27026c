//! Credential storage for the portal session
//!
//! One process holds at most one signed-in session: an access token used
//! on every API request and a refresh token used to obtain a new access
//! token when the current one is rejected. The store is the single source
//! of truth for both; the gateway reads tokens at request time and writes
//! them back after a refresh.
//!
//! Two implementations are provided: `MemoryStore` for ephemeral sessions
//! and tests, and `FileStore`, which persists the session as a JSON file.
//! All file writes use atomic temp-file + rename to prevent corruption on
//! crash. A tokio Mutex serializes concurrent writers.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The current session's tokens.
///
/// Both tokens are opaque to this crate: it stores and returns them but
/// never interprets their contents. Either side may be absent: a session
/// seeded from a refresh token starts with no access token, and a
/// signed-out session has neither.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

/// Backing storage for the session credential.
///
/// Implementations must hold at most one current credential; `set_access`
/// and `set_refresh` replace, never accumulate. The gateway is the only
/// writer on the refresh path, so implementations need to serialize
/// concurrent writes but not merge them.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn CredentialStore>`).
pub trait CredentialStore: Send + Sync {
    /// Current access token, if any.
    fn access(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>>;

    /// Current refresh token, if any.
    fn refresh(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>>;

    /// Replace the access token. Idempotent.
    fn set_access(&self, token: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Replace the refresh token. Idempotent.
    fn set_refresh(&self, token: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Remove both tokens, leaving the session signed out.
    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// In-memory credential store.
///
/// Holds the session for the lifetime of the process. Used for tests and
/// for deployments that re-seed the session from the environment on start.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoredCredential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known credential.
    pub fn with_credential(credential: StoredCredential) -> Self {
        Self {
            state: Mutex::new(credential),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn access(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.access.clone() })
    }

    fn refresh(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.refresh.clone() })
    }

    fn set_access(&self, token: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().await.access = Some(token);
            Ok(())
        })
    }

    fn set_refresh(&self, token: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().await.refresh = Some(token);
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            *self.state.lock().await = StoredCredential::default();
            Ok(())
        })
    }
}

/// File-backed credential store.
///
/// The file is the single source of truth for the session: every write
/// updates the in-memory state and persists it before returning. Reads
/// take the lock briefly to clone the in-memory state, so request-time
/// reads don't block on a concurrent persist.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoredCredential>,
}

impl FileStore {
    /// Load the session from the given file path.
    ///
    /// If the file doesn't exist, creates it holding an empty credential,
    /// so a cold start leaves a signed-out session rather than an error.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let credential: StoredCredential = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            info!(
                path = %path.display(),
                signed_in = credential.access.is_some() || credential.refresh.is_some(),
                "loaded credential file"
            );
            credential
        } else {
            info!(path = %path.display(), "credential file not found, starting signed out");
            let credential = StoredCredential::default();
            write_atomic(&path, &credential).await?;
            credential
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }
}

impl CredentialStore for FileStore {
    fn access(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.access.clone() })
    }

    fn refresh(&self) -> Pin<Box<dyn Future<Output = Option<String>> + Send + '_>> {
        Box::pin(async move { self.state.lock().await.refresh.clone() })
    }

    fn set_access(&self, token: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.access = Some(token);
            debug!("updated access token");
            write_atomic(&self.path, &state).await
        })
    }

    fn set_refresh(&self, token: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.refresh = Some(token);
            debug!("updated refresh token");
            write_atomic(&self.path, &state).await
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            *state = StoredCredential::default();
            debug!("cleared credential");
            write_atomic(&self.path, &state).await
        })
    }
}

/// Write the credential to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains session tokens.
async fn write_atomic(path: &Path, credential: &StoredCredential) -> Result<()> {
    let json = serde_json::to_string_pretty(credential)
        .map_err(|e| Error::CredentialParse(format!("serializing credential: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credential.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}
