use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::SessionError;
use crate::domain::EmailConfig;

/// Everything the client keeps between runs.
#[derive(Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Raw identity JSON as returned at login. Parsed on restore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_config: Option<EmailConfig>,
}

impl PersistedState {
    pub fn auth_token(&self) -> Option<SecretString> {
        self.auth_token.clone().map(SecretString::from)
    }
}

impl std::fmt::Debug for PersistedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedState")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("user_info", &self.user_info)
            .field("email_config", &self.email_config)
            .finish()
    }
}

/// JSON file backing the persisted session. A missing file reads as an
/// empty state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<PersistedState, SessionError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PersistedState::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_slice(&raw).map_err(SessionError::Corrupt)
    }

    pub async fn save(&self, state: &PersistedState) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let raw = serde_json::to_vec_pretty(state).map_err(SessionError::Encode)?;
        // Write next to the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }

    pub async fn update<F>(&self, f: F) -> Result<PersistedState, SessionError>
    where
        F: FnOnce(&mut PersistedState),
    {
        let mut state = self.load().await?;
        f(&mut state);
        self.save(&state).await?;
        Ok(state)
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}
