use secrecy::SecretString;
use tokio::sync::watch;

use super::{SessionError, SessionStore};
use crate::domain::{EmailConfig, UserInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Authenticated(UserInfo),
    Unauthenticated,
}

/// Owns the persisted credential and tells the UI layer when it goes away.
///
/// The bearer token is read back from the store on every call, so a token
/// rewritten by another process is picked up immediately.
pub struct SessionGuard {
    store: SessionStore,
    status: watch::Sender<SessionStatus>,
}

impl SessionGuard {
    /// Start a session from whatever is persisted.
    ///
    /// Authenticated only when both a token and a parseable identity exist;
    /// an identity that fails to parse is handled like a rejected credential.
    #[tracing::instrument(name = "Restoring persisted session", skip(store), fields(path = %store.path().display()))]
    pub async fn restore(store: SessionStore) -> Result<Self, SessionError> {
        let (status, _) = watch::channel(SessionStatus::Unauthenticated);
        let guard = Self { store, status };

        let state = match guard.store.load().await {
            Ok(state) => state,
            Err(SessionError::Corrupt(e)) => {
                tracing::warn!(error = %e, "Persisted session is unreadable, starting over");
                guard.store.save(&Default::default()).await?;
                return Ok(guard);
            }
            Err(e) => return Err(e),
        };

        match (state.auth_token.as_ref(), state.user_info.as_deref()) {
            (Some(_), Some(raw_user)) => match serde_json::from_str::<UserInfo>(raw_user) {
                Ok(user) => {
                    tracing::info!(username = %user.username, "Session restored");
                    guard
                        .status
                        .send_replace(SessionStatus::Authenticated(user));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Persisted identity is invalid");
                    guard.on_unauthorized().await?;
                }
            },
            _ => tracing::info!("No persisted session"),
        }
        Ok(guard)
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.status.borrow(), SessionStatus::Authenticated(_))
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub async fn bearer(&self) -> Result<SecretString, SessionError> {
        self.store
            .load()
            .await?
            .auth_token()
            .ok_or(SessionError::NotAuthenticated)
    }

    #[tracing::instrument(name = "Storing new session", skip(self, token, user))]
    pub async fn sign_in(
        &self,
        token: SecretString,
        user: serde_json::Value,
    ) -> Result<UserInfo, SessionError> {
        use secrecy::ExposeSecret;

        let parsed: UserInfo =
            serde_json::from_value(user.clone()).map_err(SessionError::InvalidIdentity)?;
        self.store
            .update(|state| {
                state.auth_token = Some(token.expose_secret().to_owned());
                state.user_info = Some(user.to_string());
            })
            .await?;
        self.status
            .send_replace(SessionStatus::Authenticated(parsed.clone()));
        Ok(parsed)
    }

    /// Drop the credential and identity after the backend rejected them.
    /// The email template is kept.
    #[tracing::instrument(name = "Invalidating session", skip(self))]
    pub async fn on_unauthorized(&self) -> Result<(), SessionError> {
        let cleared = self
            .store
            .update(|state| {
                state.auth_token = None;
                state.user_info = None;
            })
            .await;
        // Subscribers learn about the logout even if the store could not be written.
        self.status.send_replace(SessionStatus::Unauthenticated);
        cleared.map(|_| ())
    }

    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.on_unauthorized().await
    }

    pub async fn email_config(&self) -> Result<Option<EmailConfig>, SessionError> {
        Ok(self.store.load().await?.email_config)
    }

    pub async fn save_email_config(&self, config: &EmailConfig) -> Result<(), SessionError> {
        self.store
            .update(|state| state.email_config = Some(config.clone()))
            .await
            .map(|_| ())
    }
}
