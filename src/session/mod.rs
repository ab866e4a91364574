mod guard;
mod store;

pub use guard::{SessionGuard, SessionStatus};
pub use store::{PersistedState, SessionStore};

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("not signed in")]
    NotAuthenticated,
    #[error("couldn't access session file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("session file is not valid JSON: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("couldn't encode the session state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("identity returned at login is invalid: {0}")]
    InvalidIdentity(#[source] serde_json::Error),
}
