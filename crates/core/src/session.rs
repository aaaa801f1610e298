//! Credential store: an injected session lifecycle (init, read, teardown) instead of ambient
//! browser-style storage.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::user::User;
use crate::errors::ErrorKind;

/// A signed-in session. `user` is absent when the token was supplied out of band (config or
/// environment) and the profile has not been fetched yet.
#[derive(Clone, Debug)]
pub struct Session {
    pub token: SecretString,
    pub user: Option<User>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self { token: SecretString::from(token.into()), user: Some(user) }
    }

    pub fn from_token(token: SecretString) -> Self {
        Self { token, user: None }
    }

    pub fn bearer(&self) -> &str {
        self.token.expose_secret()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not access session file `{path}`: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("could not encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Transport
    }
}

pub trait CredentialStore: Send + Sync {
    /// Replaces any stored session.
    fn init(&self, session: Session) -> Result<(), SessionError>;

    fn read(&self) -> Result<Option<Session>, SessionError>;

    /// Removes the session. Idempotent.
    fn teardown(&self) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    session: RwLock<Option<Session>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self { session: RwLock::new(Some(session)) }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn init(&self, session: Session) -> Result<(), SessionError> {
        let mut slot = match self.session.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(session);
        Ok(())
    }

    fn read(&self) -> Result<Option<Session>, SessionError> {
        let slot = match self.session.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(slot.clone())
    }

    fn teardown(&self) -> Result<(), SessionError> {
        let mut slot = match self.session.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = None;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<User>,
}

/// JSON file store used by the CLI between invocations. A malformed file reads as signed out.
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> SessionError {
        SessionError::Io { path: self.path.clone(), source }
    }
}

impl CredentialStore for FileCredentialStore {
    fn init(&self, session: Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let stored = StoredSession { token: session.bearer().to_string(), user: session.user };
        let encoded = serde_json::to_vec_pretty(&stored)?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|source| self.io_error(source))?;
        file.write_all(&encoded).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    fn read(&self) -> Result<Option<Session>, SessionError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(self.io_error(error)),
        };

        Ok(serde_json::from_slice::<StoredSession>(&raw)
            .ok()
            .filter(|stored| !stored.token.trim().is_empty())
            .map(|stored| Session { token: SecretString::from(stored.token), user: stored.user }))
    }

    fn teardown(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(self.io_error(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use secrecy::SecretString;
    use tempfile::TempDir;

    use super::{CredentialStore, FileCredentialStore, InMemoryCredentialStore, Session};
    use crate::domain::user::{Role, User, UserId};

    fn employee() -> User {
        User {
            id: UserId(7),
            email: "emp@corp.test".to_string(),
            role: Role::Employee,
            manager_id: Some(UserId(2)),
            active: true,
        }
    }

    #[test]
    fn memory_store_lifecycle() {
        let store = InMemoryCredentialStore::new();
        assert!(store.read().expect("read").is_none());

        store.init(Session::new("tok-1", employee())).expect("init");
        let session = store.read().expect("read").expect("session present");
        assert_eq!(session.bearer(), "tok-1");
        assert_eq!(session.user.map(|user| user.id), Some(UserId(7)));

        store.teardown().expect("teardown");
        store.teardown().expect("teardown is idempotent");
        assert!(store.read().expect("read").is_none());
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let session = Session::from_token(SecretString::from("tok-very-secret".to_string()));
        assert!(!format!("{session:?}").contains("tok-very-secret"));
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nested").join("session.json");

        FileCredentialStore::new(&path).init(Session::new("tok-2", employee())).expect("init");

        let reopened = FileCredentialStore::new(&path);
        let session = reopened.read().expect("read").expect("session present");
        assert_eq!(session.bearer(), "tok-2");
        assert_eq!(session.user, Some(employee()));

        reopened.teardown().expect("teardown");
        assert!(!path.exists());
        assert!(reopened.read().expect("read").is_none());
    }

    #[test]
    fn malformed_file_reads_as_signed_out() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").expect("write");

        assert!(FileCredentialStore::new(&path).read().expect("read").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("session.json");
        FileCredentialStore::new(&path).init(Session::new("tok-3", employee())).expect("init");

        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
