use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Mutex,
};
use thiserror::Error;
use tracing::warn;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "currentUser";
pub const ROLE_KEY: &str = "userRole";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Anything other than `admin` is treated as a regular user.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not signed in")]
    NotSignedIn,

    #[error("failed to access session file '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to serialize session: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable key-value storage for the session, keyed by fixed names.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

/// A JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, SessionError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(SessionError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        match serde_json::from_str(&data) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring unreadable session file");
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), SessionError> {
        let io_err = |source| SessionError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, data).map_err(io_err)
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.entries().remove(key);
        Ok(())
    }
}

pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
}

impl SessionStore {
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::default())
    }

    pub fn login(&self, username: &str, token: &str, role: Role) -> Result<Session, SessionError> {
        self.storage.set(TOKEN_KEY, token)?;
        self.storage.set(USER_KEY, username)?;
        self.storage.set(ROLE_KEY, role.as_str())?;
        Ok(Session {
            token: token.to_string(),
            username: username.to_string(),
            role,
        })
    }

    /// `None` unless both the token and the username are present.
    pub fn current_session(&self) -> Result<Option<Session>, SessionError> {
        let token = self.storage.get(TOKEN_KEY)?.filter(|t| !t.is_empty());
        let username = self.storage.get(USER_KEY)?.filter(|u| !u.is_empty());
        let (Some(token), Some(username)) = (token, username) else {
            return Ok(None);
        };
        let role = self
            .storage
            .get(ROLE_KEY)?
            .map(|raw| Role::parse_lenient(&raw))
            .unwrap_or_default();
        Ok(Some(Session {
            token,
            username,
            role,
        }))
    }

    pub fn require_session(&self) -> Result<Session, SessionError> {
        self.current_session()?.ok_or(SessionError::NotSignedIn)
    }

    pub fn clear(&self) -> Result<(), SessionError> {
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        self.storage.remove(ROLE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_then_current_session_returns_the_pair() {
        let store = SessionStore::in_memory();
        store.login("alice", "tok-1", Role::User).unwrap();

        let session = store.current_session().unwrap().unwrap();
        assert_eq!(session.username, "alice");
        assert_eq!(session.token, "tok-1");
        assert_eq!(session.role, Role::User);
    }

    #[test]
    fn clear_makes_session_absent() {
        let store = SessionStore::in_memory();
        store.login("alice", "tok-1", Role::Admin).unwrap();
        store.clear().unwrap();

        assert!(store.current_session().unwrap().is_none());
        assert!(matches!(
            store.require_session(),
            Err(SessionError::NotSignedIn)
        ));
    }

    #[test]
    fn token_without_username_is_absent() {
        let storage = MemoryStorage::default();
        storage.set(TOKEN_KEY, "tok-1").unwrap();
        let store = SessionStore::new(storage);

        assert!(store.current_session().unwrap().is_none());
    }

    #[test]
    fn file_storage_survives_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");

        SessionStore::new(FileStorage::new(&path))
            .login("alice", "tok-1", Role::Admin)
            .unwrap();

        let reopened = SessionStore::new(FileStorage::new(&path));
        let session = reopened.current_session().unwrap().unwrap();
        assert_eq!(session.role, Role::Admin);

        reopened.clear().unwrap();
        assert!(SessionStore::new(FileStorage::new(&path))
            .current_session()
            .unwrap()
            .is_none());
    }

    #[test]
    fn corrupt_session_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let store = SessionStore::new(FileStorage::new(&path));
        assert!(store.current_session().unwrap().is_none());
    }
}
