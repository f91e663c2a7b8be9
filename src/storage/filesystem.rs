//! Filesystem state store.
//!
//! Stores each session as `<data_dir>/<session_id>.json`.
//!
//! # Security
//!
//! - **Path traversal**: session ids are restricted to `[A-Za-z0-9_-]`
//! - **File size limits**: files above [`MAX_FILE_SIZE`] are refused on load

use super::{StateStore, validate_session_id};
use crate::models::ConversationState;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum size of a session file (1 MiB).
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// One JSON file per session.
pub struct FilesystemStateStore {
    base_path: PathBuf,
}

impl FilesystemStateStore {
    /// Creates a store rooted at `base_path`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_create(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| Error::OperationFailed {
            operation: "create_state_dir".to_string(),
            cause: format!("{}: {e}", base_path.display()),
        })?;
        Ok(Self { base_path })
    }

    /// Returns the base path.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        let path = self.base_path.join(format!("{session_id}.json"));
        if !path.starts_with(&self.base_path) {
            return Err(Error::InvalidInput(format!(
                "path traversal attempt for session id: {session_id}"
            )));
        }
        Ok(path)
    }
}

impl StateStore for FilesystemStateStore {
    fn load(&self, session_id: &str) -> Result<Option<ConversationState>> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Ok(None);
        }

        let metadata = fs::metadata(&path).map_err(|e| Error::OperationFailed {
            operation: "read_state_metadata".to_string(),
            cause: e.to_string(),
        })?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(Error::InvalidInput(format!(
                "state file exceeds maximum size of {MAX_FILE_SIZE} bytes: {}",
                path.display()
            )));
        }

        let json = fs::read_to_string(&path).map_err(|e| Error::OperationFailed {
            operation: "read_state_file".to_string(),
            cause: e.to_string(),
        })?;
        let state = serde_json::from_str(&json).map_err(|e| Error::OperationFailed {
            operation: "deserialize_state".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Some(state))
    }

    fn save(&self, session_id: &str, state: &ConversationState) -> Result<()> {
        let path = self.session_path(session_id)?;
        let json = serde_json::to_string_pretty(state).map_err(|e| Error::OperationFailed {
            operation: "serialize_state".to_string(),
            cause: e.to_string(),
        })?;

        // Write then rename so readers never see a partial file.
        let tmp = path.with_extension("json.tmp");
        let written = fs::write(&tmp, json)
            .map_err(|e| ("write_state_file", e))
            .and_then(|()| fs::rename(&tmp, &path).map_err(|e| ("rename_state_file", e)));
        written.map_err(|(operation, e)| {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temp state file");
                }
            }
            Error::OperationFailed {
                operation: operation.to_string(),
                cause: e.to_string(),
            }
        })
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        let path = self.session_path(session_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::OperationFailed {
                operation: "delete_state_file".to_string(),
                cause: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityMention, Speaker};
    use tempfile::TempDir;

    fn store() -> (TempDir, FilesystemStateStore) {
        let dir = TempDir::new().unwrap();
        let store = FilesystemStateStore::with_create(dir.path().join("states")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_round_trip_preserves_state() {
        let (_dir, store) = store();
        let mut state = ConversationState::for_user("u-1");
        state.message_count = 6;
        state.entities.medications.push(EntityMention {
            name: "metformin".to_string(),
            mentioned_turn: 3,
            mentioned_by: Speaker::Assistant,
            salience: 0.8,
        });

        store.save("s1", &state).unwrap();
        let loaded = store.load("s1").unwrap().unwrap();

        assert_eq!(loaded, state);
    }

    #[test]
    fn test_file_uses_camel_case() {
        let (_dir, store) = store();
        store.save("s1", &ConversationState::for_user("u-1")).unwrap();

        let raw = fs::read_to_string(store.base_path().join("s1.json")).unwrap();
        assert!(raw.contains("\"messageCount\""));
        assert!(raw.contains("\"aiOutputs\""));
        assert!(!store.base_path().join("s1.json.tmp").exists());
    }

    #[test]
    fn test_missing_session_is_none() {
        let (_dir, store) = store();
        assert!(store.load("nobody").unwrap().is_none());
        assert!(!store.delete("nobody").unwrap());
    }

    #[test]
    fn test_delete_removes_file() {
        let (_dir, store) = store();
        store.save("s1", &ConversationState::default()).unwrap();
        assert!(store.delete("s1").unwrap());
        assert!(store.load("s1").unwrap().is_none());
    }

    #[test]
    fn test_traversal_is_rejected() {
        let (_dir, store) = store();
        assert!(matches!(
            store.save("../escape", &ConversationState::default()),
            Err(Error::InvalidInput(_))
        ));
        assert!(store.load("..").is_err());
    }

    #[test]
    fn test_oversized_file_is_refused() {
        let (_dir, store) = store();
        let big = "x".repeat(usize::try_from(MAX_FILE_SIZE).unwrap() + 1);
        fs::write(store.base_path().join("big.json"), big).unwrap();

        assert!(matches!(store.load("big"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (_dir, store) = store();
        fs::write(store.base_path().join("bad.json"), "{not json").unwrap();

        assert!(matches!(store.load("bad"), Err(Error::OperationFailed { .. })));
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let (_dir, store) = store();
        // A non-empty directory at the target path makes the rename fail.
        let target = store.base_path().join("s1.json");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "x").unwrap();

        let err = store.save("s1", &ConversationState::default()).unwrap_err();

        assert!(err.to_string().contains("rename_state_file"));
        assert!(!store.base_path().join("s1.json.tmp").exists());
    }
}
