//! Session state persistence.
//!
//! A [`StateStore`] holds one [`ConversationState`] per session id. The
//! service loads the state before resolving a turn and saves the snapshot
//! produced by extraction afterwards.
//!
//! | Backend | Durability | Bound |
//! |---------|------------|-------|
//! | [`MemoryStateStore`] | process lifetime | least recently used sessions evicted |
//! | [`FilesystemStateStore`] | one JSON file per session | 1 MiB per file |

mod filesystem;
mod memory;

pub use filesystem::FilesystemStateStore;
pub use memory::MemoryStateStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::models::ConversationState;
use crate::{Error, Result};
use std::sync::Arc;

/// Storage for per-session conversation state.
pub trait StateStore: Send + Sync {
    /// Loads the state of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session id is invalid or the stored state
    /// cannot be read.
    fn load(&self, session_id: &str) -> Result<Option<ConversationState>>;

    /// Replaces the state of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session id is invalid or the state cannot be
    /// written.
    fn save(&self, session_id: &str, state: &ConversationState) -> Result<()>;

    /// Removes a session. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the session id is invalid or removal fails.
    fn delete(&self, session_id: &str) -> Result<bool>;
}

/// Builds the store selected by `config`.
///
/// # Errors
///
/// Returns an error if the filesystem data directory cannot be created.
pub fn build_state_store(config: &StorageConfig) -> Result<Arc<dyn StateStore>> {
    let store: Arc<dyn StateStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStateStore::new(config.max_sessions)),
        StorageBackend::Filesystem => {
            Arc::new(FilesystemStateStore::with_create(&config.data_dir)?)
        },
    };
    tracing::debug!(backend = ?config.backend, "State store built");
    Ok(store)
}

/// Checks that a session id is usable as a key and a file name.
///
/// Only alphanumerics, dashes and underscores are allowed.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for empty, overlong, or unsafe ids.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 128
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "session id contains invalid characters: {session_id:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("session-1" ; "dashed")]
    #[test_case("u_42_2024" ; "underscored")]
    #[test_case("ABCdef123" ; "alphanumeric")]
    fn test_valid_session_ids(id: &str) {
        assert!(validate_session_id(id).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("../etc/passwd" ; "traversal")]
    #[test_case("a/b" ; "separator")]
    #[test_case("a\\b" ; "backslash")]
    #[test_case("oturum-ğ" ; "non ascii")]
    fn test_invalid_session_ids(id: &str) {
        assert!(matches!(validate_session_id(id), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_overlong_session_id() {
        assert!(validate_session_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_build_memory_store() {
        let store = build_state_store(&StorageConfig::default()).unwrap();
        assert!(store.load("missing").unwrap().is_none());
    }
}
