//! In-process state store.

use super::{StateStore, validate_session_id};
use crate::models::ConversationState;
use crate::{Error, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Bounded in-memory store.
///
/// Holds at most `capacity` sessions; saving a new session beyond that
/// evicts the least recently used one.
pub struct MemoryStateStore {
    sessions: Mutex<LruCache<String, ConversationState>>,
}

impl MemoryStateStore {
    /// Creates a store holding up to `capacity` sessions (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of sessions currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().map_or(0, |s| s.len())
    }

    /// Whether no sessions are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, ConversationState>>> {
        self.sessions.lock().map_err(|e| Error::OperationFailed {
            operation: "lock_state_store".to_string(),
            cause: e.to_string(),
        })
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, session_id: &str) -> Result<Option<ConversationState>> {
        validate_session_id(session_id)?;
        Ok(self.lock()?.get(session_id).cloned())
    }

    fn save(&self, session_id: &str, state: &ConversationState) -> Result<()> {
        validate_session_id(session_id)?;
        if let Some((evicted, _)) = self.lock()?.push(session_id.to_string(), state.clone()) {
            if evicted != session_id {
                tracing::debug!(session_id = %evicted, "Evicted least recently used session");
                metrics::counter!("state_store_evictions_total").increment(1);
            }
        }
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        validate_session_id(session_id)?;
        Ok(self.lock()?.pop(session_id).is_some())
    }
}
