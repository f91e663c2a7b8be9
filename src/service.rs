//! Per-turn orchestration.
//!
//! [`ConversationContextService`] ties detection, resolution, extraction,
//! and a [`StateStore`] together for a chat backend:
//!
//! 1. Before generating a reply, [`prepare_turn`] resolves the utterance
//!    against the stored state and returns the guidance block.
//! 2. After the reply is delivered, [`spawn_state_update`] folds the new
//!    messages into the state in the background.
//!
//! Updates of the same session are serialized; different sessions proceed
//! concurrently.
//!
//! [`prepare_turn`]: ConversationContextService::prepare_turn
//! [`spawn_state_update`]: ConversationContextService::spawn_state_update

use crate::detection::{detect_references, get_primary_reference, get_required_layers};
use crate::extraction::{ExtractionOutcome, StateExtractor};
use crate::models::{
    ChatMessage, ConversationState, DetectedReference, ResolvedReference, StateLayer,
};
use crate::resolution::{build_context_guidance, resolve_references};
use crate::storage::StateStore;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Everything the generator needs about references in one utterance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnContext {
    /// All detections, in detector order.
    pub references: Vec<DetectedReference>,
    /// Highest-confidence detection, or the none sentinel.
    pub primary: DetectedReference,
    /// Union of state sections the detections need.
    pub required_layers: BTreeSet<StateLayer>,
    /// Resolutions against the stored state.
    pub resolved: Vec<ResolvedReference>,
    /// Guidance block for the generator prompt, empty when nothing resolved.
    pub guidance: String,
}

impl TurnContext {
    /// Runs detection and resolution of `message` against `state`.
    #[must_use]
    pub fn build(message: &str, state: &ConversationState) -> Self {
        let references = detect_references(message);
        let primary = get_primary_reference(&references);
        let required_layers = get_required_layers(&references);
        let resolved = resolve_references(message, &references, state);
        let guidance = build_context_guidance(&resolved);
        Self {
            references,
            primary,
            required_layers,
            resolved,
            guidance,
        }
    }

    /// Returns whether the utterance contained no references.
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.primary.is_none()
    }
}

type SessionLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Session-aware front end of the engine.
#[derive(Clone)]
pub struct ConversationContextService {
    store: Arc<dyn StateStore>,
    extractor: Arc<StateExtractor>,
    session_locks: Arc<SessionLocks>,
}

impl ConversationContextService {
    /// Creates a service over `store` using `extractor` for updates.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, extractor: Arc<StateExtractor>) -> Self {
        Self {
            store,
            extractor,
            session_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Loads the stored state, or an empty one when absent or unreadable.
    #[must_use]
    pub fn current_state(&self, session_id: &str) -> ConversationState {
        match self.store.load(session_id) {
            Ok(Some(state)) => state,
            Ok(None) => ConversationState::default(),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Failed to load state, using empty state");
                ConversationState::default()
            },
        }
    }

    /// Detects and resolves references in `message` for `session_id`.
    ///
    /// Never fails. A missing or unreadable state resolves against an
    /// empty state.
    #[must_use]
    pub fn prepare_turn(&self, session_id: &str, message: &str) -> TurnContext {
        let state = self.current_state(session_id);
        let context = TurnContext::build(message, &state);
        tracing::debug!(
            session_id,
            primary = %context.primary.reference_type,
            resolved = context.resolved.len(),
            "Prepared turn context"
        );
        context
    }

    /// Extracts state from `history` and stores the result.
    ///
    /// A store failure on save is logged; the outcome is still returned.
    pub async fn update_state(&self, session_id: &str, history: &[ChatMessage]) -> ExtractionOutcome {
        let lock = self.session_lock(session_id);
        let outcome = {
            let _guard = lock.lock().await;
            let previous = self.current_state(session_id);
            let outcome = self.extractor.extract(history, Some(&previous)).await;
            if outcome.success && outcome.state != previous {
                if let Err(e) = self.store.save(session_id, &outcome.state) {
                    tracing::warn!(session_id, error = %e, "Failed to save extracted state");
                    metrics::counter!("state_store_save_failures_total").increment(1);
                }
            }
            outcome
        };
        drop(lock);
        self.release_session_lock(session_id);
        outcome
    }

    /// Runs [`Self::update_state`] in the background.
    ///
    /// Must be called within a tokio runtime. The task logs its own
    /// failures and is never retried.
    #[must_use = "the handle can be awaited or dropped to detach"]
    pub fn spawn_state_update(&self, session_id: &str, history: Vec<ChatMessage>) -> JoinHandle<()> {
        let service = self.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            let outcome = service.update_state(&session_id, &history).await;
            if !outcome.success {
                tracing::warn!(session_id = %session_id, "Background state update was rejected");
            }
        })
    }

    /// Removes the stored state of a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn reset_session(&self, session_id: &str) -> crate::Result<bool> {
        self.store.delete(session_id)
    }

    fn session_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.session_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(session_id.to_string()).or_default())
    }

    /// Drops the session's lock entry once no update holds or awaits it.
    fn release_session_lock(&self, session_id: &str) {
        let mut locks = match self.session_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        if locks
            .get(session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(session_id);
        }
    }
}
