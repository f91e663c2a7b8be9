//! # refcontext
//!
//! Conversational reference resolution for a multi-turn health assistant.
//!
//! refcontext keeps a structured model of what has been discussed in a
//! conversation (entities with decaying salience, discourse state, and the
//! assistant's own earlier outputs), detects references in a new user
//! utterance ("ya akşam?", "onu", "ilki", "neden?"), and resolves them into
//! plain-language guidance for the downstream text generator.
//!
//! ## Pipeline
//!
//! ```text
//! utterance ──► detection ──► resolution ──► guidance block ──► generator
//!                                 ▲
//!                                 │ ConversationState (read)
//!                                 │
//! (utterance, response) ──► extraction ──► next ConversationState (write)
//! ```
//!
//! - [`detection`]: stateless regex battery, one or more typed matches per utterance
//! - [`resolution`]: per-category antecedent lookup against the current state
//! - [`extraction`]: incremental LLM-based state update with a regex fallback
//! - [`state`]: decay-weighted entity merge and bounded history merge
//! - [`service`]: per-session orchestration over a [`storage::StateStore`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use refcontext::{ConversationState, build_context_guidance, detect_references, resolve_references};
//!
//! let state = ConversationState::default();
//! let message = "Peki onu ne zaman almalıyım?";
//! let references = detect_references(message);
//! let resolved = resolve_references(message, &references, &state);
//! let guidance = build_context_guidance(&resolved);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod detection;
pub mod extraction;
pub mod llm;
pub mod models;
pub mod observability;
pub mod resolution;
pub mod service;
pub mod state;
pub mod storage;

pub use config::{EngineConfig, ExtractionConfig, HistoryLimits, SalienceConfig};
pub use detection::{detect_references, get_primary_reference, get_required_layers};
pub use extraction::{ExtractionOutcome, StateExtractor};
pub use llm::LlmProvider;
pub use models::{
    ChatMessage, ConversationState, DetectedReference, ReferenceType, ResolvedReference, Speaker,
    StateLayer,
};
pub use resolution::{build_context_guidance, resolve_references};
pub use service::{ConversationContextService, TurnContext};
pub use storage::{FilesystemStateStore, MemoryStateStore, StateStore};

/// Error type for refcontext operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed message history, invalid session ids, bad config values |
/// | `OperationFailed` | LLM HTTP failures, storage I/O, JSON encoding errors |
/// | `Timeout` | The generator did not answer within the extraction deadline |
/// | `NotFound` | A referenced config or state file does not exist |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - Message turn numbers decrease within a history
    /// - A session id contains path separators or other disallowed characters
    /// - A config value cannot be parsed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - The LLM provider returns an error status or an unreadable body
    /// - State files cannot be read or written
    /// - Logging cannot be initialized
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation exceeded its deadline.
    #[error("operation '{operation}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The deadline that was exceeded.
        timeout_ms: u64,
    },

    /// A requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type alias for refcontext operations.
pub type Result<T> = std::result::Result<T, Error>;
