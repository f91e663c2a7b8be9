//! Incremental conversation state extraction.
//!
//! The extractor folds the messages beyond the previous state's cursor into
//! a new [`ConversationState`]. It asks the configured [`LlmProvider`] for a
//! structured update first and falls back to pattern extraction when the
//! provider is missing, errors, times out, or answers with something that
//! does not parse.
//!
//! # Paths
//!
//! | Path | When | `success` | `used_fallback` |
//! |------|------|-----------|-----------------|
//! | noop | no messages beyond the cursor | true | false |
//! | llm | provider answered with a valid update | true | false |
//! | fallback | any provider failure, or LLM disabled | true | true |
//! | rejected | history failed validation | false | false |
//!
//! Extraction never returns an error. Every failure is logged and absorbed.

mod fallback;
mod parse;

pub use fallback::{A1C_RANGE, GLUCOSE_RANGE, extract_with_patterns};
pub use parse::{ParseOutcome, extract_json_block, parse_extraction_response};

use crate::config::{EngineConfig, ExtractionConfig, HistoryLimits, SalienceConfig};
use crate::llm::LlmProvider;
use crate::llm::prompts::{STATE_EXTRACTION_PROMPT, build_extraction_request};
use crate::models::{ChatMessage, ConversationState};
use crate::state::{StateUpdate, apply_update};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Result of one extraction call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutcome {
    /// The replacement snapshot.
    pub state: ConversationState,
    /// Wall time spent, zero when nothing was new.
    pub extraction_time_ms: u64,
    /// False only when the history was rejected.
    pub success: bool,
    /// Whether pattern extraction produced the update.
    pub used_fallback: bool,
}

/// Extracts conversation state from message history.
pub struct StateExtractor {
    provider: Option<Arc<dyn LlmProvider>>,
    salience: SalienceConfig,
    history: HistoryLimits,
    extraction: ExtractionConfig,
}

impl StateExtractor {
    /// Creates an extractor using `provider` for the structured path.
    #[must_use]
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, config: &EngineConfig) -> Self {
        Self {
            provider,
            salience: config.salience,
            history: config.history,
            extraction: config.extraction,
        }
    }

    /// Creates an extractor that only uses pattern extraction.
    #[must_use]
    pub fn fallback_only(config: &EngineConfig) -> Self {
        Self::new(None, config)
    }

    /// Returns whether the structured path will be attempted.
    #[must_use]
    pub fn uses_llm(&self) -> bool {
        self.extraction.use_llm && self.provider.is_some()
    }

    /// Folds the unseen suffix of `history` into `previous`.
    ///
    /// `previous` defaults to an empty state. When its cursor is beyond the
    /// end of `history` the whole history is re-folded into an empty state
    /// that keeps the user id and carried-over sections.
    pub async fn extract(
        &self,
        history: &[ChatMessage],
        previous: Option<&ConversationState>,
    ) -> ExtractionOutcome {
        let start = Instant::now();
        let empty = ConversationState::default();
        let previous = previous.unwrap_or(&empty);

        if let Err(e) = validate_history(history) {
            tracing::warn!(error = %e, "Rejecting message history, keeping previous state");
            metrics::counter!("state_extraction_total", "path" => "rejected").increment(1);
            return ExtractionOutcome {
                state: previous.clone(),
                extraction_time_ms: 0,
                success: false,
                used_fallback: false,
            };
        }

        let base = if previous.message_count > history.len() {
            tracing::warn!(
                cursor = previous.message_count,
                history_len = history.len(),
                "Extraction cursor is past the history, re-extracting from scratch"
            );
            reset_state(previous)
        } else {
            previous.clone()
        };

        let new_messages = &history[base.message_count..];
        if new_messages.is_empty() {
            metrics::counter!("state_extraction_total", "path" => "noop").increment(1);
            return ExtractionOutcome {
                state: base,
                extraction_time_ms: 0,
                success: true,
                used_fallback: false,
            };
        }

        let span = tracing::info_span!("state_extraction", new_messages = new_messages.len());
        async {
            let current_turn = new_messages
                .iter()
                .map(|m| m.turn_number)
                .max()
                .unwrap_or(base.turn_count);

            let (update, used_fallback) = match self.extract_with_llm(&base, new_messages).await {
                Some(update) => (update, false),
                None => (extract_with_patterns(new_messages), true),
            };

            let state = apply_update(
                &base,
                &update,
                current_turn,
                history.len(),
                &self.salience,
                &self.history,
            );

            let path = if used_fallback { "fallback" } else { "llm" };
            let elapsed = start.elapsed();
            metrics::counter!("state_extraction_total", "path" => path).increment(1);
            metrics::histogram!("state_extraction_duration_ms")
                .record(elapsed.as_secs_f64() * 1000.0);
            tracing::info!(
                path,
                turn = current_turn,
                message_count = state.message_count,
                elapsed_ms = elapsed.as_millis(),
                "State extracted"
            );

            ExtractionOutcome {
                state,
                extraction_time_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                success: true,
                used_fallback,
            }
        }
        .instrument(span)
        .await
    }

    /// Runs the structured path. `None` means the fallback should be used.
    async fn extract_with_llm(
        &self,
        previous: &ConversationState,
        new_messages: &[ChatMessage],
    ) -> Option<StateUpdate> {
        if !self.extraction.use_llm {
            return None;
        }
        let provider = self.provider.as_ref()?;
        let request = build_extraction_request(previous, new_messages);
        let timeout_ms = self.extraction.llm_timeout_ms;

        // On timeout the in-flight request is dropped.
        let span = tracing::info_span!("state_extraction.llm", provider = provider.name());
        let call = provider
            .complete_with_system(STATE_EXTRACTION_PROMPT, &request)
            .instrument(span);

        let response = match tokio::time::timeout(Duration::from_millis(timeout_ms), call).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                metrics::counter!("state_extraction_llm_completed", "status" => "error")
                    .increment(1);
                tracing::warn!(error = %e, "LLM extraction failed, using pattern fallback");
                return None;
            },
            Err(_) => {
                let e = Error::Timeout {
                    operation: "state_extraction".to_string(),
                    timeout_ms,
                };
                metrics::counter!("state_extraction_llm_completed", "status" => "timeout")
                    .increment(1);
                tracing::warn!(error = %e, "LLM extraction timed out, using pattern fallback");
                return None;
            },
        };

        match parse_extraction_response(&response) {
            ParseOutcome::Parsed(update) => {
                metrics::counter!("state_extraction_llm_completed", "status" => "success")
                    .increment(1);
                Some(update)
            },
            ParseOutcome::Failed { reason } => {
                metrics::counter!("state_extraction_llm_completed", "status" => "parse_error")
                    .increment(1);
                tracing::warn!(%reason, "Unusable LLM extraction response, using pattern fallback");
                None
            },
        }
    }
}

/// Checks that turn numbers never decrease along the history.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] naming the first offending message.
pub fn validate_history(history: &[ChatMessage]) -> Result<()> {
    for (index, pair) in history.windows(2).enumerate() {
        if pair[1].turn_number < pair[0].turn_number {
            return Err(Error::InvalidInput(format!(
                "turn number decreases at message {}: {} -> {}",
                index + 1,
                pair[0].turn_number,
                pair[1].turn_number
            )));
        }
    }
    Ok(())
}

/// Empty state that keeps what extraction never writes.
fn reset_state(previous: &ConversationState) -> ConversationState {
    ConversationState {
        user_id: previous.user_id.clone(),
        procedural: previous.procedural.clone(),
        commitments: previous.commitments.clone(),
        ..ConversationState::default()
    }
}
