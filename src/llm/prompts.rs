//! Prompt text for structured state extraction.

use crate::models::{ChatMessage, ConversationState};

/// Instruction and JSON schema for the extraction call.
///
/// The response is deserialized into [`crate::state::StateUpdate`]; field
/// names here must stay in sync with that type.
pub const STATE_EXTRACTION_PROMPT: &str = r#"You maintain the conversation state of a Turkish-language diabetes and health assistant.

You receive the PREVIOUS STATE as JSON and the NEW MESSAGES of the conversation.
Report only what the NEW MESSAGES add. Do not repeat entities from the previous
state unless the new messages mention them again.

Respond with a single JSON object and nothing else, using exactly this schema:

{
  "entities": {
    "medications":  [{"name": string, "mentionedBy": "user" | "assistant", "salience": number 0-1}],
    "foods":        [{"name": string, "mentionedBy": "user" | "assistant", "salience": number 0-1}],
    "measurements": [{"type": "blood_glucose" | "a1c" | string, "value": number, "unit": string}],
    "symptoms":     [{"name": string, "mentionedBy": "user" | "assistant", "salience": number 0-1}],
    "exercises":    [{"name": string, "mentionedBy": "user" | "assistant", "salience": number 0-1}],
    "medicalTerms": [{"name": string, "mentionedBy": "user" | "assistant", "salience": number 0-1}]
  },
  "discourse": {
    "currentTopic": string | null,
    "lastQuestion": {"type": string, "subject": string, "verb": string} | null,
    "lastStatement": {"claim": string, "by": "user" | "assistant"} | null,
    "openQuestions": [string] | null
  },
  "aiOutputs": {
    "listsPresented":      [{"title": string, "items": [string]}],
    "recommendations":     [{"content": string}],
    "proceduresExplained": [{"name": string, "steps": [string]}],
    "examples":            [{"content": string}]
  }
}

Rules:
- Keep entity names in the language and form the speakers used (Turkish).
- salience is 1.0 for the focus of the new messages and lower for passing mentions.
- lastQuestion is the last question the user asked; subject is what it is about,
  verb is the predicate (for "kahvaltıda ne yemeliyim?": subject "kahvaltı", verb "ne yemeli").
- lastStatement is the last factual claim made by either side, paraphrased briefly.
- Use empty arrays and null for anything the new messages do not contain."#;

/// Renders the user part of the extraction request.
///
/// Contains the previous state as JSON followed by the new messages as
/// `role (turn N): content` lines.
#[must_use]
pub fn build_extraction_request(previous: &ConversationState, new_messages: &[ChatMessage]) -> String {
    let state_json =
        serde_json::to_string_pretty(previous).unwrap_or_else(|_| "{}".to_string());
    let messages = new_messages
        .iter()
        .map(|m| format!("{} (turn {}): {}", m.role, m.turn_number, m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    format!("PREVIOUS STATE:\n{state_json}\n\nNEW MESSAGES:\n{messages}")
}
