//! Parsing of generator output into a [`StateUpdate`].

use crate::state::StateUpdate;

/// Result of interpreting the generator's extraction response.
///
/// The extractor falls back to pattern extraction on [`ParseOutcome::Failed`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// The response held a well-formed state update.
    Parsed(StateUpdate),
    /// The response could not be used.
    Failed {
        /// Why the response was rejected.
        reason: String,
    },
}

impl ParseOutcome {
    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Top-level keys of which at least one must be present.
const SECTIONS: [&str; 3] = ["entities", "discourse", "aiOutputs"];

/// Parses a raw generator response.
#[must_use]
pub fn parse_extraction_response(response: &str) -> ParseOutcome {
    let Some(block) = extract_json_block(response) else {
        return ParseOutcome::failed("no JSON object in response");
    };

    let value: serde_json::Value = match serde_json::from_str(block) {
        Ok(value) => value,
        Err(e) => return ParseOutcome::failed(format!("invalid JSON: {e}")),
    };

    let Some(object) = value.as_object() else {
        return ParseOutcome::failed("response is not a JSON object");
    };
    if !SECTIONS.iter().any(|key| object.contains_key(*key)) {
        return ParseOutcome::failed("response has none of entities, discourse, aiOutputs");
    }

    match serde_json::from_value::<StateUpdate>(value) {
        Ok(update) => ParseOutcome::Parsed(update),
        Err(e) => ParseOutcome::failed(format!("schema mismatch: {e}")),
    }
}

/// Returns the first balanced `{...}` block of `response`.
///
/// Prefers the body of a fenced code block when one exists. Braces inside
/// JSON strings are ignored.
#[must_use]
pub fn extract_json_block(response: &str) -> Option<&str> {
    let trimmed = response.trim();
    let body = fenced_body(trimmed).unwrap_or(trimmed);
    balanced_object(body).or_else(|| balanced_object(trimmed))
}

/// Content between the first ```` ``` ```` fence pair, language tag skipped.
fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let after = &text[start..];
    let content_start = after.find('\n').map_or(0, |i| i + 1);
    let content = &after[content_start..];
    let end = content.find("```")?;
    Some(content[..end].trim())
}

fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {},
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            },
            _ => {},
        }
    }
    None
}
