//! Guidance text handed to the response generator.
//!
//! Guidance is written in English for the generator and quotes the user's
//! Turkish fragments verbatim.

use crate::models::ResolvedReference;

/// Header placed above the resolution notes.
pub const GUIDANCE_HEADER: &str = "CONVERSATION CONTEXT (resolve these references before answering; \
if a note says something is unclear, ask the user to clarify instead of guessing):";

/// Joins every non-empty guidance string under [`GUIDANCE_HEADER`].
///
/// Returns an empty string when there is nothing to say; callers omit the
/// context section entirely in that case.
#[must_use]
pub fn build_context_guidance(resolved: &[ResolvedReference]) -> String {
    let lines: Vec<String> = resolved
        .iter()
        .map(|r| r.context_guidance.trim())
        .filter(|g| !g.is_empty())
        .map(|g| format!("- {g}"))
        .collect();

    if lines.is_empty() {
        return String::new();
    }
    format!("{GUIDANCE_HEADER}\n{}", lines.join("\n"))
}

pub(super) fn standalone(pattern: &str) -> String {
    format!(
        "\"{pattern}\" looks like an elliptical follow-up, but no earlier question is on record. \
Treat it as a standalone question."
    )
}

pub(super) fn ellipsis(pattern: &str, subject: &str, restored: &str) -> String {
    format!(
        "\"{pattern}\" continues the previous question about \"{subject}\". \
Interpret it as: \"{restored}\"."
    )
}

pub(super) fn no_antecedent(pattern: &str) -> String {
    format!(
        "\"{pattern}\" points back to something, but nothing relevant has been discussed yet. \
There is no clear antecedent; this may need clarification."
    )
}

pub(super) fn plural_possessive(pattern: &str, names: &str) -> String {
    format!("\"{pattern}\" (plural) refers to the recently discussed items: {names}.")
}

pub(super) fn singular_possessive(pattern: &str, name: &str) -> String {
    format!("\"{pattern}\" asks about a property of \"{name}\".")
}

pub(super) fn accusative(pattern: &str, name: &str) -> String {
    format!("\"{pattern}\" refers to \"{name}\".")
}

pub(super) fn demonstrative(pattern: &str, name: &str) -> String {
    format!("\"{pattern}\" refers to \"{name}\", the most recently discussed item.")
}

pub(super) fn compare_to_measurement(pattern: &str, reading: &str) -> String {
    format!("\"{pattern}\" compares against the latest reading ({reading}).")
}

pub(super) fn compare_to_entity(pattern: &str, name: &str) -> String {
    format!("\"{pattern}\" compares against \"{name}\".")
}

pub(super) fn difference(pattern: &str, first: &str, second: &str) -> String {
    format!("\"{pattern}\" asks for the difference between \"{first}\" and \"{second}\".")
}

pub(super) fn difference_unclear(pattern: &str) -> String {
    format!(
        "\"{pattern}\" asks for a difference, but fewer than two comparable items are in context. \
Ask which items the user wants to compare."
    )
}

pub(super) fn alternatives(pattern: &str, name: &str) -> String {
    format!("\"{pattern}\" asks about alternatives to \"{name}\".")
}

pub(super) fn earlier_statement(pattern: &str, claim: &str) -> String {
    format!("\"{pattern}\" refers to what was said earlier: \"{claim}\".")
}

pub(super) fn still_reading(pattern: &str, reading: &str) -> String {
    format!(
        "\"{pattern}\" refers to the latest reading ({reading}); \
the user says it has not changed."
    )
}

pub(super) fn temporal_topic(pattern: &str, topic: &str) -> String {
    format!("\"{pattern}\" is relative to the ongoing topic \"{topic}\".")
}

pub(super) fn list_item(pattern: &str, position: &str, item: &str, title: &str) -> String {
    format!("\"{pattern}\" is the {position} item of the list \"{title}\": \"{item}\".")
}

pub(super) fn list_out_of_range(pattern: &str, len: usize, title: &str) -> String {
    format!(
        "\"{pattern}\" names a list position, but the list \"{title}\" has only {len} item(s). \
This may need clarification."
    )
}

pub(super) fn no_list(pattern: &str) -> String {
    format!(
        "\"{pattern}\" refers to a list, but no list has been presented yet. \
This may need clarification."
    )
}

pub(super) fn recommendation(pattern: &str, content: &str) -> String {
    format!("\"{pattern}\" refers to your earlier recommendation: \"{content}\".")
}

pub(super) fn no_recommendation(pattern: &str) -> String {
    format!(
        "\"{pattern}\" refers to a recommendation, but none is on record. \
This may need clarification."
    )
}

pub(super) fn said_list(pattern: &str, title: &str, items: &str) -> String {
    format!("\"{pattern}\" refers to the list you gave about \"{title}\": {items}.")
}

pub(super) fn evaluation(pattern: &str, name: &str, adjective: &str) -> String {
    format!(
        "\"{pattern}\" asks whether \"{name}\" is \"{adjective}\". \
Evaluate \"{name}\" specifically."
    )
}

pub(super) fn causality(pattern: &str, claim: &str) -> String {
    format!("\"{pattern}\" asks for the reason behind: \"{claim}\".")
}

pub(super) fn modal(pattern: &str, subject: &str, modal_word: &str) -> String {
    format!("\"{pattern}\" asks whether \"{subject}\" is \"{modal_word}\".")
}

pub(super) fn memory_recall(pattern: &str, query: &str) -> String {
    format!(
        "\"{pattern}\" asks you to recall earlier conversation. \
Search the prior context for: \"{query}\"."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReferenceType, StateLayer};

    fn resolved(guidance: &str) -> ResolvedReference {
        ResolvedReference {
            reference_type: ReferenceType::Definite,
            original_pattern: "onu".to_string(),
            resolved_to: "metformin".to_string(),
            context_guidance: guidance.to_string(),
            source_layer: StateLayer::Entities,
        }
    }

    #[test]
    fn test_empty_input_yields_empty_string() {
        assert_eq!(build_context_guidance(&[]), "");
    }

    #[test]
    fn test_blank_guidance_is_skipped() {
        assert_eq!(build_context_guidance(&[resolved("  ")]), "");
    }

    #[test]
    fn test_guidance_is_newline_joined_under_header() {
        let text = build_context_guidance(&[resolved("first"), resolved(""), resolved("second")]);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], GUIDANCE_HEADER);
        assert_eq!(lines[1], "- first");
        assert_eq!(lines[2], "- second");
    }
}
