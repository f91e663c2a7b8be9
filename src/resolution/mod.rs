//! Reference resolution.
//!
//! Binds each detected reference to an antecedent in the current
//! [`ConversationState`] and writes a guidance line for the generator.
//! Dispatch is one match arm per [`ReferenceType`]; categories with nothing
//! to resolve against return no entry at all. When an antecedent is expected
//! but missing, the resolver says so in the guidance rather than guessing.

mod guidance;

pub use guidance::{GUIDANCE_HEADER, build_context_guidance};

use crate::detection::{ListPosition, SurfaceForm, normalize, patterns, surface_form};
use crate::models::{
    ConversationState, DetectedReference, EntityKind, ReferenceType, ResolvedReference, StateLayer,
};

/// Value of `resolved_to` when no antecedent exists.
pub const UNKNOWN: &str = "unknown";
/// Value of `resolved_to` when candidates are insufficient to decide.
pub const UNCLEAR: &str = "unclear";

/// Minimum salience for an entity to count as a comparison candidate.
const DIFFERENCE_MIN_SALIENCE: f32 = 0.5;

/// Resolves every detected reference against `state`.
///
/// The `none` sentinel and categories with no resolution strategy produce
/// no entry, so the result may be shorter than `references`.
#[must_use]
pub fn resolve_references(
    message: &str,
    references: &[DetectedReference],
    state: &ConversationState,
) -> Vec<ResolvedReference> {
    let resolved: Vec<ResolvedReference> = references
        .iter()
        .filter_map(|reference| {
            let result = resolve_one(message, reference, state);
            metrics::counter!(
                "reference_resolution_total",
                "type" => reference.reference_type.as_str(),
                "resolved" => if result.is_some() { "true" } else { "false" }
            )
            .increment(1);
            result
        })
        .collect();

    tracing::debug!(
        detected = references.len(),
        resolved = resolved.len(),
        "Resolved references"
    );
    resolved
}

fn resolve_one(
    message: &str,
    reference: &DetectedReference,
    state: &ConversationState,
) -> Option<ResolvedReference> {
    let form = surface_form(reference);
    match reference.reference_type {
        ReferenceType::None | ReferenceType::DiscourseMarker | ReferenceType::Process => None,
        ReferenceType::Ellipsis => Some(resolve_ellipsis(reference, form, state)),
        ReferenceType::Definite => Some(resolve_definite(reference, form, state)),
        ReferenceType::Comparative => Some(resolve_comparative(reference, form, state)),
        ReferenceType::Temporal => resolve_temporal(reference, form, state),
        ReferenceType::AiOutput => Some(resolve_ai_output(reference, form, state)),
        ReferenceType::Evaluation => Some(resolve_evaluation(reference, state)),
        ReferenceType::Causality => resolve_causality(reference, state),
        ReferenceType::Modal => resolve_modal(reference, state),
        ReferenceType::MemoryRecall => Some(resolve_memory_recall(message, reference)),
    }
}

fn build(
    reference: &DetectedReference,
    resolved_to: impl Into<String>,
    context_guidance: String,
    source_layer: StateLayer,
) -> ResolvedReference {
    ResolvedReference {
        reference_type: reference.reference_type,
        original_pattern: reference.pattern.clone(),
        resolved_to: resolved_to.into(),
        context_guidance,
        source_layer,
    }
}

fn unknown(reference: &DetectedReference, source_layer: StateLayer) -> ResolvedReference {
    build(
        reference,
        UNKNOWN,
        guidance::no_antecedent(&reference.pattern),
        source_layer,
    )
}

/// Strips leading particles and trailing question marks from a fragment.
fn fragment_of(pattern: &str, strip_particle: bool) -> String {
    let trimmed = pattern.trim().trim_end_matches('?').trim();
    if !strip_particle {
        return trimmed.to_string();
    }
    ["ya ", "peki ", "ve "]
        .iter()
        .find_map(|p| trimmed.strip_prefix(p))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn join_nonempty(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Ellipsis
// ============================================================================

fn resolve_ellipsis(
    reference: &DetectedReference,
    form: Option<SurfaceForm>,
    state: &ConversationState,
) -> ResolvedReference {
    let Some(question) = &state.discourse.last_question else {
        return build(
            reference,
            fragment_of(&reference.pattern, false),
            guidance::standalone(&reference.pattern),
            StateLayer::Message,
        );
    };

    let subject = question.subject.as_str();
    let verb = question.verb.as_str();
    let previous = join_nonempty(&[subject, verb]);

    let restored = match form {
        Some(SurfaceForm::BareQuantity | SurfaceForm::ModalOnly) => {
            let fragment = fragment_of(&reference.pattern, false);
            format!("{}?", join_nonempty(&[subject, &fragment]))
        },
        _ => {
            let fragment = fragment_of(&reference.pattern, true);
            format!(
                "{}? (önceki soru: {previous})",
                join_nonempty(&[&fragment, verb])
            )
        },
    };

    build(
        reference,
        restored.clone(),
        guidance::ellipsis(&reference.pattern, subject, &restored),
        StateLayer::Discourse,
    )
}

// ============================================================================
// Definite
// ============================================================================

fn resolve_definite(
    reference: &DetectedReference,
    form: Option<SurfaceForm>,
    state: &ConversationState,
) -> ResolvedReference {
    let Some(entity) = state.most_salient_entity() else {
        return unknown(reference, StateLayer::Entities);
    };
    let name = entity.name.as_str();
    let pattern = reference.pattern.as_str();

    let guidance = match form {
        Some(SurfaceForm::PluralPossessive) => {
            let names = state
                .top_entities(&EntityKind::ALL, 3)
                .iter()
                .map(|e| format!("\"{}\"", e.name))
                .collect::<Vec<_>>()
                .join(", ");
            guidance::plural_possessive(pattern, &names)
        },
        Some(SurfaceForm::SingularPossessive) => guidance::singular_possessive(pattern, name),
        Some(SurfaceForm::DemonstrativeNoun) => guidance::demonstrative(pattern, name),
        _ => guidance::accusative(pattern, name),
    };

    build(reference, name, guidance, StateLayer::Entities)
}

// ============================================================================
// Comparative
// ============================================================================

fn resolve_comparative(
    reference: &DetectedReference,
    form: Option<SurfaceForm>,
    state: &ConversationState,
) -> ResolvedReference {
    let pattern = reference.pattern.as_str();

    match form {
        Some(SurfaceForm::Difference) => {
            let candidates: Vec<_> = state
                .top_entities(&[EntityKind::Medication, EntityKind::Food], usize::MAX)
                .into_iter()
                .filter(|e| e.salience > DIFFERENCE_MIN_SALIENCE)
                .take(2)
                .collect();
            match candidates.as_slice() {
                [first, second] => build(
                    reference,
                    format!("{} vs {}", first.name, second.name),
                    guidance::difference(pattern, &first.name, &second.name),
                    StateLayer::Entities,
                ),
                _ => build(
                    reference,
                    UNCLEAR,
                    guidance::difference_unclear(pattern),
                    StateLayer::Entities,
                ),
            }
        },
        Some(SurfaceForm::Other) => match state.most_salient_entity() {
            Some(entity) => build(
                reference,
                entity.name.clone(),
                guidance::alternatives(pattern, &entity.name),
                StateLayer::Entities,
            ),
            None => unknown(reference, StateLayer::Entities),
        },
        _ => {
            if let Some(reading) = state.latest_measurement() {
                let described = reading.describe();
                return build(
                    reference,
                    described.clone(),
                    guidance::compare_to_measurement(pattern, &described),
                    StateLayer::Entities,
                );
            }
            match state.most_salient_entity() {
                Some(entity) => build(
                    reference,
                    entity.name.clone(),
                    guidance::compare_to_entity(pattern, &entity.name),
                    StateLayer::Entities,
                ),
                None => unknown(reference, StateLayer::Entities),
            }
        },
    }
}

// ============================================================================
// Temporal
// ============================================================================

fn resolve_temporal(
    reference: &DetectedReference,
    form: Option<SurfaceForm>,
    state: &ConversationState,
) -> Option<ResolvedReference> {
    let pattern = reference.pattern.as_str();

    match form {
        Some(SurfaceForm::Before) => {
            if let Some(statement) = &state.discourse.last_statement {
                return Some(build(
                    reference,
                    statement.claim.clone(),
                    guidance::earlier_statement(pattern, &statement.claim),
                    StateLayer::Discourse,
                ));
            }
        },
        Some(SurfaceForm::Still) => {
            if let Some(reading) = state.latest_measurement() {
                let described = reading.describe();
                return Some(build(
                    reference,
                    described.clone(),
                    guidance::still_reading(pattern, &described),
                    StateLayer::Entities,
                ));
            }
        },
        _ => {},
    }

    let topic = state
        .discourse
        .current_topic
        .clone()
        .or_else(|| state.discourse.last_question.as_ref().map(|q| q.subject.clone()))
        .filter(|t| !t.trim().is_empty())?;
    Some(build(
        reference,
        topic.clone(),
        guidance::temporal_topic(pattern, &topic),
        StateLayer::Discourse,
    ))
}

// ============================================================================
// Assistant outputs
// ============================================================================

fn list_position(pattern: &str) -> Option<ListPosition> {
    pattern.split_whitespace().find_map(|word| {
        patterns::ORDINAL_STEMS
            .iter()
            .find(|(stem, _)| word.starts_with(stem))
            .map(|(_, position)| *position)
    })
}

fn resolve_ai_output(
    reference: &DetectedReference,
    form: Option<SurfaceForm>,
    state: &ConversationState,
) -> ResolvedReference {
    let pattern = reference.pattern.as_str();

    match form {
        Some(SurfaceForm::Recommended) => match state.latest_recommendation() {
            Some(rec) => build(
                reference,
                rec.content.clone(),
                guidance::recommendation(pattern, &rec.content),
                StateLayer::AiOutputs,
            ),
            None => build(
                reference,
                UNKNOWN,
                guidance::no_recommendation(pattern),
                StateLayer::AiOutputs,
            ),
        },
        Some(SurfaceForm::Said) => {
            if let Some(list) = state.latest_list() {
                let items = list
                    .items
                    .iter()
                    .map(|i| format!("\"{i}\""))
                    .collect::<Vec<_>>()
                    .join(", ");
                return build(
                    reference,
                    list.items.join(", "),
                    guidance::said_list(pattern, &list.title, &items),
                    StateLayer::AiOutputs,
                );
            }
            match &state.discourse.last_statement {
                Some(statement) => build(
                    reference,
                    statement.claim.clone(),
                    guidance::earlier_statement(pattern, &statement.claim),
                    StateLayer::Discourse,
                ),
                None => unknown(reference, StateLayer::AiOutputs),
            }
        },
        _ => {
            let Some(list) = state.latest_list() else {
                return build(
                    reference,
                    UNKNOWN,
                    guidance::no_list(pattern),
                    StateLayer::AiOutputs,
                );
            };
            let (index, label) = match list_position(pattern) {
                Some(ListPosition::Last) => (list.items.len().checked_sub(1), "last".to_string()),
                Some(ListPosition::Index(i)) => (Some(i), ordinal_label(i)),
                None => (Some(0), ordinal_label(0)),
            };
            match index.and_then(|i| list.items.get(i)) {
                Some(item) => build(
                    reference,
                    item.clone(),
                    guidance::list_item(pattern, &label, item, &list.title),
                    StateLayer::AiOutputs,
                ),
                None => build(
                    reference,
                    UNKNOWN,
                    guidance::list_out_of_range(pattern, list.items.len(), &list.title),
                    StateLayer::AiOutputs,
                ),
            }
        },
    }
}

fn ordinal_label(index: usize) -> String {
    match index {
        0 => "first".to_string(),
        1 => "second".to_string(),
        2 => "third".to_string(),
        n => format!("{}th", n + 1),
    }
}

// ============================================================================
// Evaluation, causality, modal, recall
// ============================================================================

/// Returns the word before the question particle ("zararlı mı" -> "zararlı").
fn leading_word(pattern: &str) -> &str {
    pattern.split_whitespace().next().unwrap_or(pattern)
}

fn resolve_evaluation(reference: &DetectedReference, state: &ConversationState) -> ResolvedReference {
    let Some(entity) = state.most_salient_entity() else {
        return unknown(reference, StateLayer::Entities);
    };
    let adjective = leading_word(&reference.pattern);
    build(
        reference,
        entity.name.clone(),
        guidance::evaluation(&reference.pattern, &entity.name, adjective),
        StateLayer::Entities,
    )
}

fn resolve_causality(
    reference: &DetectedReference,
    state: &ConversationState,
) -> Option<ResolvedReference> {
    let statement = state.discourse.last_statement.as_ref()?;
    Some(build(
        reference,
        statement.claim.clone(),
        guidance::causality(&reference.pattern, &statement.claim),
        StateLayer::Discourse,
    ))
}

fn resolve_modal(reference: &DetectedReference, state: &ConversationState) -> Option<ResolvedReference> {
    let question = state.discourse.last_question.as_ref()?;
    if question.subject.trim().is_empty() {
        return None;
    }
    let modal_word = leading_word(&reference.pattern);
    Some(build(
        reference,
        question.subject.clone(),
        guidance::modal(&reference.pattern, &question.subject, modal_word),
        StateLayer::Discourse,
    ))
}

fn resolve_memory_recall(message: &str, reference: &DetectedReference) -> ResolvedReference {
    let normalized = normalize(message);
    let query = patterns::LEADING_MARKERS
        .replace(&normalized, "")
        .trim()
        .trim_end_matches('?')
        .trim()
        .to_string();
    build(
        reference,
        query.clone(),
        guidance::memory_recall(&reference.pattern, &query),
        StateLayer::Message,
    )
}
