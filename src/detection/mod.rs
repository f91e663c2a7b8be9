//! Reference detection.
//!
//! A stateless pass over one user utterance. Every category in
//! [`patterns::REFERENCE_SIGNALS`] is tested independently, so one message
//! can yield several detections (for example ellipsis and causality for
//! "peki neden?"). Each category contributes at most one detection: the
//! first of its signals that matches.
//!
//! When nothing matches, the result is a single
//! [`DetectedReference::none`] sentinel, never an empty list.

pub mod patterns;

pub use patterns::{ListPosition, ReferenceSignal, SurfaceForm};

use crate::models::{DetectedReference, ReferenceType, StateLayer};
use patterns::REFERENCE_SIGNALS;
use std::collections::BTreeSet;

/// Lowercases Turkish text correctly and trims it.
///
/// `I` lowers to dotless `ı` and `İ` to `i`; the generic Unicode mapping
/// would turn `İ` into `i` plus a combining dot.
#[must_use]
pub fn normalize(message: &str) -> String {
    message
        .trim()
        .chars()
        .flat_map(|c| match c {
            'I' => 'ı'.to_lowercase(),
            'İ' => 'i'.to_lowercase(),
            other => other.to_lowercase(),
        })
        .collect()
}

/// Detects reference patterns in a user utterance.
///
/// Always returns at least one element.
#[must_use]
pub fn detect_references(message: &str) -> Vec<DetectedReference> {
    let normalized = normalize(message);
    if normalized.is_empty() {
        return vec![DetectedReference::none()];
    }

    let mut detected: Vec<DetectedReference> = Vec::new();
    for signal in REFERENCE_SIGNALS.iter() {
        if detected
            .iter()
            .any(|d| d.reference_type == signal.reference_type)
        {
            continue;
        }
        if let Some(matched) = signal.pattern.find(&normalized) {
            detected.push(DetectedReference::new(
                signal.reference_type,
                matched.as_str().trim(),
                signal.confidence,
            ));
        }
    }

    if detected.is_empty() {
        detected.push(DetectedReference::none());
    }

    for reference in &detected {
        metrics::counter!("reference_detection_total", "type" => reference.reference_type.as_str())
            .increment(1);
    }
    tracing::debug!(
        count = detected.len(),
        types = ?detected.iter().map(|d| d.reference_type.as_str()).collect::<Vec<_>>(),
        "Detected references"
    );

    detected
}

/// Returns the highest-confidence detection.
///
/// Ties go to the earliest detection, so the result follows detection order
/// rather than sort stability. An empty slice yields the `none` sentinel.
#[must_use]
pub fn get_primary_reference(references: &[DetectedReference]) -> DetectedReference {
    references
        .iter()
        .fold(None, |best: Option<&DetectedReference>, candidate| match best {
            Some(b) if b.confidence >= candidate.confidence => Some(b),
            _ => Some(candidate),
        })
        .cloned()
        .unwrap_or_else(DetectedReference::none)
}

/// Unions the state sections every detection needs.
#[must_use]
pub fn get_required_layers(references: &[DetectedReference]) -> BTreeSet<StateLayer> {
    references
        .iter()
        .flat_map(|r| r.requires_layers.iter().copied())
        .collect()
}

/// Recovers the surface form of a detection from its matched text.
///
/// Runs the signals of the detection's category against `pattern`; the
/// first that matches is the one that produced it.
#[must_use]
pub fn surface_form(reference: &DetectedReference) -> Option<SurfaceForm> {
    if reference.reference_type == ReferenceType::None {
        return None;
    }
    REFERENCE_SIGNALS
        .iter()
        .filter(|s| s.reference_type == reference.reference_type)
        .find(|s| s.pattern.is_match(&reference.pattern))
        .map(|s| s.form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn types(message: &str) -> Vec<ReferenceType> {
        detect_references(message)
            .into_iter()
            .map(|d| d.reference_type)
            .collect()
    }

    // ============================================================================
    // Categories
    // ============================================================================

    #[test_case("ya akşam?", ReferenceType::Ellipsis; "prefix particle")]
    #[test_case("ne kadar?", ReferenceType::Ellipsis; "bare quantity")]
    #[test_case("olur mu?", ReferenceType::Ellipsis; "modal only")]
    #[test_case("onun yan etkileri neler", ReferenceType::Definite; "singular possessive")]
    #[test_case("bu ilacı ne zaman almalıyım", ReferenceType::Definite; "demonstrative noun")]
    #[test_case("onların farkı ne", ReferenceType::Comparative; "difference")]
    #[test_case("daha fazla yiyebilir miyim", ReferenceType::Comparative; "more than")]
    #[test_case("diğerleri nasıl", ReferenceType::Comparative; "other")]
    #[test_case("daha önce ne demiştik", ReferenceType::Temporal; "before")]
    #[test_case("şekerim hala yüksek", ReferenceType::Temporal; "still")]
    #[test_case("tamam anladım", ReferenceType::DiscourseMarker; "marker")]
    #[test_case("ikincisini anlatır mısın", ReferenceType::AiOutput; "ordinal")]
    #[test_case("önerdiğin kahvaltıyı denedim", ReferenceType::AiOutput; "recommended")]
    #[test_case("muz sağlıklı mı", ReferenceType::Evaluation; "evaluation")]
    #[test_case("neden?", ReferenceType::Causality; "bare why")]
    #[test_case("bu ne yüzünden oluyor", ReferenceType::Causality; "cause phrase")]
    #[test_case("spor yapmak şart mı", ReferenceType::Modal; "modal")]
    #[test_case("nasıl?", ReferenceType::Process; "bare how")]
    #[test_case("adım adım anlatır mısın", ReferenceType::Process; "steps")]
    #[test_case("hatırlıyor musun geçen hafta", ReferenceType::MemoryRecall; "recall")]
    fn test_detects_category(message: &str, expected: ReferenceType) {
        assert!(
            types(message).contains(&expected),
            "{message:?} -> {:?}",
            types(message)
        );
    }

    #[test_case(""; "empty")]
    #[test_case("   "; "whitespace")]
    #[test_case("merhaba, bugün kahvaltıda yulaf yedim"; "plain statement")]
    fn test_no_match_yields_single_none(message: &str) {
        let detected = detect_references(message);
        assert_eq!(detected.len(), 1);
        assert!(detected[0].is_none());
        assert!((detected[0].confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_categories_are_not_exclusive() {
        let found = types("peki neden?");
        assert!(found.contains(&ReferenceType::Ellipsis));
        assert!(found.contains(&ReferenceType::Causality));
        assert!(found.contains(&ReferenceType::DiscourseMarker));
    }

    #[test]
    fn test_one_detection_per_category() {
        let detected = detect_references("onun ve onların dozu");
        let definite = detected
            .iter()
            .filter(|d| d.reference_type == ReferenceType::Definite)
            .count();
        assert_eq!(definite, 1);
    }

    #[test]
    fn test_turkish_uppercase_is_normalized() {
        assert_eq!(normalize("  İLAÇ IŞIK "), "ilaç ışık");
        assert!(types("BU İLAÇ iyi mi").contains(&ReferenceType::Definite));
    }

    #[test]
    fn test_pattern_is_matched_text() {
        let detected = detect_references("Ya akşam?");
        assert_eq!(detected[0].pattern, "ya akşam?");
    }

    // ============================================================================
    // Primary and layers
    // ============================================================================

    #[test]
    fn test_primary_prefers_highest_confidence() {
        let refs = vec![
            DetectedReference::new(ReferenceType::DiscourseMarker, "peki", 0.6),
            DetectedReference::new(ReferenceType::Ellipsis, "peki neden", 0.9),
        ];
        assert_eq!(get_primary_reference(&refs).reference_type, ReferenceType::Ellipsis);
    }

    #[test]
    fn test_primary_tie_keeps_detection_order() {
        let refs = vec![
            DetectedReference::new(ReferenceType::Ellipsis, "peki neden", 0.85),
            DetectedReference::new(ReferenceType::Causality, "peki neden", 0.85),
        ];
        assert_eq!(get_primary_reference(&refs).reference_type, ReferenceType::Ellipsis);
    }

    #[test]
    fn test_primary_of_empty_is_none() {
        assert!(get_primary_reference(&[]).is_none());
    }

    #[test]
    fn test_required_layers_union() {
        let refs = vec![
            DetectedReference::new(ReferenceType::Ellipsis, "ya akşam", 0.9),
            DetectedReference::new(ReferenceType::AiOutput, "ilki", 0.8),
        ];
        let layers = get_required_layers(&refs);
        assert!(layers.contains(&StateLayer::Discourse));
        assert!(layers.contains(&StateLayer::AiOutputs));
        assert!(!layers.contains(&StateLayer::Entities));
    }

    #[test]
    fn test_surface_form_roundtrip() {
        let detected = detect_references("bunların içinde şeker var mı");
        let definite = detected
            .iter()
            .find(|d| d.reference_type == ReferenceType::Definite)
            .unwrap();
        assert_eq!(surface_form(definite), Some(SurfaceForm::PluralPossessive));
    }
}
