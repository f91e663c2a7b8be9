//! Property-based tests for state merging and reference detection.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Entity, measurement and assistant-output collections stay within their caps
//! - Salience never increases without a fresh mention
//! - A fresh mention replaces decayed salience instead of compounding it
//! - Utterances with no reference signal yield exactly the none sentinel

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use refcontext::config::{HistoryLimits, SalienceConfig};
use refcontext::models::{
    EntityMention, ExampleOutput, PresentedList, Procedure, Recommendation, Speaker,
    measurement_kinds,
};
use refcontext::state::{
    AiOutputsUpdate, EntityUpdate, RawMeasurement, RawMention, StateUpdate, apply_update,
    decay_salience, merge_entities,
};
use refcontext::{ConversationState, ReferenceType, build_context_guidance, detect_references};

/// One turn's observations: every name lands in every entity collection and
/// every assistant-output history, and every reading becomes a measurement.
fn turn_update(names: &[String], readings: &[f64]) -> StateUpdate {
    let mentions: Vec<RawMention> = names
        .iter()
        .map(|n| RawMention::new(n.clone(), Speaker::User))
        .collect();
    StateUpdate {
        entities: EntityUpdate {
            medications: mentions.clone(),
            foods: mentions.clone(),
            symptoms: mentions.clone(),
            exercises: mentions.clone(),
            medical_terms: mentions,
            measurements: readings
                .iter()
                .map(|v| RawMeasurement {
                    kind: measurement_kinds::BLOOD_GLUCOSE.to_string(),
                    value: *v,
                    unit: Some("mg/dL".to_string()),
                })
                .collect(),
        },
        ai_outputs: AiOutputsUpdate {
            lists_presented: names
                .iter()
                .map(|n| PresentedList {
                    title: n.clone(),
                    items: vec![n.clone()],
                    turn: 0,
                })
                .collect(),
            recommendations: names
                .iter()
                .map(|n| Recommendation {
                    content: n.clone(),
                    turn: 0,
                })
                .collect(),
            procedures_explained: names
                .iter()
                .map(|n| Procedure {
                    name: n.clone(),
                    steps: vec![format!("{n} adım 1")],
                    turn: 0,
                })
                .collect(),
            examples: names
                .iter()
                .map(|n| ExampleOutput {
                    content: n.clone(),
                    turn: 0,
                })
                .collect(),
        },
        ..StateUpdate::default()
    }
}

fn assert_within_caps(
    state: &ConversationState,
    salience: &SalienceConfig,
    limits: &HistoryLimits,
) -> std::result::Result<(), TestCaseError> {
    let entities = &state.entities;
    for ranked in [
        &entities.medications,
        &entities.foods,
        &entities.symptoms,
        &entities.exercises,
        &entities.medical_terms,
    ] {
        prop_assert!(ranked.len() <= salience.max_entities);
    }
    prop_assert!(entities.measurements.len() <= salience.max_measurements);

    let outputs = &state.ai_outputs;
    prop_assert!(outputs.lists_presented.len() <= limits.lists);
    prop_assert!(outputs.recommendations.len() <= limits.recommendations);
    prop_assert!(outputs.procedures_explained.len() <= limits.procedures);
    prop_assert!(outputs.examples.len() <= limits.examples);
    Ok(())
}

// ============================================================================
// Bounded collections
// ============================================================================

proptest! {
    /// Property: every collection stays within its cap after any merge sequence,
    /// and the bounded histories keep the newest entries.
    #[test]
    fn prop_collections_are_bounded(
        turns in prop::collection::vec(
            (
                prop::collection::vec("[a-zçğıöşü]{2,8}", 0..14),
                prop::collection::vec(40.0f64..=600.0, 0..14),
            ),
            1..15,
        )
    ) {
        let salience = SalienceConfig::default();
        let limits = HistoryLimits::default();
        let mut state = ConversationState::default();

        for (i, (names, readings)) in turns.iter().enumerate() {
            let turn = u32::try_from(i + 1).unwrap();
            state = apply_update(
                &state,
                &turn_update(names, readings),
                turn,
                i + 1,
                &salience,
                &limits,
            );

            assert_within_caps(&state, &salience, &limits)?;
            prop_assert_eq!(state.turn_count, turn);

            if let Some(last) = readings.last() {
                let newest = state.entities.measurements.last().unwrap();
                prop_assert!((newest.value - last).abs() < f64::EPSILON);
                prop_assert_eq!(newest.turn, turn);
            }
            if let Some(last) = names.last() {
                prop_assert_eq!(&state.ai_outputs.examples.last().unwrap().content, last);
                prop_assert_eq!(
                    &state.ai_outputs.procedures_explained.last().unwrap().name,
                    last
                );
            }
        }
    }

    /// Property: ranked collections are sorted by salience, descending.
    #[test]
    fn prop_ranked_collections_are_sorted(
        names in prop::collection::vec("[a-z]{3,6}", 1..25),
        saliences in prop::collection::vec(0.0f32..=1.0, 25),
    ) {
        let mentions: Vec<RawMention> = names
            .iter()
            .zip(&saliences)
            .map(|(n, s)| RawMention::new(n.clone(), Speaker::Assistant).with_salience(*s))
            .collect();

        let merged = merge_entities(&[], &mentions, 1, &SalienceConfig::default());

        prop_assert!(merged.len() <= 10);
        for pair in merged.windows(2) {
            prop_assert!(pair[0].salience >= pair[1].salience);
        }
    }
}

// ============================================================================
// Salience decay
// ============================================================================

proptest! {
    /// Property: salience is non-increasing in the number of unmentioned turns.
    #[test]
    fn prop_decay_is_monotonic(
        salience in 0.0f32..=1.0,
        mentioned in 0u32..50,
        k1 in 0u32..20,
        extra in 1u32..20,
    ) {
        let config = SalienceConfig::default();
        let near = decay_salience(salience, mentioned, mentioned + k1, &config);
        let far = decay_salience(salience, mentioned, mentioned + k1 + extra, &config);

        prop_assert!(far <= near);
        prop_assert!(near <= salience);
        prop_assert!(
            far < near || (far - config.floor).abs() < 1e-6 || salience <= config.floor,
            "near={near} far={far}"
        );
    }

    /// Property: decay never pushes salience below the floor unless it started there.
    #[test]
    fn prop_decay_respects_floor(salience in 0.0f32..=1.0, distance in 0u32..100) {
        let config = SalienceConfig::default();
        let decayed = decay_salience(salience, 0, distance, &config);
        prop_assert!(decayed >= config.floor.min(salience));
    }

    /// Property: a fresh mention sets the stated salience and turn exactly.
    #[test]
    fn prop_fresh_mention_resets(
        old_salience in 0.0f32..=1.0,
        old_turn in 0u32..20,
        gap in 0u32..20,
        new_salience in 0.0f32..=1.0,
    ) {
        let existing = vec![EntityMention {
            name: "Metformin".to_string(),
            mentioned_turn: old_turn,
            mentioned_by: Speaker::User,
            salience: old_salience,
        }];
        let current = old_turn + gap;
        let mentions =
            vec![RawMention::new("metformin", Speaker::Assistant).with_salience(new_salience)];

        let merged = merge_entities(&existing, &mentions, current, &SalienceConfig::default());

        prop_assert_eq!(merged.len(), 1);
        prop_assert_eq!(merged[0].mentioned_turn, current);
        prop_assert!((merged[0].salience - new_salience).abs() < f32::EPSILON);
        prop_assert_eq!(merged[0].mentioned_by, Speaker::Assistant);
    }
}

// ============================================================================
// Detection
// ============================================================================

proptest! {
    /// Property: utterances without letters never match a reference signal.
    #[test]
    fn prop_no_letters_means_none(message in "[0-9 .,!?+/-]{0,40}") {
        let detected = detect_references(&message);
        prop_assert_eq!(detected.len(), 1);
        prop_assert_eq!(detected[0].reference_type, ReferenceType::None);
        prop_assert!((detected[0].confidence - 1.0).abs() < f32::EPSILON);
    }

    /// Property: detection yields at most one match per category.
    #[test]
    fn prop_one_detection_per_category(message in "\\PC{0,80}") {
        let detected = detect_references(&message);
        prop_assert!(!detected.is_empty());
        for (i, a) in detected.iter().enumerate() {
            for b in &detected[i + 1..] {
                prop_assert_ne!(a.reference_type, b.reference_type);
            }
        }
    }
}

#[test]
fn test_single_turn_overflow_is_cut_to_caps() {
    let salience = SalienceConfig::default();
    let limits = HistoryLimits::default();
    let names: Vec<String> = (0..12).map(|i| format!("öğe{i}")).collect();
    let readings: Vec<f64> = (0..12).map(|i| 100.0 + f64::from(i)).collect();

    let state = apply_update(
        &ConversationState::default(),
        &turn_update(&names, &readings),
        1,
        2,
        &salience,
        &limits,
    );

    let measurements: Vec<f64> = state.entities.measurements.iter().map(|m| m.value).collect();
    assert_eq!(measurements.len(), 10);
    assert!((measurements[0] - 102.0).abs() < f64::EPSILON);
    assert!((measurements[9] - 111.0).abs() < f64::EPSILON);

    let outputs = &state.ai_outputs;
    let procedures: Vec<&str> = outputs
        .procedures_explained
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(procedures, vec!["öğe9", "öğe10", "öğe11"]);
    assert_eq!(outputs.examples.len(), 5);
    assert_eq!(outputs.examples[0].content, "öğe7");
    assert_eq!(outputs.lists_presented.len(), 5);
    assert_eq!(outputs.recommendations.len(), 5);
    assert_eq!(state.entities.medications.len(), 10);
}

#[test]
fn test_empty_guidance_for_empty_resolution() {
    assert_eq!(build_context_guidance(&[]), "");
}
