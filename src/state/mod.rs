//! Conversation state merging.
//!
//! A [`StateUpdate`] describes what the newest messages added. [`apply_update`]
//! folds it into the previous [`ConversationState`] and returns the
//! replacement snapshot; the previous state is never modified in place.
//!
//! # Merge rules
//!
//! | Section | Rule |
//! |---------|------|
//! | Ranked entities | decay, upsert by lowercased name, rank, truncate |
//! | Measurements | append, keep most recent N |
//! | Discourse | overwrite when present, one-step topic shift |
//! | Assistant outputs | append, keep most recent N per list |

mod merge;
mod update;

pub use merge::{
    append_bounded, decay_salience, merge_entities, merge_measurements, rank_and_truncate,
};
pub use update::{
    AiOutputsUpdate, DiscourseUpdate, EntityUpdate, RawMeasurement, RawMention, StateUpdate,
};

use crate::config::{HistoryLimits, SalienceConfig};
use crate::models::{AiOutputs, ConversationState, Discourse, EntityCollections};
use chrono::Utc;

/// Folds `update` into `previous`, producing the next snapshot.
///
/// `current_turn` is the highest turn number among the new messages and
/// `message_count` the new extraction cursor.
#[must_use]
pub fn apply_update(
    previous: &ConversationState,
    update: &StateUpdate,
    current_turn: u32,
    message_count: usize,
    salience: &SalienceConfig,
    limits: &HistoryLimits,
) -> ConversationState {
    let now = Utc::now();
    let old = &previous.entities;
    let new = &update.entities;

    let entities = EntityCollections {
        medications: merge_entities(&old.medications, &new.medications, current_turn, salience),
        foods: merge_entities(&old.foods, &new.foods, current_turn, salience),
        measurements: merge_measurements(
            &old.measurements,
            &new.measurements,
            current_turn,
            now,
            salience.max_measurements,
        ),
        symptoms: merge_entities(&old.symptoms, &new.symptoms, current_turn, salience),
        exercises: merge_entities(&old.exercises, &new.exercises, current_turn, salience),
        medical_terms: merge_entities(
            &old.medical_terms,
            &new.medical_terms,
            current_turn,
            salience,
        ),
    };

    ConversationState {
        entities,
        discourse: merge_discourse(&previous.discourse, &update.discourse, current_turn),
        ai_outputs: merge_ai_outputs(&previous.ai_outputs, &update.ai_outputs, current_turn, limits),
        procedural: previous.procedural.clone(),
        commitments: previous.commitments.clone(),
        turn_count: previous.turn_count.max(current_turn),
        last_updated: now,
        user_id: previous.user_id.clone(),
        message_count,
    }
}

/// Merges discourse observations.
///
/// Present fields overwrite, absent fields inherit. When the topic changes
/// (compared case-insensitively), the old `current_topic` moves to
/// `previous_topic`; only one step of topic history is kept.
#[must_use]
pub fn merge_discourse(previous: &Discourse, update: &DiscourseUpdate, current_turn: u32) -> Discourse {
    let mut next = previous.clone();

    if let Some(topic) = update
        .current_topic
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        let changed = previous
            .current_topic
            .as_deref()
            .is_none_or(|old| old.to_lowercase() != topic.to_lowercase());
        if changed {
            next.previous_topic = previous.current_topic.clone();
            next.current_topic = Some(topic.to_string());
        }
    }

    if let Some(question) = &update.last_question {
        let mut question = question.clone();
        if question.turn == 0 {
            question.turn = current_turn;
        }
        next.last_question = Some(question);
    }

    if let Some(statement) = update
        .last_statement
        .as_ref()
        .filter(|s| !s.claim.trim().is_empty())
    {
        let mut statement = statement.clone();
        if statement.turn == 0 {
            statement.turn = current_turn;
        }
        next.last_statement = Some(statement);
    }

    if let Some(open) = &update.open_questions {
        next.open_questions.clone_from(open);
    }

    next
}

/// Appends new assistant outputs to each bounded history.
///
/// Entries without a turn are stamped with `current_turn`.
#[must_use]
pub fn merge_ai_outputs(
    previous: &AiOutputs,
    update: &AiOutputsUpdate,
    current_turn: u32,
    limits: &HistoryLimits,
) -> AiOutputs {
    let stamp = |turn: u32| if turn == 0 { current_turn } else { turn };

    AiOutputs {
        lists_presented: append_bounded(
            &previous.lists_presented,
            update
                .lists_presented
                .iter()
                .filter(|l| !l.items.is_empty())
                .cloned()
                .map(|mut l| {
                    l.turn = stamp(l.turn);
                    l
                }),
            limits.lists,
        ),
        recommendations: append_bounded(
            &previous.recommendations,
            update.recommendations.iter().cloned().map(|mut r| {
                r.turn = stamp(r.turn);
                r
            }),
            limits.recommendations,
        ),
        procedures_explained: append_bounded(
            &previous.procedures_explained,
            update.procedures_explained.iter().cloned().map(|mut p| {
                p.turn = stamp(p.turn);
                p
            }),
            limits.procedures,
        ),
        examples: append_bounded(
            &previous.examples,
            update.examples.iter().cloned().map(|mut e| {
                e.turn = stamp(e.turn);
                e
            }),
            limits.examples,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LastQuestion, PresentedList, Recommendation, Speaker};

    fn food_update(name: &str) -> StateUpdate {
        StateUpdate {
            entities: EntityUpdate {
                foods: vec![RawMention::new(name, Speaker::User)],
                ..EntityUpdate::default()
            },
            ..StateUpdate::default()
        }
    }

    #[test]
    fn test_eleven_food_mentions_keep_ten_most_salient() {
        let salience = SalienceConfig::default();
        let limits = HistoryLimits::default();
        let mut state = ConversationState::default();

        for turn in 1..=11_u32 {
            let update = food_update(&format!("yemek-{turn}"));
            state = apply_update(&state, &update, turn, turn as usize * 2, &salience, &limits);
        }

        let foods = &state.entities.foods;
        assert_eq!(foods.len(), 10);
        assert_eq!(foods[0].name, "yemek-11");
        assert!(foods.iter().all(|f| f.name != "yemek-1"));
        assert!(foods.windows(2).all(|w| w[0].salience >= w[1].salience));
    }

    #[test]
    fn test_apply_update_carries_passthrough_fields() {
        let mut previous = ConversationState::for_user("u-7");
        previous.procedural = serde_json::json!({"step": 2});
        previous.turn_count = 9;

        let next = apply_update(
            &previous,
            &StateUpdate::default(),
            4,
            12,
            &SalienceConfig::default(),
            &HistoryLimits::default(),
        );

        assert_eq!(next.procedural, previous.procedural);
        assert_eq!(next.user_id.as_deref(), Some("u-7"));
        assert_eq!(next.turn_count, 9);
        assert_eq!(next.message_count, 12);
    }

    #[test]
    fn test_topic_shift_is_one_step() {
        let mut discourse = Discourse::default();
        for topic in ["kahvaltı", "egzersiz", "uyku"] {
            let update = DiscourseUpdate {
                current_topic: Some(topic.to_string()),
                ..DiscourseUpdate::default()
            };
            discourse = merge_discourse(&discourse, &update, 1);
        }

        assert_eq!(discourse.current_topic.as_deref(), Some("uyku"));
        assert_eq!(discourse.previous_topic.as_deref(), Some("egzersiz"));
    }

    #[test]
    fn test_same_topic_does_not_shift() {
        let discourse = Discourse {
            current_topic: Some("Kahvaltı".to_string()),
            previous_topic: Some("uyku".to_string()),
            ..Discourse::default()
        };
        let update = DiscourseUpdate {
            current_topic: Some("kahvaltı".to_string()),
            ..DiscourseUpdate::default()
        };

        let next = merge_discourse(&discourse, &update, 2);

        assert_eq!(next.previous_topic.as_deref(), Some("uyku"));
    }

    #[test]
    fn test_absent_discourse_fields_inherit() {
        let discourse = Discourse {
            last_question: Some(LastQuestion {
                question_type: "what".to_string(),
                subject: "kahvaltı".to_string(),
                verb: "ne yemeli".to_string(),
                turn: 1,
            }),
            ..Discourse::default()
        };

        let next = merge_discourse(&discourse, &DiscourseUpdate::default(), 3);

        assert_eq!(next, discourse);
    }

    #[test]
    fn test_ai_outputs_are_bounded_and_stamped() {
        let limits = HistoryLimits::default();
        let mut outputs = AiOutputs::default();

        for turn in 1..=7 {
            let update = AiOutputsUpdate {
                lists_presented: vec![PresentedList {
                    title: format!("liste {turn}"),
                    items: vec!["a".to_string()],
                    turn: 0,
                }],
                recommendations: vec![Recommendation {
                    content: format!("öneri {turn}"),
                    turn: 0,
                }],
                ..AiOutputsUpdate::default()
            };
            outputs = merge_ai_outputs(&outputs, &update, turn, &limits);
        }

        assert_eq!(outputs.lists_presented.len(), 5);
        assert_eq!(outputs.recommendations.len(), 5);
        assert_eq!(outputs.lists_presented[0].title, "liste 3");
        assert_eq!(outputs.recommendations[4].turn, 7);
    }

    #[test]
    fn test_empty_lists_are_ignored() {
        let update = AiOutputsUpdate {
            lists_presented: vec![PresentedList {
                title: "boş".to_string(),
                items: vec![],
                turn: 2,
            }],
            ..AiOutputsUpdate::default()
        };

        let outputs = merge_ai_outputs(&AiOutputs::default(), &update, 2, &HistoryLimits::default());

        assert!(outputs.lists_presented.is_empty());
    }
}
