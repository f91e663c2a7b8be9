//! Salience decay and collection merging.
//!
//! Ranked entities decay linearly with turn distance and never drop below
//! the configured floor. A re-mention refreshes the entity to the current
//! turn. Each collection is then ranked by salience and truncated, so the
//! least salient entities fall off first.

use super::update::{RawMeasurement, RawMention};
use crate::config::SalienceConfig;
use crate::models::{EntityMention, Measurement};
use chrono::{DateTime, Utc};

/// Returns `salience` decayed from `mentioned_turn` to `current_turn`.
///
/// `max(floor, salience * (1 - distance * decay_per_turn))`, clamped so decay
/// never raises a score that already sits below the floor.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn decay_salience(
    salience: f32,
    mentioned_turn: u32,
    current_turn: u32,
    config: &SalienceConfig,
) -> f32 {
    let distance = current_turn.saturating_sub(mentioned_turn) as f32;
    let factor = distance.mul_add(-config.decay_per_turn, 1.0);
    (salience * factor).max(config.floor).min(salience)
}

/// Merges fresh mentions into an existing ranked collection.
///
/// Existing entries are decayed to `current_turn` first. A mention whose
/// lowercased name matches an entry replaces it; otherwise it is appended.
/// The result is sorted by salience (descending, newer mention first on
/// ties) and truncated to `config.max_entities`.
#[must_use]
pub fn merge_entities(
    existing: &[EntityMention],
    mentions: &[RawMention],
    current_turn: u32,
    config: &SalienceConfig,
) -> Vec<EntityMention> {
    let mut merged: Vec<EntityMention> = Vec::with_capacity(existing.len() + mentions.len());

    for entity in existing {
        let decayed = EntityMention {
            salience: decay_salience(
                entity.salience,
                entity.mentioned_turn,
                current_turn,
                config,
            ),
            ..entity.clone()
        };
        upsert(&mut merged, decayed, |old, new| new.salience > old.salience);
    }

    for mention in mentions {
        let name = mention.name.trim();
        if name.is_empty() {
            continue;
        }
        let fresh = EntityMention {
            name: name.to_string(),
            mentioned_turn: current_turn,
            mentioned_by: mention.mentioned_by.unwrap_or_default(),
            salience: mention
                .salience
                .unwrap_or(config.default_salience)
                .clamp(0.0, 1.0),
        };
        upsert(&mut merged, fresh, |_, _| true);
    }

    rank_and_truncate(&mut merged, config.max_entities);
    merged
}

/// Inserts `entity`, or replaces the same-named entry when `replace` agrees.
fn upsert(
    entities: &mut Vec<EntityMention>,
    entity: EntityMention,
    replace: impl Fn(&EntityMention, &EntityMention) -> bool,
) {
    let key = entity.name.to_lowercase();
    match entities.iter_mut().find(|e| e.name.to_lowercase() == key) {
        Some(slot) => {
            if replace(slot, &entity) {
                *slot = entity;
            }
        },
        None => entities.push(entity),
    }
}

/// Sorts by salience descending, newer mention first on ties, then truncates.
pub fn rank_and_truncate(entities: &mut Vec<EntityMention>, cap: usize) {
    entities.sort_by(|a, b| {
        b.salience
            .total_cmp(&a.salience)
            .then_with(|| b.mentioned_turn.cmp(&a.mentioned_turn))
    });
    entities.truncate(cap);
}

/// Appends new readings and keeps the most recent `cap`.
///
/// Readings with a non-finite value are dropped.
#[must_use]
pub fn merge_measurements(
    existing: &[Measurement],
    readings: &[RawMeasurement],
    current_turn: u32,
    now: DateTime<Utc>,
    cap: usize,
) -> Vec<Measurement> {
    let fresh = readings
        .iter()
        .filter(|r| r.value.is_finite() && !r.kind.trim().is_empty())
        .map(|r| Measurement {
            kind: r.kind.trim().to_string(),
            value: r.value,
            unit: r.unit.clone().unwrap_or_default(),
            timestamp: now,
            turn: current_turn,
        });
    append_bounded(existing, fresh, cap)
}

/// Appends `new` after `existing` and keeps the last `cap` items.
#[must_use]
pub fn append_bounded<T: Clone>(
    existing: &[T],
    new: impl IntoIterator<Item = T>,
    cap: usize,
) -> Vec<T> {
    let mut all: Vec<T> = existing.to_vec();
    all.extend(new);
    let overflow = all.len().saturating_sub(cap);
    all.drain(..overflow);
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Speaker;

    fn entity(name: &str, turn: u32, salience: f32) -> EntityMention {
        EntityMention {
            name: name.to_string(),
            mentioned_turn: turn,
            mentioned_by: Speaker::User,
            salience,
        }
    }

    // ============================================================================
    // Decay
    // ============================================================================

    #[test]
    fn test_decay_reaches_floor_after_seven_turns() {
        let config = SalienceConfig::default();
        let decayed = decay_salience(1.0, 1, 8, &config);
        assert!((decayed - 0.3).abs() < 1e-6, "got {decayed}");
    }

    #[test]
    fn test_decay_same_turn_is_identity() {
        let config = SalienceConfig::default();
        assert!((decay_salience(0.8, 4, 4, &config) - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decay_is_clamped_at_floor() {
        let config = SalienceConfig::default();
        assert!((decay_salience(1.0, 1, 40, &config) - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decay_never_raises_low_salience() {
        let config = SalienceConfig::default();
        assert!((decay_salience(0.2, 1, 5, &config) - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_decay_future_turn_is_identity() {
        let config = SalienceConfig::default();
        assert!((decay_salience(0.9, 10, 3, &config) - 0.9).abs() < f32::EPSILON);
    }

    // ============================================================================
    // Entity merge
    // ============================================================================

    #[test]
    fn test_remention_refreshes_salience_and_turn() {
        let config = SalienceConfig::default();
        let existing = vec![entity("metformin", 1, 1.0)];
        let mentions = vec![RawMention::new("Metformin", Speaker::User)];

        let merged = merge_entities(&existing, &mentions, 8, &config);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].mentioned_turn, 8);
        assert!((merged[0].salience - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_new_mention_is_appended_with_default_salience() {
        let config = SalienceConfig::default();
        let existing = vec![entity("metformin", 1, 1.0)];
        let mentions = vec![RawMention::new("pilav", Speaker::Assistant)];

        let merged = merge_entities(&existing, &mentions, 3, &config);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "pilav");
        assert_eq!(merged[0].mentioned_by, Speaker::Assistant);
        assert!((merged[1].salience - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_stated_salience_is_clamped() {
        let config = SalienceConfig::default();
        let mentions = vec![RawMention::new("ekmek", Speaker::User).with_salience(3.0)];

        let merged = merge_entities(&[], &mentions, 1, &config);

        assert!((merged[0].salience - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_blank_names_are_skipped() {
        let config = SalienceConfig::default();
        let mentions = vec![RawMention::new("  ", Speaker::User)];
        assert!(merge_entities(&[], &mentions, 1, &config).is_empty());
    }

    #[test]
    fn test_duplicate_existing_names_collapse_to_highest() {
        let config = SalienceConfig::default();
        let existing = vec![entity("Insülin", 5, 0.9), entity("insülin", 5, 0.5)];

        let merged = merge_entities(&existing, &[], 5, &config);

        assert_eq!(merged.len(), 1);
        assert!((merged[0].salience - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_cap_evicts_least_salient() {
        let config = SalienceConfig::default();
        let existing: Vec<_> = (0..10)
            .map(|i| entity(&format!("food-{i}"), 1, 0.5 + 0.01 * i as f32))
            .collect();
        let mentions = vec![RawMention::new("new", Speaker::User)];

        let merged = merge_entities(&existing, &mentions, 1, &config);

        assert_eq!(merged.len(), 10);
        assert_eq!(merged[0].name, "new");
        assert!(merged.iter().all(|e| e.name != "food-0"));
    }

    #[test]
    fn test_ties_keep_newer_mention_first() {
        let mut entities = vec![entity("eski", 1, 0.3), entity("yeni", 6, 0.3)];
        rank_and_truncate(&mut entities, 10);
        assert_eq!(entities[0].name, "yeni");
    }

    // ============================================================================
    // Bounded logs
    // ============================================================================

    #[test]
    fn test_append_bounded_drops_oldest() {
        let result = append_bounded(&[1, 2, 3, 4], vec![5, 6], 5);
        assert_eq!(result, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_append_bounded_under_cap() {
        let result = append_bounded(&[1], vec![2], 5);
        assert_eq!(result, vec![1, 2]);
    }

    #[test]
    fn test_merge_measurements_keeps_recent_and_stamps_turn() {
        let now = Utc::now();
        let readings = vec![
            RawMeasurement {
                kind: "blood_glucose".to_string(),
                value: 180.0,
                unit: Some("mg/dL".to_string()),
            },
            RawMeasurement {
                kind: "a1c".to_string(),
                value: f64::NAN,
                unit: None,
            },
        ];

        let merged = merge_measurements(&[], &readings, 4, now, 10);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].turn, 4);
        assert_eq!(merged[0].unit, "mg/dL");
    }
}
