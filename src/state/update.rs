//! Observations extracted from new messages, before merging.
//!
//! Both extraction paths (LLM and pattern fallback) produce a
//! [`StateUpdate`]; [`super::apply_update`] folds it into the previous state.
//! The LLM path deserializes these types directly from model output, so every
//! field is optional and tolerant of common shape variations.

use crate::models::{
    ExampleOutput, LastQuestion, LastStatement, PresentedList, Procedure, Recommendation, Speaker,
};
use serde::Deserialize;

/// A raw entity mention.
///
/// Accepts either a bare string (`"metformin"`) or an object
/// (`{"name": "metformin", "mentionedBy": "user", "salience": 0.9}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawMentionRepr")]
pub struct RawMention {
    /// Surface name.
    pub name: String,
    /// Who mentioned it, if known.
    pub mentioned_by: Option<Speaker>,
    /// Stated salience; the configured default applies when absent.
    pub salience: Option<f32>,
}

impl RawMention {
    /// Creates a mention with no stated salience.
    #[must_use]
    pub fn new(name: impl Into<String>, mentioned_by: Speaker) -> Self {
        Self {
            name: name.into(),
            mentioned_by: Some(mentioned_by),
            salience: None,
        }
    }

    /// Sets the stated salience.
    #[must_use]
    pub const fn with_salience(mut self, salience: f32) -> Self {
        self.salience = Some(salience);
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMentionRepr {
    Name(String),
    Detailed(DetailedMention),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailedMention {
    name: String,
    #[serde(default, alias = "by", alias = "mentioned_by")]
    mentioned_by: Option<Speaker>,
    #[serde(default)]
    salience: Option<f32>,
}

impl From<RawMentionRepr> for RawMention {
    fn from(repr: RawMentionRepr) -> Self {
        match repr {
            RawMentionRepr::Name(name) => Self {
                name,
                mentioned_by: None,
                salience: None,
            },
            RawMentionRepr::Detailed(d) => Self {
                name: d.name,
                mentioned_by: d.mentioned_by,
                salience: d.salience,
            },
        }
    }
}

/// A raw measurement observation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeasurement {
    /// Reading type.
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    /// Numeric value.
    pub value: f64,
    /// Unit, if stated.
    #[serde(default)]
    pub unit: Option<String>,
}

/// Entity observations grouped by collection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityUpdate {
    /// Medications.
    pub medications: Vec<RawMention>,
    /// Foods.
    pub foods: Vec<RawMention>,
    /// Measurements.
    pub measurements: Vec<RawMeasurement>,
    /// Symptoms.
    pub symptoms: Vec<RawMention>,
    /// Exercises.
    pub exercises: Vec<RawMention>,
    /// Medical terms.
    #[serde(alias = "medical_terms")]
    pub medical_terms: Vec<RawMention>,
}

impl EntityUpdate {
    /// Returns whether nothing was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.medications.is_empty()
            && self.foods.is_empty()
            && self.measurements.is_empty()
            && self.symptoms.is_empty()
            && self.exercises.is_empty()
            && self.medical_terms.is_empty()
    }
}

/// Discourse observations. Absent fields inherit from the previous state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscourseUpdate {
    /// Topic of the new turn.
    pub current_topic: Option<String>,
    /// Last user question in the new messages.
    pub last_question: Option<LastQuestion>,
    /// Last claim in the new messages.
    pub last_statement: Option<LastStatement>,
    /// Open questions, replacing the previous set when present.
    pub open_questions: Option<Vec<String>>,
}

/// Assistant outputs observed in the new messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiOutputsUpdate {
    /// Lists presented.
    pub lists_presented: Vec<PresentedList>,
    /// Recommendations made.
    pub recommendations: Vec<Recommendation>,
    /// Procedures explained.
    pub procedures_explained: Vec<Procedure>,
    /// Examples given.
    pub examples: Vec<ExampleOutput>,
}

/// Everything observed in one batch of new messages.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateUpdate {
    /// Entity observations.
    pub entities: EntityUpdate,
    /// Discourse observations.
    pub discourse: DiscourseUpdate,
    /// Assistant output observations.
    pub ai_outputs: AiOutputsUpdate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_mention_accepts_string_and_object() {
        let mentions: Vec<RawMention> = serde_json::from_str(
            r#"["metformin", {"name": "insülin", "mentionedBy": "ai", "salience": 0.8}]"#,
        )
        .unwrap();

        assert_eq!(mentions[0].name, "metformin");
        assert_eq!(mentions[0].mentioned_by, None);
        assert_eq!(mentions[1].mentioned_by, Some(Speaker::Assistant));
        assert_eq!(mentions[1].salience, Some(0.8));
    }

    #[test]
    fn test_state_update_partial_document() {
        let update: StateUpdate = serde_json::from_str(
            r#"{
                "entities": {"foods": ["pilav"], "measurements": [{"type": "blood_glucose", "value": 180}]},
                "discourse": {"currentTopic": "akşam yemeği"}
            }"#,
        )
        .unwrap();

        assert_eq!(update.entities.foods.len(), 1);
        assert!((update.entities.measurements[0].value - 180.0).abs() < f64::EPSILON);
        assert_eq!(
            update.discourse.current_topic.as_deref(),
            Some("akşam yemeği")
        );
        assert!(update.discourse.open_questions.is_none());
        assert!(update.ai_outputs.recommendations.is_empty());
    }
}
