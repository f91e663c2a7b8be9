//! Conversation state: entities, discourse, and assistant output memory.
//!
//! One [`ConversationState`] exists per session. It is replaced wholesale
//! after every turn by the extractor and read by the resolver. All fields
//! serialize to JSON with camelCase names; timestamps are ISO-8601 strings.

use super::Speaker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known values of [`Measurement::kind`].
pub mod measurement_kinds {
    /// Blood glucose reading in mg/dL.
    pub const BLOOD_GLUCOSE: &str = "blood_glucose";
    /// Glycated hemoglobin in percent.
    pub const A1C: &str = "a1c";
}

/// A mentioned entity with a decaying salience score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMention {
    /// Surface name as mentioned. Merging is keyed on the lowercased name.
    pub name: String,
    /// Turn of the most recent mention.
    pub mentioned_turn: u32,
    /// Who mentioned it most recently.
    #[serde(default)]
    pub mentioned_by: Speaker,
    /// Relevance score in `[0, 1]`.
    pub salience: f32,
}

/// A numeric health reading. Measurements are a bounded log, not ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Reading type, see [`measurement_kinds`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Numeric value.
    pub value: f64,
    /// Unit of `value`.
    #[serde(default)]
    pub unit: String,
    /// When the reading was folded into state.
    pub timestamp: DateTime<Utc>,
    /// Turn the reading was mentioned in.
    pub turn: u32,
}

impl Measurement {
    /// Renders the reading as `"<type>: <value> <unit>"`.
    #[must_use]
    pub fn describe(&self) -> String {
        let unit = if self.unit.is_empty() {
            String::new()
        } else {
            format!(" {}", self.unit)
        };
        format!("{}: {}{unit}", self.kind, self.value)
    }
}

/// The five salience-ranked entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// `entities.medications`
    Medication,
    /// `entities.foods`
    Food,
    /// `entities.symptoms`
    Symptom,
    /// `entities.exercises`
    Exercise,
    /// `entities.medicalTerms`
    MedicalTerm,
}

impl EntityKind {
    /// All ranked kinds, in pooling order.
    pub const ALL: [Self; 5] = [
        Self::Medication,
        Self::Food,
        Self::Symptom,
        Self::Exercise,
        Self::MedicalTerm,
    ];

    /// Returns the JSON field name of the collection.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Medication => "medications",
            Self::Food => "foods",
            Self::Symptom => "symptoms",
            Self::Exercise => "exercises",
            Self::MedicalTerm => "medicalTerms",
        }
    }
}

/// The six entity collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityCollections {
    /// Medications mentioned.
    pub medications: Vec<EntityMention>,
    /// Foods and meals mentioned.
    pub foods: Vec<EntityMention>,
    /// Recent measurement log.
    pub measurements: Vec<Measurement>,
    /// Symptoms mentioned.
    pub symptoms: Vec<EntityMention>,
    /// Exercises mentioned.
    pub exercises: Vec<EntityMention>,
    /// Medical terms mentioned.
    pub medical_terms: Vec<EntityMention>,
}

impl EntityCollections {
    /// Returns the collection for `kind`.
    #[must_use]
    pub fn get(&self, kind: EntityKind) -> &[EntityMention] {
        match kind {
            EntityKind::Medication => &self.medications,
            EntityKind::Food => &self.foods,
            EntityKind::Symptom => &self.symptoms,
            EntityKind::Exercise => &self.exercises,
            EntityKind::MedicalTerm => &self.medical_terms,
        }
    }

    /// Iterates over every ranked entity across all five collections.
    pub fn iter_ranked(&self) -> impl Iterator<Item = &EntityMention> {
        EntityKind::ALL.into_iter().flat_map(|kind| self.get(kind))
    }

    /// Returns whether no entity and no measurement is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty() && self.iter_ranked().next().is_none()
    }
}

/// The last question the user asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastQuestion {
    /// Question type as labeled by the extractor ("what", "quantity", ...).
    #[serde(rename = "type", default)]
    pub question_type: String,
    /// What the question was about ("kahvaltı").
    #[serde(default)]
    pub subject: String,
    /// The predicate of the question ("ne yemeli").
    #[serde(default)]
    pub verb: String,
    /// Turn the question was asked in.
    #[serde(default)]
    pub turn: u32,
}

/// The last claim made by either party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastStatement {
    /// The claim, paraphrased.
    pub claim: String,
    /// Who made the claim.
    #[serde(default)]
    pub by: Speaker,
    /// Turn the claim was made in.
    #[serde(default)]
    pub turn: u32,
}

/// Topic continuity and the most recent question/claim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Discourse {
    /// Topic of the latest turn.
    pub current_topic: Option<String>,
    /// Topic before `current_topic` changed. One step of history only.
    pub previous_topic: Option<String>,
    /// Last user question.
    pub last_question: Option<LastQuestion>,
    /// Last claim.
    pub last_statement: Option<LastStatement>,
    /// Questions raised but not yet answered.
    pub open_questions: Vec<String>,
}

/// A list the assistant presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentedList {
    /// What the list was about.
    #[serde(default)]
    pub title: String,
    /// Items in presentation order.
    #[serde(default)]
    pub items: Vec<String>,
    /// Turn the list was presented in.
    #[serde(default)]
    pub turn: u32,
}

/// A recommendation the assistant made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// The recommendation text.
    pub content: String,
    /// Turn the recommendation was made in.
    #[serde(default)]
    pub turn: u32,
}

/// A procedure the assistant explained step by step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    /// Name of the procedure.
    pub name: String,
    /// Steps in order.
    #[serde(default)]
    pub steps: Vec<String>,
    /// Turn the procedure was explained in.
    #[serde(default)]
    pub turn: u32,
}

/// An example the assistant gave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleOutput {
    /// The example text.
    pub content: String,
    /// Turn the example was given in.
    #[serde(default)]
    pub turn: u32,
}

/// Bounded, insertion-ordered memory of assistant outputs (oldest first).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiOutputs {
    /// Lists presented.
    pub lists_presented: Vec<PresentedList>,
    /// Recommendations made.
    pub recommendations: Vec<Recommendation>,
    /// Procedures explained.
    pub procedures_explained: Vec<Procedure>,
    /// Examples given.
    pub examples: Vec<ExampleOutput>,
}

/// Structured model of what has been discussed in one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationState {
    /// Mentioned entities and measurements.
    pub entities: EntityCollections,
    /// Discourse state.
    pub discourse: Discourse,
    /// Assistant output memory.
    pub ai_outputs: AiOutputs,
    /// Carried over unchanged.
    pub procedural: serde_json::Value,
    /// Carried over unchanged.
    pub commitments: serde_json::Value,
    /// Highest turn folded into this state.
    pub turn_count: u32,
    /// When this snapshot was produced.
    pub last_updated: DateTime<Utc>,
    /// Owner of the session, if known.
    pub user_id: Option<String>,
    /// Number of history messages already folded in (extraction cursor).
    pub message_count: usize,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            entities: EntityCollections::default(),
            discourse: Discourse::default(),
            ai_outputs: AiOutputs::default(),
            procedural: serde_json::Value::Object(serde_json::Map::new()),
            commitments: serde_json::Value::Object(serde_json::Map::new()),
            turn_count: 0,
            last_updated: Utc::now(),
            user_id: None,
            message_count: 0,
        }
    }
}

impl ConversationState {
    /// Creates an empty state for a user.
    #[must_use]
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Returns the entity with the highest salience across all ranked collections.
    ///
    /// Collections are pooled, not compared per category. On equal salience
    /// the entity found first (medications, foods, symptoms, exercises,
    /// medical terms) wins.
    #[must_use]
    pub fn most_salient_entity(&self) -> Option<&EntityMention> {
        self.entities
            .iter_ranked()
            .fold(None, |best: Option<&EntityMention>, entity| match best {
                Some(b) if b.salience >= entity.salience => Some(b),
                _ => Some(entity),
            })
    }

    /// Returns the `n` most salient entities pooled from `kinds`, highest first.
    #[must_use]
    pub fn top_entities(&self, kinds: &[EntityKind], n: usize) -> Vec<&EntityMention> {
        let mut pooled: Vec<&EntityMention> = kinds
            .iter()
            .flat_map(|kind| self.entities.get(*kind))
            .collect();
        pooled.sort_by(|a, b| b.salience.total_cmp(&a.salience));
        pooled.truncate(n);
        pooled
    }

    /// Returns the most recently recorded measurement.
    #[must_use]
    pub fn latest_measurement(&self) -> Option<&Measurement> {
        self.entities.measurements.last()
    }

    /// Returns the most recently presented list.
    #[must_use]
    pub fn latest_list(&self) -> Option<&PresentedList> {
        self.ai_outputs.lists_presented.last()
    }

    /// Returns the most recent recommendation.
    #[must_use]
    pub fn latest_recommendation(&self) -> Option<&Recommendation> {
        self.ai_outputs.recommendations.last()
    }
}
