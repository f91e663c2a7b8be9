//! Reference detection and resolution types.
//!
//! - [`ReferenceType`]: the linguistic category of a detected reference
//! - [`StateLayer`]: the section of conversation state a resolution reads
//! - [`DetectedReference`]: one detector match, ephemeral per turn
//! - [`ResolvedReference`]: one resolved antecedent plus generator guidance

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Categories of reference the detector recognizes.
///
/// Categories are not mutually exclusive: a single utterance can produce
/// several detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Nothing matched. Always emitted alone.
    #[default]
    None,
    /// "ya akşam?", "ne kadar?", "olur mu?" - words omitted from a prior question.
    Ellipsis,
    /// "onu", "onun", "bu ilaç" - pronoun or demonstrative without antecedent.
    Definite,
    /// "daha fazla", "arasındaki fark", "diğerleri".
    Comparative,
    /// "daha önce", "sonra", "hala".
    Temporal,
    /// Sentence-initial "peki", "tamam", "o zaman".
    DiscourseMarker,
    /// "ilki", "önerdiğin" - something the assistant said or listed.
    AiOutput,
    /// "iyi mi", "zararlı mı".
    Evaluation,
    /// "neden?", "ne yüzünden".
    Causality,
    /// "gerekli mi", "yasak mı".
    Modal,
    /// "nasıl?", "adım adım".
    Process,
    /// "hatırlıyor musun".
    MemoryRecall,
}

impl ReferenceType {
    /// Returns the string representation used in serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Ellipsis => "ellipsis",
            Self::Definite => "definite",
            Self::Comparative => "comparative",
            Self::Temporal => "temporal",
            Self::DiscourseMarker => "discourse_marker",
            Self::AiOutput => "ai_output",
            Self::Evaluation => "evaluation",
            Self::Causality => "causality",
            Self::Modal => "modal",
            Self::Process => "process",
            Self::MemoryRecall => "memory_recall",
        }
    }

    /// State sections a resolver needs to disambiguate this category.
    #[must_use]
    pub fn required_layers(&self) -> BTreeSet<StateLayer> {
        let layers: &[StateLayer] = match self {
            Self::None => &[],
            Self::Ellipsis | Self::Causality | Self::DiscourseMarker | Self::Process => {
                &[StateLayer::Discourse]
            },
            Self::Definite | Self::Evaluation | Self::Comparative => &[StateLayer::Entities],
            Self::Temporal | Self::Modal => &[StateLayer::Discourse, StateLayer::Entities],
            Self::AiOutput => &[StateLayer::AiOutputs],
            Self::MemoryRecall => &[
                StateLayer::Entities,
                StateLayer::Discourse,
                StateLayer::AiOutputs,
            ],
        };
        layers.iter().copied().collect()
    }
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A section of [`ConversationState`](super::ConversationState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateLayer {
    /// `entities`, including measurements.
    Entities,
    /// `discourse`.
    Discourse,
    /// `aiOutputs`.
    AiOutputs,
    /// The current utterance itself (no stored antecedent).
    Message,
}

impl StateLayer {
    /// Returns the string representation used in serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entities => "entities",
            Self::Discourse => "discourse",
            Self::AiOutputs => "aiOutputs",
            Self::Message => "message",
        }
    }
}

impl std::fmt::Display for StateLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One detector match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedReference {
    /// Category of the match.
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
    /// The matched text (empty for [`ReferenceType::None`]).
    pub pattern: String,
    /// State sections needed to resolve this match.
    pub requires_layers: BTreeSet<StateLayer>,
    /// Detector confidence (0.0 to 1.0).
    pub confidence: f32,
}

impl DetectedReference {
    /// Creates a detection whose layer requirements come from its category.
    #[must_use]
    pub fn new(reference_type: ReferenceType, pattern: impl Into<String>, confidence: f32) -> Self {
        Self {
            reference_type,
            pattern: pattern.into(),
            requires_layers: reference_type.required_layers(),
            confidence,
        }
    }

    /// The sentinel returned when nothing matched.
    #[must_use]
    pub fn none() -> Self {
        Self::new(ReferenceType::None, String::new(), 1.0)
    }

    /// Returns whether this is the "nothing matched" sentinel.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.reference_type == ReferenceType::None
    }
}

/// A detected reference bound to an antecedent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedReference {
    /// Category of the detection this resolves.
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
    /// The matched text from the utterance.
    pub original_pattern: String,
    /// The antecedent or restored full form.
    pub resolved_to: String,
    /// Instruction for the generator describing the resolution.
    pub context_guidance: String,
    /// Which state section supplied the resolution.
    pub source_layer: StateLayer,
}
