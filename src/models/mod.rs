//! Data models for refcontext.
//!
//! This module contains the persisted conversation state and the ephemeral
//! per-turn reference types.

mod message;
mod reference;
mod state;

pub use message::{ChatMessage, Speaker};
pub use reference::{DetectedReference, ReferenceType, ResolvedReference, StateLayer};
pub use state::{
    AiOutputs, ConversationState, Discourse, EntityCollections, EntityKind, EntityMention,
    ExampleOutput, LastQuestion, LastStatement, Measurement, PresentedList, Procedure,
    Recommendation, measurement_kinds,
};
