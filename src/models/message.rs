//! Chat messages as seen by the engine.

use serde::{Deserialize, Serialize};

/// Who produced a message or mentioned an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The end user.
    #[default]
    User,
    /// The assistant (the downstream generator).
    #[serde(alias = "ai", alias = "model", alias = "bot")]
    Assistant,
}

impl Speaker {
    /// Parses a role string, accepting the aliases generators commonly emit.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" | "human" => Some(Self::User),
            "assistant" | "ai" | "model" | "bot" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Returns the string representation used in serialization.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One message of the ordered conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Author of the message.
    pub role: Speaker,
    /// Raw message text.
    pub content: String,
    /// Conversation turn the message belongs to.
    pub turn_number: u32,
}

impl ChatMessage {
    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>, turn_number: u32) -> Self {
        Self {
            role: Speaker::User,
            content: content.into(),
            turn_number,
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>, turn_number: u32) -> Self {
        Self {
            role: Speaker::Assistant,
            content: content.into(),
            turn_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_parse_aliases() {
        assert_eq!(Speaker::parse("user"), Some(Speaker::User));
        assert_eq!(Speaker::parse("AI"), Some(Speaker::Assistant));
        assert_eq!(Speaker::parse("model"), Some(Speaker::Assistant));
        assert_eq!(Speaker::parse("system"), None);
    }

    #[test]
    fn test_message_json_shape() {
        let msg = ChatMessage::assistant("Metformin yemekle alınır.", 3);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["turnNumber"], 3);

        let parsed: ChatMessage =
            serde_json::from_str(r#"{"role":"ai","content":"x","turnNumber":2}"#).unwrap();
        assert_eq!(parsed.role, Speaker::Assistant);
    }
}
