//! `OpenAI` Chat Completions client.
//!
//! Requests run in JSON mode (`response_format: json_object`), so the reply
//! body is the extraction object itself. Any endpoint that implements the
//! Chat Completions API with JSON mode works.

use super::{LlmHttpConfig, LlmProvider, build_http_client, request_failed};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// `OpenAI` LLM client.
pub struct OpenAiClient {
    api_key: Option<String>,
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    /// Completion token cap for extraction-sized responses.
    const MAX_COMPLETION_TOKENS: u32 = 2048;

    /// Creates a client with the default endpoint and model.
    #[must_use]
    pub fn new(api_key: Option<String>, http: LlmHttpConfig) -> Self {
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            client: build_http_client(http),
        }
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Returns whether an API key is configured.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }

    /// JSON mode requires the word "JSON" somewhere in the messages; the
    /// extraction prompt always contains it.
    fn build_request<'a>(&'a self, system: Option<&'a str>, user: &'a str) -> JsonModeRequest<'a> {
        let messages = system
            .map(|content| Turn {
                role: "system",
                content,
            })
            .into_iter()
            .chain(std::iter::once(Turn {
                role: "user",
                content: user,
            }))
            .collect();
        JsonModeRequest {
            model: &self.model,
            messages,
            max_completion_tokens: Self::MAX_COMPLETION_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }

    async fn request(&self, system: Option<&str>, user: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| request_failed("openai_request", "OPENAI_API_KEY not set"))?;

        let response = self
            .client
            .post(self.url())
            .bearer_auth(api_key)
            .json(&self.build_request(system, user))
            .send()
            .await
            .map_err(|e| request_failed("openai_request", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(request_failed(
                "openai_request",
                format!("API returned status: {status} - {body}"),
            ));
        }

        let completion: Completion = response
            .json()
            .await
            .map_err(|e| request_failed("openai_response", e))?;
        completion.into_content()
    }
}

#[async_trait]
impl LlmProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.request(None, prompt).await
    }

    async fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.request(Some(system), user).await
    }
}

#[derive(Debug, Serialize)]
struct JsonModeRequest<'a> {
    model: &'a str,
    messages: Vec<Turn<'a>>,
    max_completion_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Turn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl Completion {
    /// Takes the first choice's content.
    ///
    /// A refusal, or a reply cut off at the token cap, cannot hold a
    /// complete JSON object and is reported as an error.
    fn into_content(self) -> Result<String> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| request_failed("openai_response", "No choices in response"))?;
        if let Some(refusal) = choice.message.refusal {
            return Err(request_failed("openai_response", format!("refused: {refusal}")));
        }
        if choice.finish_reason.as_deref() == Some("length") {
            return Err(request_failed(
                "openai_response",
                "reply truncated at the token limit",
            ));
        }
        choice
            .message
            .content
            .ok_or_else(|| request_failed("openai_response", "Empty message content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(Some("sk-test".to_string()), LlmHttpConfig::default())
    }

    #[test]
    fn test_client_configuration() {
        let client = client()
            .with_endpoint("https://llm.internal/v1/")
            .with_model("gpt-4.1-mini");

        assert_eq!(client.name(), "openai");
        assert!(client.has_api_key());
        assert_eq!(client.url(), "https://llm.internal/v1/chat/completions");
        assert_eq!(client.model, "gpt-4.1-mini");
    }

    #[test]
    fn test_request_uses_json_mode() {
        let client = client();
        let json =
            serde_json::to_value(client.build_request(Some("Return JSON."), "kullanıcı: selam"))
                .unwrap();

        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["max_completion_tokens"], 2048);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "kullanıcı: selam");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn test_request_without_system() {
        let client = client();
        let json = serde_json::to_value(client.build_request(None, "x")).unwrap();
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_completion_content() {
        let completion: Completion = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{\"entities\":{}}"}, "finish_reason": "stop"}]}"#,
        )
        .unwrap();
        assert_eq!(completion.into_content().unwrap(), "{\"entities\":{}}");
    }

    #[test]
    fn test_truncated_completion_is_an_error() {
        let completion: Completion = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "{\"entities\":"}, "finish_reason": "length"}]}"#,
        )
        .unwrap();
        assert!(completion.into_content().is_err());
    }

    #[test]
    fn test_refusal_is_an_error() {
        let completion: Completion = serde_json::from_str(
            r#"{"choices": [{"message": {"content": null, "refusal": "cannot help"}}]}"#,
        )
        .unwrap();
        let err = completion.into_content().unwrap_err();
        assert!(err.to_string().contains("cannot help"));
    }

    #[tokio::test]
    async fn test_blank_key_fails_before_sending() {
        let client = OpenAiClient::new(Some("  ".to_string()), LlmHttpConfig::default());
        assert!(!client.has_api_key());
        assert!(client.complete("merhaba").await.is_err());
    }
}
