//! Reasoning collaborator - HTTP client for the backend chat endpoint.
//!
//! The backend wraps the actual language model; this side only speaks the
//! JSON contract. A transport or parse failure never propagates: the agent
//! substitutes [`AiResponse::fallback`] so the interaction loop stays alive.

use async_trait::async_trait;
use canvas_core::chat::ProfilingOption;
use canvas_core::mood::{Language, Mood};
use canvas_core::{CanvasError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outbound request timeout. The duration is a free parameter, not part of
/// the backend contract; a timeout lands on the fallback path.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat response substituted when the backend is unreachable.
const FALLBACK_CHAT_RESPONSE: &str =
    "I'm having trouble accessing the case files right now. Let's try that again.";

/// One prior chat turn, role and content only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// A selected node handed to the backend as conversation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextNode {
    pub title: String,
    pub insight: String,
}

/// Request body for the chat endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningRequest {
    pub user_prompt: String,
    pub chat_history: Vec<ChatTurn>,
    pub language: Language,
    pub context_nodes: Vec<ContextNode>,
}

/// The visualization block of a reasoning response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    pub should_create_node: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub insight: String,
    #[serde(default)]
    pub visual_keyword: String,
    #[serde(default)]
    pub connection_label: Option<String>,
}

/// A full reasoning response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    pub chat_response: String,
    pub visualization: Visualization,
    #[serde(default)]
    pub profiling_options: Option<Vec<ProfilingOption>>,
    #[serde(default)]
    pub options_header: Option<String>,
    pub soundtrack_mood: Mood,
}

impl AiResponse {
    /// Safe default response: apologetic text, empty visualization, and a
    /// tense soundtrack. Substituted on transport/parse failure.
    pub fn fallback() -> Self {
        Self {
            chat_response: FALLBACK_CHAT_RESPONSE.to_string(),
            visualization: Visualization::default(),
            profiling_options: None,
            options_header: None,
            soundtrack_mood: Mood::Tension,
        }
    }
}

/// The remote reasoning collaborator.
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// Processes one user interaction.
    ///
    /// # Errors
    ///
    /// Implementations backed by the HTTP endpoint do not fail on transport
    /// problems (they return the fallback response); an `Err` is reserved
    /// for implementations with genuinely unrecoverable local failures.
    async fn process(&self, request: ReasoningRequest) -> Result<AiResponse>;
}

/// Agent implementation that talks to the backend chat API.
#[derive(Clone)]
pub struct HttpReasoningAgent {
    client: Client,
    base_url: String,
}

impl HttpReasoningAgent {
    /// Creates a new agent against the given backend base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CanvasError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn send_request(&self, request: &ReasoningRequest) -> std::result::Result<AiResponse, String> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| format!("chat request failed: {err}"))?;

        if !response.status().is_success() {
            return Err(format!("chat request returned {}", response.status()));
        }

        response
            .json::<AiResponse>()
            .await
            .map_err(|err| format!("failed to parse chat response: {err}"))
    }
}

#[async_trait]
impl ReasoningAgent for HttpReasoningAgent {
    async fn process(&self, request: ReasoningRequest) -> Result<AiResponse> {
        match self.send_request(&request).await {
            Ok(response) => Ok(response),
            Err(message) => {
                tracing::warn!(%message, "reasoning backend unavailable, using fallback response");
                Ok(AiResponse::fallback())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_safe_default() {
        let response = AiResponse::fallback();
        assert!(!response.visualization.should_create_node);
        assert_eq!(response.soundtrack_mood, Mood::Tension);
        assert!(response.profiling_options.is_none());
        assert!(!response.chat_response.is_empty());
    }

    #[test]
    fn request_serializes_to_backend_contract() {
        let request = ReasoningRequest {
            user_prompt: "Who was there?".to_string(),
            chat_history: vec![ChatTurn {
                role: "user".to_string(),
                content: "hello".to_string(),
            }],
            language: Language::En,
            context_nodes: vec![ContextNode {
                title: "The Letter".to_string(),
                insight: "Unsent".to_string(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["userPrompt"], "Who was there?");
        assert_eq!(json["chatHistory"][0]["role"], "user");
        assert_eq!(json["language"], "en");
        assert_eq!(json["contextNodes"][0]["title"], "The Letter");
    }

    #[test]
    fn response_parses_with_optional_fields_missing() {
        let json = r#"{
            "chatResponse": "A clue emerges.",
            "visualization": {
                "shouldCreateNode": true,
                "title": "Broken Watch",
                "insight": "Stopped at 3:12",
                "visualKeyword": "shattered pocket watch"
            },
            "soundtrackMood": "mystery"
        }"#;
        let response: AiResponse = serde_json::from_str(json).unwrap();
        assert!(response.visualization.should_create_node);
        assert_eq!(response.visualization.connection_label, None);
        assert_eq!(response.soundtrack_mood, Mood::Mystery);
        assert!(response.options_header.is_none());
    }
}
