//! Chat log domain types.
//!
//! The chat history is append-only: messages are never mutated or removed
//! once added.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
}

/// An interactive choice the model can offer the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilingOption {
    pub id: String,
    /// Short label shown on the choice, e.g. "Drowning".
    pub label: String,
    /// Longer description, e.g. "Feeling submerged and unable to breathe".
    pub description: String,
    /// The prompt keyword used if this option is selected.
    pub visual_keyword: String,
}

/// One entry in the append-only chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    /// Present only on model turns that offer a multiple-choice follow-up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ProfilingOption>>,
    /// Dynamic label for the options section, e.g. "Select a Theory".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options_header: Option<String>,
}

impl ChatMessage {
    /// Creates a plain message with a fresh id and current timestamp.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            options: None,
            options_header: None,
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates a model message.
    pub fn model(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Model, content)
    }

    /// Attaches profiling options and their header to a model message.
    pub fn with_options(
        mut self,
        options: Option<Vec<ProfilingOption>>,
        options_header: Option<String>,
    ) -> Self {
        self.options = options;
        self.options_header = options_header;
        self
    }
}
