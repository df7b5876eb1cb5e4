//! Image collaborator - HTTP client for the backend image endpoint.

use async_trait::async_trait;
use canvas_core::{CanvasError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of one image-generation task.
///
/// Failure and a `null` URL are the same outcome: the node stays imageless
/// and the renderer falls back to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// An image URL (or base64 data URL) was produced.
    Generated(String),
    /// No image could be produced.
    Unavailable,
}

/// The remote image-generation collaborator.
#[async_trait]
pub trait ImageAgent: Send + Sync {
    /// Generates an image for the given visual keyword.
    async fn generate(&self, keyword: &str) -> ImageOutcome;
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    keyword: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    image_url: Option<String>,
}

/// Agent implementation that talks to the backend image API.
#[derive(Clone)]
pub struct HttpImageAgent {
    client: Client,
    base_url: String,
}

impl HttpImageAgent {
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

    async fn send_request(&self, keyword: &str) -> std::result::Result<Option<String>, String> {
        let url = format!("{}/api/generate-image", self.base_url);

        let response = self
            .client
            .post(url)
            .json(&ImageRequest { keyword })
            .send()
            .await
            .map_err(|err| format!("image request failed: {err}"))?;

        if !response.status().is_success() {
            return Err(format!("image request returned {}", response.status()));
        }

        let parsed: ImageResponse = response
            .json()
            .await
            .map_err(|err| format!("failed to parse image response: {err}"))?;

        Ok(parsed.image_url)
    }
}

#[async_trait]
impl ImageAgent for HttpImageAgent {
    async fn generate(&self, keyword: &str) -> ImageOutcome {
        match self.send_request(keyword).await {
            Ok(Some(url)) => ImageOutcome::Generated(url),
            Ok(None) => ImageOutcome::Unavailable,
            Err(message) => {
                tracing::warn!(%message, keyword, "image generation skipped");
                ImageOutcome::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_url_parses_to_none() {
        let parsed: ImageResponse = serde_json::from_str(r#"{"imageUrl": null}"#).unwrap();
        assert_eq!(parsed.image_url, None);

        let parsed: ImageResponse =
            serde_json::from_str(r#"{"imageUrl": "data:image/png;base64,AAAA"}"#).unwrap();
        assert!(parsed.image_url.is_some());
    }
}
