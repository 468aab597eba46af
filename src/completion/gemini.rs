//! Gemini-shaped completion client

use super::{CompletionError, CompletionService};
use crate::config::CompletionConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Completion service speaking the `generateContent` wire format
pub struct GeminiCompletion {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    cookie: Option<String>,
}

impl GeminiCompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            cookie: config.cookie.clone(),
        })
    }

    fn build_request(utterance: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(utterance.to_string()),
                }],
            }],
        }
    }

    fn extract_text(resp: GeminiResponse) -> Result<String, CompletionError> {
        resp.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| {
                CompletionError::shape("Response missing candidates[0].content.parts[0].text")
            })
    }
}

#[async_trait]
impl CompletionService for GeminiCompletion {
    async fn complete(&self, utterance: &str) -> Result<String, CompletionError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("apiKey", key);
        }
        if let Some(cookie) = &self.cookie {
            request = request.header("Cookie", cookie);
        }

        let response = request
            .json(&Self::build_request(utterance))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::timeout(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    CompletionError::network(format!("Connection failed: {e}"))
                } else {
                    CompletionError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::status(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                CompletionError::timeout(format!("Request timeout: {e}"))
            } else {
                CompletionError::network(format!("Failed to read response: {e}"))
            }
        })?;

        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::shape(format!("Failed to parse response: {e}")))?;

        Self::extract_text(parsed)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}
