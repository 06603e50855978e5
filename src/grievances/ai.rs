use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::AiConfig;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI service is not configured")]
    NotConfigured,
    #[error("AI request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("AI service answered with status {0}")]
    Status(u16),
    #[error("AI response had no candidate text")]
    UnexpectedShape,
}

/// Text-completion collaborator used to draft grievance resolutions.
#[async_trait]
pub trait SolutionClient: Send + Sync {
    async fn draft_solution(&self, prompt: &str) -> Result<String, AiError>;
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(cfg: &AiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build AI http client")?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl SolutionClient for GeminiClient {
    async fn draft_solution(&self, prompt: &str) -> Result<String, AiError> {
        let key = self.api_key.as_deref().ok_or(AiError::NotConfigured)?;
        let body = json!({ "contents": [ { "parts": [ { "text": prompt } ] } ] });

        let resp = self
            .http
            .post(&self.endpoint)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AiError::Status(status.as_u16()));
        }
        let value: Value = resp.json().await?;
        let text = candidate_text(&value).ok_or(AiError::UnexpectedShape)?;
        debug!(chars = text.len(), "AI solution drafted");
        Ok(text)
    }
}

/// `candidates[0].content.parts[0].text`, if present and non-empty.
pub fn candidate_text(value: &Value) -> Option<String> {
    value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_nested_candidate_text() {
        let v = json!({
            "candidates": [
                { "content": { "parts": [ { "text": "Repair the drain." } ], "role": "model" } }
            ]
        });
        assert_eq!(candidate_text(&v).as_deref(), Some("Repair the drain."));
    }

    #[test]
    fn other_shapes_yield_nothing() {
        assert_eq!(candidate_text(&json!({})), None);
        assert_eq!(candidate_text(&json!({ "candidates": [] })), None);
        assert_eq!(candidate_text(&json!({ "error": { "code": 403 } })), None);
        assert_eq!(
            candidate_text(&json!({ "candidates": [ { "content": { "parts": [ { "text": "" } ] } } ] })),
            None
        );
    }

    #[tokio::test]
    async fn missing_api_key_is_an_error_not_a_panic() {
        let client = GeminiClient::new(&AiConfig {
            endpoint: "http://127.0.0.1:9/unused".into(),
            api_key: None,
            timeout_secs: 1,
        })
        .unwrap();
        assert!(matches!(
            client.draft_solution("anything").await,
            Err(AiError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let client = GeminiClient::new(&AiConfig {
            endpoint: "http://127.0.0.1:9/generate".into(),
            api_key: Some("k".into()),
            timeout_secs: 2,
        })
        .unwrap();
        assert!(matches!(
            client.draft_solution("anything").await,
            Err(AiError::Transport(_))
        ));
    }
}
