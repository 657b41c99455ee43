use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, time::Duration};

use crate::error::AttemptFailure;

/// One call to a generative-text model.
#[async_trait]
pub trait TextGenerator: Send + Sync + Debug {
    /// False when the generator has no credentials and every call would fail.
    fn is_configured(&self) -> bool {
        true
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, AttemptFailure>;
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Gemini `generateContent` over REST.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(8),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, AttemptFailure> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AttemptFailure::Transport("no Gemini API key configured".to_string()))?;

        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        let request = GeminiRequest { contents: [Content { parts: [Part { text: prompt }] }] };

        let response = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            // The URL carries the key.
            .map_err(|e| AttemptFailure::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::from_status(status.as_u16()));
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AttemptFailure::Malformed(e.without_url().to_string()))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| AttemptFailure::Malformed("no text in first candidate".to_string()))
    }
}
