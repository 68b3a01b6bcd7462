//! Generation service client.
//!
//! [`GeminiGeneration`] calls the Gemini `generateContent` endpoint with an
//! assembled prompt and a sampling temperature, returning the trimmed text
//! of the first candidate.

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::GeminiConfig;

/// A service that produces text for a prompt.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;
}

/// Gemini generation API client.
pub struct GeminiGeneration {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiGeneration {
    /// Build a client from configuration. Fails if `GEMINI_API_KEY` is not
    /// set in the environment.
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let api_key = crate::config::api_key()?;
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl GenerationBackend for GeminiGeneration {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = serde_json::json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ],
            "generationConfig": { "temperature": temperature },
        });

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini generation API error {}: {}", status, body);
        }

        let json: serde_json::Value = response.json().await?;
        Ok(extract_candidate_text(&json))
    }
}

/// Pull the answer text out of a `generateContent` response: all text parts
/// of the first candidate, concatenated and trimmed. A response without
/// candidates yields an empty string (the composer substitutes its canned
/// fallback).
fn extract_candidate_text(json: &serde_json::Value) -> String {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());

    let Some(parts) = parts else {
        return String::new();
    };

    let mut out = String::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
            out.push_str(text);
        }
    }

    out.trim().to_string()
}
