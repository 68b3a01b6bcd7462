//! Embedding service client and resilient batch embedding.
//!
//! [`GeminiEmbeddings`] talks to the Gemini embedding endpoints:
//! `batchEmbedContents` for ingestion batches and `embedContent` for the
//! latency-sensitive single-query path. [`BatchEmbedder`] wraps any
//! [`EmbeddingBackend`] with sub-batching, bounded retry with exponential
//! backoff, and inter-call pacing.
//!
//! Failure is all-or-nothing at the `embed` call level: once a batch
//! exhausts its retries the whole call fails and vectors from earlier
//! batches are discarded. Callers needing partial-result recovery must
//! checkpoint at the batch boundary themselves.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::{EmbeddingConfig, GeminiConfig};
use crate::retry::{retry, RetryPolicy, Sleeper};

/// A service that turns texts into fixed-dimension vectors, one per input,
/// in input order.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts in one external call.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>>;
}

/// Batch embedding exhausted its retries.
#[derive(Debug)]
pub struct EmbeddingFailure {
    /// Attempts made on the failing batch (initial call + retries).
    pub attempts: u32,
    /// The error from the final attempt.
    pub source: anyhow::Error,
}

impl std::fmt::Display for EmbeddingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "embedding failed after {} attempts: {}",
            self.attempts, self.source
        )
    }
}

impl std::error::Error for EmbeddingFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Splits input into batches and submits each to the backend with retry,
/// backoff, and pacing.
pub struct BatchEmbedder<'a> {
    backend: &'a dyn EmbeddingBackend,
    sleeper: &'a dyn Sleeper,
    batch_size: usize,
    policy: RetryPolicy,
    per_call_sleep: Duration,
}

impl<'a> BatchEmbedder<'a> {
    pub fn new(
        backend: &'a dyn EmbeddingBackend,
        sleeper: &'a dyn Sleeper,
        config: &EmbeddingConfig,
    ) -> Self {
        Self {
            backend,
            sleeper,
            batch_size: config.batch_size,
            policy: RetryPolicy::new(config.max_retries, config.base_sleep()),
            per_call_sleep: config.per_call_sleep(),
        }
    }

    /// Embed all `texts`, returning one vector per input in input order.
    ///
    /// Empty input returns an empty vector without touching the backend.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingFailure> {
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        if texts.is_empty() {
            return Ok(vectors);
        }

        for batch in texts.chunks(self.batch_size) {
            let backend = self.backend;
            let batch_vectors = retry(&self.policy, self.sleeper, move || async move {
                let vecs = backend.embed_batch(batch).await?;
                if vecs.len() != batch.len() {
                    bail!(
                        "embedding service returned {} vectors for {} texts",
                        vecs.len(),
                        batch.len()
                    );
                }
                Ok::<_, anyhow::Error>(vecs)
            })
            .await
            .map_err(|e| EmbeddingFailure {
                attempts: e.attempts,
                source: e.last_error,
            })?;

            vectors.extend(batch_vectors);

            // Gentle pacing between successful sub-calls; a rate-limit
            // courtesy, not a correctness requirement.
            if !self.per_call_sleep.is_zero() {
                self.sleeper.sleep(self.per_call_sleep).await;
            }
        }

        Ok(vectors)
    }
}

/// Gemini embedding API client.
pub struct GeminiEmbeddings {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiEmbeddings {
    /// Build a client from configuration. Fails if `GEMINI_API_KEY` is not
    /// set in the environment.
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let api_key = crate::config::api_key()?;
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.embed_model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents?key={}",
            self.base_url, self.model, self.api_key
        );

        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| {
                serde_json::json!({
                    "model": format!("models/{}", self.model),
                    "content": { "parts": [ { "text": t } ] },
                })
            })
            .collect();

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini embedding API error {}: {}", status, body);
        }

        let json: serde_json::Value = response.json().await?;
        parse_batch_response(&json)
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/v1beta/models/{}:embedContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = serde_json::json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [ { "text": text } ] },
        });

        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini embedding API error {}: {}", status, body);
        }

        let json: serde_json::Value = response.json().await?;
        let values = json
            .get("embedding")
            .and_then(|e| e.get("values"))
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing embedding.values"))?;

        Ok(values
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect())
    }
}

/// Parse the `batchEmbedContents` response JSON.
///
/// Extracts `embeddings[].values` arrays in response order, which the API
/// guarantees matches request order.
fn parse_batch_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing embeddings array"))?;

    let mut out = Vec::with_capacity(embeddings.len());
    for item in embeddings {
        let values = item
            .get("values")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing values"))?;
        out.push(
            values
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }

    Ok(out)
}
