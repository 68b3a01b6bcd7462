use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub docs: DocsConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    /// Directory scanned for `.txt`/`.pdf` source documents.
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string(), "**/*.pdf".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// SQLite file backing the vector index.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default = "default_gen_model")]
    pub model: String,
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gen_model(),
            embed_model: default_embed_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_gen_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_embed_model() -> String {
    "gemini-embedding-001".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_size")]
    pub size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_window_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_window_size() -> usize {
    800
}
fn default_overlap() -> usize {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_sleep_ms")]
    pub base_sleep_ms: u64,
    #[serde(default = "default_per_call_sleep_ms")]
    pub per_call_sleep_ms: u64,
    /// Hard cap on chunks embedded in a single ingestion run.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            base_sleep_ms: default_base_sleep_ms(),
            per_call_sleep_ms: default_per_call_sleep_ms(),
            max_chunks: default_max_chunks(),
        }
    }
}

fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_sleep_ms() -> u64 {
    500
}
fn default_per_call_sleep_ms() -> u64 {
    20
}
fn default_max_chunks() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            temperature: default_temperature(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_context_chars() -> usize {
    4000
}

impl GeminiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EmbeddingConfig {
    pub fn base_sleep(&self) -> Duration {
        Duration::from_millis(self.base_sleep_ms)
    }

    pub fn per_call_sleep(&self) -> Duration {
        Duration::from_millis(self.per_call_sleep_ms)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.size == 0 {
        anyhow::bail!("chunking.size must be > 0");
    }

    if config.chunking.overlap >= config.chunking.size {
        anyhow::bail!(
            "chunking.overlap ({}) must be < chunking.size ({})",
            config.chunking.overlap,
            config.chunking.size
        );
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.answer.top_k == 0 {
        anyhow::bail!("answer.top_k must be >= 1");
    }

    if !(0.0..=2.0).contains(&config.answer.temperature) {
        anyhow::bail!("answer.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

/// Read the Gemini API key from the environment.
///
/// Checked here rather than inside request code so a missing key fails
/// at client construction, before any pipeline work starts.
pub fn api_key() -> Result<String> {
    std::env::var("GEMINI_API_KEY")
        .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(chunking: &str) -> String {
        format!(
            r#"
[docs]
dir = "./data/docs"

[index]
path = "./data/koc.sqlite"

{chunking}
"#
        )
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config: Config = toml::from_str(&base_config("")).unwrap();
        assert_eq!(config.chunking.size, 800);
        assert_eq!(config.chunking.overlap, 120);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.answer.top_k, 5);
        assert_eq!(config.gemini.model, "gemini-2.5-flash");
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config: Config =
            toml::from_str(&base_config("[chunking]\nsize = 100\noverlap = 100")).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn zero_window_rejected() {
        let config: Config =
            toml::from_str(&base_config("[chunking]\nsize = 0\noverlap = 0")).unwrap();
        assert!(validate(&config).is_err());
    }
}
