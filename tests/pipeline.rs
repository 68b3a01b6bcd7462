//! End-to-end pipeline tests with in-process service stubs.
//!
//! The embedding and generation backends are replaced by deterministic
//! stand-ins so the full ingest → search → answer flow runs offline
//! against a temporary index.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use kartkoc::answer::{AnswerComposer, AskError};
use kartkoc::config::{
    AnswerConfig, ChunkingConfig, Config, DocsConfig, EmbeddingConfig, GeminiConfig, IndexConfig,
};
use kartkoc::embedding::EmbeddingBackend;
use kartkoc::generation::GenerationBackend;
use kartkoc::index::VectorIndex;
use kartkoc::ingest::IngestionPipeline;
use kartkoc::retriever::Retriever;
use kartkoc::retry::TokioSleeper;

/// Embeds text as keyword-presence dimensions, so topical documents land
/// close to topical queries.
struct KeywordEmbedding;

fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v = vec![
        if lower.contains("ekstre") { 1.0 } else { 0.0 },
        if lower.contains("limit") { 1.0 } else { 0.0 },
        if lower.contains("bonus") { 1.0 } else { 0.0 },
        0.1,
    ];
    // Keep zero-keyword texts off the origin so cosine stays defined.
    if v.iter().take(3).all(|x| *x == 0.0) {
        v[3] = 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingBackend for KeywordEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        Ok(keyword_vector(text))
    }
}

/// Counts calls and echoes a fixed grounded answer.
#[derive(Default)]
struct CountingGeneration {
    calls: AtomicUsize,
    reply: String,
}

impl CountingGeneration {
    fn with_reply(reply: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            reply: reply.to_string(),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for CountingGeneration {
    async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

fn test_config(root: &Path) -> Config {
    Config {
        docs: DocsConfig {
            dir: root.join("docs"),
            include_globs: vec!["**/*.txt".to_string(), "**/*.pdf".to_string()],
        },
        index: IndexConfig {
            path: root.join("koc.sqlite"),
        },
        gemini: GeminiConfig::default(),
        chunking: ChunkingConfig::default(),
        embedding: EmbeddingConfig {
            per_call_sleep_ms: 0,
            ..EmbeddingConfig::default()
        },
        answer: AnswerConfig::default(),
    }
}

async fn ingest_docs(config: &Config, index: &VectorIndex) -> usize {
    let backend = KeywordEmbedding;
    let sleeper = TokioSleeper;
    let pipeline = IngestionPipeline::new(config, &backend, &sleeper, index).unwrap();
    pipeline.ingest().await.chunks_added()
}

#[tokio::test]
async fn ingest_search_answer_round_trip() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    std::fs::create_dir_all(&config.docs.dir).unwrap();
    std::fs::write(
        config.docs.dir.join("ekstre.txt"),
        "Ekstre, kredi kartı dönemindeki harcamaları gösteren belgedir.",
    )
    .unwrap();
    std::fs::write(
        config.docs.dir.join("limit.txt"),
        "Limit artırımı için gelir belgesi gerekir.",
    )
    .unwrap();

    let index = VectorIndex::open(&config.index.path).await.unwrap();
    let added = ingest_docs(&config, &index).await;
    assert_eq!(added, 2);
    assert_eq!(index.count().await.unwrap(), 2);

    let backend = KeywordEmbedding;
    let retriever = Retriever::new(&backend, &index);
    let hits = retriever.search("ekstre nedir", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].meta.title, "ekstre");
    assert!(hits[0].distance <= hits[1].distance);

    let generation =
        CountingGeneration::with_reply("Ekstre, dönem harcamalarını gösteren belgedir.");
    let composer = AnswerComposer::new(
        Retriever::new(&backend, &index),
        &generation,
        config.answer.clone(),
    );

    let answer = composer
        .answer("Ekstre nedir?", Some(2), None, None)
        .await
        .unwrap();

    assert_eq!(generation.call_count(), 1);
    assert_eq!(answer.text, "Ekstre, dönem harcamalarını gösteren belgedir.");
    assert_eq!(answer.meta.used_hits, 2);
    assert_eq!(answer.meta.top_k, 2);
    assert!(answer.meta.context_chars > 0);
    assert_eq!(answer.sources[0].title, "ekstre");
    index.close().await;
}

#[tokio::test]
async fn two_document_directory_produces_four_chunks() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    std::fs::create_dir_all(&config.docs.dir).unwrap();

    // 1700 normalized chars chunk at 0, 680, 1360 with the default
    // window (800) and overlap (120); 50 chars fit in one window.
    let long: String = std::iter::repeat('e').take(1700).collect();
    let short: String = std::iter::repeat('k').take(50).collect();
    std::fs::write(config.docs.dir.join("a.txt"), &long).unwrap();
    std::fs::write(config.docs.dir.join("b.txt"), &short).unwrap();

    let index = VectorIndex::open(&config.index.path).await.unwrap();
    let added = ingest_docs(&config, &index).await;
    assert_eq!(added, 4);
    assert_eq!(index.count().await.unwrap(), 4);
    index.close().await;
}

#[tokio::test]
async fn empty_index_answers_without_a_generation_call() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());

    let index = VectorIndex::open(&config.index.path).await.unwrap();
    let backend = KeywordEmbedding;
    let generation = CountingGeneration::with_reply("asla kullanılmamalı");
    let composer = AnswerComposer::new(
        Retriever::new(&backend, &index),
        &generation,
        config.answer.clone(),
    );

    let answer = composer.answer("Ekstre nedir?", None, None, None).await.unwrap();
    assert_eq!(generation.call_count(), 0);
    assert!(answer.text.starts_with("Bilmiyorum"));
    assert!(answer.sources.is_empty());
    assert_eq!(answer.meta.used_hits, 0);
    assert_eq!(answer.meta.context_chars, 0);
    index.close().await;
}

#[tokio::test]
async fn unrelated_content_still_yields_a_grounded_answer() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    std::fs::create_dir_all(&config.docs.dir).unwrap();
    std::fs::write(
        config.docs.dir.join("alakasiz.txt"),
        "Kedi maması tarifi ve bahçe bakımı üzerine notlar.",
    )
    .unwrap();

    let index = VectorIndex::open(&config.index.path).await.unwrap();
    ingest_docs(&config, &index).await;

    let backend = KeywordEmbedding;
    let generation = CountingGeneration::with_reply("Bu konuda bilgim yok.");
    let composer = AnswerComposer::new(
        Retriever::new(&backend, &index),
        &generation,
        config.answer.clone(),
    );

    // Low relevance is not an error; only an empty index short-circuits.
    let answer = composer.answer("Ekstre nedir?", Some(5), None, None).await.unwrap();
    assert_eq!(generation.call_count(), 1);
    assert_eq!(answer.meta.used_hits, 1);
    assert!(!answer.sources.is_empty());
    index.close().await;
}

#[tokio::test]
async fn reset_empties_the_index_and_search_stays_calm() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    std::fs::create_dir_all(&config.docs.dir).unwrap();
    std::fs::write(config.docs.dir.join("doc.txt"), "ekstre kesim tarihi").unwrap();

    let index = VectorIndex::open(&config.index.path).await.unwrap();
    ingest_docs(&config, &index).await;
    assert!(index.count().await.unwrap() > 0);

    index.reset().await.unwrap();
    assert_eq!(index.count().await.unwrap(), 0);

    let backend = KeywordEmbedding;
    let retriever = Retriever::new(&backend, &index);
    let hits = retriever.search("ekstre", 5).await.unwrap();
    assert!(hits.is_empty());
    index.close().await;
}

#[tokio::test]
async fn generation_failure_propagates_to_the_caller() {
    struct FailingGeneration;

    #[async_trait]
    impl GenerationBackend for FailingGeneration {
        async fn generate(&self, _prompt: &str, _temperature: f32) -> Result<String> {
            anyhow::bail!("quota exceeded")
        }
    }

    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    std::fs::create_dir_all(&config.docs.dir).unwrap();
    std::fs::write(config.docs.dir.join("doc.txt"), "ekstre kesim tarihi").unwrap();

    let index = VectorIndex::open(&config.index.path).await.unwrap();
    ingest_docs(&config, &index).await;

    let backend = KeywordEmbedding;
    let generation = FailingGeneration;
    let composer = AnswerComposer::new(
        Retriever::new(&backend, &index),
        &generation,
        config.answer.clone(),
    );

    let err = composer.answer("Ekstre nedir?", None, None, None).await.unwrap_err();
    assert!(matches!(err, AskError::Generation(_)));
    assert!(err.to_string().contains("generation failed"));
    index.close().await;
}
