//! Ingestion pipeline orchestration.
//!
//! Coordinates the full write path: scan the docs directory → extract →
//! normalize and chunk → embed in batches → upsert into the vector index.
//! The pipeline never returns `Err`; every internal failure is logged and
//! reported through [`IngestOutcome`] so a batch run stays available even
//! when one run crashes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::chunk::Chunker;
use crate::config::Config;
use crate::embedding::{BatchEmbedder, EmbeddingBackend};
use crate::extract::DocumentFormat;
use crate::index::VectorIndex;
use crate::models::ChunkMeta;
use crate::retry::Sleeper;

/// Seeded into an empty docs directory so a fresh run never leaves an
/// empty index.
const DEMO_FILE_NAME: &str = "kartkoc_demo.txt";
const DEMO_TEXT: &str = "Ekstre, kredi kartı dönemindeki harcamaları gösteren belgedir. \
Ödeme tarihi ekstre kesim tarihinden sonra belirlenir. \
Kazanılan Harçlık (bonus) kampanyalara göre kullanılır.";

/// Result of an ingestion run. `Failed` still reports zero chunks to
/// callers that only look at the count; the cause travels alongside.
#[derive(Debug)]
pub enum IngestOutcome {
    Completed { chunks_added: usize },
    Failed { error: anyhow::Error },
}

impl IngestOutcome {
    pub fn chunks_added(&self) -> usize {
        match self {
            IngestOutcome::Completed { chunks_added } => *chunks_added,
            IngestOutcome::Failed { .. } => 0,
        }
    }
}

/// Orchestrates chunking, embedding, and indexing over a docs directory.
pub struct IngestionPipeline<'a> {
    config: &'a Config,
    chunker: Chunker,
    embedder: BatchEmbedder<'a>,
    index: &'a VectorIndex,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        config: &'a Config,
        backend: &'a dyn EmbeddingBackend,
        sleeper: &'a dyn Sleeper,
        index: &'a VectorIndex,
    ) -> Result<Self> {
        let chunker = Chunker::new(config.chunking.size, config.chunking.overlap)?;
        let embedder = BatchEmbedder::new(backend, sleeper, &config.embedding);
        Ok(Self {
            config,
            chunker,
            embedder,
            index,
        })
    }

    /// Run one ingestion pass over the configured docs directory.
    ///
    /// Never fails outright: errors are logged at warn level and folded
    /// into [`IngestOutcome::Failed`].
    pub async fn ingest(&self) -> IngestOutcome {
        match self.run().await {
            Ok(chunks_added) => IngestOutcome::Completed { chunks_added },
            Err(error) => {
                warn!(error = %format!("{error:#}"), "ingestion run failed");
                IngestOutcome::Failed { error }
            }
        }
    }

    async fn run(&self) -> Result<usize> {
        let docs_dir = &self.config.docs.dir;
        std::fs::create_dir_all(docs_dir)
            .with_context(|| format!("Failed to create docs dir: {}", docs_dir.display()))?;

        let mut files = scan_docs(docs_dir, &self.config.docs.include_globs)?;
        if files.is_empty() {
            files = vec![write_demo_document(docs_dir)?];
            info!(file = DEMO_FILE_NAME, "docs directory empty, seeded demo document");
        }
        info!(files = files.len(), dir = %docs_dir.display(), "ingestion scan complete");

        let mut ids: Vec<String> = Vec::new();
        let mut texts: Vec<String> = Vec::new();
        let mut metas: Vec<ChunkMeta> = Vec::new();

        for relative in &files {
            let path = docs_dir.join(relative);
            let Some(format) = DocumentFormat::from_path(&path) else {
                continue;
            };

            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let raw = format
                .extract(&bytes)
                .with_context(|| format!("Failed to extract {}", path.display()))?;

            let source = file_name(&path);
            let title = file_stem(&path);
            let chunks = self.chunker.chunk(&source, &title, &raw);
            info!(
                file = %relative.display(),
                raw_chars = raw.len(),
                chunks = chunks.len(),
                "document chunked"
            );

            let doc_key = chunk_id_prefix(relative);
            for chunk in chunks {
                ids.push(format!("{doc_key}-{}", chunk.index));
                metas.push(chunk.meta());
                texts.push(chunk.text);
            }
        }

        if ids.is_empty() {
            info!("no chunks produced, nothing to index");
            return Ok(0);
        }

        // Hard cost/latency guard on a single run, preserving order.
        let cap = self.config.embedding.max_chunks;
        if ids.len() > cap {
            warn!(total = ids.len(), cap, "chunk cap exceeded, truncating run");
            ids.truncate(cap);
            texts.truncate(cap);
            metas.truncate(cap);
        }

        let vectors = self.embedder.embed(&texts).await?;
        let added = self.index.upsert(&ids, &texts, &metas, &vectors).await?;
        info!(added, "index write complete");

        Ok(added)
    }
}

/// Enumerate ingestible files under `dir`, as paths relative to it,
/// sorted for deterministic ordering.
fn scan_docs(dir: &Path, include_globs: &[String]) -> Result<Vec<PathBuf>> {
    let include = build_globset(include_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        if include.is_match(relative) {
            files.push(relative.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn write_demo_document(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(DEMO_FILE_NAME);
    std::fs::write(&path, DEMO_TEXT)
        .with_context(|| format!("Failed to write demo document {}", path.display()))?;
    Ok(PathBuf::from(DEMO_FILE_NAME))
}

/// Collision-resistant id prefix: same-titled files in different
/// subdirectories hash to different prefixes.
fn chunk_id_prefix(relative: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(relative.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
