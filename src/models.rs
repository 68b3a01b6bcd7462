//! Core data models used throughout Kart Koç.
//!
//! These types represent the chunks, retrieval hits, and answers that flow
//! through the ingestion and answering pipeline.

use serde::Serialize;

/// A bounded slice of a normalized document, the unit of embedding
/// and retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Origin filename (with extension), e.g. `statement_faq.txt`.
    pub source: String,
    /// Filename without extension, used for display and citations.
    pub title: String,
    /// 0-based position within the source document.
    pub index: usize,
    /// Normalized text, at most the configured window size.
    pub text: String,
}

/// Metadata persisted alongside each index record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMeta {
    pub source: String,
    pub title: String,
    pub chunk: usize,
}

/// A single result of a similarity query. Distance is cosine distance
/// (lower = more similar). Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalHit {
    pub id: String,
    pub text: String,
    pub meta: ChunkMeta,
    pub distance: f32,
}

/// A deduplicated citation entry in an [`Answer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub title: String,
    pub source: String,
    pub chunk: usize,
}

/// Bookkeeping attached to every answer.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerMeta {
    /// Number of hits retrieval returned (before the context budget).
    pub used_hits: usize,
    /// The k that was requested.
    pub top_k: usize,
    /// Length in characters of the assembled context.
    pub context_chars: usize,
}

/// A grounded answer with its citations. Constructed per query,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
    pub meta: AnswerMeta,
}

impl Chunk {
    pub fn meta(&self) -> ChunkMeta {
        ChunkMeta {
            source: self.source.clone(),
            title: self.title.clone(),
            chunk: self.index,
        }
    }
}
