//! Query-side retrieval: embed the question, rank the collection.

use anyhow::{Context, Result};

use crate::embedding::EmbeddingBackend;
use crate::index::VectorIndex;
use crate::models::RetrievalHit;

/// Top-k similarity search over the vector index.
pub struct Retriever<'a> {
    backend: &'a dyn EmbeddingBackend,
    index: &'a VectorIndex,
}

impl<'a> Retriever<'a> {
    pub fn new(backend: &'a dyn EmbeddingBackend, index: &'a VectorIndex) -> Self {
        Self { backend, index }
    }

    /// Embed `query` with a single external call (not batched; this is the
    /// latency-sensitive path) and return up to `k` hits by ascending
    /// cosine distance. An empty index yields an empty result, not an
    /// error.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let vector = self
            .backend
            .embed_one(query)
            .await
            .context("query embedding failed")?;

        self.index
            .query(&vector, k)
            .await
            .context("index query failed")
    }
}
