//! Persistent cosine-similarity vector index.
//!
//! Records live in a single SQLite table named after the logical collection
//! (`ak_koc_docs`), vectors stored as little-endian `f32` BLOBs. Queries
//! load the collection and rank by cosine distance in Rust; at the corpus
//! sizes the ingestion cap allows, a brute-force scan beats maintaining an
//! approximate index.
//!
//! Ordering among records at exactly equal distance is unspecified.

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::models::{ChunkMeta, RetrievalHit};

/// Logical collection name; also the backing table name.
pub const COLLECTION: &str = "ak_koc_docs";

/// Misaligned `upsert` argument sequences.
#[derive(Debug)]
pub struct ShapeMismatch {
    pub ids: usize,
    pub texts: usize,
    pub metas: usize,
    pub vectors: usize,
}

impl std::fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "upsert arguments differ in length: ids={}, texts={}, metas={}, vectors={}",
            self.ids, self.texts, self.metas, self.vectors
        )
    }
}

impl std::error::Error for ShapeMismatch {}

/// A persistent similarity-search store scoped to [`COLLECTION`].
pub struct VectorIndex {
    pool: SqlitePool,
}

impl VectorIndex {
    /// Open (or create) the index at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        create_collection(&pool).await?;

        Ok(Self { pool })
    }

    /// Insert or overwrite records keyed by id. All four sequences must have
    /// equal length; a mismatch fails before any write.
    pub async fn upsert(
        &self,
        ids: &[String],
        texts: &[String],
        metas: &[ChunkMeta],
        vectors: &[Vec<f32>],
    ) -> Result<usize> {
        if ids.len() != texts.len() || ids.len() != metas.len() || ids.len() != vectors.len() {
            return Err(ShapeMismatch {
                ids: ids.len(),
                texts: texts.len(),
                metas: metas.len(),
                vectors: vectors.len(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        for (((id, text), meta), vector) in
            ids.iter().zip(texts).zip(metas).zip(vectors)
        {
            let blob = vec_to_blob(vector);
            sqlx::query(&format!(
                r#"
                INSERT INTO {COLLECTION} (id, source, title, chunk_index, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source = excluded.source,
                    title = excluded.title,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    embedding = excluded.embedding
                "#
            ))
            .bind(id)
            .bind(&meta.source)
            .bind(&meta.title)
            .bind(meta.chunk as i64)
            .bind(text)
            .bind(blob)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(ids.len())
    }

    /// Return up to `k` records ordered by ascending cosine distance to
    /// `vector`. An empty collection yields an empty result.
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievalHit>> {
        let rows = sqlx::query(&format!(
            "SELECT id, source, title, chunk_index, text, embedding FROM {COLLECTION}"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<RetrievalHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let stored = blob_to_vec(&blob);
                let chunk_index: i64 = row.get("chunk_index");
                RetrievalHit {
                    id: row.get("id"),
                    text: row.get("text"),
                    meta: ChunkMeta {
                        source: row.get("source"),
                        title: row.get("title"),
                        chunk: chunk_index as usize,
                    },
                    distance: cosine_distance(vector, &stored),
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    /// Current number of records in the collection.
    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {COLLECTION}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Delete every record and recreate the empty collection. Destructive;
    /// used only for full reindexing.
    pub async fn reset(&self) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {COLLECTION}"))
            .execute(&self.pool)
            .await?;
        create_collection(&self.pool).await
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn create_collection(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {COLLECTION} (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            title TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;
    Ok(())
}

/// Encode a float vector as little-endian `f32` bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance: `1 - cosine_similarity`, lower = more similar.
/// Empty or mismatched-length vectors are treated as unrelated (distance 1).
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(title: &str, chunk: usize) -> ChunkMeta {
        ChunkMeta {
            source: format!("{title}.txt"),
            title: title.to_string(),
            chunk,
        }
    }

    async fn open_temp() -> (TempDir, VectorIndex) {
        let tmp = TempDir::new().unwrap();
        let index = VectorIndex::open(&tmp.path().join("koc.sqlite")).await.unwrap();
        (tmp, index)
    }

    #[test]
    fn blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn distance_of_identical_vectors_is_zero() {
        let v = vec![1.0, 2.0, 3.0];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn distance_of_orthogonal_vectors_is_one() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_count_as_unrelated() {
        assert_eq!(cosine_distance(&[1.0, 2.0], &[1.0]), 1.0);
        assert_eq!(cosine_distance(&[], &[]), 1.0);
    }

    #[tokio::test]
    async fn shape_mismatch_fails_without_writing() {
        let (_tmp, index) = open_temp().await;
        let err = index
            .upsert(
                &["a-0".to_string(), "a-1".to_string()],
                &["birinci".to_string()],
                &[meta("a", 0)],
                &[vec![1.0, 0.0]],
            )
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<ShapeMismatch>().is_some());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn query_ranks_by_ascending_distance() {
        let (_tmp, index) = open_temp().await;
        index
            .upsert(
                &["a-0".to_string(), "a-1".to_string(), "b-0".to_string()],
                &[
                    "tam eşleşme".to_string(),
                    "yakın".to_string(),
                    "alakasız".to_string(),
                ],
                &[meta("a", 0), meta("a", 1), meta("b", 0)],
                &[
                    vec![1.0, 0.0],
                    vec![0.7, 0.7],
                    vec![0.0, 1.0],
                ],
            )
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a-0");
        assert_eq!(hits[1].id, "a-1");
        assert!(hits[0].distance <= hits[1].distance);
        assert_eq!(hits[0].meta, meta("a", 0));
    }

    #[tokio::test]
    async fn upsert_overwrites_by_id() {
        let (_tmp, index) = open_temp().await;
        let ids = vec!["a-0".to_string()];
        index
            .upsert(&ids, &["eski".to_string()], &[meta("a", 0)], &[vec![1.0, 0.0]])
            .await
            .unwrap();
        let written = index
            .upsert(&ids, &["yeni".to_string()], &[meta("a", 0)], &[vec![1.0, 0.0]])
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(index.count().await.unwrap(), 1);

        let hits = index.query(&[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits[0].text, "yeni");
    }

    #[tokio::test]
    async fn reset_leaves_an_empty_queryable_collection() {
        let (_tmp, index) = open_temp().await;
        index
            .upsert(
                &["a-0".to_string()],
                &["metin".to_string()],
                &[meta("a", 0)],
                &[vec![1.0, 0.0]],
            )
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        index.reset().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }
}
