//! Semantic scene memory: an independent store keyed by scene id, holding an
//! embedding of each scene's semantic intent plus recall metadata.
//!
//! Kept in its own SQLite file on purpose — the relational timeline and the
//! semantic index are separate collaborators with separate failure modes,
//! and the committer's rollback semantics depend on that separation.

use crate::embedding::{cosine_similarity, Embedder};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;
use std::sync::Arc;

/// One scene's entry in the semantic store.
#[derive(Debug, Clone)]
pub struct SemanticEntry {
    pub scene_id: String,
    pub project_id: String,
    /// The text that gets embedded (the planner's intent summary).
    pub summary: String,
    pub sequence_index: i64,
    pub location: String,
    pub participants: Vec<String>,
}

/// A nearest-neighbor match.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub scene_id: String,
    pub summary: String,
    pub score: f32,
    pub sequence_index: i64,
    pub location: String,
}

#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Upsert keyed by scene id. Idempotent: re-committing a scene after a
    /// partial failure overwrites rather than duplicates.
    async fn upsert_scene(&self, entry: &SemanticEntry) -> Result<()>;

    /// Top-`limit` scenes of the project by cosine similarity to `intent`.
    /// An empty result is valid, never an error.
    async fn query(&self, project_id: &str, intent: &str, limit: usize)
        -> Result<Vec<SemanticHit>>;
}

#[derive(Clone)]
pub struct SqliteSemanticIndex {
    pool: Pool<Sqlite>,
    embedder: Arc<dyn Embedder>,
}

impl SqliteSemanticIndex {
    pub async fn new<P: AsRef<Path>>(db_path: P, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .connect(&db_url)
            .await
            .context("Failed to connect to semantic store")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scene_vectors (
                scene_id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                summary TEXT NOT NULL,
                embedding BLOB NOT NULL,
                sequence_index INTEGER NOT NULL,
                location TEXT NOT NULL,
                participants TEXT NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create scene_vectors table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scene_vectors_project ON scene_vectors(project_id)",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool, embedder })
    }
}

#[async_trait]
impl SemanticIndex for SqliteSemanticIndex {
    async fn upsert_scene(&self, entry: &SemanticEntry) -> Result<()> {
        let embedding = self
            .embedder
            .embed(&entry.summary)
            .context("Failed to embed scene summary")?;
        let blob = bincode::serialize(&embedding).context("Failed to serialize embedding")?;
        let participants = entry.participants.join(",");

        sqlx::query(
            "INSERT INTO scene_vectors
                (scene_id, project_id, summary, embedding, sequence_index, location, participants)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(scene_id) DO UPDATE SET
                project_id = excluded.project_id,
                summary = excluded.summary,
                embedding = excluded.embedding,
                sequence_index = excluded.sequence_index,
                location = excluded.location,
                participants = excluded.participants",
        )
        .bind(&entry.scene_id)
        .bind(&entry.project_id)
        .bind(&entry.summary)
        .bind(&blob)
        .bind(entry.sequence_index)
        .bind(&entry.location)
        .bind(&participants)
        .execute(&self.pool)
        .await
        .context("Failed to upsert scene vector")?;

        tracing::debug!("Semantic entry upserted for scene {}", entry.scene_id);
        Ok(())
    }

    async fn query(
        &self,
        project_id: &str,
        intent: &str,
        limit: usize,
    ) -> Result<Vec<SemanticHit>> {
        let query_embedding = self
            .embedder
            .embed(intent)
            .context("Failed to embed query intent")?;

        // Brute-force scan over the project's vectors. Projects hold at most
        // a few thousand scenes; an ANN index is not worth it yet.
        let rows = sqlx::query(
            "SELECT scene_id, summary, embedding, sequence_index, location
             FROM scene_vectors WHERE project_id = ?",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch scene vectors")?;

        let mut hits: Vec<SemanticHit> = Vec::new();
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            if let Ok(embedding) = bincode::deserialize::<Vec<f32>>(&blob) {
                let score = cosine_similarity(&query_embedding, &embedding);
                hits.push(SemanticHit {
                    scene_id: row.get("scene_id"),
                    summary: row.get("summary"),
                    score,
                    sequence_index: row.get("sequence_index"),
                    location: row.get("location"),
                });
            }
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }
}
