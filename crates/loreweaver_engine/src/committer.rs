//! Two-store scene commit.
//!
//! Ordering: the relational scene row is staged first inside a transaction,
//! the semantic upsert is attempted second, and the transaction commits only
//! after the semantic write succeeds. A semantic failure rolls the staged
//! row back, so no partial commit is ever visible to readers.
//!
//! This is best-effort ordering, not two-phase commit: a crash between the
//! semantic write and the relational commit leaves an orphaned semantic
//! entry. The upsert is keyed by scene id precisely so a re-commit of the
//! same scene overwrites the orphan instead of duplicating it.

use loreweaver_core::NewScene;
use loreweaver_memory::{SemanticEntry, SemanticIndex, SqliteStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("relational write failed: {0}")]
    Relational(#[from] StoreError),
    #[error("semantic write failed; relational write rolled back: {0}")]
    Semantic(#[source] anyhow::Error),
}

/// What a successful commit produced: the identifier the caller supplied and
/// the sequence index the store assigned.
#[derive(Debug, Clone)]
pub struct CommittedScene {
    pub scene_id: String,
    pub sequence_index: i64,
}

#[derive(Clone)]
pub struct SceneCommitter {
    store: SqliteStore,
    semantic: Arc<dyn SemanticIndex>,
}

impl SceneCommitter {
    pub fn new(store: SqliteStore, semantic: Arc<dyn SemanticIndex>) -> Self {
        Self { store, semantic }
    }

    pub async fn commit(&self, scene: &NewScene) -> Result<CommittedScene, PersistenceError> {
        let mut tx = self.store.begin().await?;
        let sequence_index = self.store.stage_scene(&mut tx, scene).await?;

        let entry = SemanticEntry {
            scene_id: scene.id.clone(),
            project_id: scene.project_id.clone(),
            summary: scene.semantic_intent.clone(),
            sequence_index,
            location: scene.location.clone(),
            participants: scene.participants.clone(),
        };

        match self.semantic.upsert_scene(&entry).await {
            Ok(()) => {
                tx.commit().await.map_err(StoreError::from)?;
                tracing::info!(
                    "Scene {} committed as sequence_index={}",
                    scene.id,
                    sequence_index
                );
                Ok(CommittedScene {
                    scene_id: scene.id.clone(),
                    sequence_index,
                })
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(
                        "Rollback after semantic failure also failed: {}",
                        rollback_err
                    );
                }
                tracing::warn!("Scene {} commit rolled back: {}", scene.id, e);
                Err(PersistenceError::Semantic(e))
            }
        }
    }
}
