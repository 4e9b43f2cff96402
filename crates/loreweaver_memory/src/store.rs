use loreweaver_core::{
    Character, CharacterState, CriticReport, NewScene, Project, RuleScope, Scene, StatePatch,
    WorldRule,
};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite, Transaction};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("project {0} not found")]
    ProjectNotFound(String),
    #[error("character {0} not found")]
    CharacterNotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The relational store: projects, characters, world rules, and the
/// committed scene timeline.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                    Ok(())
                })
            })
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                core_psychology TEXT NOT NULL,
                current_state TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS world_rules (
                id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                rule_text TEXT NOT NULL,
                active_scope TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scenes (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                sequence_index INTEGER NOT NULL,
                prompt TEXT NOT NULL,
                scene_text TEXT NOT NULL,
                critic_report TEXT,
                location TEXT NOT NULL,
                participants TEXT NOT NULL,
                summary TEXT NOT NULL,
                causal_prerequisites TEXT,
                created_at INTEGER NOT NULL,
                UNIQUE(project_id, sequence_index)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_scenes_project_seq ON scenes(project_id, sequence_index)",
        )
        .execute(&self.pool)
        .await?;

        // Legacy timeline log, kept as the tier-2 fallback for worlds that
        // predate the scenes table.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS timeline_events (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                sequence_index INTEGER NOT NULL,
                location TEXT NOT NULL,
                participants TEXT NOT NULL,
                summary TEXT NOT NULL,
                causal_prerequisites TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // Projects
    // ========================================================================

    pub async fn insert_project(&self, project: &Project) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO projects (id, name, user_id, created_at) VALUES (?, ?, ?, ?)")
            .bind(&project.id)
            .bind(&project.name)
            .bind(&project.user_id)
            .bind(project.created_at)
            .execute(&self.pool)
            .await?;
        tracing::debug!("Project {} created", project.id);
        Ok(())
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query("SELECT id, name, user_id, created_at FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Project {
            id: r.get("id"),
            name: r.get("name"),
            user_id: r.get("user_id"),
            created_at: r.get("created_at"),
        }))
    }

    /// Ownership-checked lookup: the gateway rejects unknown *and*
    /// unauthorized projects identically, before any generation work.
    pub async fn get_project_for_user(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, user_id, created_at FROM projects WHERE id = ? AND user_id = ?",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Project {
            id: r.get("id"),
            name: r.get("name"),
            user_id: r.get("user_id"),
            created_at: r.get("created_at"),
        }))
    }

    /// Deleting a project cascades to its scenes (FK with ON DELETE CASCADE).
    pub async fn delete_project(&self, project_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::ProjectNotFound(project_id.to_string()));
        }
        tracing::info!("Project {} deleted (scenes cascaded)", project_id);
        Ok(())
    }

    // ========================================================================
    // Characters
    // ========================================================================

    pub async fn upsert_character(&self, character: &Character) -> Result<(), StoreError> {
        let state_json = serde_json::to_string(&character.current_state)?;
        sqlx::query(
            "INSERT INTO characters (id, name, core_psychology, current_state) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name,
                 core_psychology = excluded.core_psychology,
                 current_state = excluded.current_state",
        )
        .bind(&character.id)
        .bind(&character.name)
        .bind(&character.core_psychology)
        .bind(&state_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn characters_by_ids(&self, ids: &[String]) -> Result<Vec<Character>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: String = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, name, core_psychology, current_state FROM characters WHERE id IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut characters = Vec::with_capacity(rows.len());
        for row in rows {
            let state_json: String = row.get("current_state");
            characters.push(Character {
                id: row.get("id"),
                name: row.get("name"),
                core_psychology: row.get("core_psychology"),
                current_state: serde_json::from_str(&state_json)?,
            });
        }
        Ok(characters)
    }

    /// Apply a sparse state patch to one character and persist the result.
    /// Outside the generation pipeline itself: generation only reads state.
    pub async fn update_character_state(
        &self,
        character_id: &str,
        patch: &StatePatch,
    ) -> Result<CharacterState, StoreError> {
        let row = sqlx::query("SELECT current_state FROM characters WHERE id = ?")
            .bind(character_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::CharacterNotFound(character_id.to_string()))?;

        let state_json: String = row.get("current_state");
        let mut state: CharacterState = serde_json::from_str(&state_json)?;
        state.apply(patch);

        sqlx::query("UPDATE characters SET current_state = ? WHERE id = ?")
            .bind(serde_json::to_string(&state)?)
            .bind(character_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!("Character {} state patched ({} keys)", character_id, patch.0.len());
        Ok(state)
    }

    // ========================================================================
    // World rules
    // ========================================================================

    pub async fn insert_world_rule(&self, rule: &WorldRule) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO world_rules (id, category, rule_text, active_scope) VALUES (?, ?, ?, ?)",
        )
        .bind(&rule.id)
        .bind(&rule.category)
        .bind(&rule.rule_text)
        .bind(rule.active_scope.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Rules in force at `location`: global scope plus exact location match.
    pub async fn rules_for_location(&self, location: &str) -> Result<Vec<WorldRule>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, category, rule_text, active_scope FROM world_rules
             WHERE active_scope = 'global' OR active_scope = ?",
        )
        .bind(location)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| WorldRule {
                id: row.get("id"),
                category: row.get("category"),
                rule_text: row.get("rule_text"),
                active_scope: RuleScope::parse(row.get("active_scope")),
            })
            .collect())
    }

    // ========================================================================
    // Scenes
    // ========================================================================

    /// Begin a transaction for the two-store commit. The committer stages
    /// the scene row here, then attempts the semantic write before
    /// committing.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    /// Stage a scene insert inside `tx`, assigning the next sequence index
    /// as MAX(sequence_index) + 1 for the project.
    ///
    /// The read-then-insert is not serialized across connections: two
    /// concurrent commits to the same project can race. The UNIQUE
    /// constraint on (project_id, sequence_index) turns a lost race into an
    /// error instead of a duplicate index.
    pub async fn stage_scene(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        scene: &NewScene,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(sequence_index), 0) AS max_seq FROM scenes WHERE project_id = ?",
        )
        .bind(&scene.project_id)
        .fetch_one(&mut **tx)
        .await?;
        let max_seq: i64 = row.get("max_seq");
        let sequence_index = max_seq + 1;

        let report_json = scene
            .critic_report
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let participants_json = serde_json::to_string(&scene.participants)?;
        let prereqs_json = serde_json::to_string(&scene.causal_prereqs)?;

        sqlx::query(
            "INSERT INTO scenes (id, project_id, sequence_index, prompt, scene_text,
                critic_report, location, participants, summary, causal_prerequisites, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&scene.id)
        .bind(&scene.project_id)
        .bind(sequence_index)
        .bind(&scene.prompt)
        .bind(&scene.scene_text)
        .bind(&report_json)
        .bind(&scene.location)
        .bind(&participants_json)
        .bind(&scene.summary)
        .bind(&prereqs_json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut **tx)
        .await?;

        tracing::debug!(
            "Staged scene {} as sequence_index={} (prev max={})",
            scene.id,
            sequence_index,
            max_seq
        );
        Ok(sequence_index)
    }

    pub async fn get_scene(&self, scene_id: &str) -> Result<Option<Scene>, StoreError> {
        let row = sqlx::query(
            "SELECT id, project_id, sequence_index, prompt, scene_text, critic_report,
                    location, participants, summary, created_at
             FROM scenes WHERE id = ?",
        )
        .bind(scene_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_scene).transpose()
    }

    /// The most recent `window` scenes, newest first.
    pub async fn recent_scenes(
        &self,
        project_id: &str,
        window: usize,
    ) -> Result<Vec<Scene>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, project_id, sequence_index, prompt, scene_text, critic_report,
                    location, participants, summary, created_at
             FROM scenes WHERE project_id = ?
             ORDER BY sequence_index DESC LIMIT ?",
        )
        .bind(project_id)
        .bind(window as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_scene).collect()
    }

    /// All scenes of a project in chronological order.
    pub async fn scenes_for_project(&self, project_id: &str) -> Result<Vec<Scene>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, project_id, sequence_index, prompt, scene_text, critic_report,
                    location, participants, summary, created_at
             FROM scenes WHERE project_id = ?
             ORDER BY sequence_index ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_scene).collect()
    }

    // ========================================================================
    // Legacy timeline events (tier-2 fallback)
    // ========================================================================

    pub async fn insert_timeline_event(&self, event: &TimelineEvent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO timeline_events
                (id, project_id, sequence_index, location, participants, summary, causal_prerequisites)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.project_id)
        .bind(event.sequence_index)
        .bind(&event.location)
        .bind(serde_json::to_string(&event.participants)?)
        .bind(&event.summary)
        .bind(serde_json::to_string(&event.causal_prerequisites)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_timeline_events(
        &self,
        project_id: &str,
        window: usize,
    ) -> Result<Vec<TimelineEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, project_id, sequence_index, location, participants, summary, causal_prerequisites
             FROM timeline_events WHERE project_id = ?
             ORDER BY sequence_index DESC LIMIT ?",
        )
        .bind(project_id)
        .bind(window as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let participants_json: String = row.get("participants");
            let prereqs_json: Option<String> = row.get("causal_prerequisites");
            events.push(TimelineEvent {
                id: row.get("id"),
                project_id: row.get("project_id"),
                sequence_index: row.get("sequence_index"),
                location: row.get("location"),
                participants: serde_json::from_str(&participants_json)?,
                summary: row.get("summary"),
                causal_prerequisites: prereqs_json
                    .map(|j| serde_json::from_str(&j))
                    .transpose()?
                    .unwrap_or_default(),
            });
        }
        Ok(events)
    }
}

/// Legacy timeline record, predating the scenes table.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    pub id: String,
    pub project_id: String,
    pub sequence_index: i64,
    pub location: String,
    pub participants: Vec<String>,
    pub summary: String,
    pub causal_prerequisites: Vec<String>,
}

fn row_to_scene(row: sqlx::sqlite::SqliteRow) -> Result<Scene, StoreError> {
    let participants_json: String = row.get("participants");
    let report_json: Option<String> = row.get("critic_report");
    let critic_report: Option<CriticReport> = report_json
        .map(|j| serde_json::from_str(&j))
        .transpose()?;

    Ok(Scene {
        id: row.get("id"),
        project_id: row.get("project_id"),
        sequence_index: row.get("sequence_index"),
        prompt: row.get("prompt"),
        scene_text: row.get("scene_text"),
        critic_report,
        location: row.get("location"),
        participants: serde_json::from_str(&participants_json)?,
        summary: row.get("summary"),
        created_at: row.get("created_at"),
    })
}
