//! Integration tests for the generation state machine, using scripted
//! capability mocks and tempfile-isolated SQLite stores.

use anyhow::Result;
use async_trait::async_trait;
use loreweaver_core::config::GenerationConfig;
use loreweaver_core::{Project, SceneOutline};
use loreweaver_engine::providers::{MockCritic, MockExecutor, MockPlanner};
use loreweaver_engine::{
    GenerationError, GenerationRequest, GenerationServices, SceneCommitter, SceneOrchestrator,
};
use loreweaver_memory::{
    ContextAssembler, HashEmbedder, SemanticEntry, SemanticHit, SemanticIndex,
    SqliteSemanticIndex, SqliteStore,
};
use std::sync::Arc;

struct Harness {
    store: SqliteStore,
    semantic: Arc<SqliteSemanticIndex>,
    planner: Arc<MockPlanner>,
    executor: Arc<MockExecutor>,
    critic: Arc<MockCritic>,
}

impl Harness {
    fn orchestrator(&self, max_retries: u32) -> SceneOrchestrator {
        self.orchestrator_with_index(self.semantic.clone(), max_retries)
    }

    fn orchestrator_with_index(
        &self,
        index: Arc<dyn SemanticIndex>,
        max_retries: u32,
    ) -> SceneOrchestrator {
        let config = GenerationConfig::default();
        let assembler = ContextAssembler::new(self.store.clone(), index.clone(), &config);
        let committer = SceneCommitter::new(self.store.clone(), index);
        let services = GenerationServices {
            planner: self.planner.clone(),
            executor: self.executor.clone(),
            critic: self.critic.clone(),
        };
        SceneOrchestrator::new(assembler, committer, services, max_retries)
    }
}

fn outline() -> SceneOutline {
    SceneOutline {
        intent_summary: "Ana confronts the captain about the missing cargo".to_string(),
        target_emotional_shift: "Suspicion to Fury".to_string(),
        required_actions: vec![
            "Ana enters the hold".to_string(),
            "The captain deflects".to_string(),
        ],
    }
}

async fn setup(dir: &tempfile::TempDir, planner: MockPlanner, critic: MockCritic) -> Harness {
    let store = SqliteStore::new(dir.path().join("world.db")).await.unwrap();
    let semantic = Arc::new(
        SqliteSemanticIndex::new(dir.path().join("vectors.db"), Arc::new(HashEmbedder))
            .await
            .unwrap(),
    );
    store
        .insert_project(&Project {
            id: "p1".to_string(),
            name: "test world".to_string(),
            user_id: "u1".to_string(),
            created_at: 0,
        })
        .await
        .unwrap();

    Harness {
        store,
        semantic,
        planner: Arc::new(planner),
        executor: Arc::new(MockExecutor::returning("Ana stormed into the hold")),
        critic: Arc::new(critic),
    }
}

fn request() -> GenerationRequest {
    GenerationRequest {
        project_id: "p1".to_string(),
        user_prompt: "Ana confronts the captain".to_string(),
        active_characters: vec!["ana".to_string()],
        location: "the hold".to_string(),
        characters_freetext: None,
    }
}

/// An index whose writes always fail; reads still work so tier 3 assembly
/// is unaffected.
struct WriteFailingIndex;

#[async_trait]
impl SemanticIndex for WriteFailingIndex {
    async fn upsert_scene(&self, _entry: &SemanticEntry) -> Result<()> {
        anyhow::bail!("vector store rejected the write")
    }

    async fn query(&self, _project_id: &str, _intent: &str, _limit: usize) -> Result<Vec<SemanticHit>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn early_exit_on_first_approval() {
    let dir = tempfile::TempDir::new().unwrap();
    let harness = setup(
        &dir,
        MockPlanner::returning(outline()),
        MockCritic::approving(),
    )
    .await;

    let result = harness
        .orchestrator(2)
        .generate_scene(&request())
        .await
        .unwrap();

    // One executor/critic round, one commit.
    assert_eq!(harness.executor.calls(), 1);
    assert_eq!(harness.critic.calls(), 1);
    assert_eq!(result.sequence_index, 1);
    assert!(result.report.approved);

    let scene = harness
        .store
        .get_scene(&result.scene_id)
        .await
        .unwrap()
        .expect("committed scene must be readable");
    assert_eq!(scene.sequence_index, 1);
    assert_eq!(scene.summary, outline().intent_summary);
    assert!(scene.critic_report.unwrap().approved);
}

#[tokio::test]
async fn retry_terminates_after_max_attempts_with_last_draft_and_report() {
    let dir = tempfile::TempDir::new().unwrap();
    let harness = setup(
        &dir,
        MockPlanner::returning(outline()),
        MockCritic::rejecting(),
    )
    .await;

    let err = harness
        .orchestrator(2)
        .generate_scene(&request())
        .await
        .unwrap_err();

    assert_eq!(harness.executor.calls(), 2);
    assert_eq!(harness.critic.calls(), 2);
    match err {
        GenerationError::Exhausted {
            attempts,
            last_draft,
            last_report,
        } => {
            assert_eq!(attempts, 2);
            assert!(last_draft.contains("(attempt 2)"));
            assert!(!last_report.approved);
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }

    // Nothing was committed.
    assert!(harness
        .store
        .scenes_for_project("p1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn second_attempt_approval_commits_once() {
    let dir = tempfile::TempDir::new().unwrap();
    let harness = setup(
        &dir,
        MockPlanner::returning(outline()),
        MockCritic::scripted(vec![false, true], false),
    )
    .await;

    let result = harness
        .orchestrator(2)
        .generate_scene(&request())
        .await
        .unwrap();

    assert_eq!(harness.executor.calls(), 2);
    assert!(result.scene_text.contains("(attempt 2)"));
    assert_eq!(harness.store.scenes_for_project("p1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn planning_failure_is_fatal_and_spends_no_retries() {
    let dir = tempfile::TempDir::new().unwrap();
    let harness = setup(
        &dir,
        MockPlanner::failing("planner offline"),
        MockCritic::approving(),
    )
    .await;

    let err = harness
        .orchestrator(2)
        .generate_scene(&request())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Planning(_)));
    assert_eq!(harness.executor.calls(), 0);
    assert_eq!(harness.critic.calls(), 0);
}

#[tokio::test]
async fn sequential_commits_assign_contiguous_sequence_indices() {
    let dir = tempfile::TempDir::new().unwrap();
    let harness = setup(
        &dir,
        MockPlanner::returning(outline()),
        MockCritic::approving(),
    )
    .await;
    let orchestrator = harness.orchestrator(2);

    let mut indices = Vec::new();
    for _ in 0..5 {
        let result = orchestrator.generate_scene(&request()).await.unwrap();
        indices.push(result.sequence_index);
    }
    assert_eq!(indices, vec![1, 2, 3, 4, 5]);

    let scenes = harness.store.scenes_for_project("p1").await.unwrap();
    let stored: Vec<i64> = scenes.iter().map(|s| s.sequence_index).collect();
    assert_eq!(stored, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn semantic_write_failure_rolls_back_the_scene_row() {
    let dir = tempfile::TempDir::new().unwrap();
    let harness = setup(
        &dir,
        MockPlanner::returning(outline()),
        MockCritic::approving(),
    )
    .await;
    let orchestrator = harness.orchestrator_with_index(Arc::new(WriteFailingIndex), 2);

    let err = orchestrator.generate_scene(&request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Persistence(_)));

    // Rollback verified by a subsequent read: no scene row is visible.
    assert!(harness
        .store
        .scenes_for_project("p1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn committed_scene_is_recallable_in_tier3() {
    let dir = tempfile::TempDir::new().unwrap();
    let harness = setup(
        &dir,
        MockPlanner::returning(outline()),
        MockCritic::approving(),
    )
    .await;

    harness
        .orchestrator(2)
        .generate_scene(&request())
        .await
        .unwrap();

    let hits = harness
        .semantic
        .query("p1", "the captain and the missing cargo", 3)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].sequence_index, 1);
}
