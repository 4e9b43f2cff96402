//! The generation state machine.
//!
//! PLANNING → TIER3_RETRIEVAL → (EXECUTING ⇄ CRITIQUING)* →
//! APPROVED → COMMITTING → DONE, or EXHAUSTED → FAILED.
//!
//! Every phase is a sequential blocking step: the outline is needed before
//! execution, the draft before critique. Retries resample the executor with
//! identical inputs — no critic feedback flows into the next attempt. That
//! is a known limitation of the pipeline, not a quality mechanism.

use crate::capabilities::{Critic, Executor, Planner, PlanningError};
use crate::committer::{PersistenceError, SceneCommitter};
use loreweaver_core::{CriticReport, NewScene, SceneOutline};
use loreweaver_memory::{ContextAssembler, StoreError};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// The three capability backends, injected explicitly per orchestrator
/// rather than living as process-wide singletons.
#[derive(Clone)]
pub struct GenerationServices {
    pub planner: Arc<dyn Planner>,
    pub executor: Arc<dyn Executor>,
    pub critic: Arc<dyn Critic>,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub project_id: String,
    pub user_prompt: String,
    pub active_characters: Vec<String>,
    pub location: String,
    pub characters_freetext: Option<String>,
}

/// A committed, approved scene.
#[derive(Debug, Clone)]
pub struct GeneratedScene {
    pub scene_id: String,
    pub sequence_index: i64,
    pub scene_text: String,
    pub report: CriticReport,
    pub outline: SceneOutline,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),
    #[error("generation failed after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        last_draft: String,
        last_report: CriticReport,
    },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("context assembly failed: {0}")]
    Context(#[from] StoreError),
}

pub struct SceneOrchestrator {
    assembler: ContextAssembler,
    committer: SceneCommitter,
    services: GenerationServices,
    max_retries: u32,
}

impl SceneOrchestrator {
    pub fn new(
        assembler: ContextAssembler,
        committer: SceneCommitter,
        services: GenerationServices,
        max_retries: u32,
    ) -> Self {
        Self {
            assembler,
            committer,
            services,
            max_retries,
        }
    }

    /// Run one generation request through the full state machine.
    pub async fn generate_scene(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedScene, GenerationError> {
        // PLANNING: tier 1 + tier 2 only; the planner never sees tier 3.
        let tier1 = self
            .assembler
            .tier1(
                &request.active_characters,
                &request.location,
                request.characters_freetext.as_deref(),
            )
            .await?;
        let tier2 = self.assembler.tier2(&request.project_id).await?;

        // A planning failure is fatal for the request; no retries are spent.
        let outline = self
            .services
            .planner
            .plan(&tier1, &tier2, &request.user_prompt)
            .await?;
        tracing::info!(
            "Planned scene for project {}: {}",
            request.project_id,
            outline.intent_summary
        );

        // TIER3_RETRIEVAL: semantic recall keyed on the planned intent.
        // Assembled once; every retry attempt reuses this exact context.
        let tier3 = self
            .assembler
            .tier3(&request.project_id, &outline.intent_summary)
            .await;
        let full_context = ContextAssembler::assemble(&tier1, &tier2, &tier3);

        // EXECUTING ⇄ CRITIQUING: bounded independent resamples.
        let mut last_draft = String::new();
        let mut last_report = CriticReport::rejected("no attempts were made");

        for attempt in 1..=self.max_retries {
            let draft = self
                .services
                .executor
                .execute(&full_context, &outline)
                .await;
            // The critic judges against tier-1 state only.
            let report = self.services.critic.critique(&tier1, &draft).await;

            tracing::debug!(
                "Attempt {}/{}: approved={} adherence={:.2}",
                attempt,
                self.max_retries,
                report.approved,
                report.metrics.trait_adherence_score
            );

            if report.approved {
                // APPROVED → COMMITTING
                let scene_id = fresh_scene_id();
                let committed = self
                    .committer
                    .commit(&NewScene {
                        id: scene_id,
                        project_id: request.project_id.clone(),
                        prompt: request.user_prompt.clone(),
                        scene_text: draft.clone(),
                        critic_report: Some(report.clone()),
                        location: request.location.clone(),
                        participants: request.active_characters.clone(),
                        summary: outline.intent_summary.clone(),
                        semantic_intent: outline.intent_summary.clone(),
                        causal_prereqs: Vec::new(),
                    })
                    .await?;

                return Ok(GeneratedScene {
                    scene_id: committed.scene_id,
                    sequence_index: committed.sequence_index,
                    scene_text: draft,
                    report,
                    outline,
                });
            }

            tracing::warn!(
                "Attempt {}/{} rejected: {}",
                attempt,
                self.max_retries,
                report.justification
            );
            last_draft = draft;
            last_report = report;
        }

        // EXHAUSTED → FAILED: the last draft and report travel with the
        // error so the caller can inspect what the critic objected to.
        Err(GenerationError::Exhausted {
            attempts: self.max_retries,
            last_draft,
            last_report,
        })
    }
}

fn fresh_scene_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("sc_{}", &hex[..8])
}
