//! The three pluggable generative-text capabilities.
//!
//! Their failure contracts differ deliberately. A planner that cannot
//! produce a valid outline fails the whole request. An executor never fails
//! structurally — transport errors come back as inline text, which the
//! critic then rejects. A critic always produces a report; when it cannot,
//! the adapter fabricates a fail-closed rejection so a parse failure can
//! never read as approval.

use async_trait::async_trait;
use loreweaver_core::{CriticReport, SceneOutline};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("planner backend unreachable: {0}")]
    Transport(String),
    #[error("planner returned a malformed outline: {0}")]
    MalformedOutline(String),
}

/// Drafts a structured scene outline from state, working memory and the
/// user's prompt. Fatal on failure: the orchestrator spends no retries here.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        state_context: &str,
        memory_context: &str,
        user_prompt: &str,
    ) -> Result<SceneOutline, PlanningError>;
}

/// Turns an outline into narrative prose against the full assembled context.
/// Must follow the outline's required actions and the tone of the memory
/// tier; introducing entities absent from context/outline is advisory only —
/// the critic enforces it downstream.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Never a structured error: a transport failure returns descriptive
    /// text that the critic will reject, consuming a retry attempt.
    async fn execute(&self, full_context: &str, outline: &SceneOutline) -> String;
}

/// Evaluates a draft against the tier-1 state snapshot.
#[async_trait]
pub trait Critic: Send + Sync {
    /// Always returns a report; internal failures come back as
    /// `approved=false` with an explanatory justification.
    async fn critique(&self, state_context: &str, draft_text: &str) -> CriticReport;
}
