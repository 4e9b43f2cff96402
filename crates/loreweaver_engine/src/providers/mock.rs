//! Deterministic capability mocks for testing the orchestrator without API
//! keys. Each records how many times it was invoked.

use crate::capabilities::{Critic, Executor, Planner, PlanningError};
use async_trait::async_trait;
use loreweaver_core::{CriticMetrics, CriticReport, SceneOutline};
use std::sync::atomic::{AtomicU32, Ordering};

pub struct MockPlanner {
    outline: SceneOutline,
    failure: Option<String>,
    calls: AtomicU32,
}

impl MockPlanner {
    pub fn returning(outline: SceneOutline) -> Self {
        Self {
            outline,
            failure: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outline: SceneOutline {
                intent_summary: String::new(),
                target_emotional_shift: String::new(),
                required_actions: Vec::new(),
            },
            failure: Some(message.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Planner for MockPlanner {
    async fn plan(
        &self,
        _state_context: &str,
        _memory_context: &str,
        _user_prompt: &str,
    ) -> Result<SceneOutline, PlanningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(PlanningError::Transport(message.clone())),
            None => Ok(self.outline.clone()),
        }
    }
}

pub struct MockExecutor {
    draft: String,
    calls: AtomicU32,
}

impl MockExecutor {
    pub fn returning(draft: &str) -> Self {
        Self {
            draft: draft.to_string(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, _full_context: &str, _outline: &SceneOutline) -> String {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{} (attempt {})", self.draft, attempt)
    }
}

/// Verdicts are consumed from a script, front first; once the script is
/// exhausted the default verdict repeats.
pub struct MockCritic {
    script: Vec<bool>,
    default_verdict: bool,
    calls: AtomicU32,
}

impl MockCritic {
    pub fn approving() -> Self {
        Self {
            script: Vec::new(),
            default_verdict: true,
            calls: AtomicU32::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            script: Vec::new(),
            default_verdict: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn scripted(script: Vec<bool>, default_verdict: bool) -> Self {
        Self {
            script,
            default_verdict,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Critic for MockCritic {
    async fn critique(&self, _state_context: &str, _draft_text: &str) -> CriticReport {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let approved = self
            .script
            .get(attempt)
            .copied()
            .unwrap_or(self.default_verdict);
        CriticReport {
            approved,
            metrics: CriticMetrics {
                trait_adherence_score: if approved { 0.9 } else { 0.2 },
                temporal_continuity_flags: 0,
                state_drift_detected: Vec::new(),
            },
            justification: format!("scripted verdict for attempt {}", attempt + 1),
        }
    }
}
