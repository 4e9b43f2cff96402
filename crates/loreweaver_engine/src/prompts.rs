//! Prompt templates and structured-response parsing shared by every
//! provider. The section headers are part of the context wire format the
//! backends are tuned to.

use crate::capabilities::PlanningError;
use loreweaver_core::{CriticReport, SceneOutline};

pub const PLAN_SYSTEM: &str = "You are a master storyteller's Planner. Output ONLY valid JSON outlining the next scene.\n\
Schema:\n\
{\n\
  \"intent_summary\": \"1 sentence semantic summary\",\n\
  \"target_emotional_shift\": \"e.g., Hope to Despair\",\n\
  \"required_actions\": [\"List\", \"of\", \"events\"]\n\
}";

pub const EXECUTE_SYSTEM: &str = "You are a master storyteller. Your job is to EXECUTE the provided Scene Outline exactly.\n\
Adopt the style and tone from the Working Memory. Do NOT introduce elements not present in the Outline or State.\n\
Output ONLY the narrative prose. Do not include meta-commentary.";

pub const CRITIC_SYSTEM: &str = "You are the Consistency Critic. Evaluate the Scene Text against the State constraints.\n\
Output ONLY valid JSON.\n\
Schema:\n\
{\n\
  \"approved\": boolean,\n\
  \"metrics\": {\n\
     \"trait_adherence_score\": float (0-1),\n\
     \"temporal_continuity_flags\": int (0 is perfect),\n\
     \"state_drift_detected\": [\"list\", \"of\", \"unprompted\", \"state changes\"]\n\
  },\n\
  \"justification\": \"Explanation\"\n\
}";

/// Drafts beyond this length are truncated before critique; the critic only
/// needs enough text to judge consistency.
pub const CRITIC_DRAFT_CHAR_LIMIT: usize = 3000;

pub fn plan_prompt(state_context: &str, memory_context: &str, user_prompt: &str) -> String {
    format!(
        "### STATE ###\n{}\n\n### RECENT MEMORY ###\n{}\n\n### USER PROMPT ###\n{}",
        state_context, memory_context, user_prompt
    )
}

pub fn execute_prompt(full_context: &str, outline: &SceneOutline) -> String {
    let outline_json =
        serde_json::to_string_pretty(outline).unwrap_or_else(|_| "{}".to_string());
    format!(
        "{}\n\n### SCENE OUTLINE TO EXECUTE ###\n{}",
        full_context, outline_json
    )
}

pub fn critic_prompt(state_context: &str, draft_text: &str) -> String {
    let bounded: String = draft_text.chars().take(CRITIC_DRAFT_CHAR_LIMIT).collect();
    format!(
        "### STATE CONSTRAINTS ###\n{}\n\n### SCENE TEXT ###\n{}",
        state_context, bounded
    )
}

/// Parse a planner response into the strict three-field outline schema.
/// Anything else — including a syntactically valid JSON object missing a
/// field — is a malformed outline.
pub fn parse_outline(raw: &str) -> Result<SceneOutline, PlanningError> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(cleaned)
        .map_err(|e| PlanningError::MalformedOutline(format!("{} (raw: {:.120})", e, cleaned)))
}

/// Parse a critic response, failing closed: any parse problem yields a
/// rejection report rather than an error.
pub fn parse_critic_report(raw: &str) -> CriticReport {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str::<CriticReport>(cleaned) {
        Ok(report) => report,
        Err(e) => {
            tracing::warn!("Critic response did not parse, rejecting draft: {}", e);
            CriticReport::rejected(format!("Critic evaluation failed (parse error): {}", e))
        }
    }
}

/// Models often wrap JSON in markdown fences despite instructions.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_outline_accepts_exact_schema() {
        let raw = r#"{"intent_summary":"Ana confronts the captain","target_emotional_shift":"Calm to Fury","required_actions":["Ana enters","The captain lies"]}"#;
        let outline = parse_outline(raw).unwrap();
        assert_eq!(outline.required_actions.len(), 2);
    }

    #[test]
    fn parse_outline_strips_markdown_fences() {
        let raw = "```json\n{\"intent_summary\":\"a\",\"target_emotional_shift\":\"b\",\"required_actions\":[]}\n```";
        assert!(parse_outline(raw).is_ok());
    }

    #[test]
    fn parse_outline_rejects_missing_fields() {
        let raw = r#"{"intent_summary":"a"}"#;
        assert!(matches!(
            parse_outline(raw),
            Err(PlanningError::MalformedOutline(_))
        ));
    }

    #[test]
    fn parse_outline_rejects_prose() {
        assert!(parse_outline("Sure! Here is your outline:").is_err());
    }

    #[test]
    fn parse_critic_report_fails_closed_on_garbage() {
        let report = parse_critic_report("the scene looks fine to me");
        assert!(!report.approved);
        assert!(report.justification.contains("parse error"));
    }

    #[test]
    fn parse_critic_report_reads_full_schema() {
        let raw = r#"{"approved":true,"metrics":{"trait_adherence_score":0.9,"temporal_continuity_flags":0,"state_drift_detected":[]},"justification":"Consistent."}"#;
        let report = parse_critic_report(raw);
        assert!(report.approved);
        assert!((report.metrics.trait_adherence_score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn critic_prompt_truncates_long_drafts() {
        let draft = "x".repeat(10_000);
        let prompt = critic_prompt("state", &draft);
        assert!(prompt.len() < 4_000);
    }

    #[test]
    fn plan_prompt_keeps_section_order() {
        let prompt = plan_prompt("S", "M", "U");
        let s = prompt.find("### STATE ###").unwrap();
        let m = prompt.find("### RECENT MEMORY ###").unwrap();
        let u = prompt.find("### USER PROMPT ###").unwrap();
        assert!(s < m && m < u);
    }
}
