//! Tiered context assembly.
//!
//! Tier 1: character/rule state snapshot. Tier 2: recent-scene working
//! memory, chronological. Tier 3: semantically recalled past scenes.
//!
//! The assembled blob always orders tier 1 before tier 2 before tier 3 with
//! blank-line separation. Executor backends are tuned to that section order;
//! it is a wire contract, not a formatting preference.

use crate::semantic::SemanticIndex;
use crate::store::{SqliteStore, StoreError};
use loreweaver_core::config::GenerationConfig;
use std::sync::Arc;

pub const CHARACTERS_HEADER: &str = "### ACTIVE CHARACTERS ###";
pub const RULES_HEADER: &str = "### RELEVANT WORLD RULES ###";
pub const WORKING_MEMORY_HEADER: &str = "### RECENT EVENTS (WORKING MEMORY) ###";
pub const PAST_EVENTS_HEADER: &str = "### RELEVANT PAST EVENTS ###";

pub const NO_CHARACTER_DATA: &str =
    "(No character data available; infer the characters from the prompt.)";
pub const NO_RULES: &str = "(No world rules recorded for this location.)";
pub const NO_RECENT_SCENES: &str = "(No prior scenes; this is the opening of the story.)";
pub const NO_PAST_EVENTS: &str = "(No relevant past events found.)";

/// Read-only reconstruction of a bounded working state from the two stores.
#[derive(Clone)]
pub struct ContextAssembler {
    store: SqliteStore,
    semantic: Arc<dyn SemanticIndex>,
    window: usize,
    tier3_matches: usize,
    excerpt_chars: usize,
}

impl ContextAssembler {
    pub fn new(
        store: SqliteStore,
        semantic: Arc<dyn SemanticIndex>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            store,
            semantic,
            window: config.tier2_window,
            tier3_matches: config.tier3_matches,
            excerpt_chars: config.excerpt_chars,
        }
    }

    /// Tier 1: active character snapshots plus world rules in force at the
    /// location.
    ///
    /// Fallback order when no character rows match: a caller-supplied
    /// freetext description verbatim, else an explicit infer-from-prompt
    /// placeholder. Absence of rules likewise yields a placeholder line;
    /// tier 1 never fails on missing data.
    pub async fn tier1(
        &self,
        active_character_ids: &[String],
        location: &str,
        freetext_fallback: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut parts = vec![format!("{}\n", CHARACTERS_HEADER)];

        let characters = self.store.characters_by_ids(active_character_ids).await?;
        if characters.is_empty() {
            match freetext_fallback.filter(|t| !t.trim().is_empty()) {
                Some(freetext) => parts.push(freetext.to_string()),
                None => parts.push(NO_CHARACTER_DATA.to_string()),
            }
        } else {
            for character in &characters {
                parts.push(format!("Name: {}", character.name));
                parts.push(format!("Core Psychology: {}", character.core_psychology));
                parts.push(format!("Current State: {}", character.current_state.render()));
                parts.push(String::new());
            }
        }

        parts.push(format!("{}\n", RULES_HEADER));
        let rules = self.store.rules_for_location(location).await?;
        if rules.is_empty() {
            parts.push(NO_RULES.to_string());
        } else {
            for rule in &rules {
                parts.push(format!("[{}] {}", rule.category, rule.rule_text));
            }
        }

        Ok(parts.join("\n"))
    }

    /// Tier 2: the most recent committed scenes in chronological order, as
    /// bounded excerpts (summary + prompt + capped text slice) — never the
    /// full scene text.
    ///
    /// Projects with no committed scenes fall back to the legacy timeline
    /// log; still empty means the story is just opening.
    pub async fn tier2(&self, project_id: &str) -> Result<String, StoreError> {
        let mut parts = vec![format!("{}\n", WORKING_MEMORY_HEADER)];

        let mut scenes = self.store.recent_scenes(project_id, self.window).await?;
        if !scenes.is_empty() {
            scenes.reverse(); // chronological
            for scene in &scenes {
                parts.push(format!(
                    "Scene {} at {}: {}",
                    scene.sequence_index, scene.location, scene.summary
                ));
                parts.push(format!("Prompt: {}", scene.prompt));
                parts.push(format!(
                    "Excerpt: {}",
                    bounded_excerpt(&scene.scene_text, self.excerpt_chars)
                ));
            }
            return Ok(parts.join("\n"));
        }

        let mut events = self
            .store
            .recent_timeline_events(project_id, self.window)
            .await?;
        if !events.is_empty() {
            events.reverse();
            for event in &events {
                parts.push(format!(
                    "Scene {} at {}: {}",
                    event.sequence_index, event.location, event.summary
                ));
            }
            return Ok(parts.join("\n"));
        }

        parts.push(NO_RECENT_SCENES.to_string());
        Ok(parts.join("\n"))
    }

    /// Tier 3: semantic recall against the planner's intent. Empty results
    /// and index failures both degrade to a placeholder; this tier never
    /// fails the request.
    pub async fn tier3(&self, project_id: &str, intent: &str) -> String {
        let hits = match self
            .semantic
            .query(project_id, intent, self.tier3_matches)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Tier-3 semantic recall failed, continuing without it: {}", e);
                Vec::new()
            }
        };

        let mut parts = vec![format!("{}\n", PAST_EVENTS_HEADER)];
        if hits.is_empty() {
            parts.push(NO_PAST_EVENTS.to_string());
        } else {
            for hit in &hits {
                parts.push(format!("- {}", hit.summary));
            }
        }
        parts.join("\n")
    }

    /// Concatenate the three tiers in their fixed order. Section order is
    /// part of the executor wire contract; do not reorder.
    pub fn assemble(tier1: &str, tier2: &str, tier3: &str) -> String {
        format!("{}\n\n{}\n\n{}", tier1, tier2, tier3)
    }
}

/// Cap an excerpt at `max_chars` characters, appending an ellipsis when cut.
fn bounded_excerpt(text: &str, max_chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut excerpt: String = flattened.chars().take(max_chars).collect();
    excerpt.push('…');
    excerpt
}
