//! Local Ollama backend. Implements all three capabilities against the
//! `/api/generate` endpoint; JSON mode is used for the planner and critic.

use crate::capabilities::{Critic, Executor, Planner, PlanningError};
use crate::prompts;
use anyhow::{Context, Result};
use async_trait::async_trait;
use loreweaver_core::config::LlmConfig;
use loreweaver_core::{CriticReport, SceneOutline};
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .or_else(|| env::var("OLLAMA_BASE_URL").ok())
            .unwrap_or_else(|| "http://localhost:11434".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn generate(&self, system: &str, prompt: &str, json_mode: bool) -> Result<String> {
        let mut payload = json!({
            "model": self.model,
            "system": system,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        if json_mode {
            payload["format"] = json!("json");
        }

        tracing::debug!(
            "Ollama generate: model={} json_mode={} prompt_len={}",
            self.model,
            json_mode,
            prompt.len()
        );

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("Ollama request failed")?
            .error_for_status()
            .context("Ollama returned an error status")?;

        let body: Value = response.json().await.context("Ollama response was not JSON")?;
        Ok(body["response"].as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl Planner for OllamaProvider {
    async fn plan(
        &self,
        state_context: &str,
        memory_context: &str,
        user_prompt: &str,
    ) -> Result<SceneOutline, PlanningError> {
        let prompt = prompts::plan_prompt(state_context, memory_context, user_prompt);
        let raw = self
            .generate(prompts::PLAN_SYSTEM, &prompt, true)
            .await
            .map_err(|e| PlanningError::Transport(e.to_string()))?;
        prompts::parse_outline(&raw)
    }
}

#[async_trait]
impl Executor for OllamaProvider {
    async fn execute(&self, full_context: &str, outline: &SceneOutline) -> String {
        let prompt = prompts::execute_prompt(full_context, outline);
        match self.generate(prompts::EXECUTE_SYSTEM, &prompt, false).await {
            Ok(text) => text,
            // Inline error text: the critic rejects it and a retry is spent.
            Err(e) => format!("Error connecting to executor backend: {}", e),
        }
    }
}

#[async_trait]
impl Critic for OllamaProvider {
    async fn critique(&self, state_context: &str, draft_text: &str) -> CriticReport {
        let prompt = prompts::critic_prompt(state_context, draft_text);
        match self.generate(prompts::CRITIC_SYSTEM, &prompt, true).await {
            Ok(raw) => prompts::parse_critic_report(&raw),
            Err(e) => CriticReport::rejected(format!("Critic backend unreachable: {}", e)),
        }
    }
}
