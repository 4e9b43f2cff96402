//! Groq backend (OpenAI-compatible chat completions endpoint).

use crate::capabilities::{Critic, Executor, Planner, PlanningError};
use crate::prompts;
use anyhow::{Context, Result};
use async_trait::async_trait;
use loreweaver_core::config::LlmConfig;
use loreweaver_core::{CriticReport, SceneOutline};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Clone)]
pub struct GroqProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GroqProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("GROQ_API_KEY").ok())
            .context("GROQ_API_KEY is not set")?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            base_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn chat(&self, system: &str, user: &str, json_mode: bool) -> Result<String> {
        let mut payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if json_mode {
            payload["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Groq request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Groq API error ({}): {:.200}", status, body);
        }

        let body: Value = response.json().await.context("Groq response was not JSON")?;
        Ok(body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl Planner for GroqProvider {
    async fn plan(
        &self,
        state_context: &str,
        memory_context: &str,
        user_prompt: &str,
    ) -> Result<SceneOutline, PlanningError> {
        let prompt = prompts::plan_prompt(state_context, memory_context, user_prompt);
        let raw = self
            .chat(prompts::PLAN_SYSTEM, &prompt, true)
            .await
            .map_err(|e| PlanningError::Transport(e.to_string()))?;
        prompts::parse_outline(&raw)
    }
}

#[async_trait]
impl Executor for GroqProvider {
    async fn execute(&self, full_context: &str, outline: &SceneOutline) -> String {
        let prompt = prompts::execute_prompt(full_context, outline);
        match self.chat(prompts::EXECUTE_SYSTEM, &prompt, false).await {
            Ok(text) => text,
            Err(e) => format!("Error connecting to executor backend: {}", e),
        }
    }
}

#[async_trait]
impl Critic for GroqProvider {
    async fn critique(&self, state_context: &str, draft_text: &str) -> CriticReport {
        let prompt = prompts::critic_prompt(state_context, draft_text);
        match self.chat(prompts::CRITIC_SYSTEM, &prompt, true).await {
            Ok(raw) => prompts::parse_critic_report(&raw),
            Err(e) => CriticReport::rejected(format!("Critic backend unreachable: {}", e)),
        }
    }
}
