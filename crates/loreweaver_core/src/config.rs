use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoreweaverConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
}

impl LoreweaverConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields. Env var overrides are applied after loading.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: LoreweaverConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file is missing or invalid, return
    /// defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("GROQ_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(n) = v.parse() {
                self.llm.temperature = n;
            }
        }
        if let Ok(v) = std::env::var("LOREWEAVER_DB") {
            self.database.path = v;
        }
        if let Ok(v) = std::env::var("LOREWEAVER_VECTOR_DB") {
            self.database.vector_path = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_HOST") {
            self.gateway.host = v;
        }
        if let Ok(v) = std::env::var("GATEWAY_PORT") {
            if let Ok(n) = v.parse() {
                self.gateway.port = n;
            }
        }
        if let Ok(v) = std::env::var("GENERATION_MAX_RETRIES") {
            if let Ok(n) = v.parse() {
                self.generation.max_retries = n;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend name: "groq", "ollama", or "mock".
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "dolphin3:latest".to_string(),
            base_url: None,
            api_key: None,
            max_tokens: 2500,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "fastembed" (downloads a model on first use) or "hash" (offline,
    /// deterministic — useful for air-gapped runs and tests).
    pub provider: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "fastembed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Upper bound on execute/critique attempts per request. Fixed, not
    /// adaptive.
    pub max_retries: u32,
    /// Recent-scene window for tier 2 context.
    pub tier2_window: usize,
    /// Nearest-neighbor matches for tier 3 context.
    pub tier3_matches: usize,
    /// Per-scene text excerpt bound (chars) in tier 2.
    pub excerpt_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            tier2_window: 3,
            tier3_matches: 3,
            excerpt_chars: 280,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Relational store (projects, characters, rules, scenes).
    pub path: String,
    /// Semantic store — a separate file on purpose: the two stores are
    /// independent collaborators with their own failure modes.
    pub vector_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "loreweaver.db".to_string(),
            vector_path: "loreweaver_vectors.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8700,
        }
    }
}

/// Dev-mode identity handed to the single-user auth stand-in. Real session
/// issuance is an external collaborator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub user_id: String,
    pub email: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_id: "local-user".to_string(),
            email: "local@loreweaver.dev".to_string(),
        }
    }
}
