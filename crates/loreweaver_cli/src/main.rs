use clap::Parser;
use loreweaver_core::{LoreweaverConfig, SceneOutline};
use loreweaver_engine::providers::{
    GroqProvider, MockCritic, MockExecutor, MockPlanner, OllamaProvider,
};
use loreweaver_engine::GenerationServices;
use loreweaver_gateway::GatewayServer;
use loreweaver_memory::{
    Embedder, FastembedEmbedder, HashEmbedder, SemanticIndex, SqliteSemanticIndex, SqliteStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "loreweaver.toml")]
    config: String,

    /// Override the relational database path
    #[arg(long)]
    db: Option<String>,

    /// Override the semantic index database path
    #[arg(long)]
    vector_db: Option<String>,

    /// Override the LLM backend: "groq", "ollama", or "mock"
    #[arg(long)]
    provider: Option<String>,

    /// Override the gateway bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the gateway bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config = LoreweaverConfig::load_or_default(&args.config);
    if let Some(db) = args.db {
        config.database.path = db;
    }
    if let Some(vector_db) = args.vector_db {
        config.database.vector_path = vector_db;
    }
    if let Some(provider) = args.provider {
        config.llm.provider = provider;
    }
    if let Some(host) = args.host {
        config.gateway.host = host;
    }
    if let Some(port) = args.port {
        config.gateway.port = port;
    }

    info!("Opening world store at {}", config.database.path);
    let store = SqliteStore::new(&config.database.path).await?;

    let embedder = build_embedder(&config)?;
    info!("Opening semantic index at {}", config.database.vector_path);
    let semantic: Arc<dyn SemanticIndex> = Arc::new(
        SqliteSemanticIndex::new(&config.database.vector_path, embedder).await?,
    );

    let services = build_services(&config)?;
    info!(
        "LLM backend: {} ({}), max_retries={}",
        config.llm.provider, config.llm.model, config.generation.max_retries
    );

    let server = GatewayServer::new(store, semantic, services, &config);
    server.start().await?;
    Ok(())
}

fn build_embedder(config: &LoreweaverConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    match config.embedding.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder)),
        "fastembed" => Ok(Arc::new(FastembedEmbedder::new()?)),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}

fn build_services(config: &LoreweaverConfig) -> anyhow::Result<GenerationServices> {
    match config.llm.provider.as_str() {
        "groq" => {
            let provider = Arc::new(GroqProvider::new(&config.llm)?);
            Ok(GenerationServices {
                planner: provider.clone(),
                executor: provider.clone(),
                critic: provider,
            })
        }
        "ollama" => {
            let provider = Arc::new(OllamaProvider::new(&config.llm)?);
            Ok(GenerationServices {
                planner: provider.clone(),
                executor: provider.clone(),
                critic: provider,
            })
        }
        // Offline smoke-test backend: every request plans the same outline
        // and is approved on the first attempt.
        "mock" => Ok(GenerationServices {
            planner: Arc::new(MockPlanner::returning(SceneOutline {
                intent_summary: "A placeholder scene advancing the story".to_string(),
                target_emotional_shift: "Neutral to Curious".to_string(),
                required_actions: vec!["The characters take stock of the situation".to_string()],
            })),
            executor: Arc::new(MockExecutor::returning(
                "The scene unfolds quietly, exactly as outlined.",
            )),
            critic: Arc::new(MockCritic::approving()),
        }),
        other => anyhow::bail!("Unknown LLM provider: {}", other),
    }
}
