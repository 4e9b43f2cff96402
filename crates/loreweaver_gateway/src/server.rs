use crate::auth::SingleUserAuth;
use crate::types::{ErrorResponse, GenerateSceneRequest, GenerateSceneResponse};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use loreweaver_core::{Auth, LoreweaverConfig};
use loreweaver_engine::{
    GenerationError, GenerationRequest, GenerationServices, SceneCommitter, SceneOrchestrator,
};
use loreweaver_memory::{ContextAssembler, SemanticIndex, SqliteStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Shared state for the gateway server.
#[derive(Clone)]
struct AppState {
    store: SqliteStore,
    orchestrator: Arc<SceneOrchestrator>,
    auth: Arc<dyn Auth>,
}

/// The gateway HTTP server.
///
/// - `POST /generate_scene` — run one generation request end to end
/// - `GET /health` — health check
pub struct GatewayServer {
    state: AppState,
    host: String,
    port: u16,
}

impl GatewayServer {
    pub fn new(
        store: SqliteStore,
        semantic: Arc<dyn SemanticIndex>,
        services: GenerationServices,
        config: &LoreweaverConfig,
    ) -> Self {
        let assembler = ContextAssembler::new(store.clone(), semantic.clone(), &config.generation);
        let committer = SceneCommitter::new(store.clone(), semantic);
        let orchestrator = Arc::new(SceneOrchestrator::new(
            assembler,
            committer,
            services,
            config.generation.max_retries,
        ));
        let auth: Arc<dyn Auth> = Arc::new(SingleUserAuth::new(&config.auth));
        Self {
            state: AppState {
                store,
                orchestrator,
                auth,
            },
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/generate_scene", post(generate_scene))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Start the server. Spawns a background task and returns its handle.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        let app = self.router();
        let addr = format!("{}:{}", self.host, self.port);

        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(&addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!("Gateway failed to bind {}: {}", addr, e);
                    return;
                }
            };
            tracing::info!("Gateway listening on {}", addr);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Gateway server error: {}", e);
            }
        })
    }
}

// ============================================================================
// Route handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
            report: None,
        }),
    )
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// POST /generate_scene — synchronous request/response.
///
/// Auth and project ownership are checked up front; the request then runs
/// the full plan/execute/critique/commit pipeline before responding.
async fn generate_scene(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateSceneRequest>,
) -> Result<Json<GenerateSceneResponse>, ApiError> {
    let user = state
        .auth
        .current_user(bearer_token(&headers))
        .await
        .map_err(|e| api_error(StatusCode::UNAUTHORIZED, e.to_string()))?;

    // Ownership is part of the lookup: someone else's project id reads the
    // same as a nonexistent one.
    let project = state
        .store
        .get_project_for_user(&req.project_id, &user.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Project lookup failed: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Project lookup failed")
        })?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Project not found"))?;

    let request = GenerationRequest {
        project_id: project.id,
        user_prompt: req.user_prompt,
        active_characters: req.active_characters,
        location: req.location,
        characters_freetext: req.characters_freetext,
    };

    match state.orchestrator.generate_scene(&request).await {
        Ok(scene) => Ok(Json(GenerateSceneResponse {
            status: "success".to_string(),
            scene_id: scene.scene_id,
            sequence_index: scene.sequence_index,
            scene_text: scene.scene_text,
            critic_report: scene.report,
        })),
        Err(GenerationError::Exhausted {
            attempts,
            last_report,
            ..
        }) => {
            tracing::warn!(
                "Generation exhausted after {} attempts for project {}",
                attempts,
                request.project_id
            );
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    message: "Generation failed after max retries".to_string(),
                    report: Some(last_report),
                }),
            ))
        }
        Err(e) => {
            tracing::error!("Generation failed for project {}: {}", request.project_id, e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loreweaver_core::{Project, SceneOutline};
    use loreweaver_engine::providers::{MockCritic, MockExecutor, MockPlanner};
    use loreweaver_memory::{HashEmbedder, SqliteSemanticIndex};

    async fn state_with_critic(dir: &tempfile::TempDir, critic: MockCritic) -> AppState {
        let store = SqliteStore::new(dir.path().join("world.db")).await.unwrap();
        let semantic: Arc<dyn SemanticIndex> = Arc::new(
            SqliteSemanticIndex::new(dir.path().join("vectors.db"), Arc::new(HashEmbedder))
                .await
                .unwrap(),
        );
        store
            .insert_project(&Project {
                id: "p1".to_string(),
                name: "test world".to_string(),
                user_id: "local-user".to_string(),
                created_at: 0,
            })
            .await
            .unwrap();

        let services = GenerationServices {
            planner: Arc::new(MockPlanner::returning(SceneOutline {
                intent_summary: "a tense meeting".to_string(),
                target_emotional_shift: "Calm to Tense".to_string(),
                required_actions: vec!["they meet".to_string()],
            })),
            executor: Arc::new(MockExecutor::returning("The room fell silent")),
            critic: Arc::new(critic),
        };

        let server =
            GatewayServer::new(store, semantic, services, &LoreweaverConfig::default());
        server.state
    }

    fn request_body() -> GenerateSceneRequest {
        GenerateSceneRequest {
            project_id: "p1".to_string(),
            user_prompt: "they finally meet".to_string(),
            active_characters: Vec::new(),
            location: "the hall".to_string(),
            characters_freetext: None,
        }
    }

    fn authed_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer dev-token".parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = state_with_critic(&dir, MockCritic::approving()).await;

        let err = generate_scene(State(state), HeaderMap::new(), Json(request_body()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_project_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = state_with_critic(&dir, MockCritic::approving()).await;

        let mut body = request_body();
        body.project_id = "missing".to_string();
        let err = generate_scene(State(state), authed_headers(), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);
        assert_eq!(err.1.message, "Project not found");
        assert!(err.1.report.is_none());
    }

    #[tokio::test]
    async fn approved_generation_returns_committed_scene() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = state_with_critic(&dir, MockCritic::approving()).await;

        let response = generate_scene(State(state), authed_headers(), Json(request_body()))
            .await
            .unwrap();
        assert_eq!(response.status, "success");
        assert_eq!(response.sequence_index, 1);
        assert!(response.scene_id.starts_with("sc_"));
        assert!(response.critic_report.approved);
    }

    #[tokio::test]
    async fn exhausted_generation_returns_500_with_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = state_with_critic(&dir, MockCritic::rejecting()).await;

        let err = generate_scene(State(state), authed_headers(), Json(request_body()))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.1.message, "Generation failed after max retries");
        let report = err.1.report.as_ref().expect("last report travels with the error");
        assert!(!report.approved);
    }

    #[tokio::test]
    async fn bearer_extraction_requires_the_scheme_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
        assert!(bearer_token(&headers).is_none());

        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
