//! Main Gateway implementation
//!
//! axum router over the project workflow and the stateless refinement call.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use scopeforge_core::knowledge::SearchFilters;
use scopeforge_core::{
    KnowledgeBase, ProjectProfile, QuestionAnswer, RateCard, RefinementEngine, ScopeDocument,
    ScopeGenerator, TextGenerator,
};

use crate::config::GatewayConfig;
use crate::store::{ApprovalStatus, ProjectStore};
use crate::{GatewayError, Result};

const DEFAULT_SEARCH_LIMIT: usize = 5;
const MAX_SEARCH_LIMIT: usize = 20;

/// Gateway state shared across handlers
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub config: GatewayConfig,
    pub engine: RefinementEngine,
    pub generator: ScopeGenerator,
    pub knowledge: Arc<KnowledgeBase>,
    pub store: Arc<ProjectStore>,
}

impl GatewayState {
    pub fn new(
        config: GatewayConfig,
        text_generator: Arc<dyn TextGenerator>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Self {
        let engine = RefinementEngine::from_config(text_generator.clone(), &config.refinement)
            .with_rate_card(RateCard::with_overrides(config.rate_overrides.clone()));
        let generator = ScopeGenerator::new(text_generator, knowledge.clone())
            .with_timeout(Duration::from_secs(config.refinement.llm_timeout_secs))
            .with_contingency(config.contingency_percentage);

        Self {
            store: Arc::new(ProjectStore::new(config.max_versions_per_project)),
            config,
            engine,
            generator,
            knowledge,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefineScopeRequest {
    message: String,
    current_scope: ScopeDocument,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DocumentRequest {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateScopeRequest {
    #[serde(default)]
    answers: Vec<QuestionAnswer>,
}

#[derive(Debug, Deserialize)]
struct FinalizeRequest {
    approval_status: ApprovalStatus,
    #[serde(default)]
    user_feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    domain: Option<String>,
    limit: Option<usize>,
}

fn require_message(message: &str) -> Result<&str> {
    let message = message.trim();
    if message.is_empty() {
        return Err(GatewayError::InvalidRequest("message must not be empty".into()));
    }
    Ok(message)
}

/// Main Gateway
#[derive(Debug)]
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a gateway, loading the configured knowledge directory
    pub fn new(config: GatewayConfig, text_generator: Arc<dyn TextGenerator>) -> Result<Self> {
        config.validate()?;
        let knowledge = Arc::new(KnowledgeBase::new());
        if let Some(path) = &config.knowledge_base_path {
            knowledge.load_directory(&PathBuf::from(path))?;
        }
        Ok(Self::with_knowledge(config, text_generator, knowledge))
    }

    /// Create a gateway over an existing knowledge base
    pub fn with_knowledge(
        config: GatewayConfig,
        text_generator: Arc<dyn TextGenerator>,
        knowledge: Arc<KnowledgeBase>,
    ) -> Self {
        let state = Arc::new(GatewayState::new(config, text_generator, knowledge));
        Self { state }
    }

    /// Get gateway state
    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .state
            .config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        if origins.is_empty() {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/health", get(Self::handle_health))
            .route("/status", get(Self::handle_status))
            .route("/api/refinement/refine", post(Self::handle_refine_scope))
            .route(
                "/api/projects",
                get(Self::handle_list_projects).post(Self::handle_create_project),
            )
            .route("/api/projects/:id", get(Self::handle_get_project))
            .route("/api/projects/:id/document", post(Self::handle_document))
            .route("/api/projects/:id/analyze", post(Self::handle_analyze))
            .route("/api/projects/:id/scope", post(Self::handle_generate_scope))
            .route("/api/projects/:id/refine", post(Self::handle_refine_project))
            .route("/api/projects/:id/scope/versions", get(Self::handle_versions))
            .route("/api/projects/:id/finalize", post(Self::handle_finalize))
            .route("/api/knowledge/search", get(Self::handle_search))
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the gateway server; returns after Ctrl+C
    pub async fn start(&self) -> Result<()> {
        let addr = self.state.config.socket_addr()?;
        let router = self.build_router();

        tracing::info!("ScopeForge Gateway starting on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Gateway shutdown initiated");
                }
            })
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        Ok(())
    }

    // HTTP handlers

    async fn handle_health() -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "healthy",
            "version": crate::VERSION
        }))
    }

    async fn handle_status(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        Json(serde_json::json!({
            "version": crate::VERSION,
            "projects": state.store.len(),
            "knowledge_documents": state.knowledge.len(),
            "refinement": state.config.refinement,
        }))
    }

    async fn handle_refine_scope(
        State(state): State<Arc<GatewayState>>,
        Json(request): Json<RefineScopeRequest>,
    ) -> Result<impl IntoResponse> {
        let message = require_message(&request.message)?;
        let report = request.current_scope.validate()?;
        if !report.is_clean() {
            tracing::debug!(warnings = report.warnings.len(), "Refining scope with warnings");
        }
        let outcome = state.engine.refine(message, &request.current_scope).await;
        Ok(Json(outcome))
    }

    async fn handle_create_project(
        State(state): State<Arc<GatewayState>>,
        Json(profile): Json<ProjectProfile>,
    ) -> Result<impl IntoResponse> {
        if profile.name.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("project name must not be empty".into()));
        }
        let record = state.store.create(profile);
        Ok((StatusCode::CREATED, Json(record.summary())))
    }

    async fn handle_list_projects(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        let projects: Vec<serde_json::Value> =
            state.store.list().iter().map(|r| r.summary()).collect();
        Json(projects)
    }

    async fn handle_get_project(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<Uuid>,
    ) -> Result<impl IntoResponse> {
        Ok(Json(state.store.get(id)?.summary()))
    }

    async fn handle_document(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<Uuid>,
        Json(request): Json<DocumentRequest>,
    ) -> Result<impl IntoResponse> {
        state.store.get(id)?;
        if request.text.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("document text must not be empty".into()));
        }

        let entities = state.generator.extract_entities(&request.text).await;
        let profile = state.store.update(id, |record| {
            record.profile.merge_entities(&entities);
            record.document_text = Some(request.text);
            record.entities = Some(entities.clone());
            record.profile.clone()
        })?;

        Ok(Json(serde_json::json!({
            "entities": entities,
            "profile": profile,
        })))
    }

    async fn handle_analyze(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<Uuid>,
    ) -> Result<impl IntoResponse> {
        let record = state.store.get(id)?;
        let analysis = state
            .generator
            .analyze_project(&record.profile, record.document_text.as_deref())
            .await;
        state
            .store
            .update(id, |record| record.analysis = Some(analysis.clone()))?;
        Ok(Json(analysis))
    }

    async fn handle_generate_scope(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<Uuid>,
        Json(request): Json<GenerateScopeRequest>,
    ) -> Result<impl IntoResponse> {
        let record = state.store.get(id)?;
        let similar = record
            .analysis
            .as_ref()
            .map(|a| a.similar_projects.clone())
            .unwrap_or_default();

        let scope = state
            .generator
            .generate_scope(&record.profile, &request.answers, &similar)
            .await;
        let version = state.store.reset_scope(id, scope)?;
        Ok((StatusCode::CREATED, Json(version)))
    }

    async fn handle_refine_project(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<Uuid>,
        Json(request): Json<MessageRequest>,
    ) -> Result<impl IntoResponse> {
        let message = require_message(&request.message)?;
        let scope = state.store.latest_scope(id)?;
        let outcome = state.engine.refine(message, &scope).await;

        let version = if outcome.changes_made.is_empty() {
            None
        } else {
            let stored = state.store.push_version(
                id,
                outcome.updated_scope.clone(),
                message,
                outcome.changes_made.clone(),
            )?;
            Some(stored.version)
        };

        Ok(Json(serde_json::json!({
            "outcome": outcome,
            "version": version,
        })))
    }

    async fn handle_versions(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<Uuid>,
    ) -> Result<impl IntoResponse> {
        Ok(Json(state.store.get(id)?.versions))
    }

    async fn handle_finalize(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<Uuid>,
        Json(request): Json<FinalizeRequest>,
    ) -> Result<impl IntoResponse> {
        let record = state.store.get(id)?;
        let latest = record
            .latest()
            .ok_or_else(|| GatewayError::NoScope(id.to_string()))?;
        let approved = request.approval_status == ApprovalStatus::Approved;
        let feedback_recorded = request.user_feedback.is_some();

        // Only approved scopes become references for later projects.
        let document_id = if approved {
            let id_text = id.to_string();
            Some(
                state
                    .knowledge
                    .store_project_scope(Some(&id_text), &record.profile, &latest.scope),
            )
        } else {
            tracing::info!(project = %id, status = ?request.approval_status, "Scope saved without learning");
            None
        };

        state.store.update(id, |record| {
            record.approval_status = Some(request.approval_status);
            record.user_feedback = request.user_feedback;
            record.finalized = approved;
        })?;

        Ok(Json(serde_json::json!({
            "learning_status": if approved { "success" } else { "skipped" },
            "document_id": document_id,
            "version": latest.version,
            "feedback_recorded": feedback_recorded,
        })))
    }

    async fn handle_search(
        State(state): State<Arc<GatewayState>>,
        Query(params): Query<SearchParams>,
    ) -> Result<impl IntoResponse> {
        let query = params.q.trim();
        if query.is_empty() {
            return Err(GatewayError::InvalidRequest("query parameter 'q' is required".into()));
        }
        let limit = params
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);
        let filters = SearchFilters {
            domain: params.domain,
        };
        Ok(Json(state.knowledge.search_blocking(query, &filters, limit)))
    }
}
