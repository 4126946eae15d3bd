//! textsim HTTP REST API
//!
//! Axum-based HTTP server for the similarity, session and search-intent
//! endpoints used by the browser client.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum dispatch
//! machinery.
//!
//! Endpoints:
//! - GET  /health - health check with DB status
//! - GET  /version - server version info
//! - POST /api/save_session/ - create or update a session
//! - GET  /api/get_session_data/ - fetch session data + summary
//! - GET  /api/get_session_id/ - mint a new session id (POST also accepted)
//! - POST /api/get_similarity/ - score two texts (form body)
//! - POST /api/generate_search_intents/ - five search intents for a text
//!
//! Any other method on the /api routes gets a JSON 405.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use textsim_core::config::OpenAiConfig;
use textsim_core::{
    ChatBackend, ClientSettings, EmbeddingBackend, IntentError, IntentGenerator,
    OpenAiChatClient, OpenAiEmbeddingClient, SimilarityOutcome, SimilarityScorer, Summarizer,
    TextsimConfig, UnconfiguredChat, UnconfiguredEmbeddings,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::subsystems::sessions::{self, SessionError, SessionRepository};
use crate::subsystems::similarity::{self, TextPairRepository};
use crate::subsystems::store::PgStore;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: PgPool,
    pub sessions: Arc<dyn SessionRepository>,
    pub text_pairs: Arc<dyn TextPairRepository>,
    pub scorer: SimilarityScorer,
    pub summarizer: Summarizer,
    pub intents: IntentGenerator,
}

impl HttpState {
    /// Wire Postgres persistence and the hosted-model clients together.
    pub fn new(
        pool: PgPool,
        embedder: Arc<dyn EmbeddingBackend>,
        chat: Arc<dyn ChatBackend>,
    ) -> Self {
        let store = Arc::new(PgStore::new(pool.clone()));
        Self {
            pool,
            sessions: store.clone(),
            text_pairs: store,
            scorer: SimilarityScorer::new(embedder),
            summarizer: Summarizer::new(chat.clone()),
            intents: IntentGenerator::new(chat),
        }
    }
}

/// Build the hosted-model clients. A client that cannot be built (no API key)
/// is replaced by one that fails every call, so the session endpoints keep
/// working and the model-backed ones degrade.
pub fn model_backends(
    config: &OpenAiConfig,
    api_key: &str,
) -> (Arc<dyn EmbeddingBackend>, Arc<dyn ChatBackend>) {
    let embedder: Arc<dyn EmbeddingBackend> =
        match OpenAiEmbeddingClient::new(ClientSettings::for_embeddings(config, api_key)) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::warn!(error = %e, "Embedding client unavailable: similarity scores will be reported as unavailable");
                Arc::new(UnconfiguredEmbeddings)
            }
        };

    let chat: Arc<dyn ChatBackend> =
        match OpenAiChatClient::new(ClientSettings::for_chat(config, api_key)) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::warn!(error = %e, "Chat client unavailable: summaries and search intents will fail");
                Arc::new(UnconfiguredChat)
            }
        };

    (embedder, chat)
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route(
            "/api/save_session/",
            post(save_session_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/api/get_session_data/",
            get(get_session_data_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/api/get_session_id/",
            get(get_session_id_handler)
                .post(get_session_id_handler)
                .fallback(method_not_allowed_handler),
        )
        .route(
            "/api/get_similarity/",
            post(get_similarity_handler).fallback(method_not_allowed_handler),
        )
        .route(
            "/api/generate_search_intents/",
            post(generate_search_intents_handler).fallback(method_not_allowed_handler),
        )
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: HttpState,
    config: &TextsimConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);

    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("textsim HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct SaveSessionRequest {
    pub session_id: Option<String>,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SimilarityForm {
    pub text1: Option<String>,
    pub text2: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct IntentRequest {
    pub text: Option<String>,
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    json!({ "error": msg.into() })
}

fn session_error(e: SessionError) -> (StatusCode, serde_json::Value) {
    match e {
        SessionError::Validation(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
        SessionError::Store(e) => {
            tracing::error!(error = %e, "Session store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, error_body(e.to_string()))
        }
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check - queries DB and returns (status_code, json_body).
pub async fn health_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    match textsim_core::db::health_check(pool).await {
        Ok(pg_ver) => (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "postgresql": pg_ver,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version - returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "textsim/1",
    })
}

pub async fn save_session_inner(
    state: &HttpState,
    req: SaveSessionRequest,
) -> (StatusCode, serde_json::Value) {
    match sessions::save_session(
        state.sessions.as_ref(),
        &state.summarizer,
        req.session_id.as_deref(),
        req.data.as_ref(),
    )
    .await
    {
        Ok(record) => (
            StatusCode::OK,
            json!({ "success": true, "summary": record.summary }),
        ),
        Err(e) => session_error(e),
    }
}

pub async fn get_session_data_inner(
    state: &HttpState,
    query: SessionQuery,
) -> (StatusCode, serde_json::Value) {
    match sessions::get_session(state.sessions.as_ref(), query.session_id.as_deref()).await {
        Ok(Some(view)) => (
            StatusCode::OK,
            json!({ "data": view.data, "summary": view.summary }),
        ),
        Ok(None) => (StatusCode::OK, json!({ "data": null, "summary": null })),
        Err(e) => session_error(e),
    }
}

/// Inner session id - a fresh random v4 UUID (pure, no IO).
pub fn get_session_id_inner() -> serde_json::Value {
    json!({ "session_id": uuid::Uuid::new_v4().to_string() })
}

pub async fn get_similarity_inner(
    state: &HttpState,
    query: SessionQuery,
    form: SimilarityForm,
) -> (StatusCode, serde_json::Value) {
    let session_id = match query.session_id {
        Some(s) if !s.trim().is_empty() => s,
        _ => return (StatusCode::BAD_REQUEST, error_body("Missing session_id")),
    };

    let (text1, text2) = match (form.text1, form.text2) {
        (Some(a), Some(b)) if !a.trim().is_empty() && !b.trim().is_empty() => (a, b),
        _ => return (StatusCode::BAD_REQUEST, error_body("Missing text1 or text2")),
    };

    let outcome = similarity::score_pair(
        &state.scorer,
        state.text_pairs.as_ref(),
        Some(&session_id),
        &text1,
        &text2,
    )
    .await;

    let mut body = json!({
        "similarity_score": outcome.score_or_zero(),
        "session_id": session_id,
        "score_available": outcome.is_available(),
    });
    if let (SimilarityOutcome::Unavailable { reason }, Some(obj)) = (&outcome, body.as_object_mut()) {
        obj.insert("reason".to_string(), json!(reason));
    }

    (StatusCode::OK, body)
}

pub async fn generate_search_intents_inner(
    state: &HttpState,
    req: IntentRequest,
) -> (StatusCode, serde_json::Value) {
    let text = req.text.unwrap_or_default();

    match state.intents.generate(&text).await {
        Ok(intents) => (StatusCode::OK, json!({ "intents": intents })),
        Err(IntentError::BadInput(msg)) => (StatusCode::BAD_REQUEST, error_body(msg)),
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "Search intent generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": e.to_string(), "kind": e.kind() }),
            )
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin - delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn save_session_handler(
    State(state): State<Arc<HttpState>>,
    payload: Result<Json<SaveSessionRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(req)) => save_session_inner(&state, req).await,
        Err(e) => (StatusCode::BAD_REQUEST, error_body(e.body_text())),
    };
    (status, Json(body))
}

pub async fn get_session_data_handler(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<SessionQuery>, QueryRejection>,
) -> impl IntoResponse {
    let (status, body) = match query {
        Ok(Query(query)) => get_session_data_inner(&state, query).await,
        Err(e) => (StatusCode::BAD_REQUEST, error_body(e.body_text())),
    };
    (status, Json(body))
}

pub async fn get_session_id_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(get_session_id_inner()))
}

pub async fn get_similarity_handler(
    State(state): State<Arc<HttpState>>,
    query: Result<Query<SessionQuery>, QueryRejection>,
    form: Result<Form<SimilarityForm>, FormRejection>,
) -> impl IntoResponse {
    let (status, body) = match (query, form) {
        (Ok(Query(query)), Ok(Form(form))) => get_similarity_inner(&state, query, form).await,
        (Err(e), _) => (StatusCode::BAD_REQUEST, error_body(e.body_text())),
        (_, Err(e)) => (StatusCode::BAD_REQUEST, error_body(e.body_text())),
    };
    (status, Json(body))
}

pub async fn generate_search_intents_handler(
    State(state): State<Arc<HttpState>>,
    payload: Result<Json<IntentRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(req)) => generate_search_intents_inner(&state, req).await,
        Err(e) => (StatusCode::BAD_REQUEST, error_body(e.body_text())),
    };
    (status, Json(body))
}

pub async fn method_not_allowed_handler() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(error_body("Method not allowed")),
    )
}

// ============================================================================
// Unit Tests - inner functions and router dispatch against in-memory fakes
// ============================================================================
