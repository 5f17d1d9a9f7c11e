//! HTTP routes for the memory service.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Path, Query, Request, State};
use axum::http::HeaderMap;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use log::{debug, info};
use mnemos_rs_memory::{
    AddMemoryResult, MemoryError, Metadata, MetadataValue, NewMemory, SearchHit, SearchQuery,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const USER_ID_HEADER: &str = "x-user-id";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/memory", post(add_memory))
        .route("/api/memory/search", post(search_memory))
        .route("/api/memory/session", post(add_session_memory))
        .route("/api/memory/{user_id}", delete(delete_memories))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    info!(
        "request handled (method={}, path={}, status={}, elapsed_ms={})",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// Body user id, falling back to the `x-user-id` header.
fn resolve_user_id(body: Option<String>, headers: &HeaderMap) -> String {
    body.filter(|user_id| !user_id.trim().is_empty())
        .or_else(|| {
            headers
                .get(USER_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default()
}

/// Convert a JSON object into scalar metadata.
fn metadata_from_json(field: &'static str, map: Map<String, Value>) -> Result<Metadata, ApiError> {
    map.into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| match MetadataValue::from_json(&value) {
            Some(value) => Ok((key, value)),
            None => Err(ApiError(MemoryError::validation(
                field,
                format!("value for {key:?} must be a string, number or boolean"),
            ))),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` when the store answers, `degraded` otherwise.
    pub status: &'static str,
    pub version: &'static str,
    pub store_connected: bool,
    pub timestamp: DateTime<Utc>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_connected = state.service.health_check().await;
    Json(HealthResponse {
        status: if store_connected { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        store_connected,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
pub struct AddMemoryRequest {
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
}

async fn add_memory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AddMemoryRequest>,
) -> Result<Json<AddMemoryResult>, ApiError> {
    let user_id = resolve_user_id(request.user_id, &headers);
    debug!(
        "add memory request (user_id={}, content_len={})",
        user_id,
        request.content.len()
    );
    let memory = NewMemory {
        content: request.content,
        user_id,
        session_id: request.session_id,
        agent_name: request.agent_name,
        metadata: metadata_from_json("metadata", request.metadata)?,
    };
    Ok(Json(state.service.add_memory(memory).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub score_threshold: Option<f32>,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub query: String,
}

async fn search_memory(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = SearchQuery {
        query: request.query.clone(),
        user_id: resolve_user_id(request.user_id, &headers),
        session_id: request.session_id,
        agent_name: request.agent_name,
        top_k: request.top_k.unwrap_or(state.default_top_k),
        score_threshold: request.score_threshold,
        filters: metadata_from_json("filters", request.filters)?,
    };
    let results = state.service.search_memory(query).await?;
    Ok(Json(SearchResponse {
        results,
        query: request.query,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
    pub user_id: String,
    pub events: Vec<Value>,
    #[serde(default)]
    pub app_name: Option<String>,
}

async fn add_session_memory(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<AddMemoryResult>, ApiError> {
    let result = state
        .service
        .add_session_to_memory(
            &request.session_id,
            &request.user_id,
            &request.events,
            request.app_name.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    pub session_id: Option<String>,
    pub agent_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted_count: usize,
}

async fn delete_memories(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted_count = state
        .service
        .delete_memories(
            &user_id,
            params.session_id.as_deref(),
            params.agent_name.as_deref(),
        )
        .await?;
    Ok(Json(DeleteResponse { deleted_count }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn body_user_id_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("header-user"));
        assert_eq!(
            resolve_user_id(Some("body-user".to_string()), &headers),
            "body-user"
        );
        assert_eq!(resolve_user_id(Some(" ".to_string()), &headers), "header-user");
        assert_eq!(resolve_user_id(None, &HeaderMap::new()), "");
    }

    #[test]
    fn metadata_accepts_scalars_only() {
        let Value::Object(map) = json!({ "topic": "lang", "rank": 2, "draft": false, "gone": null })
        else {
            unreachable!()
        };
        let metadata = metadata_from_json("metadata", map).expect("scalar metadata");
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata["rank"], MetadataValue::Integer(2));

        let Value::Object(map) = json!({ "nested": { "a": 1 } }) else {
            unreachable!()
        };
        let err = metadata_from_json("metadata", map).unwrap_err();
        assert_eq!(err.status_code().as_u16(), 400);
    }
}
