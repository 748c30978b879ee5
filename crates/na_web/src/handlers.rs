use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use futures::stream;
use na_agent::persist_results;
use na_core::{ArticleStorage, ArticleSummary, StoredArticle, StoredSummary};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;

const DEFAULT_THREAD_ID: &str = "default";

/// JSON error body shaped as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self { status, detail: detail.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<na_core::Error> for ApiError {
    fn from(e: na_core::Error) -> Self {
        let status = match e {
            na_core::Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    5
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Vec<ArticleSummary>>, ApiError> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Query must not be empty"));
    }

    let result = state.pipeline.run(query).await;
    if let Some(error) = result.error {
        error!("Query {:?} failed: {}", query, error);
        return Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, error));
    }

    if let Some(storage) = &state.storage {
        persist_results(storage.as_ref(), &result).await;
    }

    let mut results = result.results();
    results.truncate(request.max_results);
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

fn storage(state: &AppState) -> Result<&Arc<dyn ArticleStorage>, ApiError> {
    state
        .storage
        .as_ref()
        .ok_or_else(|| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "No storage backend configured"))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<StoredArticle>>, ApiError> {
    let articles = storage(&state)?.list_articles(page.skip, page.limit).await?;
    Ok(Json(articles))
}

pub async fn get_summaries(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<String>,
) -> Result<Json<Vec<StoredSummary>>, ApiError> {
    let id = Uuid::parse_str(&article_id)
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid article id: {}", article_id)))?;
    let summaries = storage(&state)?.summaries_for(id).await?;
    Ok(Json(summaries))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub thread_id: Option<String>,
}

/// Streams the agent's fragments as `text/plain`. Failures, including a
/// malformed body, arrive as a single `Error: ...` fragment.
pub async fn chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let (tx, rx) = mpsc::channel::<String>(32);

    match serde_json::from_slice::<ChatRequest>(&body) {
        Ok(request) => {
            let thread_id = request.thread_id.unwrap_or_else(|| DEFAULT_THREAD_ID.to_string());
            info!("Chat request on thread {}", thread_id);
            let agent = state.chat.clone();
            tokio::spawn(async move {
                if let Err(e) = agent.respond(&thread_id, &request.message, &tx).await {
                    error!("Chat on thread {} failed: {}", thread_id, e);
                    let _ = tx.send(format!("Error: {}", e)).await;
                }
            });
        }
        Err(e) => {
            let _ = tx.send(format!("Error: invalid chat request: {}", e)).await;
        }
    }

    let fragments = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|fragment| (Ok::<_, Infallible>(fragment), rx))
    });
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], Body::from_stream(fragments)).into_response()
}

pub async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}
