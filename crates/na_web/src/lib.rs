use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/query", post(handlers::query))
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/summaries/:article_id", get(handlers::get_summaries))
        .route("/chat", post(handlers::chat))
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use crate::{create_app, AppState};
    pub use na_core::{ArticleSummary, Error, Result};
}
