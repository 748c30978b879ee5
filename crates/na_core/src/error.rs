use thiserror::Error;

use crate::types::StageName;

/// Failures of the article search provider.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("News API key is not configured")]
    Unconfigured,

    #[error("Search query is empty")]
    EmptyQuery,

    #[error("News API request failed{}: {body}", .status.map(|s| format!(" with status {}", s)).unwrap_or_default())]
    RequestFailed { status: Option<u16>, body: String },

    #[error("Invalid response from news API: {0}")]
    InvalidResponse(String),

    #[error("No articles found for that query")]
    NoResults,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("No articles to filter")]
    NoArticlesToFilter,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SummarizeError {
    #[error("No articles to summarize")]
    NoArticlesToSummarize,
}

/// An unexpected failure inside a pipeline stage, as opposed to the
/// business errors above.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage} stage failed: {message}")]
pub struct StageError {
    pub stage: StageName,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Summarize(#[from] SummarizeError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
