pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod source;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, FilterError, Result, SourceError, StageError, SummarizeError};
pub use models::{GenerationOptions, InferenceModel};
pub use source::ArticleSource;
pub use storage::ArticleStorage;
pub use types::{Article, ArticleSummary, PipelineState, Stage, StageName, StoredArticle, StoredSummary};
