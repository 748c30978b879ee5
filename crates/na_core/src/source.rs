use async_trait::async_trait;

use crate::error::SourceError;
use crate::types::Article;

#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Name of the search provider
    fn name(&self) -> &str;

    /// Search for articles matching `query`, normalized to [`Article`].
    async fn search(&self, query: &str) -> std::result::Result<Vec<Article>, SourceError>;
}
