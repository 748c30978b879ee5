use async_trait::async_trait;
use uuid::Uuid;

use crate::types::{Article, StoredArticle, StoredSummary};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Store an article, keyed by url. Re-storing an url keeps its id.
    async fn store_article(&self, article: &Article) -> Result<StoredArticle>;

    /// Attach a summary to a stored article
    async fn store_summary(&self, article_id: Uuid, summary_text: &str, relevance_score: Option<f32>) -> Result<StoredSummary>;

    /// Most recently stored articles first
    async fn list_articles(&self, skip: usize, limit: usize) -> Result<Vec<StoredArticle>>;

    async fn get_article(&self, id: Uuid) -> Result<Option<StoredArticle>>;

    async fn summaries_for(&self, article_id: Uuid) -> Result<Vec<StoredSummary>>;
}
