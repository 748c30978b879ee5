use async_trait::async_trait;
use chrono::Utc;
use na_core::{Article, ArticleStorage, Error, Result, StoredArticle, StoredSummary};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryStore {
    articles: Vec<StoredArticle>,
    summaries: Vec<StoredSummary>,
}

impl MemoryStore {
    fn store_article(&mut self, article: &Article) -> StoredArticle {
        let existing = (!article.url.is_empty())
            .then(|| self.articles.iter_mut().find(|s| s.article.url == article.url))
            .flatten();

        if let Some(existing) = existing {
            existing.article = article.clone();
            return existing.clone();
        }

        let stored = StoredArticle {
            id: Uuid::new_v4(),
            article: article.clone(),
            created_at: Utc::now(),
        };
        self.articles.push(stored.clone());
        stored
    }
}

/// Process-local storage, lost on exit.
#[derive(Default)]
pub struct MemoryStorage {
    store: RwLock<MemoryStore>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStorage for MemoryStorage {
    async fn store_article(&self, article: &Article) -> Result<StoredArticle> {
        let mut store = self.store.write().await;
        Ok(store.store_article(article))
    }

    async fn store_summary(&self, article_id: Uuid, summary_text: &str, relevance_score: Option<f32>) -> Result<StoredSummary> {
        let mut store = self.store.write().await;
        if !store.articles.iter().any(|a| a.id == article_id) {
            return Err(Error::NotFound(format!("article {}", article_id)));
        }
        let summary = StoredSummary {
            id: Uuid::new_v4(),
            article_id,
            summary_text: summary_text.to_string(),
            relevance_score,
            created_at: Utc::now(),
        };
        store.summaries.push(summary.clone());
        Ok(summary)
    }

    async fn list_articles(&self, skip: usize, limit: usize) -> Result<Vec<StoredArticle>> {
        let store = self.store.read().await;
        Ok(store.articles.iter().rev().skip(skip).take(limit).cloned().collect())
    }

    async fn get_article(&self, id: Uuid) -> Result<Option<StoredArticle>> {
        let store = self.store.read().await;
        Ok(store.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn summaries_for(&self, article_id: Uuid) -> Result<Vec<StoredSummary>> {
        let store = self.store.read().await;
        Ok(store.summaries.iter().filter(|s| s.article_id == article_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        let first = storage.store_article(&Article::new("First", "one", "S", "http://a")).await.unwrap();
        let second = storage.store_article(&Article::new("Second", "two", "S", "http://b")).await.unwrap();

        let updated = storage.store_article(&Article::new("First v2", "one again", "S", "http://a")).await.unwrap();
        assert_eq!(updated.id, first.id);
        assert_eq!(updated.article.title, "First v2");

        let listed = storage.list_articles(0, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(storage.list_articles(1, 10).await.unwrap()[0].id, first.id);
        assert!(storage.list_articles(2, 10).await.unwrap().is_empty());

        storage.store_summary(first.id, "A summary", Some(7.0)).await.unwrap();
        let summaries = storage.summaries_for(first.id).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].relevance_score, Some(7.0));
        assert!(storage.summaries_for(second.id).await.unwrap().is_empty());

        assert!(storage.get_article(second.id).await.unwrap().is_some());
        assert!(storage.get_article(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_summary_requires_article() {
        let storage = MemoryStorage::new();
        let err = storage.store_summary(Uuid::new_v4(), "orphan", None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_articles_without_url_are_not_merged() {
        let storage = MemoryStorage::new();
        let a = storage.store_article(&Article::new("A", "a", "S", "")).await.unwrap();
        let b = storage.store_article(&Article::new("B", "b", "S", "")).await.unwrap();
        assert_ne!(a.id, b.id);
    }
}
