use na_core::{ArticleStorage, PipelineState, Stage};
use tracing::{debug, warn};

/// Store each (article, summary) pair of a completed run. Failures are logged
/// and skipped; the returned count is the number of pairs written.
pub async fn persist_results(storage: &dyn ArticleStorage, state: &PipelineState) -> usize {
    if state.stage != Stage::SummarizingComplete {
        debug!("Not persisting run ending at {}", state.stage);
        return 0;
    }

    let mut stored = 0;
    for (article, summary) in state.articles.iter().zip(&state.summaries) {
        let saved = match storage.store_article(article).await {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Failed to store article {}: {}", article.url, e);
                continue;
            }
        };
        match storage.store_summary(saved.id, summary, article.relevance_score).await {
            Ok(_) => stored += 1,
            Err(e) => warn!("Failed to store summary for {}: {}", article.url, e),
        }
    }
    debug!("Persisted {} of {} results", stored, state.summaries.len());
    stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use na_core::Article;
    use na_storage::MemoryStorage;

    fn completed() -> PipelineState {
        let mut state = PipelineState::new("visa");
        let mut first = Article::new("One", "Body one", "A", "http://a");
        first.relevance_score = Some(8.0);
        state.articles = vec![first, Article::new("Two", "Body two", "B", "http://b")];
        state.summaries = vec!["first".to_string(), "second".to_string()];
        state.stage = Stage::SummarizingComplete;
        state
    }

    #[tokio::test]
    async fn test_persist_completed_run() {
        let storage = MemoryStorage::new();
        assert_eq!(persist_results(&storage, &completed()).await, 2);

        let listed = storage.list_articles(0, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        let one = listed.iter().find(|a| a.article.url == "http://a").unwrap();
        let summaries = storage.summaries_for(one.id).await.unwrap();
        assert_eq!(summaries[0].summary_text, "first");
        assert_eq!(summaries[0].relevance_score, Some(8.0));
    }

    #[tokio::test]
    async fn test_failed_run_is_not_persisted() {
        let storage = MemoryStorage::new();
        let mut state = completed();
        state.stage = Stage::SearchError;
        state.error = Some("Search error: boom".to_string());

        assert_eq!(persist_results(&storage, &state).await, 0);
        assert!(storage.list_articles(0, 10).await.unwrap().is_empty());
    }
}
