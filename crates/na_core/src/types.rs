use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub source: String,
    pub url: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sentiment: Option<f64>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Set by the relevance filter, 0-10.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

impl Article {
    pub fn new(title: impl Into<String>, content: impl Into<String>, source: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            source: source.into(),
            url: url.into(),
            published_at: None,
            sentiment: None,
            authors: Vec::new(),
            image: None,
            relevance_score: None,
        }
    }

    /// The first `max_chars` characters of the content, with `...` appended
    /// when something was cut.
    pub fn preview(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &self.content[..idx]),
            None => self.content.clone(),
        }
    }
}

/// The three pipeline stages, used to label errors and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Search,
    Filter,
    Summarize,
}

impl StageName {
    pub fn completed(self) -> Stage {
        match self {
            StageName::Search => Stage::SearchComplete,
            StageName::Filter => Stage::FilteringComplete,
            StageName::Summarize => Stage::SummarizingComplete,
        }
    }

    pub fn failed(self) -> Stage {
        match self {
            StageName::Search => Stage::SearchError,
            StageName::Filter => Stage::FilterError,
            StageName::Summarize => Stage::SummarizeError,
        }
    }

    /// Capitalized label used as the error message prefix.
    pub fn label(self) -> &'static str {
        match self {
            StageName::Search => "Search",
            StageName::Filter => "Filter",
            StageName::Summarize => "Summarize",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageName::Search => write!(f, "search"),
            StageName::Filter => write!(f, "filter"),
            StageName::Summarize => write!(f, "summarize"),
        }
    }
}

/// Stage marker carried by [`PipelineState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    SearchComplete,
    SearchError,
    FilteringComplete,
    FilterError,
    SummarizingComplete,
    SummarizeError,
    /// The run was aborted by an unexpected failure rather than a stage error.
    ExecutionError,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Stage::SummarizingComplete
                | Stage::SearchError
                | Stage::FilterError
                | Stage::SummarizeError
                | Stage::ExecutionError
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::SearchComplete => "search_complete",
            Stage::SearchError => "search_error",
            Stage::FilteringComplete => "filtering_complete",
            Stage::FilterError => "filter_error",
            Stage::SummarizingComplete => "summarizing_complete",
            Stage::SummarizeError => "summarize_error",
            Stage::ExecutionError => "execution_error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State threaded through search, filter and summarize.
///
/// Once `error` is set, no later stage touches `articles`, `summaries` or
/// `takeaways`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    query: String,
    pub articles: Vec<Article>,
    pub summaries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub takeaways: Option<String>,
    #[serde(rename = "current_step")]
    pub stage: Stage,
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            articles: Vec::new(),
            summaries: Vec::new(),
            takeaways: None,
            stage: Stage::Initial,
            error: None,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Pairs retained articles with their summaries by position.
    pub fn results(&self) -> Vec<ArticleSummary> {
        self.articles
            .iter()
            .zip(self.summaries.iter())
            .map(|(article, summary)| ArticleSummary {
                title: article.title.clone(),
                summary: summary.clone(),
                source: article.source.clone(),
                url: article.url.clone(),
                relevance_score: article.relevance_score,
            })
            .collect()
    }
}

/// One row of the caller-facing result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub title: String,
    pub summary: String,
    pub source: String,
    pub url: String,
    pub relevance_score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: Uuid,
    #[serde(flatten)]
    pub article: Article,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSummary {
    pub id: Uuid,
    pub article_id: Uuid,
    pub summary_text: String,
    pub relevance_score: Option<f32>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let article = Article::new("t", "héllo wörld", "s", "u");
        assert_eq!(article.preview(5), "héllo...");
        assert_eq!(article.preview(100), "héllo wörld");
        assert_eq!(article.preview(11), "héllo wörld");
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let state = PipelineState::new("visa in the usa");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["current_step"], "initial");
        assert_eq!(json["query"], "visa in the usa");
        assert_eq!(serde_json::to_value(Stage::FilteringComplete).unwrap(), "filtering_complete");
    }

    #[test]
    fn test_results_pair_by_position() {
        let mut state = PipelineState::new("q");
        let mut first = Article::new("A", "a", "S1", "http://a");
        first.relevance_score = Some(7.0);
        state.articles = vec![first, Article::new("B", "b", "S2", "http://b")];
        state.summaries = vec!["sa".to_string(), "sb".to_string()];

        let results = state.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "A");
        assert_eq!(results[0].summary, "sa");
        assert_eq!(results[0].relevance_score, Some(7.0));
        assert_eq!(results[1].source, "S2");
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(StageName::Search.failed(), Stage::SearchError);
        assert_eq!(StageName::Summarize.completed(), Stage::SummarizingComplete);
        assert!(Stage::FilterError.is_terminal());
        assert!(!Stage::SearchComplete.is_terminal());
    }
}
