use std::fmt;
use std::time::Duration;

use url::Url;

use crate::{Error, Result};

pub const DEFAULT_NEWS_API_URL: &str = "https://eventregistry.org/api/v1/article/getArticles";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Process-wide configuration, built once in `main` and handed to each adapter.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub news: NewsConfig,
    pub model: ModelConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.news.api_url)
            .map_err(|e| Error::Config(format!("Invalid news API url {}: {}", self.news.api_url, e)))?;
        if let Some(base_url) = &self.model.base_url {
            Url::parse(base_url)
                .map_err(|e| Error::Config(format!("Invalid model url {}: {}", base_url, e)))?;
        }
        if self.news.articles_count == 0 {
            return Err(Error::Config("articles count must be at least 1".to_string()));
        }
        self.pipeline.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortOrder {
    /// Most relevant first
    #[default]
    Rel,
    /// Most recent first
    Date,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Rel => "rel",
            SortOrder::Date => "date",
        }
    }
}

#[derive(Clone)]
pub struct NewsConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub articles_count: u32,
    pub sort_by: SortOrder,
    pub request_timeout: Duration,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_NEWS_API_URL.to_string(),
            articles_count: 8,
            sort_by: SortOrder::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl fmt::Debug for NewsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsConfig")
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url)
            .field("articles_count", &self.articles_count)
            .field("sort_by", &self.sort_by)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ModelProvider {
    #[default]
    Gemini,
    /// Any OpenAI-compatible chat completions endpoint
    Deepseek,
    /// Offline model replaying scripted responses
    Dummy,
}

#[derive(Clone)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub model_name: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub request_timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            model_name: None,
            api_key: None,
            base_url: None,
            temperature: Some(0.1),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// `memory` or `sqlite`; `None` disables persistence.
    pub kind: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FilterStrategy {
    /// One rating call per article
    #[default]
    PerArticle,
    /// One call selecting relevant indices
    Batch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SummaryStrategy {
    /// One summary call per article
    #[default]
    PerArticle,
    /// One call producing a numbered list and key takeaways
    Batch,
}

/// What filter and summarizer do with an empty article list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyInputPolicy {
    #[default]
    Passthrough,
    Reject,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub filter_strategy: FilterStrategy,
    pub summary_strategy: SummaryStrategy,
    /// Minimum relevance score kept by per-article filtering (0-10 scale).
    pub threshold: f32,
    /// Score given when the rating is unknown.
    pub neutral_score: f32,
    pub preview_chars: usize,
    pub empty_input: EmptyInputPolicy,
    /// Upper bound on in-flight per-article summary calls.
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            filter_strategy: FilterStrategy::default(),
            summary_strategy: SummaryStrategy::default(),
            threshold: 5.0,
            neutral_score: 5.0,
            preview_chars: 300,
            empty_input: EmptyInputPolicy::default(),
            concurrency: 4,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=10.0).contains(&self.threshold) {
            return Err(Error::Config(format!("threshold {} is outside 0-10", self.threshold)));
        }
        if !(0.0..=10.0).contains(&self.neutral_score) {
            return Err(Error::Config(format!("neutral score {} is outside 0-10", self.neutral_score)));
        }
        if self.preview_chars == 0 {
            return Err(Error::Config("preview length must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.threshold, 5.0);
        assert_eq!(config.news.sort_by.as_str(), "rel");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.pipeline.threshold = 11.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.news.api_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pipeline.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let mut config = Config::default();
        config.news.api_key = Some("secret-news".to_string());
        config.model.api_key = Some("secret-model".to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-news"));
        assert!(!debug.contains("secret-model"));
        assert!(debug.contains("<redacted>"));
    }
}
