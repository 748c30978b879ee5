use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use na_core::config::{EmptyInputPolicy, PipelineConfig, SummaryStrategy};
use na_core::{Article, GenerationOptions, InferenceModel, SummarizeError};
use tracing::{debug, info, warn};

use crate::parse::parse_numbered_list;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summaries {
    pub summaries: Vec<String>,
    /// Cross-article synthesis, only produced by the batch strategy.
    pub takeaways: Option<String>,
}

pub struct Summarizer {
    model: Arc<dyn InferenceModel>,
    strategy: SummaryStrategy,
    empty_input: EmptyInputPolicy,
    concurrency: usize,
    options: GenerationOptions,
}

impl fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Summarizer")
            .field("model", &self.model.name())
            .field("strategy", &self.strategy)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl Summarizer {
    pub fn new(model: Arc<dyn InferenceModel>, config: &PipelineConfig) -> Self {
        Self {
            model,
            strategy: config.summary_strategy,
            empty_input: config.empty_input,
            concurrency: config.concurrency.max(1),
            options: GenerationOptions::with_temperature(0.1),
        }
    }

    /// Use a different strategy than the configured one.
    pub fn with_strategy(mut self, strategy: SummaryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub async fn summarize(&self, articles: &[Article]) -> Result<Summaries, SummarizeError> {
        if articles.is_empty() {
            return match self.empty_input {
                EmptyInputPolicy::Passthrough => Ok(Summaries::default()),
                EmptyInputPolicy::Reject => Err(SummarizeError::NoArticlesToSummarize),
            };
        }

        let summaries = match self.strategy {
            SummaryStrategy::PerArticle => Summaries {
                summaries: self.summarize_each(articles).await,
                takeaways: None,
            },
            SummaryStrategy::Batch => self.synthesize(articles).await,
        };
        info!("📝 Summarized {} articles into {} summaries", articles.len(), summaries.summaries.len());
        Ok(summaries)
    }

    /// One summary per article, position i for article i. A failed call
    /// yields the article's own content.
    pub async fn summarize_each(&self, articles: &[Article]) -> Vec<String> {
        let calls: Vec<_> = articles
            .iter()
            .enumerate()
            .map(|(i, article)| {
                let model = self.model.clone();
                let options = self.options;
                let prompt = article_prompt(article);
                let title = article.title.clone();
                let content = article.content.clone();
                async move {
                    debug!("Summarizing article {}: {}", i + 1, title);
                    match model.generate(&prompt, &options).await {
                        Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
                        Ok(_) => {
                            warn!("Empty summary for article {}, using its content", i + 1);
                            content
                        }
                        Err(e) => {
                            warn!("Could not summarize article {}, using its content: {}", i + 1, e);
                            content
                        }
                    }
                }
            })
            .collect();

        stream::iter(calls).buffered(self.concurrency).collect().await
    }

    async fn synthesize(&self, articles: &[Article]) -> Summaries {
        match self.model.generate(&synthesis_prompt(articles), &self.options).await {
            Ok(response) => {
                let parsed = parse_numbered_list(&response);
                if parsed.items.len() != articles.len() {
                    warn!("Synthesis returned {} summaries for {} articles", parsed.items.len(), articles.len());
                }
                Summaries { summaries: parsed.items, takeaways: parsed.takeaways }
            }
            Err(e) => {
                warn!("Synthesis call failed, using article contents: {}", e);
                Summaries {
                    summaries: articles.iter().map(|a| a.content.clone()).collect(),
                    takeaways: None,
                }
            }
        }
    }
}

fn article_prompt(article: &Article) -> String {
    format!(
        "Summarize the article: \"{}\"\n\nArticle Content: {}\n\n\
         The summary should capture the key points, main arguments, and any important conclusions.",
        article.title, article.content
    )
}

fn synthesis_prompt(articles: &[Article]) -> String {
    let contents = articles
        .iter()
        .enumerate()
        .map(|(i, a)| format!("Article {}:\nTitle: {}\nContent: {}", i + 1, a.title, a.content))
        .collect::<Vec<_>>()
        .join("\n---\n");
    format!(
        "You are a world-class news analyst. Your task is to do two things:\n\
         1. Provide a concise, 1-2 sentence summary for EACH of the following articles.\n\
         2. After summarizing them all, write a final 'Key Takeaways' paragraph that synthesizes the main themes.\n\n\
         Here are the articles:\n\n{}\n\n\
         Format: one line per article as `<article number>. <summary>`, using the article numbers above, \
         then a line starting with `Key Takeaways:` followed by the paragraph.",
        contents
    )
}
