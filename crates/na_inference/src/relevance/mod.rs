use std::fmt;
use std::sync::Arc;

use na_core::config::{EmptyInputPolicy, FilterStrategy, PipelineConfig};
use na_core::{Article, FilterError, GenerationOptions, InferenceModel};
use tracing::{debug, info, warn};

use crate::parse::{first_number, parse_indices};

/// Upper end of the rating scale.
pub const MAX_SCORE: f32 = 10.0;

/// Keeps the articles relevant to a query, judged by a text-generation model.
pub struct RelevanceFilter {
    model: Arc<dyn InferenceModel>,
    strategy: FilterStrategy,
    threshold: f32,
    neutral_score: f32,
    preview_chars: usize,
    empty_input: EmptyInputPolicy,
}

impl fmt::Debug for RelevanceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelevanceFilter")
            .field("model", &self.model.name())
            .field("strategy", &self.strategy)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl RelevanceFilter {
    pub fn new(model: Arc<dyn InferenceModel>, config: &PipelineConfig) -> Self {
        Self {
            model,
            strategy: config.filter_strategy,
            threshold: config.threshold,
            neutral_score: config.neutral_score,
            preview_chars: config.preview_chars,
            empty_input: config.empty_input,
        }
    }

    /// The retained articles, in their original order.
    pub async fn filter(&self, query: &str, articles: Vec<Article>) -> Result<Vec<Article>, FilterError> {
        if articles.is_empty() {
            return match self.empty_input {
                EmptyInputPolicy::Passthrough => Ok(articles),
                EmptyInputPolicy::Reject => Err(FilterError::NoArticlesToFilter),
            };
        }

        let total = articles.len();
        let retained = match self.strategy {
            FilterStrategy::PerArticle => self.filter_per_article(query, articles).await,
            FilterStrategy::Batch => self.filter_batch(query, articles).await,
        };
        info!("🧹 Filtered to {} of {} articles", retained.len(), total);
        Ok(retained)
    }

    async fn filter_per_article(&self, query: &str, articles: Vec<Article>) -> Vec<Article> {
        let total = articles.len();
        let mut retained = Vec::with_capacity(total);

        for (i, mut article) in articles.into_iter().enumerate() {
            debug!("Rating article {}/{}: {}", i + 1, total, article.title);
            let prompt = rating_prompt(query, &article, self.preview_chars);

            let score = match self.model.generate(&prompt, &GenerationOptions::with_temperature(0.0)).await {
                Ok(response) => self.score_response(&response),
                Err(e) => {
                    warn!("Could not rate article {}, keeping it: {}", i + 1, e);
                    self.neutral_score
                }
            };

            if score >= self.threshold {
                debug!("Article {} relevant with score {}", i + 1, score);
                article.relevance_score = Some(score);
                retained.push(article);
            } else {
                debug!("Article {} dropped with score {}", i + 1, score);
            }
        }

        retained
    }

    async fn filter_batch(&self, query: &str, articles: Vec<Article>) -> Vec<Article> {
        let prompt = selection_prompt(query, &articles, self.preview_chars);
        let response = match self.model.generate(&prompt, &GenerationOptions::with_temperature(0.0)).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Batch relevance call failed, keeping all articles: {}", e);
                return articles;
            }
        };

        let indices = parse_indices(&response, articles.len());
        if indices.is_empty() {
            warn!("No usable indices in {:?}, keeping all articles", response);
            return articles;
        }

        articles
            .into_iter()
            .enumerate()
            .filter(|(i, _)| indices.binary_search(i).is_ok())
            .map(|(_, article)| article)
            .collect()
    }

    /// Score from a rating response: the first number found (clamped to the
    /// scale), otherwise the neutral score if the answer says "relevant",
    /// otherwise zero.
    pub fn score_response(&self, response: &str) -> f32 {
        match first_number(response) {
            Some(score) => score.clamp(0.0, MAX_SCORE),
            None if response.to_lowercase().contains("relevant") => self.neutral_score,
            None => 0.0,
        }
    }
}

fn rating_prompt(query: &str, article: &Article, preview_chars: usize) -> String {
    format!(
        "Rate the relevance of this article to the query: \"{}\"\n\n\
         Article Title: {}\n\
         Article Preview: {}\n\n\
         Rate from 0-10 where 0 is completely irrelevant and 10 is highly relevant.\n\
         Return only a number from 0-10.",
        query,
        article.title,
        article.preview(preview_chars)
    )
}

fn selection_prompt(query: &str, articles: &[Article], preview_chars: usize) -> String {
    let listing = articles
        .iter()
        .enumerate()
        .map(|(i, a)| format!("[{}] {}\n{}", i + 1, a.title, a.preview(preview_chars)))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Which of the following articles are relevant to the query: \"{}\"?\n\n\
         {}\n\n\
         Return only the numbers of the relevant articles as a comma-separated list, e.g. 1, 3.",
        query, listing
    )
}
