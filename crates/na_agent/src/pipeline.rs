use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use na_core::config::PipelineConfig;
use na_core::{
    ArticleSource, Config, Error, InferenceModel, PipelineState, Result, Stage, StageError, StageName,
};
use na_inference::{RelevanceFilter, Summarizer};
use tracing::{debug, info, warn};

/// The linear search → filter → summarize workflow.
///
/// Each run owns its [`PipelineState`]; the source and model are shared and
/// may serve concurrent runs.
pub struct Pipeline {
    source: Arc<dyn ArticleSource>,
    filter: RelevanceFilter,
    summarizer: Summarizer,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source.name())
            .field("filter", &self.filter)
            .field("summarizer", &self.summarizer)
            .finish()
    }
}

impl Pipeline {
    pub fn new(source: Arc<dyn ArticleSource>, model: Arc<dyn InferenceModel>, config: &PipelineConfig) -> Self {
        Self {
            source,
            filter: RelevanceFilter::new(model.clone(), config),
            summarizer: Summarizer::new(model, config),
        }
    }

    /// Build the source and model described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = na_sources::create_source(&config.news)?;
        let model = na_inference::create_model(&config.model)?;
        Ok(Self::new(source, model, &config.pipeline))
    }

    /// Run all three stages for `query`. Never fails: stage errors end up in
    /// `error` with the matching `*_error` stage marker.
    pub async fn run(&self, query: &str) -> PipelineState {
        info!("🚀 Running pipeline for \"{}\"", query);
        let state = PipelineState::new(query);
        let state = self.search(state).await;
        let state = self.filter(state).await;
        let state = self.summarize(state).await;

        match &state.error {
            Some(error) => warn!("Pipeline ended at {}: {}", state.stage, error),
            None => info!("✅ Pipeline produced {} summaries", state.summaries.len()),
        }
        state
    }

    pub async fn search(&self, state: PipelineState) -> PipelineState {
        run_stage(StageName::Search, state, |mut state| async move {
            let result = self.source.search(state.query()).await;
            match result {
                Ok(articles) => {
                    state.articles = articles;
                    (state, Ok(()))
                }
                Err(e) => (state, Err(Error::from(e))),
            }
        })
        .await
    }

    pub async fn filter(&self, state: PipelineState) -> PipelineState {
        run_stage(StageName::Filter, state, |mut state| async move {
            let result = self.filter.filter(state.query(), state.articles.clone()).await;
            match result {
                Ok(retained) => {
                    state.articles = retained;
                    (state, Ok(()))
                }
                Err(e) => (state, Err(Error::from(e))),
            }
        })
        .await
    }

    pub async fn summarize(&self, state: PipelineState) -> PipelineState {
        run_stage(StageName::Summarize, state, |mut state| async move {
            let result = self.summarizer.summarize(&state.articles).await;
            match result {
                Ok(out) => {
                    state.summaries = out.summaries;
                    state.takeaways = out.takeaways;
                    (state, Ok(()))
                }
                Err(e) => (state, Err(Error::from(e))),
            }
        })
        .await
    }
}

/// Runs one stage body unless the state already carries an error, in which
/// case the state is handed back untouched.
///
/// The body gets the state by value and returns it with its outcome; the
/// stage marker and error message are set here. A panic in the body becomes
/// an `execution_error` state.
pub async fn run_stage<F, Fut>(stage: StageName, state: PipelineState, body: F) -> PipelineState
where
    F: FnOnce(PipelineState) -> Fut,
    Fut: Future<Output = (PipelineState, Result<()>)>,
{
    if let Some(error) = &state.error {
        debug!("Skipping {} stage due to previous error: {}", stage, error);
        return state;
    }

    debug!("Starting {} stage", stage);
    let query = state.query().to_string();
    match AssertUnwindSafe(body(state)).catch_unwind().await {
        Ok((mut state, Ok(()))) => {
            state.stage = stage.completed();
            info!(
                "✨ {} stage complete: {} articles, {} summaries",
                stage.label(),
                state.articles.len(),
                state.summaries.len()
            );
            state
        }
        Ok((mut state, Err(e))) => {
            warn!("{} stage failed: {}", stage.label(), e);
            state.stage = stage.failed();
            state.error = Some(format!("{} error: {}", stage.label(), e));
            state
        }
        Err(panic) => {
            let error = Error::Stage(StageError { stage, message: panic_message(panic.as_ref()) });
            warn!("Workflow execution failed: {}", error);
            let mut state = PipelineState::new(query);
            state.stage = Stage::ExecutionError;
            state.error = Some(format!("Workflow execution error: {}", error));
            state
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
