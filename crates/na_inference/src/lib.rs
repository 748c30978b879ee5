pub mod models;
pub mod parse;
pub mod relevance;
pub mod summarize;

pub use models::create_model;
pub use relevance::RelevanceFilter;
pub use summarize::{Summaries, Summarizer};

pub mod prelude {
    pub use super::models::{create_model, DeepSeekModel, DummyModel, GeminiModel};
    pub use super::relevance::RelevanceFilter;
    pub use super::summarize::{Summaries, Summarizer};
    pub use na_core::{Article, Error, GenerationOptions, InferenceModel, Result};
}
