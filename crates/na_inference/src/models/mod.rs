use std::sync::Arc;

use na_core::config::{ModelConfig, ModelProvider};
use na_core::{InferenceModel, Result};

pub mod deepseek;
pub mod dummy;
pub mod gemini;

pub use deepseek::DeepSeekModel;
pub use dummy::DummyModel;
pub use gemini::GeminiModel;

/// Build the text-generation client selected in `config`.
pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn InferenceModel>> {
    let model: Arc<dyn InferenceModel> = match config.provider {
        ModelProvider::Gemini => Arc::new(GeminiModel::new(config)?),
        ModelProvider::Deepseek => Arc::new(DeepSeekModel::new(config)?),
        ModelProvider::Dummy => Arc::new(DummyModel::new()),
    };
    tracing::debug!("Created inference model {}", model.name());
    Ok(model)
}
