use std::fmt;

use async_trait::async_trait;

use crate::Result;

/// Sampling options passed along with a prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
}

impl GenerationOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        Self { temperature: Some(temperature) }
    }
}

/// A hosted text-generation model: one prompt in, one free-form string out.
#[async_trait]
pub trait InferenceModel: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}
