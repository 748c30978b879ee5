pub mod eventregistry;

pub use eventregistry::EventRegistrySource;

use std::sync::Arc;

use na_core::config::NewsConfig;
use na_core::{ArticleSource, Result};

/// Build the configured article source.
pub fn create_source(config: &NewsConfig) -> Result<Arc<dyn ArticleSource>> {
    Ok(Arc::new(EventRegistrySource::new(config)?))
}

pub mod prelude {
    pub use super::eventregistry::EventRegistrySource;
    pub use na_core::{Article, ArticleSource, SourceError};
}
