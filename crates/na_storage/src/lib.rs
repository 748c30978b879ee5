use std::sync::Arc;

use na_core::{ArticleStorage, Error, Result};

pub mod backends;

pub use backends::*;

/// Build a storage backend by name: `memory` or `sqlite` (the latter needs
/// the `sqlite` feature). `url` is backend specific.
#[cfg_attr(not(feature = "sqlite"), allow(unused_variables))]
pub async fn create_storage(kind: &str, url: Option<&str>) -> Result<Arc<dyn ArticleStorage>> {
    match kind {
        "memory" => Ok(Arc::new(backends::MemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let url = url.unwrap_or(backends::sqlite::DEFAULT_DATABASE_URL);
            Ok(Arc::new(backends::SQLiteStorage::connect(url).await?))
        }
        other => Err(Error::Config(format!("Unsupported storage backend: {}", other))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::create_storage;
}
