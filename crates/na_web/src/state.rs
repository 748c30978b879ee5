use std::sync::Arc;

use na_agent::{ChatAgent, Pipeline};
use na_core::ArticleStorage;

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub chat: Arc<ChatAgent>,
    /// Query results are persisted here when set.
    pub storage: Option<Arc<dyn ArticleStorage>>,
}
