pub mod chat;
pub mod persist;
pub mod pipeline;

pub use chat::ChatAgent;
pub use persist::persist_results;
pub use pipeline::{run_stage, Pipeline};

pub mod prelude {
    pub use super::chat::{ChatAgent, Role, Turn};
    pub use super::persist::persist_results;
    pub use super::pipeline::Pipeline;
    pub use na_core::{ArticleSummary, PipelineState, Stage};
}
