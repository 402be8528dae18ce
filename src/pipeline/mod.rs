pub mod extract;
pub mod load;
pub mod orchestrator;
pub mod retry;
pub mod transform;

pub use extract::{parse_csv, Extractor};
pub use load::Loader;
pub use orchestrator::{run_flow, Pipeline, PipelineOutcome, PipelineStage};
pub use retry::RetryPolicy;
pub use transform::Transformer;
