pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod table;

// Ports and their adapters
pub mod app;
pub mod infra;

pub use config::PipelineConfig;
pub use error::{EtlError, Result};
pub use pipeline::{run_flow, Pipeline, PipelineOutcome};
pub use table::{Column, ColumnType, Table, Value};
