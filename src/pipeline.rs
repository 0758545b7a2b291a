// src/pipeline.rs
pub mod config;
pub mod context;
pub mod stream;

pub use config::{ErrorStrategy, PipelineConfig};
pub use context::{FileContext, ProcessingStats, Record, Row};
pub use stream::{split_line, PublishPipeline};
