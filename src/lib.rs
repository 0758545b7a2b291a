// src/lib.rs
pub mod error;
pub mod expression;
pub mod filter;
pub mod logging;
pub mod mapper;
pub mod pipeline;
pub mod profile;
pub mod sink;

pub use error::*;
pub use pipeline::*;

pub use expression::{FilterExpression, MapperExpression, Operator};
pub use filter::{CompiledColumnFilter, CompiledFilters, FilterTable, Predicate, ResolutionPolicy};
pub use mapper::MapperTable;
pub use pipeline::config::{ErrorStrategy, PipelineConfig};
pub use pipeline::stream::PublishPipeline;
pub use sink::{DeliveryReport, Sink, SinkHandle, WriterSink};
