use crate::filter::ResolutionPolicy;

/// Configuration for pipeline behavior
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub error_strategy: ErrorStrategy,
    pub resolution: ResolutionPolicy,
    /// First line of each file names the columns
    pub has_header: bool,
    pub delimiter: u8,
    /// Only files ending in `.<extension>` are scanned
    pub extension: String,
    pub topic: String,
    /// Routing key handed to the sink with every record
    pub key: String,
    pub max_line_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            error_strategy: ErrorStrategy::Skip,
            resolution: ResolutionPolicy::FailOpen,
            has_header: true,
            delimiter: b',',
            extension: "csv".to_string(),
            topic: String::new(),
            key: "1".to_string(),
            max_line_length: 1048576, // 1MB
        }
    }
}

impl PipelineConfig {
    pub fn suffix(&self) -> String {
        format!(".{}", self.extension.trim_start_matches('.'))
    }
}

/// Simple error handling strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Report problematic rows and files and continue the scan
    #[default]
    Skip,
    /// Stop the scan on the first row or publish error
    FailFast,
}
