use crate::expression::Operator;

/// Errors produced while parsing `--filter` / `--mapper` expressions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("unknown key '{key}' in expression '{expression}'")]
    UnknownKey { key: String, expression: String },

    #[error("unparseable expression '{0}'")]
    Unparseable(String),

    #[error("operator '{operator}' is not supported in expression '{expression}'")]
    UnsupportedOperator {
        operator: Operator,
        expression: String,
    },
}

/// Errors binding a column filter to a position in a specific file
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("index not found in headers, index={index}, headers={headers:?}")]
    MissingHeader { index: String, headers: Vec<String> },

    #[error("index must be a digit without headers, index={0}")]
    NotAnOrdinal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,

    #[error("sink io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cannot read directory '{path}': {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot open '{file}': {source}")]
    Open {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: cannot read line: {source}")]
    Read {
        file: String,
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}:{line}: row must have the same number of cells as the headers, headers={headers}, cells={cells}")]
    ShapeMismatch {
        file: String,
        line: usize,
        headers: usize,
        cells: usize,
    },

    #[error("{file}:{line}: line too long: {length} > {max_length}")]
    LineTooLong {
        file: String,
        line: usize,
        length: usize,
        max_length: usize,
    },

    #[error("{file}:{line}: cannot split row: {source}")]
    RowParse {
        file: String,
        line: usize,
        #[source]
        source: csv::Error,
    },

    #[error("{file}:{line}: column filter '{filter}' is out of bounds for a row of {cells} cells")]
    OutOfBounds {
        file: String,
        line: usize,
        filter: String,
        cells: usize,
    },

    #[error("{file}: {source}")]
    Unresolved {
        file: String,
        #[source]
        source: ResolveError,
    },

    #[error("{file}:{line}: failed to publish message, row={row}: {source}")]
    Publish {
        file: String,
        line: usize,
        row: String,
        #[source]
        source: SinkError,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}
