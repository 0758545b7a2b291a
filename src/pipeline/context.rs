use indexmap::IndexMap;
use std::time::Duration;

/// Field name -> value, in column order followed by injected fields
pub type Record = IndexMap<String, String>;

/// One parsed line of a delimited file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<String>,
    pub line_number: usize,
    /// Raw line content, for diagnostics
    pub line: String,
}

impl Row {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Build the output record: one entry per cell keyed by header name or
    /// `column_<i>`, then the `filename` field.
    pub fn into_record(self, headers: Option<&[String]>, file_stem: &str) -> Record {
        let mut record: Record = self
            .cells
            .into_iter()
            .enumerate()
            .map(|(i, cell)| {
                let key = headers
                    .and_then(|headers| headers.get(i).cloned())
                    .unwrap_or_else(|| format!("column_{}", i));
                (key, cell)
            })
            .collect();
        record.insert("filename".to_string(), file_stem.to_string());
        record
    }
}

/// Context for the file currently being scanned
#[derive(Debug, Clone, Default)]
pub struct FileContext {
    pub file_name: String,
    /// File name without the recognized suffix
    pub file_stem: String,
    pub headers: Option<Vec<String>>,
}

/// Runtime statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessingStats {
    pub files_seen: usize,
    pub files_scanned: usize,
    /// Skipped because of their suffix
    pub files_unsupported: usize,
    /// Skipped by `filename` filters
    pub files_filtered: usize,
    pub rows_read: usize,
    pub rows_published: usize,
    /// Rejected by column filters
    pub rows_filtered: usize,
    /// Rejected because of their shape or length
    pub rows_malformed: usize,
    pub publish_errors: usize,
    pub processing_time: Duration,
}

impl ProcessingStats {
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.files_seen += other.files_seen;
        self.files_scanned += other.files_scanned;
        self.files_unsupported += other.files_unsupported;
        self.files_filtered += other.files_filtered;
        self.rows_read += other.rows_read;
        self.rows_published += other.rows_published;
        self.rows_filtered += other.rows_filtered;
        self.rows_malformed += other.rows_malformed;
        self.publish_errors += other.publish_errors;
        self.processing_time += other.processing_time;
    }
}
