// src/pipeline/stream.rs
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

use crate::error::ProcessingError;
use crate::filter::{CompiledFilters, FilterTable};
use crate::mapper::MapperTable;
use crate::pipeline::config::{ErrorStrategy, PipelineConfig};
use crate::pipeline::context::{FileContext, ProcessingStats, Row};
use crate::sink::{Sink, SinkHandle};

/// Scans a directory of delimited files and publishes every accepted row
pub struct PublishPipeline {
    config: PipelineConfig,
    filters: FilterTable,
    mappers: MapperTable,
    stats: ProcessingStats,
}

impl PublishPipeline {
    pub fn new(config: PipelineConfig, filters: FilterTable, mappers: MapperTable) -> Self {
        PublishPipeline {
            config,
            filters,
            mappers,
            stats: ProcessingStats::default(),
        }
    }

    /// Get current accumulated stats
    pub fn get_stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Scan every eligible file in `directory` and publish to `sink`.
    ///
    /// The sink is owned for the duration of the run and is flushed and
    /// closed exactly once, whether the scan completes or stops early.
    pub fn run<S: Sink>(
        &mut self,
        directory: &Path,
        sink: S,
    ) -> Result<ProcessingStats, ProcessingError> {
        let start_time = Instant::now();
        let mut handle = SinkHandle::new(sink);

        let outcome = self.scan_directory(directory, &mut handle);
        if let Err(e) = handle.finish() {
            warn!("error: failed to flush sink: {}", e);
        }

        // Accepted messages the sink later reported as failed are not published.
        let undelivered = handle.undelivered();
        self.stats.rows_published = self.stats.rows_published.saturating_sub(undelivered);
        self.stats.publish_errors += undelivered;

        self.stats.processing_time = start_time.elapsed();
        outcome.map(|()| self.stats.clone())
    }

    fn scan_directory<S: Sink>(
        &mut self,
        directory: &Path,
        handle: &mut SinkHandle<S>,
    ) -> Result<(), ProcessingError> {
        let suffix = self.config.suffix();

        for path in list_files(directory)? {
            let file_name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            self.stats.files_seen += 1;

            if !file_name.ends_with(&suffix) {
                warn!("error: {} is not supported", file_name);
                self.stats.files_unsupported += 1;
                continue;
            }

            let verdict = self.filters.check_filename(&file_name);
            if !verdict.passed() {
                info!(
                    "filter: file {} does not match filters {:?}",
                    file_name,
                    verdict.describe()
                );
                self.stats.files_filtered += 1;
                continue;
            }

            let file = match File::open(&path) {
                Ok(file) => file,
                Err(source) => {
                    self.reject(ProcessingError::Open {
                        file: path.display().to_string(),
                        source,
                    })?;
                    continue;
                }
            };

            self.process_file(BufReader::new(file), &file_name, handle)?;
        }

        Ok(())
    }

    /// Process the rows of a single file that already passed the file-level gate.
    pub fn process_file<R: BufRead, S: Sink>(
        &mut self,
        input: R,
        file_name: &str,
        handle: &mut SinkHandle<S>,
    ) -> Result<ProcessingStats, ProcessingError> {
        let start_time = Instant::now();
        let _span = info_span!("file", name = %file_name).entered();

        let mut file_stats = ProcessingStats {
            files_scanned: 1,
            ..ProcessingStats::default()
        };
        let result = self.process_rows(input, file_name, handle, &mut file_stats);
        file_stats.processing_time = start_time.elapsed();

        debug!(
            "file complete: {} rows read, {} published, {} filtered, {} malformed, {} publish errors in {:?}",
            file_stats.rows_read,
            file_stats.rows_published,
            file_stats.rows_filtered,
            file_stats.rows_malformed,
            file_stats.publish_errors,
            file_stats.processing_time
        );

        self.stats.merge(&file_stats);
        result.map(|()| file_stats)
    }

    fn process_rows<R: BufRead, S: Sink>(
        &self,
        input: R,
        file_name: &str,
        handle: &mut SinkHandle<S>,
        file_stats: &mut ProcessingStats,
    ) -> Result<(), ProcessingError> {
        let mut lines = input.lines();
        let mut line_number = 0;

        let mut file = FileContext {
            file_name: file_name.to_string(),
            file_stem: file_name
                .strip_suffix(&self.config.suffix())
                .unwrap_or(file_name)
                .to_string(),
            headers: None,
        };

        if self.config.has_header {
            let header_line = match lines.next() {
                Some(Ok(line)) => line,
                Some(Err(source)) => {
                    return self.reject(ProcessingError::Read {
                        file: file.file_name.clone(),
                        line: line_number + 1,
                        source,
                    });
                }
                None => {
                    debug!("file {} is empty", file_name);
                    return Ok(());
                }
            };
            line_number += 1;
            match split_line(header_line.trim_end(), self.config.delimiter) {
                Ok(headers) => file.headers = Some(headers),
                Err(source) => {
                    return self.reject(ProcessingError::RowParse {
                        file: file.file_name.clone(),
                        line: line_number,
                        source,
                    });
                }
            }
        }

        let compiled = self
            .filters
            .compile(file.headers.as_deref(), self.config.resolution);
        for source in &compiled.unresolved {
            self.reject(ProcessingError::Unresolved {
                file: file.file_name.clone(),
                source: source.clone(),
            })?;
        }
        if compiled.rejects_everything() {
            warn!("filter: every row of {} is rejected", file_name);
        }

        for line_result in lines {
            line_number += 1;
            let line = match line_result {
                Ok(line) => line,
                Err(source) => {
                    return self.reject(ProcessingError::Read {
                        file: file.file_name.clone(),
                        line: line_number,
                        source,
                    });
                }
            };

            let line = line.trim_end();
            if line.is_empty() {
                debug!("line {}: blank, skipping", line_number);
                continue;
            }
            file_stats.rows_read += 1;

            match self.parse_row(&file, line, line_number) {
                Ok(row) => self.dispatch_row(&file, &compiled, row, handle, file_stats)?,
                Err(error) => {
                    file_stats.rows_malformed += 1;
                    self.reject(error)?;
                }
            }
        }

        Ok(())
    }

    fn parse_row(
        &self,
        file: &FileContext,
        line: &str,
        line_number: usize,
    ) -> Result<Row, ProcessingError> {
        if line.len() > self.config.max_line_length {
            return Err(ProcessingError::LineTooLong {
                file: file.file_name.clone(),
                line: line_number,
                length: line.len(),
                max_length: self.config.max_line_length,
            });
        }

        let cells =
            split_line(line, self.config.delimiter).map_err(|source| ProcessingError::RowParse {
                file: file.file_name.clone(),
                line: line_number,
                source,
            })?;

        if let Some(headers) = &file.headers {
            if headers.len() != cells.len() {
                return Err(ProcessingError::ShapeMismatch {
                    file: file.file_name.clone(),
                    line: line_number,
                    headers: headers.len(),
                    cells: cells.len(),
                });
            }
        }

        Ok(Row {
            cells,
            line_number,
            line: line.to_string(),
        })
    }

    /// Filter, map, serialize and publish one well-formed row.
    fn dispatch_row<S: Sink>(
        &self,
        file: &FileContext,
        compiled: &CompiledFilters,
        row: Row,
        handle: &mut SinkHandle<S>,
        file_stats: &mut ProcessingStats,
    ) -> Result<(), ProcessingError> {
        if compiled.rejects_everything() {
            file_stats.rows_filtered += 1;
            return Ok(());
        }

        let check = compiled.evaluate_row(&row.cells);
        for filter in &check.out_of_bounds {
            self.reject(ProcessingError::OutOfBounds {
                file: file.file_name.clone(),
                line: row.line_number,
                filter: filter.source.clone(),
                cells: row.len(),
            })?;
        }
        if !check.accepted(self.config.resolution) {
            let failed: Vec<&str> = check
                .failed
                .iter()
                .chain(check.out_of_bounds.iter())
                .map(|f| f.source.as_str())
                .collect();
            debug!(
                "filter: line {} does not match filters {:?}",
                row.line_number, failed
            );
            file_stats.rows_filtered += 1;
            return Ok(());
        }

        let line_number = row.line_number;
        let line = row.line.clone();
        let record = self
            .mappers
            .apply(row.into_record(file.headers.as_deref(), &file.file_stem));
        let payload = serde_json::to_vec(&record)?;

        match handle.publish(&self.config.topic, &self.config.key, &payload) {
            Ok(()) => {
                file_stats.rows_published += 1;
                Ok(())
            }
            Err(source) => {
                file_stats.publish_errors += 1;
                self.reject(ProcessingError::Publish {
                    file: file.file_name.clone(),
                    line: line_number,
                    row: line,
                    source,
                })
            }
        }
    }

    /// Apply the error strategy: report and continue, or abort the scan.
    fn reject(&self, error: ProcessingError) -> Result<(), ProcessingError> {
        match self.config.error_strategy {
            ErrorStrategy::FailFast => Err(error),
            ErrorStrategy::Skip => {
                warn!("error: {}", error);
                Ok(())
            }
        }
    }
}

/// Regular files in `directory`, sorted by name.
fn list_files(directory: &Path) -> Result<Vec<PathBuf>, ProcessingError> {
    let entries = fs::read_dir(directory).map_err(|source| ProcessingError::Directory {
        path: directory.display().to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Split one line on the delimiter, honouring quoted fields.
pub fn split_line(line: &str, delimiter: u8) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(record) => Ok(record?.iter().map(|field| field.to_string()).collect()),
        None => Ok(Vec::new()),
    }
}
