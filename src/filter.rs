// src/filter.rs - filter table, per-file compilation and predicate evaluation
use crate::error::{ExpressionError, ResolveError};
use crate::expression::{parse_filter, FilterExpression, Operator};
use std::cmp::Ordering;
use std::fmt;
use tracing::warn;

impl Operator {
    /// Compare an actual value from the input against the expected literal.
    ///
    /// Equality is always exact string equality. Ordering operators compare
    /// numerically when both sides parse as finite numbers and fall back to
    /// lexicographic comparison otherwise.
    pub fn evaluate(&self, actual: &str, expected: &str) -> bool {
        match self {
            Operator::Eq => actual == expected,
            Operator::Ge => compare(actual, expected) != Ordering::Less,
            Operator::Le => compare(actual, expected) != Ordering::Greater,
            Operator::Gt => compare(actual, expected) == Ordering::Greater,
            Operator::Lt => compare(actual, expected) == Ordering::Less,
        }
    }
}

fn compare(actual: &str, expected: &str) -> Ordering {
    match (parse_number(actual), parse_number(expected)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => actual.cmp(expected),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// What to do with a column filter that cannot be applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Drop the filter and let the row through
    #[default]
    FailOpen,
    /// Reject the row
    FailClosed,
}

/// `<op><value>` applied to a value that needs no resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub operator: Operator,
    pub value: String,
}

impl Predicate {
    pub fn matches(&self, actual: &str) -> bool {
        self.operator.evaluate(actual, &self.value)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.operator, self.value)
    }
}

/// `column:<index><op><value>` before it is bound to a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPredicate {
    pub index: String,
    pub operator: Operator,
    pub value: String,
}

impl fmt::Display for ColumnPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column:{}{}{}", self.index, self.operator, self.value)
    }
}

/// Outcome of checking a set of predicates; failures are kept for diagnostics.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Verdict<'a> {
    pub failed: Vec<&'a Predicate>,
}

impl Verdict<'_> {
    pub fn passed(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn describe(&self) -> Vec<String> {
        self.failed.iter().map(|p| p.to_string()).collect()
    }
}

/// AND all predicates against the same actual value. An empty set passes.
pub fn evaluate_all<'a>(predicates: &'a [Predicate], actual: &str) -> Verdict<'a> {
    Verdict {
        failed: predicates.iter().filter(|p| !p.matches(actual)).collect(),
    }
}

/// Parsed filters grouped by domain, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterTable {
    pub filename: Vec<Predicate>,
    pub column: Vec<ColumnPredicate>,
}

impl FilterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every expression, reporting and dropping the ones that are invalid.
    pub fn parse<I, S>(expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for raw in expressions {
            match parse_filter(raw.as_ref()) {
                Ok(expr) => table.push(expr),
                Err(e) => warn!("filter: {}, expression dropped", e),
            }
        }
        table
    }

    /// Parse every expression, failing on the first invalid one.
    pub fn try_parse<I, S>(expressions: I) -> Result<Self, ExpressionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for raw in expressions {
            table.push(parse_filter(raw.as_ref())?);
        }
        Ok(table)
    }

    pub fn push(&mut self, expr: FilterExpression) {
        match expr {
            FilterExpression::Filename { operator, value } => {
                self.filename.push(Predicate { operator, value })
            }
            FilterExpression::Column {
                index,
                operator,
                value,
            } => self.column.push(ColumnPredicate {
                index,
                operator,
                value,
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filename.is_empty() && self.column.is_empty()
    }

    /// Check the file-level filters against a file name.
    pub fn check_filename(&self, file_name: &str) -> Verdict<'_> {
        evaluate_all(&self.filename, file_name)
    }

    /// Bind every column filter to a position for one file.
    ///
    /// With headers the index must equal a header name exactly; without
    /// headers it must be a non-negative ordinal. Filters that cannot be
    /// bound are reported and dropped, or poison the whole file under
    /// [`ResolutionPolicy::FailClosed`].
    pub fn compile(
        &self,
        headers: Option<&[String]>,
        policy: ResolutionPolicy,
    ) -> CompiledFilters {
        let mut compiled = CompiledFilters::default();

        for predicate in &self.column {
            match resolve(&predicate.index, headers) {
                Ok(position) => compiled.filters.push(CompiledColumnFilter {
                    position,
                    predicate: Predicate {
                        operator: predicate.operator,
                        value: predicate.value.clone(),
                    },
                    source: predicate.to_string(),
                }),
                Err(e) => match policy {
                    ResolutionPolicy::FailOpen => warn!("filter: {}, filter dropped", e),
                    ResolutionPolicy::FailClosed => compiled.unresolved.push(e),
                },
            }
        }

        compiled
    }
}

fn resolve(index: &str, headers: Option<&[String]>) -> Result<usize, ResolveError> {
    match headers {
        Some(headers) => headers
            .iter()
            .position(|h| h == index)
            .ok_or_else(|| ResolveError::MissingHeader {
                index: index.to_string(),
                headers: headers.to_vec(),
            }),
        None if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => index
            .parse::<usize>()
            .map_err(|_| ResolveError::NotAnOrdinal(index.to_string())),
        None => Err(ResolveError::NotAnOrdinal(index.to_string())),
    }
}

/// A column filter bound to a concrete cell position for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledColumnFilter {
    pub position: usize,
    pub predicate: Predicate,
    /// Source expression text, for diagnostics
    pub source: String,
}

/// Result of checking one row against the compiled column filters
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RowCheck<'a> {
    /// Filters whose predicate evaluated false
    pub failed: Vec<&'a CompiledColumnFilter>,
    /// Filters whose position lies past the end of the row
    pub out_of_bounds: Vec<&'a CompiledColumnFilter>,
}

impl RowCheck<'_> {
    /// Under fail-open, out-of-bounds filters are skipped for this row only.
    pub fn accepted(&self, policy: ResolutionPolicy) -> bool {
        self.failed.is_empty()
            && (policy == ResolutionPolicy::FailOpen || self.out_of_bounds.is_empty())
    }
}

/// Column filters compiled against one file's header layout
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledFilters {
    pub filters: Vec<CompiledColumnFilter>,
    /// Resolution failures retained under fail-closed
    pub unresolved: Vec<ResolveError>,
}

impl CompiledFilters {
    /// True when fail-closed resolution left filters that can never be applied.
    pub fn rejects_everything(&self) -> bool {
        !self.unresolved.is_empty()
    }

    pub fn evaluate_row(&self, cells: &[String]) -> RowCheck<'_> {
        let mut check = RowCheck::default();
        for filter in &self.filters {
            match cells.get(filter.position) {
                Some(actual) if filter.predicate.matches(actual) => {}
                Some(_) => check.failed.push(filter),
                None => check.out_of_bounds.push(filter),
            }
        }
        check
    }
}
