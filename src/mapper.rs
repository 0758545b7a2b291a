// src/mapper.rs - output field renames
use crate::error::ExpressionError;
use crate::expression::{parse_mapper, MapperExpression};
use crate::pipeline::context::Record;
use indexmap::IndexMap;
use tracing::warn;

/// Output field name (before rename) -> output field name (after rename).
/// Keys not present pass through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapperTable {
    renames: IndexMap<String, String>,
}

impl MapperTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse every expression for the given header mode, reporting and
    /// dropping the ones that are invalid.
    pub fn parse<I, S>(expressions: I, has_header: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for raw in expressions {
            match parse_mapper(raw.as_ref()) {
                Ok(expr) => table.push(expr, has_header),
                Err(e) => warn!("mapper: {}, expression dropped", e),
            }
        }
        table
    }

    /// Parse every expression, failing on the first invalid one.
    pub fn try_parse<I, S>(expressions: I, has_header: bool) -> Result<Self, ExpressionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for raw in expressions {
            table.push(parse_mapper(raw.as_ref())?, has_header);
        }
        Ok(table)
    }

    /// Register a rename. Indexed mappers address a header name when the
    /// files have headers and the synthesized `column_<n>` key otherwise.
    pub fn push(&mut self, expr: MapperExpression, has_header: bool) {
        match expr {
            MapperExpression::Plain { key, value } => {
                self.renames.insert(key, value);
            }
            MapperExpression::Indexed { index, value } if has_header => {
                self.renames.insert(index, value);
            }
            MapperExpression::Indexed { index, value } => {
                if index.bytes().all(|b| b.is_ascii_digit()) {
                    self.renames.insert(format!("column_{}", index), value);
                } else {
                    warn!(
                        "mapper: index must be a digit without headers, index={}, expression dropped",
                        index
                    );
                }
            }
        }
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.renames.insert(from.into(), to.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.renames.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    /// Rename the record's keys. When two keys land on the same name the
    /// later value wins and keeps the position of the first.
    pub fn apply(&self, record: Record) -> Record {
        if self.renames.is_empty() {
            return record;
        }
        record
            .into_iter()
            .map(|(key, value)| match self.renames.get(&key) {
                Some(renamed) => (renamed.clone(), value),
                None => (key, value),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unmapped_keys_pass_through() {
        let mut table = MapperTable::new();
        table.insert("name", "username");

        let mapped = table.apply(record(&[("id", "1"), ("name", "alice"), ("filename", "a")]));
        assert_eq!(
            mapped,
            record(&[("id", "1"), ("username", "alice"), ("filename", "a")])
        );
    }

    #[test]
    fn test_identity_mapping_round_trip() {
        let input = record(&[("id", "1"), ("name", "alice"), ("filename", "a")]);
        let mut table = MapperTable::new();
        for key in input.keys() {
            table.insert(key.clone(), key.clone());
        }
        assert_eq!(table.apply(input.clone()), input);
    }

    #[test]
    fn test_collision_last_write_wins() {
        let mut table = MapperTable::new();
        table.insert("a", "x");
        table.insert("b", "x");

        let mapped = table.apply(record(&[("a", "1"), ("b", "2"), ("c", "3")]));
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped.get("x").map(String::as_str), Some("2"));
        assert_eq!(mapped.get_index(0).map(|(k, _)| k.as_str()), Some("x"));
    }

    #[test]
    fn test_indexed_mapper_without_headers() {
        let table = MapperTable::parse(["column:1=username", "column:name=x"], false);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("column_1"), Some("username"));
    }

    #[test]
    fn test_indexed_mapper_with_headers() {
        let table = MapperTable::parse(["column:name=username", "filename=source"], true);
        assert_eq!(table.get("name"), Some("username"));
        assert_eq!(table.get("filename"), Some("source"));
    }

    #[test]
    fn test_invalid_mappers_dropped() {
        let table = MapperTable::parse(["row:1=x", "id>=y", "nonsense"], true);
        assert!(table.is_empty());
        assert!(MapperTable::try_parse(["id=x", "row:1=x"], true).is_err());
    }
}
