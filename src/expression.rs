// src/expression.rs - parsing of --filter and --mapper expressions
use crate::error::ExpressionError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;

/// `key<op>value`
static PLAIN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^(?P<key>\w+)(?P<op>[=><]=?)(?P<value>.+)$").unwrap());

/// `key:index<op>value`
static INDEXED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(?P<key>\w+):(?P<index>\w+)(?P<op>[=><]=?)(?P<value>.+)$").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Operator {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" | "==" => Some(Operator::Eq),
            ">=" => Some(Operator::Ge),
            "<=" => Some(Operator::Le),
            ">" => Some(Operator::Gt),
            "<" => Some(Operator::Lt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter in one of the two recognized domains
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpression {
    /// `filename<op>value`, checked once per file
    Filename { operator: Operator, value: String },
    /// `column:<index><op>value`, checked per row
    Column {
        index: String,
        operator: Operator,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapperExpression {
    /// Rename the literal output field `key`
    Plain { key: String, value: String },
    /// Rename the column addressed by header name or ordinal
    Indexed { index: String, value: String },
}

/// The parts shared by both grammars.
struct Parts<'a> {
    key: &'a str,
    index: Option<&'a str>,
    operator: Operator,
    value: &'a str,
}

fn split(raw: &str) -> Result<Parts<'_>, ExpressionError> {
    // The indexed grammar takes precedence so an input never yields two descriptors.
    let (caps, index) = match INDEXED_PATTERN.captures(raw) {
        Some(caps) => {
            let index = caps.name("index").map(|m| m.as_str());
            (caps, index)
        }
        None => match PLAIN_PATTERN.captures(raw) {
            Some(caps) => (caps, None),
            None => return Err(ExpressionError::Unparseable(raw.to_string())),
        },
    };

    let key = group(&caps, "key");
    let operator = Operator::from_token(group(&caps, "op"))
        .ok_or_else(|| ExpressionError::Unparseable(raw.to_string()))?;
    Ok(Parts {
        key,
        index,
        operator,
        value: group(&caps, "value"),
    })
}

fn group<'a>(caps: &Captures<'a>, name: &str) -> &'a str {
    caps.name(name).map(|m| m.as_str()).unwrap_or_default()
}

/// Parse a single filter expression.
pub fn parse_filter(raw: &str) -> Result<FilterExpression, ExpressionError> {
    let parts = split(raw)?;
    match (parts.index, parts.key) {
        (Some(index), "column") => Ok(FilterExpression::Column {
            index: index.to_string(),
            operator: parts.operator,
            value: parts.value.to_string(),
        }),
        (None, "filename") => Ok(FilterExpression::Filename {
            operator: parts.operator,
            value: parts.value.to_string(),
        }),
        _ => Err(ExpressionError::UnknownKey {
            key: parts.key.to_string(),
            expression: raw.to_string(),
        }),
    }
}

/// Parse a single mapper expression. Only `=` is meaningful for a rename.
pub fn parse_mapper(raw: &str) -> Result<MapperExpression, ExpressionError> {
    let parts = split(raw)?;
    if parts.operator != Operator::Eq {
        return Err(ExpressionError::UnsupportedOperator {
            operator: parts.operator,
            expression: raw.to_string(),
        });
    }

    match parts.index {
        Some(index) if parts.key == "column" => Ok(MapperExpression::Indexed {
            index: index.to_string(),
            value: parts.value.to_string(),
        }),
        Some(_) => Err(ExpressionError::UnknownKey {
            key: parts.key.to_string(),
            expression: raw.to_string(),
        }),
        None => Ok(MapperExpression::Plain {
            key: parts.key.to_string(),
            value: parts.value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_filter() {
        let expr = parse_filter("filename>=b").unwrap();
        assert_eq!(
            expr,
            FilterExpression::Filename {
                operator: Operator::Ge,
                value: "b".to_string(),
            }
        );
    }

    #[test]
    fn test_indexed_filter() {
        let expr = parse_filter("column:id<=42").unwrap();
        assert_eq!(
            expr,
            FilterExpression::Column {
                index: "id".to_string(),
                operator: Operator::Le,
                value: "42".to_string(),
            }
        );
    }

    #[test]
    fn test_first_operator_wins() {
        // Everything after the first operator belongs to the value
        match parse_filter("column:name=a>=b:c=d").unwrap() {
            FilterExpression::Column {
                index,
                operator,
                value,
                ..
            } => {
                assert_eq!(index, "name");
                assert_eq!(operator, Operator::Eq);
                assert_eq!(value, "a>=b:c=d");
            }
            other => panic!("Expected column filter, got {:?}", other),
        }
    }

    #[test]
    fn test_value_with_colon_stays_plain() {
        match parse_filter("filename=a:b=c").unwrap() {
            FilterExpression::Filename { value, .. } => assert_eq!(value, "a:b=c"),
            other => panic!("Expected filename filter, got {:?}", other),
        }
    }

    #[test]
    fn test_double_equals_is_equality() {
        match parse_filter("filename==a.csv").unwrap() {
            FilterExpression::Filename {
                operator, value, ..
            } => {
                assert_eq!(operator, Operator::Eq);
                assert_eq!(value, "a.csv");
            }
            other => panic!("Expected filename filter, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_operators_parse() {
        assert!(matches!(
            parse_filter("column:0>5"),
            Ok(FilterExpression::Column {
                operator: Operator::Gt,
                ..
            })
        ));
        assert!(matches!(
            parse_filter("filename<m"),
            Ok(FilterExpression::Filename {
                operator: Operator::Lt,
                ..
            })
        ));
    }

    #[test]
    fn test_unknown_keys() {
        assert!(matches!(
            parse_filter("size>=10"),
            Err(ExpressionError::UnknownKey { .. })
        ));
        // column is only recognized in indexed form, filename only in plain form
        assert!(matches!(
            parse_filter("column=1"),
            Err(ExpressionError::UnknownKey { .. })
        ));
        assert!(matches!(
            parse_filter("filename:0=a"),
            Err(ExpressionError::UnknownKey { .. })
        ));
    }

    #[test]
    fn test_unparseable() {
        for raw in ["", "column", "column:id", "=value", "column:=1", "id=", "a b=c"] {
            assert_eq!(
                parse_filter(raw),
                Err(ExpressionError::Unparseable(raw.to_string())),
                "input {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_mappers() {
        assert_eq!(
            parse_mapper("filename=source").unwrap(),
            MapperExpression::Plain {
                key: "filename".to_string(),
                value: "source".to_string(),
            }
        );
        assert_eq!(
            parse_mapper("column:1=username").unwrap(),
            MapperExpression::Indexed {
                index: "1".to_string(),
                value: "username".to_string(),
            }
        );
        assert!(matches!(
            parse_mapper("row:1=x"),
            Err(ExpressionError::UnknownKey { .. })
        ));
        assert!(matches!(
            parse_mapper("id>=x"),
            Err(ExpressionError::UnsupportedOperator {
                operator: Operator::Ge,
                ..
            })
        ));
    }
}
