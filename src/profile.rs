// src/profile.rs - reusable publish settings loaded from YAML
use crate::filter::ResolutionPolicy;
use crate::pipeline::config::{ErrorStrategy, PipelineConfig};
use serde::Deserialize;
use std::path::Path;

/// A YAML profile, e.g.
///
/// ```yaml
/// topic: users
/// no_header: false
/// delimiter: ";"
/// filters:
///   - "filename>=b"
///   - "column:id=1"
/// mappers:
///   - "column:name=username"
/// ```
///
/// Every field is optional; command-line flags override scalar settings and
/// command-line filters and mappers are appended after the profile's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub topic: Option<String>,
    pub key: Option<String>,
    pub no_header: Option<bool>,
    pub delimiter: Option<String>,
    pub extension: Option<String>,
    pub fail_closed: Option<bool>,
    pub fail_fast: Option<bool>,
    pub max_line_length: Option<usize>,
    pub filters: Vec<String>,
    pub mappers: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Failed to read profile '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid profile '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Delimiter must be a single byte, got '{0}'")]
    Delimiter(String),
}

impl Profile {
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ProfileError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply the profile's settings on top of `config`.
    pub fn apply(&self, config: &mut PipelineConfig) -> Result<(), ProfileError> {
        if let Some(topic) = &self.topic {
            config.topic = topic.clone();
        }
        if let Some(key) = &self.key {
            config.key = key.clone();
        }
        if let Some(no_header) = self.no_header {
            config.has_header = !no_header;
        }
        if let Some(delimiter) = &self.delimiter {
            config.delimiter = parse_delimiter(delimiter)?;
        }
        if let Some(extension) = &self.extension {
            config.extension = extension.clone();
        }
        if let Some(fail_closed) = self.fail_closed {
            config.resolution = if fail_closed {
                ResolutionPolicy::FailClosed
            } else {
                ResolutionPolicy::FailOpen
            };
        }
        if let Some(fail_fast) = self.fail_fast {
            config.error_strategy = if fail_fast {
                ErrorStrategy::FailFast
            } else {
                ErrorStrategy::Skip
            };
        }
        if let Some(max_line_length) = self.max_line_length {
            config.max_line_length = max_line_length;
        }
        Ok(())
    }
}

/// Accepts a single byte, or `\t` / `tab` for tab-separated files.
pub fn parse_delimiter(text: &str) -> Result<u8, ProfileError> {
    match text {
        "\\t" | "tab" => Ok(b'\t'),
        _ if text.len() == 1 => Ok(text.as_bytes()[0]),
        _ => Err(ProfileError::Delimiter(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_overrides_defaults() {
        let profile: Profile = serde_yaml::from_str(
            r#"
topic: users
no_header: true
delimiter: "tab"
fail_closed: true
filters:
  - "column:0=7"
mappers:
  - "column:1=username"
"#,
        )
        .unwrap();

        let mut config = PipelineConfig::default();
        profile.apply(&mut config).unwrap();

        assert_eq!(config.topic, "users");
        assert!(!config.has_header);
        assert_eq!(config.delimiter, b'\t');
        assert_eq!(config.resolution, ResolutionPolicy::FailClosed);
        assert_eq!(config.error_strategy, ErrorStrategy::Skip);
        assert_eq!(profile.filters, vec!["column:0=7".to_string()]);
        assert_eq!(profile.mappers, vec!["column:1=username".to_string()]);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_yaml::from_str::<Profile>("bootstrap: localhost").is_err());
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert!(parse_delimiter(",,").is_err());
    }
}
