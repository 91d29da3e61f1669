use serde::Serialize;
use thiserror::Error;

use crate::source::{Field, SourceKind};

/// Pipeline stage, reported alongside fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Config,
    Adapt,
    Merge,
    Io,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Adapt => write!(f, "adapt"),
            Self::Merge => write!(f, "merge"),
            Self::Io => write!(f, "io"),
        }
    }
}

/// Fatal errors. Everything else degrades to a [`DataWarning`].
#[derive(Debug, Error)]
pub enum TriageError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad threshold, unknown column override, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// The source has no column that can serve as the page identifier.
    #[error("source '{input}': missing identifier column (tried {tried})")]
    MissingIdentifierColumn { input: SourceKind, tried: String },
    /// A mapped metric column has values but none of them are numeric.
    #[error("source '{input}': column '{column}' cannot be coerced to a number")]
    UncoercibleColumn { input: SourceKind, column: String },
    /// A table was handed to the wrong join slot.
    #[error("source '{input}' passed where '{expected}' was expected")]
    SourceMismatch { input: SourceKind, expected: SourceKind },
    /// Malformed CSV in a source export.
    #[error("source '{input}': CSV error: {message}")]
    Csv { input: SourceKind, message: String },
    /// Writing an output table failed.
    #[error("IO error: {0}")]
    Io(String),
}

impl TriageError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::ConfigParse(_) | Self::ConfigValidation(_) => Stage::Config,
            Self::MissingIdentifierColumn { .. }
            | Self::UncoercibleColumn { .. }
            | Self::Csv { .. } => Stage::Adapt,
            Self::SourceMismatch { .. } => Stage::Merge,
            Self::Io(_) => Stage::Io,
        }
    }

    /// The source that caused the failure, when there is one.
    pub fn source_kind(&self) -> Option<SourceKind> {
        match self {
            Self::MissingIdentifierColumn { input, .. }
            | Self::UncoercibleColumn { input, .. }
            | Self::SourceMismatch { input, .. }
            | Self::Csv { input, .. } => Some(*input),
            _ => None,
        }
    }

    /// True for errors caused by configuration rather than runtime IO.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Csv { .. })
    }
}

/// Non-fatal data quality findings collected during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataWarning {
    /// A cell could not be coerced; the field is absent for that row.
    UnparseableValue {
        source: SourceKind,
        line: usize,
        column: String,
        value: String,
    },
    /// A row had an empty identifier and cannot join.
    EmptyIdentifier { source: SourceKind, line: usize },
    /// A later row normalized to a key already taken by an earlier row.
    DuplicateKey {
        source: SourceKind,
        key: String,
        line: usize,
        first_line: usize,
    },
    /// An explicitly configured column is not in the export header.
    ColumnNotFound {
        source: SourceKind,
        field: Field,
        column: String,
    },
    /// The source is not configured for this run and contributes nothing.
    SourceMissing { source: SourceKind },
}

impl std::fmt::Display for DataWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnparseableValue { source, line, column, value } => {
                write!(f, "{source} line {line}: cannot parse '{value}' in column '{column}'")
            }
            Self::EmptyIdentifier { source, line } => {
                write!(f, "{source} line {line}: empty page identifier, row skipped")
            }
            Self::DuplicateKey { source, key, line, first_line } => {
                write!(
                    f,
                    "{source} line {line}: key '{key}' already seen on line {first_line}, row skipped"
                )
            }
            Self::ColumnNotFound { source, field, column } => {
                write!(f, "{source}: column '{column}' for field '{field}' not found")
            }
            Self::SourceMissing { source } => write!(f, "{source}: source not configured"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_name_stage_and_source() {
        let err = TriageError::MissingIdentifierColumn {
            input: SourceKind::Ga4,
            tried: "'Page', 'Page path'".into(),
        };
        assert_eq!(err.stage(), Stage::Adapt);
        assert_eq!(err.source_kind(), Some(SourceKind::Ga4));
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ga4"));

        let io = TriageError::Io("disk full".into());
        assert_eq!(io.stage().to_string(), "io");
        assert_eq!(io.source_kind(), None);
        assert!(!io.is_configuration());
    }

    #[test]
    fn warnings_serialize_with_kind_tag() {
        let w = DataWarning::DuplicateKey {
            source: SourceKind::Gsc,
            key: "example.com/a".into(),
            line: 5,
            first_line: 2,
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["kind"], "duplicate_key");
        assert_eq!(json["source"], "gsc");
        assert_eq!(json["first_line"], 2);
        assert!(w.to_string().contains("line 5"));
    }
}
