//! Error types for the confold configuration composition engine.

use crate::fragment::FragmentId;
use crate::key::OptionKey;
use crate::merge::Provenance;
use crate::validate::ValidationReport;
use crate::value::ValueKind;
use std::path::PathBuf;
use thiserror::Error;

/// Fragment syntax error with source location
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {col})\n{context}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub col: usize,
    /// Offending source line followed by a caret line
    pub context: String,
}

impl ParseError {
    /// Error without a meaningful location (e.g. undecodable bytes)
    pub fn unlocated(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: 0,
            col: 0,
            context: String::new(),
        }
    }
}

/// Invalid schema file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Cannot read schema {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Invalid schema TOML: {0}")]
    Syntax(String),

    #[error("Invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Unknown type '{type_name}' for '{pattern}'")]
    UnknownType { pattern: String, type_name: String },

    #[error("Invalid entry '{pattern}': {reason}")]
    InvalidEntry { pattern: String, reason: String },
}

/// Pipeline errors: loading, resolution, merging, validation and materialization
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Fragment not found: {fragment}{}", chain_suffix(.chain))]
    NotFound {
        fragment: FragmentId,
        chain: Vec<FragmentId>,
    },

    #[error("Parse error in {fragment}{}: {source}", chain_suffix(.chain))]
    Parse {
        fragment: FragmentId,
        #[source]
        source: ParseError,
        chain: Vec<FragmentId>,
    },

    #[error("Timed out after {after_ms} ms loading {fragment}{}", chain_suffix(.chain))]
    Timeout {
        fragment: FragmentId,
        after_ms: u64,
        chain: Vec<FragmentId>,
    },

    #[error("I/O error reading {fragment}: {message}{}", chain_suffix(.chain))]
    Io {
        fragment: FragmentId,
        message: String,
        chain: Vec<FragmentId>,
    },

    #[error("Import cycle detected: {}", format_path(.cycle))]
    CycleDetected { cycle: Vec<FragmentId> },

    #[error(
        "Conflicting values for immutable option '{key}': {first_value} (set by {first}) vs {second_value} (set by {second})"
    )]
    Conflict {
        key: OptionKey,
        first: Provenance,
        first_value: String,
        second: Provenance,
        second_value: String,
    },

    #[error(
        "Type conflict at '{key}': {existing_kind} (set by {existing}) cannot be merged with {incoming_kind} (set by {incoming})"
    )]
    TypeConflict {
        key: OptionKey,
        existing_kind: ValueKind,
        existing: Provenance,
        incoming_kind: ValueKind,
        incoming: Provenance,
    },

    #[error("Validation failed with {} error(s)", .report.error_count())]
    ValidationFailed { report: ValidationReport },

    #[error("Compatibility stamp '{key}' cannot be resolved: {reason}")]
    UnresolvedStamp { key: OptionKey, reason: String },

    #[error("Option '{key}' refers to 'config.{target}', which is not the compatibility stamp")]
    UnresolvedReference { key: OptionKey, target: OptionKey },

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} file(s) are not canonically formatted", .files.len())]
    Unformatted { files: Vec<PathBuf> },
}

impl EngineError {
    /// Attach the import chain that led to a loader failure.
    ///
    /// Only loader errors carry a chain; other variants are returned unchanged.
    pub fn in_chain(self, chain: &[FragmentId]) -> Self {
        match self {
            EngineError::NotFound { fragment, .. } => EngineError::NotFound {
                fragment,
                chain: chain.to_vec(),
            },
            EngineError::Parse {
                fragment, source, ..
            } => EngineError::Parse {
                fragment,
                source,
                chain: chain.to_vec(),
            },
            EngineError::Timeout {
                fragment, after_ms, ..
            } => EngineError::Timeout {
                fragment,
                after_ms,
                chain: chain.to_vec(),
            },
            EngineError::Io {
                fragment, message, ..
            } => EngineError::Io {
                fragment,
                message,
                chain: chain.to_vec(),
            },
            other => other,
        }
    }

    /// Import chain attached to a loader error (empty for other variants)
    pub fn chain(&self) -> &[FragmentId] {
        match self {
            EngineError::NotFound { chain, .. }
            | EngineError::Parse { chain, .. }
            | EngineError::Timeout { chain, .. }
            | EngineError::Io { chain, .. } => chain,
            _ => &[],
        }
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

fn chain_suffix(chain: &[FragmentId]) -> String {
    if chain.is_empty() {
        String::new()
    } else {
        format!(" (imported via {})", format_path(chain))
    }
}

fn format_path(path: &[FragmentId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_is_rendered_in_message() {
        let err = EngineError::NotFound {
            fragment: FragmentId::new("b.nix"),
            chain: Vec::new(),
        }
        .in_chain(&[FragmentId::new("root.nix"), FragmentId::new("a.nix")]);

        assert_eq!(
            err.to_string(),
            "Fragment not found: b.nix (imported via root.nix -> a.nix)"
        );
        assert_eq!(err.chain().len(), 2);
    }

    #[test]
    fn test_cycle_message_names_every_step() {
        let err = EngineError::CycleDetected {
            cycle: vec![
                FragmentId::new("a.nix"),
                FragmentId::new("b.nix"),
                FragmentId::new("a.nix"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Import cycle detected: a.nix -> b.nix -> a.nix"
        );
    }

    #[test]
    fn test_in_chain_leaves_other_errors_untouched() {
        let err = EngineError::Config("bad".to_string()).in_chain(&[FragmentId::new("x")]);
        assert!(matches!(err, EngineError::Config(_)));
        assert!(err.chain().is_empty());
    }
}
