//! Configuration System
//!
//! Settings for the `confold` tool itself (not the configurations it composes).
//! Layered with the `config` crate: built-in defaults, the global file, the
//! workspace file, then `CONFOLD__SECTION__KEY` environment variables. CLI flags
//! are applied on top by the binary.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod defaults;
mod facade;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfoldConfig {
    /// Fragment loading
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Default schema
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Per-fragment read timeout in milliseconds; 0 disables the timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Read the imports of a fragment concurrently
    #[serde(default = "default_true")]
    pub parallel_fetch: bool,

    /// File loaded when an import names a directory
    #[serde(default = "default_entry_file")]
    pub entry_file: String,
}

pub(crate) fn default_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

pub(crate) fn default_entry_file() -> String {
    "default.nix".to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            parallel_fetch: true,
            entry_file: default_entry_file(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema used when `--schema` is not given
    pub path: Option<PathBuf>,

    /// Treat unknown options as errors regardless of the schema file
    #[serde(default)]
    pub strict: bool,
}

impl ConfoldConfig {
    /// Reject settings no command can work with
    pub fn validate(&self) -> Result<(), String> {
        let entry = self.loader.entry_file.trim();
        if entry.is_empty() {
            return Err("loader.entry_file cannot be empty".to_string());
        }
        if Path::new(entry).components().count() != 1 {
            return Err(format!(
                "loader.entry_file must be a file name, not a path: {}",
                entry
            ));
        }
        Ok(())
    }

    /// Resolve a relative schema path against the directory it was configured in
    pub(crate) fn anchor_schema_path(&mut self, base: &Path) {
        if let Some(path) = &self.schema.path {
            if path.is_relative() {
                self.schema.path = Some(base.join(path));
            }
        }
    }
}
