//! CLI parse: clap types for confold. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// confold - compose layered configuration fragments into resolved settings
#[derive(Parser)]
#[command(name = "confold")]
#[command(about = "Resolve, merge and validate declarative configuration fragments")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace directory (holds .confold.toml; relative roots resolve here)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (replaces the global and workspace files)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Schema selection and merge inputs shared by the pipeline commands
#[derive(Args, Debug, Clone, Default)]
pub struct SchemaArgs {
    /// Schema file (defaults to schema.path from configuration)
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Treat unknown options as errors
    #[arg(long)]
    pub strict: bool,

    /// Override an option after all fragments, e.g. --set home.username=alice
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Per-fragment load timeout in milliseconds (0 disables)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a root fragment into final settings
    Resolve {
        /// Root fragment path
        root: String,
        #[command(flatten)]
        schema: SchemaArgs,
        /// Output format (json, nix, text)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Validate without materializing; exits non-zero on errors
    Check {
        /// Root fragment path
        root: String,
        #[command(flatten)]
        schema: SchemaArgs,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show resolution order and the import tree
    Graph {
        /// Root fragment path
        root: String,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Per-fragment load timeout in milliseconds (0 disables)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Show a key's value, provenance, merge strategy and contributors
    Explain {
        /// Root fragment path
        root: String,
        /// Dotted option key
        key: String,
        #[command(flatten)]
        schema: SchemaArgs,
    },
    /// Rewrite fragment files in canonical syntax
    Fmt {
        /// Fragment file, or a directory searched for *.nix files
        path: PathBuf,
        /// Report files that would change instead of writing them
        #[arg(long)]
        check: bool,
    },
}
