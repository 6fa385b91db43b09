//! CLI route: single route table and run context. Dispatches to the pipeline and presentation.

use crate::config::{ConfigLoader, ConfoldConfig};
use crate::error::EngineError;
use crate::fragment::{parse_value, Fragment, FragmentId, FsLoader, LoaderOptions};
use crate::key::OptionKey;
use crate::pipeline::Pipeline;
use crate::schema::Schema;
use crate::value::OptionValue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cli::parse::{Commands, SchemaArgs};
use crate::cli::presentation::{
    format_explain_text, format_graph, format_report, format_settings, Explanation,
};

/// Runtime context for CLI execution: workspace and tool configuration.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: ConfoldConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, EngineError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn config(&self) -> &ConfoldConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, EngineError> {
        match command {
            Commands::Resolve {
                root,
                schema,
                format,
            } => self.handle_resolve(root, schema, format),
            Commands::Check {
                root,
                schema,
                format,
            } => self.handle_check(root, schema, format),
            Commands::Graph {
                root,
                format,
                timeout_ms,
            } => {
                let loader = self.loader(*timeout_ms)?;
                let resolution = Pipeline::new(&loader, Schema::empty()).resolve(&self.root(root))?;
                format_graph(&resolution, format)
            }
            Commands::Explain { root, key, schema } => self.handle_explain(root, key, schema),
            Commands::Fmt { path, check } => self.handle_fmt(path, *check),
        }
    }

    fn handle_resolve(
        &self,
        root: &str,
        args: &SchemaArgs,
        format: &str,
    ) -> Result<String, EngineError> {
        let loader = self.loader(args.timeout_ms)?;
        let mut pipeline =
            Pipeline::new(&loader, self.schema(args)?).with_overrides(parse_overrides(&args.overrides)?);
        let settings = pipeline.run(&self.root(root))?;
        info!(
            fragments = settings.fragments().len(),
            fingerprint = settings.fingerprint(),
            "Resolved settings"
        );
        format_settings(&settings, format)
    }

    fn handle_check(
        &self,
        root: &str,
        args: &SchemaArgs,
        format: &str,
    ) -> Result<String, EngineError> {
        let loader = self.loader(args.timeout_ms)?;
        let mut pipeline =
            Pipeline::new(&loader, self.schema(args)?).with_overrides(parse_overrides(&args.overrides)?);
        let inspection = pipeline.check(&self.root(root))?;
        if inspection.report.has_errors() {
            return Err(EngineError::ValidationFailed {
                report: inspection.report,
            });
        }
        format_report(&inspection.report, format)
    }

    fn handle_explain(
        &self,
        root: &str,
        key: &str,
        args: &SchemaArgs,
    ) -> Result<String, EngineError> {
        let key = OptionKey::parse(key)
            .map_err(|e| EngineError::Config(format!("Invalid option key '{}': {}", key, e)))?;
        let loader = self.loader(args.timeout_ms)?;
        let mut pipeline =
            Pipeline::new(&loader, self.schema(args)?).with_overrides(parse_overrides(&args.overrides)?);
        let inspection = pipeline.check(&self.root(root))?;

        let children = if inspection.tree.is_mapping(&key) {
            inspection
                .tree
                .leaves()
                .filter(|(leaf, _)| key.is_strict_prefix_of(leaf))
                .collect()
        } else {
            Vec::new()
        };
        let explanation = Explanation {
            key: &key,
            entry: inspection.tree.get(&key),
            children,
            schema: pipeline.schema().lookup(&key),
            violations: inspection
                .report
                .violations()
                .iter()
                .filter(|v| v.key == key || key.is_strict_prefix_of(&v.key))
                .collect(),
        };
        Ok(format_explain_text(&explanation))
    }

    /// Rewrite fragments in canonical form. Files whose rendering would drop
    /// comments or scoping constructs are reported and left untouched.
    fn handle_fmt(&self, path: &Path, check: bool) -> Result<String, EngineError> {
        let path = self.workspace_root.join(path);
        let files = fragment_files(&path)?;
        let mut changed = Vec::new();
        let mut skipped = Vec::new();

        for file in &files {
            let id = FragmentId::from_path(file);
            let original = std::fs::read_to_string(file).map_err(|e| io_error(&id, e))?;
            let fragment = Fragment::from_source(id.clone(), &original)?;
            if !fragment.unrendered().is_empty() {
                warn!(
                    file = %id,
                    constructs = %fragment.unrendered().join(", "),
                    "Skipped fragment; canonical form would drop source constructs"
                );
                skipped.push(file.clone());
                continue;
            }
            let rendered = fragment.to_string();
            if rendered == original {
                continue;
            }
            if !check {
                std::fs::write(file, &rendered).map_err(|e| io_error(&id, e))?;
                debug!(file = %id, "Rewrote fragment");
            }
            changed.push(file.clone());
        }

        let note = if skipped.is_empty() {
            String::new()
        } else {
            format!(", {} skipped (comments or scoping constructs)", skipped.len())
        };
        if check {
            if !changed.is_empty() {
                return Err(EngineError::Unformatted { files: changed });
            }
            return Ok(format!(
                "{} file(s) already formatted{}",
                files.len() - skipped.len(),
                note
            ));
        }
        Ok(format!(
            "{} file(s) reformatted, {} unchanged{}",
            changed.len(),
            files.len() - changed.len() - skipped.len(),
            note
        ))
    }

    /// Relative roots are taken from the workspace directory
    fn root(&self, root: &str) -> String {
        let path = Path::new(root);
        if path.is_relative() && !root.starts_with("~/") {
            self.workspace_root.join(path).to_string_lossy().into_owned()
        } else {
            root.to_string()
        }
    }

    /// `--schema`, else `schema.path` from configuration, else an empty schema
    fn schema(&self, args: &SchemaArgs) -> Result<Schema, EngineError> {
        let path = args.schema.as_ref().or(self.config.schema.path.as_ref());
        let schema = match path {
            Some(path) => Schema::load(path)?,
            None => Schema::empty(),
        };
        if args.strict || self.config.schema.strict {
            Ok(schema.with_strict(true))
        } else {
            Ok(schema)
        }
    }

    fn loader(&self, timeout_ms: Option<u64>) -> Result<FsLoader, EngineError> {
        let mut options = LoaderOptions::from(&self.config.loader);
        if let Some(ms) = timeout_ms {
            options.timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        FsLoader::new(options)
    }
}

/// `key=value` pairs. Values use fragment value syntax; a bare word is a string.
fn parse_overrides(raw: &[String]) -> Result<Vec<(OptionKey, OptionValue)>, EngineError> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                EngineError::Config(format!("Invalid override '{}': expected KEY=VALUE", pair))
            })?;
            let key = OptionKey::parse(key.trim())
                .map_err(|e| EngineError::Config(format!("Invalid override key '{}': {}", key, e)))?;
            let value = match parse_value(value.trim()) {
                Ok(OptionValue::Symbol(word)) => OptionValue::String(word),
                Ok(parsed) => parsed,
                Err(_) => OptionValue::String(value.to_string()),
            };
            Ok((key, value))
        })
        .collect()
}

/// A single file, or every `*.nix` below a directory (hidden directories skipped)
fn fragment_files(path: &Path) -> Result<Vec<PathBuf>, EngineError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(EngineError::NotFound {
            fragment: FragmentId::from_path(path),
            chain: Vec::new(),
        });
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry.map_err(|e| EngineError::Io {
            fragment: FragmentId::from_path(path),
            message: e.to_string(),
            chain: Vec::new(),
        })?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "nix") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn io_error(id: &FragmentId, e: std::io::Error) -> EngineError {
    EngineError::Io {
        fragment: id.clone(),
        message: e.to_string(),
        chain: Vec::new(),
    }
}
