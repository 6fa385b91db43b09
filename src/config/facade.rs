//! Configuration loading facade: assembles the layered sources and deserializes.

use super::defaults::builder_with_defaults;
use super::sources::{environment, global_file, workspace_file};
use super::ConfoldConfig;
use crate::error::EngineError;
use config::File;
use std::path::Path;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, the global file, `<workspace>/.confold.toml` and the environment.
    pub fn load(workspace_root: &Path) -> Result<ConfoldConfig, EngineError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let mut config: ConfoldConfig = builder.build()?.try_deserialize()?;
        config.anchor_schema_path(workspace_root);
        Self::finish(config)
    }

    /// Load defaults, one explicit file and the environment. The global and
    /// workspace files are skipped.
    pub fn load_from_file(path: &Path) -> Result<ConfoldConfig, EngineError> {
        if !path.exists() {
            return Err(EngineError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        let builder = environment::add_to_builder(builder);

        let mut config: ConfoldConfig = builder.build()?.try_deserialize()?;
        if let Some(dir) = path.parent() {
            config.anchor_schema_path(dir);
        }
        Self::finish(config)
    }

    fn finish(config: ConfoldConfig) -> Result<ConfoldConfig, EngineError> {
        config.validate().map_err(EngineError::Config)?;
        debug!(
            timeout_ms = config.loader.timeout_ms,
            parallel_fetch = config.loader.parallel_fetch,
            schema = ?config.schema.path,
            "Loaded configuration"
        );
        Ok(config)
    }
}
