//! Built-in defaults: the lowest configuration layer.

use super::{default_entry_file, default_timeout_ms};
use crate::logging::default_log_file;
use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with the built-in defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("loader.timeout_ms", default_timeout_ms() as i64)?
        .set_default("loader.parallel_fetch", true)?
        .set_default("loader.entry_file", default_entry_file())?
        .set_default("schema.strict", false)?
        .set_default("logging.enabled", false)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")?
        .set_default(
            "logging.file",
            default_log_file().to_string_lossy().into_owned(),
        )?
        .set_default("logging.color", true)
}
