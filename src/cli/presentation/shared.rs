//! Helpers shared by the presentation formatters.

use crate::error::EngineError;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub(crate) fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| EngineError::Config(format!("Failed to serialize output: {}", e)))
}

pub(crate) fn unsupported_format(format: &str, supported: &[&str]) -> EngineError {
    EngineError::Config(format!(
        "Unsupported format '{}' (expected one of: {})",
        format,
        supported.join(", ")
    ))
}

/// Shorten long rendered values for table cells
pub(crate) fn truncate_cell(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
