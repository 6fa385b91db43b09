//! Resolved settings: json, nix and provenance-table output.

use super::shared::{format_section_heading, to_pretty_json, truncate_cell, unsupported_format};
use crate::error::EngineError;
use crate::materialize::ResolvedSettings;
use comfy_table::Table;

const VALUE_WIDTH: usize = 60;

pub fn format_settings(settings: &ResolvedSettings, format: &str) -> Result<String, EngineError> {
    match format {
        "json" => to_pretty_json(settings),
        "nix" => Ok(format_settings_nix(settings)),
        "text" => Ok(format_settings_text(settings)),
        other => Err(unsupported_format(other, &["json", "nix", "text"])),
    }
}

/// Settings rendered back into fragment syntax, headed by the stamp and fingerprint
pub fn format_settings_nix(settings: &ResolvedSettings) -> String {
    let mut out = String::new();
    if let Some(stamp) = settings.stamp() {
        out.push_str(&format!("# stamp: {}\n", stamp));
    }
    out.push_str(&format!("# fingerprint: {}\n", settings.fingerprint()));
    out.push_str(&settings.settings().to_string());
    out.push('\n');
    out
}

pub fn format_settings_text(settings: &ResolvedSettings) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Resolved settings")));
    out.push_str(&format!(
        "  Stamp: {}\n",
        settings.stamp().map(|s| s.as_str()).unwrap_or("-")
    ));
    out.push_str(&format!("  Fingerprint: {}\n", settings.fingerprint()));
    out.push_str(&format!("  Fragments: {}\n\n", settings.fragments().len()));

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Key", "Value", "Source", "Strategy"]);
    for (key, entry) in settings.entries() {
        table.add_row(vec![
            key.to_string(),
            truncate_cell(&entry.value.to_string(), VALUE_WIDTH),
            entry.provenance.to_string(),
            entry.strategy.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));

    let warnings = settings.warnings();
    if !warnings.is_empty() {
        out.push_str(&format!("\n{}\n\n", format_section_heading("Warnings")));
        for warning in warnings {
            out.push_str(&format!("  {}\n", warning));
        }
    }
    out
}
