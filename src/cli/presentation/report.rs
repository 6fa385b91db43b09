//! Validation report output for `check`.

use super::shared::{format_section_heading, to_pretty_json, unsupported_format};
use crate::error::EngineError;
use crate::validate::ValidationReport;
use comfy_table::Table;

pub fn format_report(report: &ValidationReport, format: &str) -> Result<String, EngineError> {
    match format {
        "json" => to_pretty_json(report),
        "text" => Ok(format_report_text(report)),
        other => Err(unsupported_format(other, &["text", "json"])),
    }
}

pub fn format_report_text(report: &ValidationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Validation")));
    if report.is_empty() {
        out.push_str("  No violations.\n");
        return out;
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Severity", "Key", "Violation", "Expected", "Found"]);
    for violation in report.violations() {
        table.add_row(vec![
            format!("{:?}", violation.severity).to_lowercase(),
            violation.key.to_string(),
            violation.kind.to_string(),
            violation.expected.clone(),
            violation.actual.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!(
        "  {} error(s), {} warning(s)\n",
        report.error_count(),
        report.warnings().count()
    ));
    out
}
