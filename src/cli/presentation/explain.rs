//! Single-key explanation for `explain`.

use super::shared::format_section_heading;
use crate::key::OptionKey;
use crate::merge::MergedEntry;
use crate::schema::SchemaEntry;
use crate::validate::Violation;
use crate::value::OptionValue;
use comfy_table::Table;

/// What is known about one key after merging and validation
#[derive(Debug)]
pub struct Explanation<'a> {
    pub key: &'a OptionKey,
    /// Merged leaf at exactly this key
    pub entry: Option<&'a MergedEntry>,
    /// Leaves below this key when it is a mapping
    pub children: Vec<(&'a OptionKey, &'a MergedEntry)>,
    pub schema: Option<&'a SchemaEntry>,
    pub violations: Vec<&'a Violation>,
}

impl Explanation<'_> {
    fn default_value(&self) -> Option<&OptionValue> {
        self.schema.and_then(|entry| entry.constraint.default.as_ref())
    }
}

pub fn format_explain_text(explanation: &Explanation<'_>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&explanation.key.to_string())
    ));

    match (explanation.entry, explanation.default_value()) {
        (Some(entry), _) => {
            out.push_str(&format!("  Value: {}\n", entry.value));
            out.push_str(&format!("  Set by: {}\n", entry.provenance));
            out.push_str(&format!("  Strategy: {}\n", entry.strategy));
            out.push_str("  Contributors:\n");
            for (index, id) in entry.history.iter().enumerate() {
                out.push_str(&format!("    {}. {}\n", index + 1, id));
            }
        }
        (None, Some(default)) if explanation.children.is_empty() => {
            out.push_str(&format!("  Value: {}\n", default));
            out.push_str("  Set by: schema default (no fragment sets this key)\n");
        }
        (None, _) if !explanation.children.is_empty() => {
            out.push_str("  Mapping with the following options:\n\n");
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Key", "Value", "Source"]);
            for (key, entry) in &explanation.children {
                table.add_row(vec![
                    key.to_string(),
                    entry.value.to_string(),
                    entry.provenance.to_string(),
                ]);
            }
            out.push_str(&format!("{}\n", table));
        }
        (None, _) => out.push_str("  Not set by any fragment.\n"),
    }

    if let Some(schema) = explanation.schema {
        out.push_str(&format!("\n{}\n\n", format_section_heading("Schema")));
        out.push_str(&format!("  Pattern: {}\n", schema.pattern));
        out.push_str(&format!("  Type: {}\n", schema.constraint.option_type));
        if schema.constraint.required {
            out.push_str("  Required: yes\n");
        }
        if let Some(allowed) = &schema.constraint.allowed {
            let allowed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
            out.push_str(&format!("  Allowed: {}\n", allowed.join(", ")));
        }
        if let Some(description) = &schema.constraint.description {
            out.push_str(&format!("  Description: {}\n", description));
        }
    }

    if !explanation.violations.is_empty() {
        out.push_str(&format!("\n{}\n\n", format_section_heading("Violations")));
        for violation in &explanation.violations {
            out.push_str(&format!("  {}\n", violation));
        }
    }
    out
}
