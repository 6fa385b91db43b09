//! Import graph output for `graph`.

use super::shared::{format_section_heading, to_pretty_json, unsupported_format};
use crate::error::EngineError;
use crate::fragment::FragmentId;
use crate::resolve::Resolution;
use serde_json::json;
use std::collections::HashSet;

pub fn format_graph(resolution: &Resolution, format: &str) -> Result<String, EngineError> {
    match format {
        "json" => to_pretty_json(&json!({
            "order": resolution.ids(),
            "edges": resolution.edges,
        })),
        "text" => Ok(format_graph_text(resolution)),
        other => Err(unsupported_format(other, &["text", "json"])),
    }
}

pub fn format_graph_text(resolution: &Resolution) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Resolution order")));
    for (index, id) in resolution.ids().iter().enumerate() {
        out.push_str(&format!("  {:>3}. {}\n", index + 1, id));
    }

    out.push_str(&format!("\n{}\n\n", format_section_heading("Import tree")));
    if let Some(root) = resolution.root() {
        let mut printed = HashSet::new();
        write_tree(resolution, root.id(), 0, &mut printed, &mut out);
    }
    out
}

/// Depth-first; a fragment reached again is listed but not expanded
fn write_tree<'r>(
    resolution: &'r Resolution,
    id: &'r FragmentId,
    depth: usize,
    printed: &mut HashSet<&'r FragmentId>,
    out: &mut String,
) {
    let indent = "  ".repeat(depth + 1);
    if !printed.insert(id) {
        out.push_str(&format!("{}{} (already listed)\n", indent, id));
        return;
    }
    out.push_str(&format!("{}{}\n", indent, id));
    for child in resolution.imports_of(id) {
        write_tree(resolution, child, depth + 1, printed, out);
    }
}
