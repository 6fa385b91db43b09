//! CLI presentation: text and json formatters per command.

mod explain;
mod graph;
mod report;
mod settings;
mod shared;

pub use explain::{format_explain_text, Explanation};
pub use graph::{format_graph, format_graph_text};
pub use report::{format_report, format_report_text};
pub use settings::{format_settings, format_settings_nix, format_settings_text};
pub use shared::format_section_heading;
