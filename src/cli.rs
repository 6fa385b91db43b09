//! CLI domain: parse, route, output, and presentation only.
//! No pipeline logic of its own; a single route table dispatches to the engine.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, SchemaArgs};
pub use presentation::{
    format_explain_text, format_graph, format_graph_text, format_report, format_report_text,
    format_section_heading, format_settings, format_settings_nix, format_settings_text,
    Explanation,
};
pub use route::RunContext;
