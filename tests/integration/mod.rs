//! Integration tests for the confold composition engine

mod cli_commands;
mod config_loading;
mod pipeline_scenarios;
mod resolver_graphs;
mod test_utils;
