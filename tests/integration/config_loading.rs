//! Integration tests for the tool's own configuration

use super::test_utils::Workspace;
use confold::config::{ConfigLoader, ConfoldConfig};
use confold::fragment::LoaderOptions;
use std::time::Duration;

#[test]
fn test_workspace_without_config_uses_defaults() {
    let ws = Workspace::new();
    let config = ConfigLoader::load(ws.path()).unwrap();
    assert_eq!(config.loader, ConfoldConfig::default().loader);
    assert!(config.schema.path.is_none());
}

#[test]
fn test_workspace_file_feeds_loader_options() {
    let ws = Workspace::new();
    ws.write(
        ".confold.toml",
        r#"
[loader]
timeout_ms = 0
parallel_fetch = false
entry_file = "home.nix"

[schema]
path = "schemas/home.toml"
strict = true
"#,
    );

    let config = ConfigLoader::load(ws.path()).unwrap();
    let options = LoaderOptions::from(&config.loader);
    assert_eq!(options.timeout, None);
    assert!(!options.parallel_fetch);
    assert_eq!(options.entry_file, "home.nix");
    assert_eq!(
        config.schema.path.as_deref(),
        Some(ws.path().join("schemas/home.toml").as_path())
    );
    assert!(config.schema.strict);
}

#[test]
fn test_timeout_is_carried_in_milliseconds() {
    let ws = Workspace::new();
    ws.write(".confold.toml", "[loader]\ntimeout_ms = 1500\n");
    let config = ConfigLoader::load(ws.path()).unwrap();
    assert_eq!(
        LoaderOptions::from(&config.loader).timeout,
        Some(Duration::from_millis(1500))
    );
}

#[test]
fn test_malformed_workspace_file_is_an_error() {
    let ws = Workspace::new();
    ws.write(".confold.toml", "[loader\ntimeout_ms = ");
    assert!(ConfigLoader::load(ws.path()).is_err());
}
