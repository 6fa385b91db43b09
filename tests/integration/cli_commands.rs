//! CLI commands through the run context

use super::test_utils::{Workspace, HOME_SCHEMA};
use clap::Parser;
use confold::cli::{map_error, Cli, RunContext};
use confold::EngineError;

fn run(ws: &Workspace, args: &[&str]) -> Result<String, EngineError> {
    let workspace = ws.path().to_string_lossy().into_owned();
    let mut argv = vec!["confold", "--workspace", workspace.as_str()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    let context = RunContext::new(cli.workspace.clone(), cli.config.clone())?;
    context.execute(&cli.command)
}

fn home_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.write("schema.toml", HOME_SCHEMA);
    ws.write(
        "home.nix",
        r#"{
  imports = [ ./a.nix ./b.nix ];
  home.username = "quentin";
  home.stateVersion = "24.05";
}"#,
    );
    ws.write("a.nix", r#"{ home.keyboard.layout = "us"; }"#);
    ws.write("b.nix", r#"{ home.keyboard.layout = "fr"; }"#);
    ws
}

#[test]
fn test_resolve_json_output() {
    let ws = home_workspace();
    let out = run(&ws, &["resolve", "home.nix", "--schema", &ws.root("schema.toml")]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();

    assert_eq!(value["settings"]["home"]["keyboard"]["layout"], "fr");
    assert_eq!(value["stamp"], "24.05");
    assert!(value["provenance"]["home.keyboard.layout"]["provenance"]
        .as_str()
        .unwrap()
        .ends_with("b.nix"));
    assert_eq!(value["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn test_resolve_with_override_and_nix_output() {
    let ws = home_workspace();
    let out = run(
        &ws,
        &[
            "resolve",
            "home.nix",
            "--schema",
            &ws.root("schema.toml"),
            "--format",
            "nix",
            "--set",
            "home.keyboard.layout=de",
        ],
    )
    .unwrap();
    assert!(out.starts_with("# stamp: 24.05\n"));
    assert!(out.contains("\"de\""));
}

#[test]
fn test_schema_from_workspace_config() {
    let ws = home_workspace();
    ws.write(".confold.toml", "[schema]\npath = \"schema.toml\"\n");
    let out = run(&ws, &["resolve", "home.nix", "--format", "text"]).unwrap();
    assert!(out.contains("home.keyboard.layout"));
    assert!(out.contains("24.05"));
}

#[test]
fn test_check_fails_on_missing_required() {
    let ws = Workspace::new();
    ws.write("schema.toml", HOME_SCHEMA);
    ws.write("home.nix", r#"{ home.username = "quentin"; }"#);

    let err = run(&ws, &["check", "home.nix", "--schema", &ws.root("schema.toml")]).unwrap_err();
    let message = map_error(&err);
    assert!(message.starts_with("Validation failed with 1 error(s)"));
    assert!(message.contains("home.stateVersion"));
}

#[test]
fn test_check_json_lists_warnings() {
    let ws = home_workspace();
    ws.write(
        "b.nix",
        r#"{ home.keyboard.layout = "fr"; services.extra.enable = true; }"#,
    );
    let out = run(
        &ws,
        &["check", "home.nix", "--schema", &ws.root("schema.toml"), "--format", "json"],
    )
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["violations"][0]["kind"], "unknown_key");
    assert_eq!(value["violations"][0]["severity"], "warning");
}

#[test]
fn test_graph_json() {
    let ws = home_workspace();
    let out = run(&ws, &["graph", "home.nix", "--format", "json"]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let order: Vec<&str> = value["order"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(order.len(), 3);
    assert!(order[0].ends_with("home.nix"));
    assert!(order[2].ends_with("b.nix"));
}

#[test]
fn test_explain_shows_contributors() {
    let ws = home_workspace();
    let out = run(
        &ws,
        &[
            "explain",
            "home.nix",
            "home.keyboard.layout",
            "--schema",
            &ws.root("schema.toml"),
        ],
    )
    .unwrap();
    assert!(out.contains("Value: \"fr\""));
    assert!(out.contains("Strategy: override"));
    assert!(out.contains("a.nix"));
    assert!(out.contains("b.nix"));
}

#[test]
fn test_fmt_check_then_rewrite() {
    let ws = Workspace::new();
    ws.write("profile/home.nix", "{home.username=\"quentin\";}");

    let err = run(&ws, &["fmt", "profile", "--check"]).unwrap_err();
    assert!(matches!(err, EngineError::Unformatted { ref files } if files.len() == 1));

    let out = run(&ws, &["fmt", "profile"]).unwrap();
    assert!(out.starts_with("1 file(s) reformatted"));
    assert_eq!(ws.read("profile/home.nix"), "{\n  home.username = \"quentin\";\n}\n");

    assert!(run(&ws, &["fmt", "profile", "--check"]).is_ok());
}

#[test]
fn test_fmt_leaves_commented_and_scoped_files_untouched() {
    let ws = Workspace::new();
    let commented = "# who I am\n{ home.username = \"quentin\"; }\n";
    let scoped = "{ home.packages = with pkgs; [ git ]; }\n";
    let bound = "let user = \"quentin\"; in { home.username = user; }\n";
    ws.write("profile/a.nix", commented);
    ws.write("profile/b.nix", scoped);
    ws.write("profile/c.nix", bound);
    ws.write("profile/d.nix", "{home.stateVersion=\"24.05\";}");

    let out = run(&ws, &["fmt", "profile"]).unwrap();
    assert_eq!(
        out,
        "1 file(s) reformatted, 0 unchanged, 3 skipped (comments or scoping constructs)"
    );
    assert_eq!(ws.read("profile/a.nix"), commented);
    assert_eq!(ws.read("profile/b.nix"), scoped);
    assert_eq!(ws.read("profile/c.nix"), bound);
    assert_eq!(ws.read("profile/d.nix"), "{\n  home.stateVersion = \"24.05\";\n}\n");

    let out = run(&ws, &["fmt", "profile", "--check"]).unwrap();
    assert!(out.starts_with("1 file(s) already formatted, 3 skipped"));
}
