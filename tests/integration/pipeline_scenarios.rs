//! End-to-end pipeline scenarios over real fragment files

use super::test_utils::{file_names, loader, Workspace, HOME_SCHEMA};
use confold::merge::Provenance;
use confold::pipeline::Stage;
use confold::validate::{Severity, ViolationKind};
use confold::{EngineError, OptionKey, OptionValue, Pipeline, PipelineState, Schema};

fn schema() -> Schema {
    Schema::from_toml_str(HOME_SCHEMA).unwrap()
}

fn key(text: &str) -> OptionKey {
    OptionKey::parse(text).unwrap()
}

#[test]
fn test_last_writer_wins_with_provenance() {
    let ws = Workspace::new();
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

    let loader = loader();
    let mut pipeline = Pipeline::new(&loader, schema());
    let settings = pipeline.run(&ws.root("home.nix")).unwrap();

    assert_eq!(pipeline.state(), &PipelineState::Materialized);
    assert_eq!(settings.get_str("home.username"), Some("quentin"));
    assert_eq!(settings.get_str("home.keyboard.layout"), Some("fr"));

    let entry = settings.entry(&key("home.keyboard.layout")).unwrap();
    match &entry.provenance {
        Provenance::Fragment(id) => assert_eq!(file_names([id]), vec!["b.nix"]),
        other => panic!("expected fragment provenance, got {other}"),
    }
    assert_eq!(file_names(&entry.history), vec!["a.nix", "b.nix"]);
}

#[test]
fn test_missing_required_fails_validation() {
    let ws = Workspace::new();
    ws.write("home.nix", r#"{ home.username = "quentin"; }"#);

    let loader = loader();
    let mut pipeline = Pipeline::new(&loader, schema());
    let err = pipeline.run(&ws.root("home.nix")).unwrap_err();

    match err {
        EngineError::ValidationFailed { report } => {
            let missing: Vec<_> = report
                .errors()
                .filter(|v| v.kind == ViolationKind::MissingRequired)
                .map(|v| v.key.to_string())
                .collect();
            assert_eq!(missing, vec!["home.stateVersion"]);
        }
        other => panic!("expected validation failure, got {other}"),
    }
    assert!(matches!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Stage::Validating,
            ..
        }
    ));
}

#[test]
fn test_import_cycle_names_the_path() {
    let ws = Workspace::new();
    ws.write("a.nix", "{ imports = [ ./b.nix ]; }");
    ws.write("b.nix", "{ imports = [ ./a.nix ]; }");

    let loader = loader();
    let mut pipeline = Pipeline::new(&loader, Schema::empty());
    let err = pipeline.run(&ws.root("a.nix")).unwrap_err();

    match &err {
        EngineError::CycleDetected { cycle } => {
            assert_eq!(file_names(cycle), vec!["a.nix", "b.nix", "a.nix"]);
        }
        other => panic!("expected a cycle, got {other}"),
    }
    assert!(err.to_string().starts_with("Import cycle detected: "));
    assert!(matches!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Stage::Resolving,
            ..
        }
    ));
}

#[test]
fn test_runs_are_idempotent() {
    let ws = Workspace::new();
    ws.write(
        "home.nix",
        r#"{
  imports = [ ./modules ];
  home.username = "quentin";
  home.stateVersion = "24.05";
  home.packages = [ "git" ];
}"#,
    );
    ws.write(
        "modules/default.nix",
        r#"{ home.packages = [ "ripgrep" ]; programs.fish.enable = true; }"#,
    );

    let loader = loader();
    let first = Pipeline::new(&loader, schema())
        .run(&ws.root("home.nix"))
        .unwrap();
    let second = Pipeline::new(&loader, schema())
        .run(&ws.root("home.nix"))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.fragments().len(), 2);
}

#[test]
fn test_append_defaults_and_stamp_substitution() {
    let ws = Workspace::new();
    ws.write(
        "home.nix",
        r#"{ config, ... }:
{
  imports = [ ./extra.nix ];
  home.username = "quentin";
  home.stateVersion = "24.05";
  home.packages = [ "git" ];
  xdg.configFile.version = config.home.stateVersion;
}"#,
    );
    ws.write("extra.nix", r#"{ home.packages = [ "ripgrep" "git" ]; }"#);

    let loader = loader();
    let settings = Pipeline::new(&loader, schema())
        .run(&ws.root("home.nix"))
        .unwrap();

    assert_eq!(
        settings.get(&key("home.packages")),
        Some(&OptionValue::List(vec![
            OptionValue::String("git".into()),
            OptionValue::String("ripgrep".into()),
            OptionValue::String("git".into()),
        ]))
    );
    assert_eq!(settings.get_bool("programs.git.enable"), Some(false));
    assert_eq!(
        settings.entry(&key("programs.git.enable")).unwrap().provenance,
        Provenance::SchemaDefault
    );
    assert_eq!(settings.get_str("xdg.configFile.version"), Some("24.05"));
    assert_eq!(settings.stamp().unwrap().as_str(), "24.05");

    // xdg.configFile.version has no schema entry
    assert_eq!(settings.warnings().len(), 1);
    assert_eq!(settings.warnings()[0].kind, ViolationKind::UnknownKey);
    assert_eq!(settings.warnings()[0].severity, Severity::Warning);
}

#[test]
fn test_immutable_conflict_aborts_merge() {
    let ws = Workspace::new();
    ws.write(
        "home.nix",
        r#"{
  imports = [ ./bash.nix ./zsh.nix ];
  home.username = "quentin";
  home.stateVersion = "24.05";
}"#,
    );
    ws.write("bash.nix", r#"{ home.shell = "bash"; }"#);
    ws.write("zsh.nix", r#"{ home.shell = "zsh"; }"#);

    let loader = loader();
    let mut pipeline = Pipeline::new(&loader, schema());
    let err = pipeline.run(&ws.root("home.nix")).unwrap_err();

    assert!(matches!(err, EngineError::Conflict { .. }));
    assert!(err.to_string().contains("home.shell"));
    assert!(matches!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Stage::Merging,
            ..
        }
    ));
}

#[test]
fn test_strict_mode_rejects_unknown_keys() {
    let ws = Workspace::new();
    ws.write(
        "home.nix",
        r#"{
  home.username = "quentin";
  home.stateVersion = "24.05";
  services.unknown.enable = true;
}"#,
    );

    let loader = loader();
    let lenient = Pipeline::new(&loader, schema())
        .run(&ws.root("home.nix"))
        .unwrap();
    assert_eq!(lenient.warnings().len(), 1);

    let err = Pipeline::new(&loader, schema().with_strict(true))
        .run(&ws.root("home.nix"))
        .unwrap_err();
    match err {
        EngineError::ValidationFailed { report } => {
            assert_eq!(report.error_count(), 1);
            assert_eq!(report.violations()[0].key, key("services.unknown.enable"));
        }
        other => panic!("expected validation failure, got {other}"),
    }
}

#[test]
fn test_enum_and_type_violations_are_reported_together() {
    let ws = Workspace::new();
    ws.write(
        "home.nix",
        r#"{
  home.username = 42;
  home.stateVersion = "24.05";
  home.keyboard.layout = "dvorak";
}"#,
    );

    let loader = loader();
    let err = Pipeline::new(&loader, schema())
        .run(&ws.root("home.nix"))
        .unwrap_err();
    match err {
        EngineError::ValidationFailed { report } => {
            let kinds: Vec<_> = report.errors().map(|v| v.kind).collect();
            assert!(kinds.contains(&ViolationKind::TypeMismatch));
            assert!(kinds.contains(&ViolationKind::InvalidEnum));
        }
        other => panic!("expected validation failure, got {other}"),
    }
}

#[test]
fn test_let_bindings_and_inherit_resolve_as_data() {
    let ws = Workspace::new();
    ws.write(
        "home.nix",
        r#"{ config, ... }:
let
  user = "quentin";
  layouts = { main = "fr"; };
in
{
  imports = [ ./shell.nix ];
  home.username = user;
  home.stateVersion = "24.05";
  home.keyboard.layout = layouts.main;
}"#,
    );
    ws.write("shell.nix", r#"let shell = "zsh"; in { home = { inherit shell; }; }"#);

    let loader = loader();
    let settings = Pipeline::new(&loader, schema())
        .run(&ws.root("home.nix"))
        .unwrap();

    assert_eq!(settings.get_str("home.username"), Some("quentin"));
    assert_eq!(settings.get_str("home.keyboard.layout"), Some("fr"));
    assert_eq!(settings.get_str("home.shell"), Some("zsh"));
}
