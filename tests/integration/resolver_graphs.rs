//! Import graph resolution against the filesystem loader

use super::test_utils::{file_names, loader, Workspace};
use confold::fragment::{FsLoader, LoaderOptions};
use confold::resolve::Resolver;
use confold::EngineError;

#[test]
fn test_diamond_resolves_each_fragment_once() {
    let ws = Workspace::new();
    ws.write("root.nix", "{ imports = [ ./left.nix ./right.nix ]; }");
    ws.write("left.nix", "{ imports = [ ./shared.nix ]; left = true; }");
    ws.write("right.nix", "{ imports = [ ./shared.nix ]; right = true; }");
    ws.write("shared.nix", "{ shared = true; }");

    let loader = loader();
    let resolution = Resolver::new(&loader)
        .resolve_root(&ws.root("root.nix"))
        .unwrap();

    assert_eq!(
        file_names(resolution.ids()),
        vec!["root.nix", "left.nix", "shared.nix", "right.nix"]
    );
    assert_eq!(resolution.edges.len(), 4);
}

#[test]
fn test_relative_imports_follow_the_importing_file() {
    let ws = Workspace::new();
    ws.write("root.nix", "{ imports = [ ./profiles/desktop.nix ]; }");
    ws.write("profiles/desktop.nix", "{ imports = [ ../modules/fonts.nix ]; }");
    ws.write("modules/fonts.nix", "{ fonts.enable = true; }");

    let loader = loader();
    let resolution = Resolver::new(&loader)
        .resolve_root(&ws.root("root.nix"))
        .unwrap();

    let last = resolution.fragments.last().unwrap().id().to_path_buf();
    assert!(last.ends_with("modules/fonts.nix"));
}

#[test]
fn test_missing_import_reports_the_chain() {
    let ws = Workspace::new();
    ws.write("root.nix", "{ imports = [ ./middle.nix ]; }");
    ws.write("middle.nix", "{ imports = [ ./gone.nix ]; }");

    let loader = loader();
    let err = Resolver::new(&loader)
        .resolve_root(&ws.root("root.nix"))
        .unwrap_err();

    match &err {
        EngineError::NotFound { fragment, chain } => {
            assert_eq!(file_names([fragment]), vec!["gone.nix"]);
            assert_eq!(file_names(chain), vec!["root.nix", "middle.nix"]);
        }
        other => panic!("expected NotFound, got {other}"),
    }
}

#[test]
fn test_parse_error_in_import_is_fatal() {
    let ws = Workspace::new();
    ws.write("root.nix", "{ imports = [ ./broken.nix ]; }");
    ws.write("broken.nix", "{ home.username = ; }");

    let loader = loader();
    let err = Resolver::new(&loader)
        .resolve_root(&ws.root("root.nix"))
        .unwrap_err();
    assert!(matches!(err, EngineError::Parse { .. }));
}

#[test]
fn test_parallel_and_sequential_fetch_agree() {
    let ws = Workspace::new();
    ws.write(
        "root.nix",
        "{ imports = [ ./a.nix ./b.nix ./c.nix ./d.nix ]; }",
    );
    for name in ["a", "b", "c", "d"] {
        ws.write(&format!("{name}.nix"), &format!("{{ {name} = 1; }}"));
    }

    let parallel = FsLoader::new(LoaderOptions {
        parallel_fetch: true,
        ..LoaderOptions::default()
    })
    .unwrap();
    let sequential = FsLoader::new(LoaderOptions {
        parallel_fetch: false,
        ..LoaderOptions::default()
    })
    .unwrap();

    let first = Resolver::new(&parallel)
        .resolve_root(&ws.root("root.nix"))
        .unwrap();
    let second = Resolver::new(&sequential)
        .resolve_root(&ws.root("root.nix"))
        .unwrap();

    assert_eq!(first.ids(), second.ids());
    assert_eq!(
        file_names(first.ids()),
        vec!["root.nix", "a.nix", "b.nix", "c.nix", "d.nix"]
    );
}

#[cfg(unix)]
#[test]
fn test_stalled_import_times_out_with_chain() {
    use std::sync::mpsc;
    use std::time::Duration;

    let ws = Workspace::new();
    ws.write("root.nix", "{ imports = [ ./stalled.nix ]; }");
    let status = std::process::Command::new("mkfifo")
        .arg(ws.path().join("stalled.nix"))
        .status()
        .unwrap();
    assert!(status.success());

    let root = ws.root("root.nix");
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let loader = FsLoader::new(LoaderOptions {
            timeout: Some(Duration::from_millis(150)),
            ..LoaderOptions::default()
        })
        .unwrap();
        let result = Resolver::new(&loader).resolve_root(&root).map(|r| r.fragments.len());
        drop(loader);
        tx.send(result).unwrap();
    });

    let err = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("resolution should give up after the timeout")
        .unwrap_err();
    match &err {
        EngineError::Timeout {
            fragment,
            after_ms,
            chain,
        } => {
            assert_eq!(file_names([fragment]), vec!["stalled.nix"]);
            assert_eq!(*after_ms, 150);
            assert_eq!(file_names(chain), vec!["root.nix"]);
        }
        other => panic!("expected a timeout, got {other}"),
    }
}
