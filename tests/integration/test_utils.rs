//! Shared test utilities for integration tests
//!
//! A throwaway workspace directory with helpers for writing fragments and schemas.

use confold::fragment::{FsLoader, LoaderOptions};
use confold::FragmentId;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Schema used by most scenarios: a required user name and stamp, a keyboard
/// layout enum, an appended package list, an immutable shell and program toggles.
pub const HOME_SCHEMA: &str = r#"
stamp = "home.stateVersion"

[options."home.username"]
type = "string"
required = true

[options."home.stateVersion"]
type = "version"
required = true

[options."home.keyboard.layout"]
type = "string"
enum = ["us", "fr", "de"]

[options."home.packages"]
type = "list"
items = "string"
merge = "append"

[options."home.shell"]
type = "string"
immutable = true

[options."programs.*.enable"]
type = "bool"

[options."programs.git.enable"]
type = "bool"
default = false
"#;

pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the workspace, creating parent directories
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Path of a workspace file as a root reference
    pub fn root(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    pub fn read(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).unwrap()
    }
}

pub fn loader() -> FsLoader {
    FsLoader::new(LoaderOptions::default()).unwrap()
}

/// File names of fragment ids, for assertions independent of the temp dir location
pub fn file_names<'a>(ids: impl IntoIterator<Item = &'a FragmentId>) -> Vec<String> {
    ids.into_iter()
        .map(|id| {
            id.to_path_buf()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect()
}
