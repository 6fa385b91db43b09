//! Fragment loading: locating import references and reading fragment sources.
//!
//! `FsLoader` reads from disk with a per-read timeout and fetches batches
//! concurrently on its own tokio runtime. `MemorySource` serves fragments
//! registered by name.

use super::{Fragment, FragmentId};
use crate::config::LoaderConfig;
use crate::error::EngineError;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, trace};

/// Where fragments come from
pub trait FragmentSource {
    /// Turn an import reference into a fragment identity.
    ///
    /// `referrer` is the importing fragment; `None` for the root reference.
    fn locate(&self, referrer: Option<&FragmentId>, reference: &str)
        -> Result<FragmentId, EngineError>;

    /// Load one fragment. Loading the same identity twice yields equal fragments.
    fn load(&self, id: &FragmentId) -> Result<Fragment, EngineError>;

    /// Load several fragments; results are in request order.
    fn load_batch(&self, ids: &[FragmentId]) -> Vec<Result<Fragment, EngineError>> {
        ids.iter().map(|id| self.load(id)).collect()
    }
}

/// Filesystem loader options
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    /// Per-read timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Read batches concurrently
    pub parallel_fetch: bool,
    /// File loaded when an import names a directory
    pub entry_file: String,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions::from(&LoaderConfig::default())
    }
}

impl From<&LoaderConfig> for LoaderOptions {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            timeout: (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms)),
            parallel_fetch: config.parallel_fetch,
            entry_file: config.entry_file.clone(),
        }
    }
}

/// Loads fragments from the filesystem.
///
/// Reads run on the runtime's blocking pool. A read abandoned by its timeout
/// may never finish, so dropping the loader shuts the runtime down without
/// waiting for it.
pub struct FsLoader {
    options: LoaderOptions,
    runtime: Option<Runtime>,
}

impl FsLoader {
    pub fn new(options: LoaderOptions) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to start loader runtime: {}", e)))?;
        Ok(Self {
            options,
            runtime: Some(runtime),
        })
    }

    fn runtime(&self) -> Result<&Runtime, EngineError> {
        self.runtime
            .as_ref()
            .ok_or_else(|| EngineError::Config("Loader runtime has been shut down".to_string()))
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    fn expand_home(reference: &str) -> PathBuf {
        if let Some(rest) = reference.strip_prefix("~/") {
            if let Some(dirs) = directories::BaseDirs::new() {
                return dirs.home_dir().join(rest);
            }
        }
        PathBuf::from(reference)
    }
}

impl FragmentSource for FsLoader {
    fn locate(
        &self,
        referrer: Option<&FragmentId>,
        reference: &str,
    ) -> Result<FragmentId, EngineError> {
        let raw = Self::expand_home(reference);
        let joined = if raw.is_absolute() {
            raw
        } else {
            let base = match referrer {
                Some(id) => id
                    .to_path_buf()
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
                None => std::env::current_dir().map_err(|e| {
                    EngineError::Config(format!("Cannot determine working directory: {}", e))
                })?,
            };
            base.join(raw)
        };

        let target = if joined.is_dir() {
            joined.join(&self.options.entry_file)
        } else {
            joined
        };

        let canonical = dunce::canonicalize(&target).unwrap_or_else(|_| normalize_lexically(&target));
        trace!(reference, fragment = %canonical.display(), "Located fragment");
        Ok(FragmentId::from_path(&canonical))
    }

    fn load(&self, id: &FragmentId) -> Result<Fragment, EngineError> {
        self.runtime()?
            .block_on(read_fragment(id.clone(), self.options.timeout))
    }

    fn load_batch(&self, ids: &[FragmentId]) -> Vec<Result<Fragment, EngineError>> {
        if !self.options.parallel_fetch || ids.len() < 2 {
            return ids.iter().map(|id| self.load(id)).collect();
        }
        let runtime = match self.runtime() {
            Ok(runtime) => runtime,
            Err(err) => return ids.iter().map(|_| Err(err.clone())).collect(),
        };
        debug!(count = ids.len(), "Fetching fragments concurrently");
        let timeout = self.options.timeout;
        runtime.block_on(join_all(
            ids.iter().map(|id| read_fragment(id.clone(), timeout)),
        ))
    }
}

impl Drop for FsLoader {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn read_fragment(id: FragmentId, timeout: Option<Duration>) -> Result<Fragment, EngineError> {
    let path = id.to_path_buf();
    let read = tokio::fs::read(path);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| EngineError::Timeout {
                fragment: id.clone(),
                after_ms: limit.as_millis() as u64,
                chain: Vec::new(),
            })?,
        None => read.await,
    };
    let bytes = result.map_err(|e| io_error(&id, e))?;
    trace!(fragment = %id, bytes = bytes.len(), "Read fragment");
    Fragment::from_bytes(id, &bytes)
}

fn io_error(id: &FragmentId, err: io::Error) -> EngineError {
    if err.kind() == io::ErrorKind::NotFound {
        EngineError::NotFound {
            fragment: id.clone(),
            chain: Vec::new(),
        }
    } else {
        EngineError::Io {
            fragment: id.clone(),
            message: err.to_string(),
            chain: Vec::new(),
        }
    }
}

/// Resolve `.` and `..` without touching the filesystem
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Fragments registered by name; names are `/`-separated and imports resolve relative to the importer
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    sources: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a fragment source
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        let name = normalize_lexically(Path::new(&name.into()));
        self.sources
            .insert(name.to_string_lossy().into_owned(), source.into());
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }
}

impl FragmentSource for MemorySource {
    fn locate(
        &self,
        referrer: Option<&FragmentId>,
        reference: &str,
    ) -> Result<FragmentId, EngineError> {
        let reference = Path::new(reference);
        let joined = match referrer {
            Some(id) if reference.is_relative() => id
                .to_path_buf()
                .parent()
                .map(|dir| dir.join(reference))
                .unwrap_or_else(|| reference.to_path_buf()),
            _ => reference.to_path_buf(),
        };
        Ok(FragmentId::from_path(&normalize_lexically(&joined)))
    }

    fn load(&self, id: &FragmentId) -> Result<Fragment, EngineError> {
        match self.sources.get(id.as_str()) {
            Some(source) => Fragment::from_source(id.clone(), source),
            None => Err(EngineError::NotFound {
                fragment: id.clone(),
                chain: Vec::new(),
            }),
        }
    }
}
