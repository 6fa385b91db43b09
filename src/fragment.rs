//! Fragments: one composable unit of configuration (options + imports).

mod loader;
mod parser;

use crate::error::{EngineError, ParseError};
use crate::key::OptionKey;
use crate::value::OptionValue;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub use loader::{FragmentSource, FsLoader, LoaderOptions, MemorySource};
pub use parser::{parse_fragment, parse_value, ParsedFragment, IMPORTS_KEY};

/// Fragment identity: canonical path for filesystem sources, registered name otherwise
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FragmentId(String);

impl FragmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A loaded fragment. Immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    id: FragmentId,
    params: Option<Vec<String>>,
    imports: Vec<String>,
    assignments: Vec<(OptionKey, OptionValue)>,
    unrendered: Vec<&'static str>,
    digest: String,
}

impl Fragment {
    /// Parse fragment source text
    pub fn from_source(id: FragmentId, source: &str) -> Result<Self, EngineError> {
        let parsed = parse_fragment(source).map_err(|source_err| EngineError::Parse {
            fragment: id.clone(),
            source: source_err,
            chain: Vec::new(),
        })?;
        Ok(Self::from_parsed(id, parsed, source.as_bytes()))
    }

    /// Decode raw bytes, then parse
    pub fn from_bytes(id: FragmentId, bytes: &[u8]) -> Result<Self, EngineError> {
        let source = std::str::from_utf8(bytes).map_err(|e| EngineError::Parse {
            fragment: id.clone(),
            source: ParseError::unlocated(format!("fragment is not valid UTF-8: {}", e)),
            chain: Vec::new(),
        })?;
        Self::from_source(id, source)
    }

    /// Build a fragment from assignments directly (command-line overrides)
    pub fn from_assignments(id: FragmentId, assignments: Vec<(OptionKey, OptionValue)>) -> Self {
        let digest = blake3::hash(
            assignments
                .iter()
                .map(|(k, v)| format!("{} = {};\n", k, v))
                .collect::<String>()
                .as_bytes(),
        );
        Self {
            id,
            params: None,
            imports: Vec::new(),
            assignments,
            unrendered: Vec::new(),
            digest: hex::encode(digest.as_bytes()),
        }
    }

    fn from_parsed(id: FragmentId, parsed: ParsedFragment, raw: &[u8]) -> Self {
        Self {
            id,
            params: parsed.params,
            imports: parsed.imports,
            assignments: parsed.bindings,
            unrendered: parsed.unrendered,
            digest: hex::encode(blake3::hash(raw).as_bytes()),
        }
    }

    pub fn id(&self) -> &FragmentId {
        &self.id
    }

    pub fn params(&self) -> Option<&[String]> {
        self.params.as_deref()
    }

    /// Import references in source order
    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    /// Option assignments in source order
    pub fn assignments(&self) -> &[(OptionKey, OptionValue)] {
        &self.assignments
    }

    /// Source constructs (comments, `with`, `let`, `inherit`) missing from the canonical rendering.
    /// Empty when rendering reproduces the fragment exactly.
    pub fn unrendered(&self) -> &[&'static str] {
        &self.unrendered
    }

    /// BLAKE3 digest (hex) of the raw source bytes
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Canonical fragment syntax
impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(params) = &self.params {
            if params.is_empty() {
                writeln!(f, "{{ ... }}:")?;
            } else {
                writeln!(f, "{{ {}, ... }}:", params.join(", "))?;
            }
            writeln!(f)?;
        }

        writeln!(f, "{{")?;
        if !self.imports.is_empty() {
            let imports: Vec<String> = self.imports.iter().map(|i| render_import(i)).collect();
            writeln!(f, "  imports = [ {} ];", imports.join(" "))?;
            if !self.assignments.is_empty() {
                writeln!(f)?;
            }
        }
        for (key, value) in &self.assignments {
            write!(f, "  {} = ", key)?;
            value.write_with_indent(f, 1)?;
            writeln!(f, ";")?;
        }
        writeln!(f, "}}")
    }
}

fn render_import(reference: &str) -> String {
    let is_path_literal = ["./", "../", "/", "~/"]
        .iter()
        .any(|prefix| reference.starts_with(prefix))
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '/' | '~'))
        && !reference.ends_with('/');
    if is_path_literal {
        reference.to_string()
    } else {
        OptionValue::String(reference.to_string()).to_string()
    }
}
