//! Option schema: declared types, enumerations, requirements, defaults and
//! merge behavior per key pattern.
//!
//! Schemas are TOML files (see `file.rs`) loaded once per invocation and never
//! mutated afterwards.

mod file;
mod pattern;

pub use pattern::KeyPattern;

use crate::error::SchemaError;
use crate::key::OptionKey;
use crate::merge::{MergePolicy, MergeStrategy};
use crate::value::{MergeClass, OptionValue};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Declared type of an option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionType {
    Any,
    String,
    Bool,
    Int,
    /// Accepts ints too
    Float,
    /// Paths, or strings that look like one
    Path,
    Symbol,
    /// Dot-separated numeric components, e.g. `24.05`
    Version,
    List(Option<Box<OptionType>>),
    Mapping,
}

impl OptionType {
    /// Parse a type name; `items` is the element type name for lists.
    ///
    /// Fails with the first unknown type name.
    pub fn from_name(name: &str, items: Option<&str>) -> Result<Self, String> {
        let element = items
            .map(|item| Self::from_name(item, None).map(Box::new))
            .transpose()?;
        Ok(match name {
            "any" => OptionType::Any,
            "string" => OptionType::String,
            "bool" => OptionType::Bool,
            "int" => OptionType::Int,
            "float" => OptionType::Float,
            "path" => OptionType::Path,
            "symbol" => OptionType::Symbol,
            "version" => OptionType::Version,
            "list" => OptionType::List(element),
            "mapping" => OptionType::Mapping,
            other => return Err(other.to_string()),
        })
    }

    /// Whether `value` satisfies this type.
    ///
    /// A reference to the stamp key stands for a version string.
    pub fn accepts(&self, value: &OptionValue, stamp: Option<&OptionKey>) -> bool {
        let stamp_reference =
            matches!(value, OptionValue::Reference(target) if Some(target) == stamp);
        match self {
            OptionType::Any => true,
            OptionType::String => matches!(value, OptionValue::String(_)) || stamp_reference,
            OptionType::Bool => matches!(value, OptionValue::Bool(_)),
            OptionType::Int => matches!(value, OptionValue::Int(_)),
            OptionType::Float => matches!(value, OptionValue::Float(_) | OptionValue::Int(_)),
            OptionType::Path => match value {
                OptionValue::Path(_) => true,
                OptionValue::String(s) => looks_like_path(s),
                _ => false,
            },
            OptionType::Symbol => matches!(value, OptionValue::Symbol(_)),
            OptionType::Version => match value {
                OptionValue::String(s) => is_version(s),
                _ => stamp_reference,
            },
            OptionType::List(items) => match value {
                OptionValue::List(elements) => items
                    .as_ref()
                    .map_or(true, |item| elements.iter().all(|e| item.accepts(e, stamp))),
                _ => false,
            },
            OptionType::Mapping => matches!(value, OptionValue::Mapping(_)),
        }
    }

    /// Types whose subtree is opaque to the schema
    pub fn covers_subtree(&self) -> bool {
        matches!(self, OptionType::Any | OptionType::Mapping)
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Any => f.write_str("any"),
            OptionType::String => f.write_str("string"),
            OptionType::Bool => f.write_str("bool"),
            OptionType::Int => f.write_str("int"),
            OptionType::Float => f.write_str("float"),
            OptionType::Path => f.write_str("path"),
            OptionType::Symbol => f.write_str("symbol"),
            OptionType::Version => f.write_str("version"),
            OptionType::List(None) => f.write_str("list"),
            OptionType::List(Some(item)) => write!(f, "list of {}", item),
            OptionType::Mapping => f.write_str("mapping"),
        }
    }
}

fn looks_like_path(s: &str) -> bool {
    ["/", "./", "../", "~/"].iter().any(|p| s.starts_with(p))
}

/// `24.05`, `1.2.3`: at least two dot-separated numeric components
pub fn is_version(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() >= 2
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// Constraint attached to one key pattern
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub option_type: OptionType,
    pub allowed: Option<Vec<OptionValue>>,
    pub required: bool,
    pub default: Option<OptionValue>,
    pub merge: Option<MergeStrategy>,
    pub immutable: bool,
    pub description: Option<String>,
}

impl Constraint {
    pub fn new(option_type: OptionType) -> Self {
        Self {
            option_type,
            allowed: None,
            required: false,
            default: None,
            merge: None,
            immutable: false,
            description: None,
        }
    }

    /// Whether `value` is in the allowed enumeration (lists: every element)
    pub fn allows(&self, value: &OptionValue) -> bool {
        let Some(allowed) = &self.allowed else {
            return true;
        };
        match value {
            OptionValue::List(items) => items.iter().all(|item| allowed.contains(item)),
            other => allowed.contains(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub pattern: KeyPattern,
    pub constraint: Constraint,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    entries: Vec<SchemaEntry>,
    stamp: Option<OptionKey>,
    strict: bool,
}

impl Schema {
    /// Schema with no entries: every key is unknown, nothing is required
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|e| SchemaError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let schema = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), entries = schema.entries.len(), "Loaded schema");
        Ok(schema)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SchemaError> {
        file::parse_schema(text)
    }

    pub(crate) fn from_parts(
        entries: Vec<SchemaEntry>,
        stamp: Option<OptionKey>,
        strict: bool,
    ) -> Self {
        Self {
            entries,
            stamp,
            strict,
        }
    }

    /// Override the file's `strict` flag
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Key holding the compatibility stamp
    pub fn stamp_key(&self) -> Option<&OptionKey> {
        self.stamp.as_ref()
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    /// Most specific entry whose pattern matches `key`
    pub fn lookup(&self, key: &OptionKey) -> Option<&SchemaEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.pattern.matches(key))
            .min_by(|a, b| a.pattern.specificity().cmp(&b.pattern.specificity()))
    }

    /// Entry of type `mapping` or `any` declared on a strict prefix of `key`
    pub fn covering(&self, key: &OptionKey) -> Option<&SchemaEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                entry.constraint.option_type.covers_subtree()
                    && entry.pattern.matches_strict_prefix_of(key)
            })
            .min_by_key(|entry| entry.pattern.len())
    }

    /// Entries marked `required`; their patterns are literal keys
    pub fn required_keys(&self) -> impl Iterator<Item = (OptionKey, &SchemaEntry)> {
        self.entries
            .iter()
            .filter(|entry| entry.constraint.required)
            .filter_map(|entry| entry.pattern.as_key().map(|key| (key, entry)))
    }

    /// Declared defaults, keyed by their literal key
    pub fn defaults(&self) -> impl Iterator<Item = (OptionKey, &OptionValue)> {
        self.entries.iter().filter_map(|entry| {
            let default = entry.constraint.default.as_ref()?;
            Some((entry.pattern.as_key()?, default))
        })
    }
}

impl MergePolicy for Schema {
    fn strategy_for(&self, key: &OptionKey, class: MergeClass) -> MergeStrategy {
        let constraint = self.lookup(key).map(|entry| &entry.constraint);
        match constraint {
            Some(c) if c.immutable => MergeStrategy::Immutable,
            Some(Constraint {
                merge: Some(strategy),
                ..
            }) => match (strategy, class) {
                (MergeStrategy::Append | MergeStrategy::Set, MergeClass::Scalar) => {
                    MergeStrategy::Override
                }
                (strategy, _) => *strategy,
            },
            _ => crate::merge::DefaultPolicy.strategy_for(key, class),
        }
    }
}
