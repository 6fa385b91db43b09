//! Option values: a recursive tagged variant over scalars, lists and mappings.
//!
//! `Display` renders values back into fragment syntax; `to_json` produces the
//! representation handed to downstream consumers.

use crate::key::{render_segment, OptionKey};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Lists whose inline rendering stays under this width are printed on one line
const INLINE_LIST_WIDTH: usize = 60;

/// A configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Path(String),
    /// Bare identifier passed through uninterpreted (e.g. a package name)
    Symbol(String),
    /// `config.<key>`: reference into the merged configuration
    Reference(OptionKey),
    List(Vec<OptionValue>),
    Mapping(BTreeMap<String, OptionValue>),
}

/// Variant tag of an [`OptionValue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    String,
    Path,
    Symbol,
    Reference,
    List,
    Mapping,
}

/// How a kind participates in merging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeClass {
    Scalar,
    List,
    Mapping,
}

impl ValueKind {
    pub fn merge_class(self) -> MergeClass {
        match self {
            ValueKind::List => MergeClass::List,
            ValueKind::Mapping => MergeClass::Mapping,
            _ => MergeClass::Scalar,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Path => "path",
            ValueKind::Symbol => "symbol",
            ValueKind::Reference => "reference",
            ValueKind::List => "list",
            ValueKind::Mapping => "mapping",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OptionValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            OptionValue::Null => ValueKind::Null,
            OptionValue::Bool(_) => ValueKind::Bool,
            OptionValue::Int(_) => ValueKind::Int,
            OptionValue::Float(_) => ValueKind::Float,
            OptionValue::String(_) => ValueKind::String,
            OptionValue::Path(_) => ValueKind::Path,
            OptionValue::Symbol(_) => ValueKind::Symbol,
            OptionValue::Reference(_) => ValueKind::Reference,
            OptionValue::List(_) => ValueKind::List,
            OptionValue::Mapping(_) => ValueKind::Mapping,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[OptionValue]> {
        match self {
            OptionValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, OptionValue>> {
        match self {
            OptionValue::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Navigate nested mappings along `key`
    pub fn lookup(&self, key: &OptionKey) -> Option<&OptionValue> {
        let mut current = self;
        for segment in key.segments() {
            current = current.as_mapping()?.get(segment)?;
        }
        Some(current)
    }

    /// Visit every reference contained in this value, including inside lists and mappings
    pub fn references(&self) -> Vec<&OptionKey> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references<'a>(&'a self, found: &mut Vec<&'a OptionKey>) {
        match self {
            OptionValue::Reference(target) => found.push(target),
            OptionValue::List(items) => items.iter().for_each(|v| v.collect_references(found)),
            OptionValue::Mapping(map) => map.values().for_each(|v| v.collect_references(found)),
            _ => {}
        }
    }

    /// JSON representation handed to consumers of resolved settings
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            OptionValue::Null => Value::Null,
            OptionValue::Bool(b) => Value::Bool(*b),
            OptionValue::Int(i) => Value::Number((*i).into()),
            OptionValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            OptionValue::String(s) | OptionValue::Path(s) | OptionValue::Symbol(s) => {
                Value::String(s.clone())
            }
            OptionValue::Reference(key) => Value::String(format!("config.{}", key)),
            OptionValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            OptionValue::Mapping(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Convert a TOML value (schema defaults and enumerations)
    pub fn from_toml(value: &toml::Value) -> Self {
        match value {
            toml::Value::String(s) => OptionValue::String(s.clone()),
            toml::Value::Integer(i) => OptionValue::Int(*i),
            toml::Value::Float(f) => OptionValue::Float(*f),
            toml::Value::Boolean(b) => OptionValue::Bool(*b),
            toml::Value::Datetime(dt) => OptionValue::String(dt.to_string()),
            toml::Value::Array(items) => {
                OptionValue::List(items.iter().map(OptionValue::from_toml).collect())
            }
            toml::Value::Table(table) => OptionValue::Mapping(
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), OptionValue::from_toml(v)))
                    .collect(),
            ),
        }
    }

    /// Render in fragment syntax at the given nesting depth
    pub(crate) fn write_with_indent(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let indent_str = "  ".repeat(indent);
        match self {
            OptionValue::Null => write!(f, "null"),
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Float(x) => write!(f, "{}", render_float(*x)),
            OptionValue::String(s) => write!(f, "\"{}\"", escape_string(s)),
            OptionValue::Path(p) | OptionValue::Symbol(p) => write!(f, "{}", p),
            OptionValue::Reference(key) => write!(f, "config.{}", key),
            OptionValue::List(items) => {
                if items.is_empty() {
                    return write!(f, "[ ]");
                }
                if let Some(inline) = inline_list(items) {
                    return write!(f, "{}", inline);
                }
                writeln!(f, "[")?;
                for item in items {
                    write!(f, "{}  ", indent_str)?;
                    item.write_with_indent(f, indent + 1)?;
                    writeln!(f)?;
                }
                write!(f, "{}]", indent_str)
            }
            OptionValue::Mapping(map) => {
                if map.is_empty() {
                    return write!(f, "{{ }}");
                }
                writeln!(f, "{{")?;
                for (key, value) in map {
                    write!(f, "{}  {} = ", indent_str, render_segment(key))?;
                    value.write_with_indent(f, indent + 1)?;
                    writeln!(f, ";")?;
                }
                write!(f, "{}}}", indent_str)
            }
        }
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_with_indent(f, 0)
    }
}

fn inline_list(items: &[OptionValue]) -> Option<String> {
    let scalars_only = items
        .iter()
        .all(|item| !matches!(item, OptionValue::List(_) | OptionValue::Mapping(_)));
    if !scalars_only {
        return None;
    }
    let rendered: Vec<String> = items.iter().map(|item| item.to_string()).collect();
    let inline = format!("[ {} ]", rendered.join(" "));
    if inline.len() <= INLINE_LIST_WIDTH && !inline.contains('\n') {
        Some(inline)
    } else {
        None
    }
}

fn render_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            other => out.push(other),
        }
    }
    out
}
