//! TOML schema file format and load-time checks.

use super::{Constraint, KeyPattern, OptionType, Schema, SchemaEntry};
use crate::error::SchemaError;
use crate::key::OptionKey;
use crate::merge::MergeStrategy;
use crate::value::OptionValue;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    stamp: Option<String>,
    #[serde(default)]
    strict: bool,
    #[serde(default)]
    options: BTreeMap<String, OptionFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OptionFile {
    #[serde(rename = "type", default = "default_type")]
    type_name: String,
    items: Option<String>,
    #[serde(rename = "enum")]
    allowed: Option<Vec<toml::Value>>,
    #[serde(default)]
    required: bool,
    default: Option<toml::Value>,
    merge: Option<MergeStrategy>,
    #[serde(default)]
    immutable: bool,
    description: Option<String>,
}

fn default_type() -> String {
    "any".to_string()
}

pub(super) fn parse_schema(text: &str) -> Result<Schema, SchemaError> {
    let file: SchemaFile = toml::from_str(text).map_err(|e| SchemaError::Syntax(e.to_string()))?;

    let stamp = file
        .stamp
        .as_deref()
        .map(|s| {
            let key = OptionKey::parse(s).map_err(|reason| SchemaError::InvalidPattern {
                pattern: s.to_string(),
                reason,
            })?;
            if key.segments().iter().any(|seg| seg == "*") {
                return Err(SchemaError::InvalidPattern {
                    pattern: s.to_string(),
                    reason: "the stamp key cannot contain wildcards".to_string(),
                });
            }
            Ok(key)
        })
        .transpose()?;

    let mut entries = Vec::with_capacity(file.options.len());
    for (pattern_text, option) in file.options {
        entries.push(build_entry(&pattern_text, option)?);
    }

    Ok(Schema::from_parts(entries, stamp, file.strict))
}

fn build_entry(pattern_text: &str, option: OptionFile) -> Result<SchemaEntry, SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidEntry {
        pattern: pattern_text.to_string(),
        reason,
    };

    let pattern = KeyPattern::parse(pattern_text).map_err(|reason| SchemaError::InvalidPattern {
        pattern: pattern_text.to_string(),
        reason,
    })?;

    if option.items.is_some() && option.type_name != "list" {
        return Err(invalid(format!(
            "'items' is only valid for lists, not '{}'",
            option.type_name
        )));
    }
    let option_type = OptionType::from_name(&option.type_name, option.items.as_deref())
        .map_err(|type_name| SchemaError::UnknownType {
            pattern: pattern_text.to_string(),
            type_name,
        })?;

    let has_wildcard = pattern.wildcard_count() > 0;
    if option.required && has_wildcard {
        return Err(invalid("required entries must name a literal key".to_string()));
    }
    if option.default.is_some() && has_wildcard {
        return Err(invalid("entries with a default must name a literal key".to_string()));
    }
    if option.required && option.default.is_some() {
        return Err(invalid(
            "an entry cannot be both required and defaulted".to_string(),
        ));
    }

    let allowed = option
        .allowed
        .map(|values| values.iter().map(OptionValue::from_toml).collect::<Vec<_>>());
    let default = option.default.as_ref().map(OptionValue::from_toml);

    let mut constraint = Constraint::new(option_type);
    constraint.allowed = allowed;
    constraint.required = option.required;
    constraint.merge = option.merge;
    constraint.immutable = option.immutable || option.merge == Some(MergeStrategy::Immutable);
    constraint.description = option.description;

    if let Some(default) = &default {
        if !constraint.option_type.accepts(default, None) {
            return Err(invalid(format!(
                "default {} is not a valid {}",
                default, constraint.option_type
            )));
        }
        if !constraint.allows(default) {
            return Err(invalid(format!(
                "default {} is outside the allowed values",
                default
            )));
        }
    }
    constraint.default = default;

    Ok(SchemaEntry { pattern, constraint })
}
