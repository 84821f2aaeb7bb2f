//! Configuration checks.
//!
//! [`validate`] walks a configuration value against a [`Schema`] and reports
//! every problem it finds, not just the first. Diagnostics carry the path of
//! the offending value, e.g. `forward_zones[1].nameservers[0]`.
//!
//! The `check_*` helpers cover rules a schema cannot express and are called
//! from the resources' own `validate` hooks.
//!
//! ```
//! use bigip_provider::schema::{Schema, Attribute};
//! use bigip_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("cache_size", Attribute::optional_int64());
//!
//! assert!(validate(&schema, &json!({"name": "/Common/r1", "cache_size": 1024})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "/Common/r1", "cache_size": "big"}));
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("cache_size"));
//! ```

use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use regex::Regex;
use serde_json::{Map, Value};

/// Validate `value` against `schema`. An empty result means valid.
///
/// Provider-computed attributes are not checked: whatever the configuration
/// holds for them is replaced on refresh.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut checker = Checker::default();
    match value {
        Value::Object(map) => checker.block(&schema.block, map, ""),
        Value::Null => {},
        other => checker.diagnostics.push(
            Diagnostic::error("Expected object").with_detail(format!("Got {}", kind_of(other))),
        ),
    }
    checker.diagnostics
}

/// Check that the string at `attribute` is one of `allowed`.
///
/// Absent, null and empty values pass; the schema decides whether they are allowed.
pub fn check_one_of(config: &Value, attribute: &str, allowed: &[&str]) -> Option<Diagnostic> {
    let value = config.get(attribute)?.as_str()?;
    if value.is_empty() || allowed.contains(&value) {
        return None;
    }
    Some(
        Diagnostic::error(format!("Invalid value for attribute '{}'", attribute))
            .with_detail(format!(
                "expected {} to be one of [{}], got {}",
                attribute,
                allowed.join(", "),
                value
            ))
            .with_attribute(attribute),
    )
}

/// Check that the string at `attribute` matches `pattern`.
pub fn check_pattern(
    config: &Value,
    attribute: &str,
    pattern: &Regex,
    expectation: &str,
) -> Option<Diagnostic> {
    let value = config.get(attribute)?.as_str()?;
    if pattern.is_match(value) {
        return None;
    }
    Some(
        Diagnostic::error(format!("Invalid value for attribute '{}'", attribute))
            .with_detail(format!("{:?} {}", value, expectation))
            .with_attribute(attribute),
    )
}

#[derive(Default)]
struct Checker {
    diagnostics: Vec<Diagnostic>,
}

impl Checker {
    fn block(&mut self, block: &Block, obj: &Map<String, Value>, prefix: &str) {
        for (name, attr) in &block.attributes {
            let path = field_path(prefix, name);
            self.attribute(attr, obj.get(name), &path);
        }
        for (name, nested) in &block.blocks {
            let path = field_path(prefix, name);
            self.nested(nested, obj.get(name), &path);
        }
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &str) {
        if attr.presence.is_read_only() {
            return;
        }
        match value {
            None | Some(Value::Null) if attr.presence.is_required() => self.fail(
                path,
                format!("Missing required attribute '{}'", path),
                "This attribute is required and must be provided".to_string(),
            ),
            None | Some(Value::Null) => {},
            Some(v) => self.value(attr.attr_type, v, path),
        }
    }

    fn value(&mut self, attr_type: AttributeType, value: &Value, path: &str) {
        let ok = match attr_type {
            AttributeType::String => value.is_string(),
            AttributeType::Int64 => is_whole_number(value),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::StringList => match value.as_array() {
                Some(items) => {
                    for (i, item) in items.iter().enumerate() {
                        self.value(AttributeType::String, item, &format!("{}[{}]", path, i));
                    }
                    true
                },
                None => false,
            },
        };
        if !ok {
            self.fail(
                path,
                format!("Invalid type for attribute '{}'", path),
                format!("Expected {}, got {}", attr_type.wire_name(), kind_of(value)),
            );
        }
    }

    fn nested(&mut self, nested: &NestedBlock, value: Option<&Value>, path: &str) {
        let items = match value {
            None | Some(Value::Null) => &[][..],
            Some(Value::Array(items)) => items.as_slice(),
            Some(other) => {
                return self.fail(
                    path,
                    format!("Expected list for block '{}'", path),
                    format!("Got {}", kind_of(other)),
                );
            },
        };

        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, i);
            match item {
                Value::Object(map) => self.block(&nested.block, map, &item_path),
                other => self.fail(
                    &item_path,
                    "Expected object".to_string(),
                    format!("Got {}", kind_of(other)),
                ),
            }
        }
    }

    fn fail(&mut self, path: &str, summary: String, detail: String) {
        self.diagnostics.push(
            Diagnostic::error(summary)
                .with_detail(detail)
                .with_attribute(path),
        );
    }
}

fn field_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_whole_number(value: &Value) -> bool {
    as_whole_number(value).is_some()
}

/// Read an int64 attribute. JSON numbers from HCL arrive as floats, so
/// `1024.0` is still a valid size.
pub fn as_whole_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Rewrite whole floats anywhere in `value` as integers.
pub fn integral_numbers(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, integral_numbers(v))).collect())
        },
        Value::Array(items) => Value::Array(items.into_iter().map(integral_numbers).collect()),
        Value::Number(n) => {
            let number = Value::Number(n);
            as_whole_number(&number).map(Value::from).unwrap_or(number)
        },
        other => other,
    }
}
