//! Schema model for the provider block, the BIG-IP resources and the
//! webtop data source.
//!
//! A [`Schema`] is the single description of an object's attributes. The
//! same value drives config validation ([`crate::validation`]), planning
//! ([`crate::plan`]) and the `GetSchema` response.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value kinds used by BIG-IP attributes.
///
/// iControl REST encodes most flags as `"true"`/`"yes"` strings; the
/// resources expose them as [`AttributeType::Bool`] and convert at the
/// client boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int64,
    Bool,
    /// Ordered list of strings, e.g. `nameservers` or a workspace's `rules`.
    StringList,
}

impl AttributeType {
    /// Type expression sent over the wire in `GetSchema`.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Bool => "bool",
            Self::StringList => "list(string)",
        }
    }
}

/// Who supplies an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Must be set in configuration.
    Required,
    /// May be set in configuration; absent means absent.
    Optional,
    /// Read back from the device, never configured.
    Computed,
    /// May be configured; when it is not, the device's value is kept.
    OptionalComputed,
}

impl Presence {
    pub fn is_required(self) -> bool {
        self == Self::Required
    }

    pub fn is_optional(self) -> bool {
        matches!(self, Self::Optional | Self::OptionalComputed)
    }

    pub fn is_computed(self) -> bool {
        matches!(self, Self::Computed | Self::OptionalComputed)
    }

    /// Only set by the provider.
    pub fn is_read_only(self) -> bool {
        self == Self::Computed
    }
}

/// One attribute of a resource, data source or nested block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    pub presence: Presence,
    /// Redacted from logs and plan output.
    #[serde(default)]
    pub sensitive: bool,
    /// A change to this attribute replaces the object.
    #[serde(default)]
    pub force_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Value planned when configuration leaves the attribute unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Attribute {
    pub fn new(attr_type: AttributeType, presence: Presence) -> Self {
        Self {
            attr_type,
            presence,
            sensitive: false,
            force_new: false,
            description: None,
            default: None,
        }
    }

    pub fn required_string() -> Self {
        Self::new(AttributeType::String, Presence::Required)
    }

    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, Presence::Optional)
    }

    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, Presence::Computed)
    }

    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, Presence::OptionalComputed)
    }

    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, Presence::Optional)
    }

    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, Presence::Computed)
    }

    pub fn optional_computed_int64() -> Self {
        Self::new(AttributeType::Int64, Presence::OptionalComputed)
    }

    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, Presence::Optional)
    }

    pub fn computed_bool() -> Self {
        Self::new(AttributeType::Bool, Presence::Computed)
    }

    pub fn optional_string_list() -> Self {
        Self::new(AttributeType::StringList, Presence::Optional)
    }

    /// Names of child objects reported by the device.
    pub fn computed_string_list() -> Self {
        Self::new(AttributeType::StringList, Presence::Computed)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// A group of attributes, possibly with nested list blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A repeated nested block, such as a resolver's `forward_zones`.
///
/// Every nested block in this provider is an unbounded ordered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    #[serde(flatten)]
    pub block: Block,
    /// Left out of configuration, the prior (device) value is kept.
    #[serde(default)]
    pub computed: bool,
}

impl NestedBlock {
    pub fn list(block: Block) -> Self {
        Self {
            block,
            computed: false,
        }
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }
}

/// Versioned root block of a resource, data source or the provider itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    #[serde(default)]
    pub version: u64,
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    pub fn v0() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }
}

/// Everything the provider exposes, keyed by type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    #[serde(default)]
    pub provider: Schema,
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A problem found in configuration or reported by BIG-IP, optionally tied
/// to an attribute path such as `forward_zones[0].name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}
