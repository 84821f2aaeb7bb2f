//! Plan and import results exchanged with the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handshake protocol version printed on startup.
pub const PROTOCOL_VERSION: u32 = 1;

/// First field of the handshake line.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

/// One attribute that differs between prior state and the planned state.
///
/// `before` is `None` for an attribute being set for the first time and
/// `after` is `None` for one being cleared or destroyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AttributeChange {
    pub fn between(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        let bytes =
            |v: Option<Value>| v.and_then(|v| serde_json::to_vec(&v).ok()).unwrap_or_default();
        Self {
            path: change.path,
            before: bytes(change.before),
            after: bytes(change.after),
        }
    }
}

/// Outcome of planning one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// `null` when the plan destroys the resource.
    pub planned_state: Value,
    pub changes: Vec<AttributeChange>,
    /// A `force_new` attribute changed; BIG-IP cannot rename in place.
    pub requires_replace: bool,
}

impl PlanResult {
    pub fn new(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }
}

/// State produced by importing an existing BIG-IP object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    pub resource_type: String,
    pub state: Value,
}

impl ImportedResource {
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Answer to `GetMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    pub resources: Vec<String>,
    pub data_sources: Vec<String>,
    pub capabilities: ServerCapabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// The host may call `Plan` with a null proposed state.
    pub plan_destroy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn change_encodes_missing_side_as_empty_bytes() {
        let proto: crate::generated::AttributeChange =
            AttributeChange::between("use_tcp", None, Some(json!(true))).into();
        assert_eq!(proto.path, "use_tcp");
        assert!(proto.before.is_empty());
        assert_eq!(proto.after, b"true".to_vec());

        let proto: crate::generated::AttributeChange =
            AttributeChange::between("cache_size", Some(json!(1024)), Some(json!(2048))).into();
        assert_eq!(proto.before, b"1024".to_vec());
        assert_eq!(proto.after, b"2048".to_vec());
    }
}
