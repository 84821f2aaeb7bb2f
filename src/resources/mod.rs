//! BIG-IP resources and data sources.
//!
//! Each type is a schema plus handlers that translate between the host's
//! attribute map and the REST client's structs.

mod apm_webtop;
mod dns_resolver;
mod ilx_workspace;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::BigIpClient;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};
use crate::validation::integral_numbers;

pub use apm_webtop::{ApmWebtopDataSource, ApmWebtopResource};
pub use dns_resolver::{expand_forward_zones, flatten_forward_zones, DnsResolverResource};
pub use ilx_workspace::IlxWorkspaceResource;

/// A managed BIG-IP object type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name as used in configuration, e.g. `bigip_apm_webtop`.
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Checks beyond what the schema expresses (enumerations, name patterns).
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    async fn create(&self, client: &BigIpClient, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state from the device. `Ok(None)` means the object is gone.
    async fn read(&self, client: &BigIpClient, current: Value)
        -> Result<Option<Value>, ProviderError>;

    async fn update(
        &self,
        client: &BigIpClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    async fn delete(&self, client: &BigIpClient, current: Value) -> Result<(), ProviderError>;

    /// Build state for an existing object from its identifier.
    async fn import(&self, client: &BigIpClient, id: &str) -> Result<Value, ProviderError> {
        let _ = (client, id);
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {}",
            self.type_name()
        )))
    }
}

/// A read-only lookup of a BIG-IP object.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, client: &BigIpClient, config: Value) -> Result<Value, ProviderError>;
}

/// Every resource this provider manages.
pub fn all_resources() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(ApmWebtopResource),
        Box::new(IlxWorkspaceResource),
        Box::new(DnsResolverResource),
    ]
}

/// Every data source this provider offers.
pub fn all_data_sources() -> Vec<Box<dyn DataSource>> {
    vec![Box::new(ApmWebtopDataSource)]
}

/// Deserialize planned or prior state.
///
/// Unknown computed values arrive as `null` and are dropped so that field
/// defaults apply; whole floats become integers.
pub(crate) fn from_state<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(drop_nulls(integral_numbers(value)))?)
}

fn drop_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, drop_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(drop_nulls).collect()),
        other => other,
    }
}

pub(crate) fn to_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Treat empty strings in configuration like unset attributes.
pub(crate) fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_type_names_are_unique() {
        let names: HashSet<_> = all_resources().iter().map(|r| r.type_name()).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains("bigip_apm_webtop"));
        assert!(names.contains("bigip_ilx_workspace"));
        assert!(names.contains("bigip_net_dns_resolver"));

        let sources: Vec<_> = all_data_sources().iter().map(|d| d.type_name()).collect();
        assert_eq!(sources, vec!["bigip_apm_webtop"]);
    }

    #[test]
    fn test_every_resource_has_computed_id() {
        for resource in all_resources() {
            let schema = resource.schema();
            let id = schema
                .block
                .attributes
                .get("id")
                .unwrap_or_else(|| panic!("{} has no id", resource.type_name()));
            assert!(id.presence.is_read_only());
        }
    }

    #[derive(Debug, Default, serde::Deserialize)]
    #[serde(default)]
    struct Sample {
        names: Vec<String>,
        size: Option<i64>,
        zones: Vec<Value>,
    }

    #[test]
    fn test_from_state_tolerates_null_and_float() {
        let sample: Sample = from_state(serde_json::json!({
            "names": null,
            "size": 1048576.0,
            "zones": [{"name": "a", "nameservers": null}]
        }))
        .unwrap();
        assert!(sample.names.is_empty());
        assert_eq!(sample.size, Some(1048576));
        assert_eq!(sample.zones[0], serde_json::json!({"name": "a"}));

        let err = from_state::<Sample>(serde_json::json!({"size": 1.5})).unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(&Some("x".to_string())), Some("x".to_string()));
        assert_eq!(non_empty(&Some(String::new())), None);
        assert_eq!(non_empty(&None), None);
    }
}
