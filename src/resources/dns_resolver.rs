//! `bigip_net_dns_resolver` resource.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{from_state, non_empty, to_state, Resource};
use crate::client::{BigIpClient, DnsResolver, DnsResolverForwardZone, DnsResolverNameserver};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::validation::check_pattern;

/// `/Partition/Name` or `/Partition/Directory/Name`; `:` is allowed in the last segment.
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/[A-Za-z0-9_.\-]+(/[A-Za-z0-9_.\-]+)?/[A-Za-z0-9_.:\-]+$")
        .expect("Invalid regex pattern")
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct ResolverState {
    id: Option<String>,
    name: String,
    description: Option<String>,
    answer_default_zones: Option<String>,
    cache_size: Option<i64>,
    randomize_query_name_case: Option<String>,
    route_domain: Option<String>,
    #[serde(rename = "type")]
    resolver_type: Option<String>,
    use_ipv4: Option<String>,
    use_ipv6: Option<String>,
    use_tcp: Option<String>,
    use_udp: Option<String>,
    forward_zones: Option<Vec<Value>>,
}

impl ResolverState {
    fn lookup_name(&self) -> &str {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => &self.name,
        }
    }

    fn request(&self, name: &str) -> DnsResolver {
        DnsResolver {
            name: name.to_string(),
            description: non_empty(&self.description),
            answer_default_zones: non_empty(&self.answer_default_zones),
            cache_size: self.cache_size.filter(|n| *n != 0),
            randomize_query_name_case: non_empty(&self.randomize_query_name_case),
            route_domain: non_empty(&self.route_domain),
            resolver_type: non_empty(&self.resolver_type),
            use_ipv4: non_empty(&self.use_ipv4),
            use_ipv6: non_empty(&self.use_ipv6),
            use_tcp: non_empty(&self.use_tcp),
            use_udp: non_empty(&self.use_udp),
            forward_zones: expand_forward_zones(self.forward_zones.as_deref().unwrap_or_default()),
            ..Default::default()
        }
    }

    fn apply(&mut self, lookup: &str, resolver: DnsResolver) {
        self.id = Some(lookup.to_string());
        self.name = non_empty(&resolver.full_path).unwrap_or_else(|| lookup.to_string());
        self.description = resolver.description;
        self.answer_default_zones = resolver.answer_default_zones;
        self.cache_size = resolver.cache_size;
        self.randomize_query_name_case = resolver.randomize_query_name_case;
        self.route_domain = resolver.route_domain;
        self.resolver_type = resolver.resolver_type;
        self.use_ipv4 = resolver.use_ipv4;
        self.use_ipv6 = resolver.use_ipv6;
        self.use_tcp = resolver.use_tcp;
        self.use_udp = resolver.use_udp;
        self.forward_zones = Some(flatten_forward_zones(&resolver.forward_zones));
    }
}

/// Convert configured `forward_zones` entries to the wire representation.
///
/// Items that are not objects are skipped; an empty input gives no zones,
/// which leaves `forwardZones` out of the request.
pub fn expand_forward_zones(raw: &[Value]) -> Vec<DnsResolverForwardZone> {
    raw.iter()
        .filter_map(Value::as_object)
        .map(|zone| DnsResolverForwardZone {
            name: zone
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            nameservers: zone
                .get("nameservers")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(|ns| DnsResolverNameserver {
                            name: ns.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

/// Convert wire zones back to state; nameservers with an empty name are dropped.
pub fn flatten_forward_zones(zones: &[DnsResolverForwardZone]) -> Vec<Value> {
    zones
        .iter()
        .map(|zone| {
            let nameservers: Vec<&str> = zone
                .nameservers
                .iter()
                .map(|ns| ns.name.as_str())
                .filter(|ns| !ns.is_empty())
                .collect();
            json!({"name": zone.name, "nameservers": nameservers})
        })
        .collect()
}

fn optional_computed(description: &str) -> Attribute {
    Attribute::optional_computed_string().with_description(description)
}

pub struct DnsResolverResource;

impl DnsResolverResource {
    async fn refresh(
        &self,
        client: &BigIpClient,
        mut state: ResolverState,
    ) -> Result<Option<ResolverState>, ProviderError> {
        let lookup = state.lookup_name().to_string();
        let resolver = client.get_dns_resolver(&lookup).await.map_err(|e| {
            ProviderError::client(format!("error retrieving DNS resolver {}", lookup), e)
        })?;
        Ok(resolver.map(|resolver| {
            state.apply(&lookup, resolver);
            state
        }))
    }
}

#[async_trait]
impl Resource for DnsResolverResource {
    fn type_name(&self) -> &'static str {
        "bigip_net_dns_resolver"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Network DNS resolver")
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Name of the DNS resolver (e.g. /Common/resolver1)"),
            )
            .with_attribute("description", optional_computed("User defined description"))
            .with_attribute(
                "answer_default_zones",
                optional_computed("Whether the resolver answers default zones."),
            )
            .with_attribute(
                "cache_size",
                Attribute::optional_computed_int64()
                    .with_description("Cache size for the resolver."),
            )
            .with_attribute(
                "randomize_query_name_case",
                optional_computed("Whether the resolver randomizes query name case."),
            )
            .with_attribute("route_domain", optional_computed("Route domain for the resolver."))
            .with_attribute("type", optional_computed("Resolver type."))
            .with_attribute("use_ipv4", optional_computed("Whether the resolver uses IPv4."))
            .with_attribute("use_ipv6", optional_computed("Whether the resolver uses IPv6."))
            .with_attribute("use_tcp", optional_computed("Whether the resolver uses TCP."))
            .with_attribute("use_udp", optional_computed("Whether the resolver uses UDP."))
            .with_block(
                "forward_zones",
                NestedBlock::list(
                    Block::new()
                        .with_description("Forward zones with their nameservers.")
                        .with_attribute(
                            "name",
                            Attribute::required_string().with_description("Forward zone name."),
                        )
                        .with_attribute(
                            "nameservers",
                            Attribute::optional_string_list()
                                .with_description("Nameservers for the zone (IP[:port])."),
                        ),
                )
                .computed(),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        check_pattern(
            config,
            "name",
            &NAME_PATTERN,
            "must be of the form /Partition/Name or /Partition/Directory/Name",
        )
        .into_iter()
        .collect()
    }

    async fn create(&self, client: &BigIpClient, planned: Value) -> Result<Value, ProviderError> {
        let mut state: ResolverState = from_state(planned)?;
        let name = state.name.clone();

        info!(name = %name, "Creating DNS resolver");
        client
            .create_dns_resolver(&state.request(&name))
            .await
            .map_err(|e| {
                ProviderError::client(format!("error creating DNS resolver {}", name), e)
            })?;

        state.id = Some(name.clone());
        let state = self.refresh(client, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("DNS resolver {} not found after create", name))
        })?;
        to_state(&state)
    }

    async fn read(
        &self,
        client: &BigIpClient,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let state: ResolverState = from_state(current)?;
        let name = state.lookup_name().to_string();
        debug!(name = %name, "Reading DNS resolver");

        match self.refresh(client, state).await {
            Ok(Some(state)) => Ok(Some(to_state(&state)?)),
            Ok(None) | Err(ProviderError::NotFound(_)) => {
                warn!(name = %name, "DNS resolver not found, removing from state");
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    async fn update(
        &self,
        client: &BigIpClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: ResolverState = from_state(prior)?;
        let mut state: ResolverState = from_state(planned)?;
        let name = prior.lookup_name().to_string();

        info!(name = %name, "Updating DNS resolver");
        client
            .modify_dns_resolver(&name, &state.request(&name))
            .await
            .map_err(|e| {
                ProviderError::client(format!("error modifying DNS resolver {}", name), e)
            })?;

        state.id = Some(name.clone());
        let state = self.refresh(client, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("DNS resolver {} not found after update", name))
        })?;
        to_state(&state)
    }

    async fn delete(&self, client: &BigIpClient, current: Value) -> Result<(), ProviderError> {
        let state: ResolverState = from_state(current)?;
        let name = state.lookup_name();

        info!(name = %name, "Deleting DNS resolver");
        match client.delete_dns_resolver(name).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!(name = %name, "DNS resolver already gone");
                Ok(())
            },
            Err(e) => Err(ProviderError::client(
                format!("error deleting DNS resolver {}", name),
                e,
            )),
        }
    }

    async fn import(&self, client: &BigIpClient, id: &str) -> Result<Value, ProviderError> {
        let state = ResolverState {
            id: Some(id.to_string()),
            name: id.to_string(),
            ..Default::default()
        };
        let state = self
            .refresh(client, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("DNS resolver {} not found", id)))?;
        to_state(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{client, mount_not_found};
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESOLVER_PATH: &str = "/mgmt/tm/net/dns-resolver/~Common~r1";

    fn device_resolver() -> Value {
        json!({
            "name": "r1",
            "partition": "Common",
            "fullPath": "/Common/r1",
            "answerDefaultZones": "no",
            "cacheSize": 5767168,
            "randomizeQueryNameCase": "yes",
            "routeDomain": "/Common/0",
            "type": "cache",
            "useIpv4": "yes",
            "useIpv6": "yes",
            "useTcp": "yes",
            "useUdp": "yes",
            "forwardZones": [
                {"name": "example.com", "nameservers": [{"name": "10.0.0.53:53"}, {"name": ""}]}
            ]
        })
    }

    #[test]
    fn test_name_validation() {
        for ok in ["/Common/r1", "/Common/dir/r1", "/Common/r1:53", "/my-part/r_1.a"] {
            assert!(
                DnsResolverResource.validate(&json!({"name": ok})).is_empty(),
                "{ok} should be valid"
            );
        }
        for bad in ["r1", "/Common", "/Common/a/b/c", "/Common/r 1", "/Com:mon/r1"] {
            assert_eq!(
                DnsResolverResource.validate(&json!({"name": bad})).len(),
                1,
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_expand_forward_zones() {
        assert!(expand_forward_zones(&[]).is_empty());

        let zones = expand_forward_zones(&[
            json!("not a zone"),
            json!({"name": "example.com", "nameservers": ["10.0.0.1", "10.0.0.2:5353"]}),
            json!({"name": "corp.local"}),
        ]);
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].name, "example.com");
        assert_eq!(zones[0].nameservers[1].name, "10.0.0.2:5353");
        assert!(zones[1].nameservers.is_empty());
    }

    #[test]
    fn test_flatten_forward_zones() {
        assert_eq!(flatten_forward_zones(&[]), Vec::<Value>::new());

        let zones = vec![DnsResolverForwardZone {
            name: "example.com".to_string(),
            nameservers: vec![
                DnsResolverNameserver {
                    name: String::new(),
                },
                DnsResolverNameserver {
                    name: "10.0.0.1".to_string(),
                },
            ],
        }];
        assert_eq!(
            flatten_forward_zones(&zones),
            vec![json!({"name": "example.com", "nameservers": ["10.0.0.1"]})]
        );
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let state: ResolverState = from_state(json!({
            "name": "/Common/r1",
            "description": "",
            "use_tcp": "no",
            "forward_zones": []
        }))
        .unwrap();
        assert_eq!(
            serde_json::to_value(state.request("/Common/r1")).unwrap(),
            json!({"name": "/Common/r1", "useTcp": "no"})
        );
    }

    #[tokio::test]
    async fn test_create_then_read_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mgmt/tm/net/dns-resolver"))
            .and(body_json(json!({
                "name": "/Common/r1",
                "routeDomain": "/Common/0",
                "forwardZones": [{"name": "example.com", "nameservers": [{"name": "10.0.0.53:53"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RESOLVER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(device_resolver()))
            .mount(&server)
            .await;

        let state = DnsResolverResource
            .create(
                &client(&server.uri()),
                json!({
                    "name": "/Common/r1",
                    "route_domain": "/Common/0",
                    "forward_zones": [{"name": "example.com", "nameservers": ["10.0.0.53:53"]}]
                }),
            )
            .await
            .unwrap();

        assert_eq!(state["id"], "/Common/r1");
        assert_eq!(state["name"], "/Common/r1");
        assert_eq!(state["cache_size"], 5767168);
        assert_eq!(state["type"], "cache");
        assert_eq!(
            state["forward_zones"],
            json!([{"name": "example.com", "nameservers": ["10.0.0.53:53"]}])
        );
    }

    #[tokio::test]
    async fn test_create_accepts_float_cache_size() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mgmt/tm/net/dns-resolver"))
            .and(body_json(json!({"name": "/Common/r1", "cacheSize": 1048576})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RESOLVER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(device_resolver()))
            .mount(&server)
            .await;

        let config = json!({"name": "/Common/r1", "cache_size": 1048576.0});
        assert!(crate::validation::validate(&DnsResolverResource.schema(), &config).is_empty());

        let plan = crate::plan::plan_resource(&DnsResolverResource.schema(), None, config);
        let state = DnsResolverResource
            .create(&client(&server.uri()), plan.planned_state)
            .await
            .unwrap();
        assert_eq!(state["id"], "/Common/r1");
    }

    #[tokio::test]
    async fn test_read_missing_resolver_drops_state() {
        let server = MockServer::start().await;
        mount_not_found(&server, RESOLVER_PATH).await;

        let state = DnsResolverResource
            .read(&client(&server.uri()), json!({"id": "/Common/r1", "name": "/Common/r1"}))
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_update_patches_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(RESOLVER_PATH))
            .and(body_json(json!({"name": "/Common/r1", "cacheSize": 1048576})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RESOLVER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(device_resolver()))
            .mount(&server)
            .await;

        let prior = json!({"id": "/Common/r1", "name": "/Common/r1", "cache_size": 5767168});
        let planned = json!({"id": "/Common/r1", "name": "/Common/r1", "cache_size": 1048576});
        let state = DnsResolverResource
            .update(&client(&server.uri()), prior, planned)
            .await
            .unwrap();
        assert_eq!(state["id"], "/Common/r1");
    }

    #[tokio::test]
    async fn test_delete_tolerates_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(RESOLVER_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 404,
                "message": "01020036:3: The requested DNS Resolver (/Common/r1) was not found."
            })))
            .expect(1)
            .mount(&server)
            .await;

        DnsResolverResource
            .delete(&client(&server.uri()), json!({"id": "/Common/r1", "name": "/Common/r1"}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_import_by_full_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(RESOLVER_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(device_resolver()))
            .mount(&server)
            .await;

        let state = DnsResolverResource
            .import(&client(&server.uri()), "/Common/r1")
            .await
            .unwrap();
        assert_eq!(state["id"], "/Common/r1");
        assert_eq!(state["use_udp"], "yes");
    }
}
