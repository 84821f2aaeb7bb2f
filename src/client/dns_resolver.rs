//! DNS resolvers (`/mgmt/tm/net/dns-resolver`).

use serde::{Deserialize, Serialize};

use super::{uri, uri_name, BigIpClient, BigIpError, URI_MGMT, URI_TM};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsResolverNameserver {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsResolverForwardZone {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<DnsResolverNameserver>,
}

/// A DNS resolver. Flags such as `useIpv4` are `"yes"`/`"no"` strings on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DnsResolver {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_default_zones: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub randomize_query_name_case: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_domain: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub resolver_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_ipv4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_ipv6: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_tcp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_udp: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forward_zones: Vec<DnsResolverForwardZone>,
}

fn resolver_path(name: &str) -> String {
    uri(&[URI_MGMT, URI_TM, "net", "dns-resolver", &uri_name(name)])
}

impl BigIpClient {
    pub async fn create_dns_resolver(&self, resolver: &DnsResolver) -> Result<(), BigIpError> {
        self.post(&resolver_path(""), resolver).await.map(|_| ())
    }

    /// Fetch a resolver by full path. `None` when it does not exist.
    pub async fn get_dns_resolver(&self, name: &str) -> Result<Option<DnsResolver>, BigIpError> {
        self.get_entity(&resolver_path(name)).await
    }

    pub async fn modify_dns_resolver(
        &self,
        name: &str,
        resolver: &DnsResolver,
    ) -> Result<(), BigIpError> {
        self.patch(&resolver_path(name), resolver).await
    }

    pub async fn delete_dns_resolver(&self, name: &str) -> Result<(), BigIpError> {
        self.delete(&resolver_path(name)).await
    }
}
