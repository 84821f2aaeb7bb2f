//! APM webtops (`/mgmt/tm/apm/resource/webtop`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{uri, uri_name, BigIpClient, BigIpError, URI_MGMT, URI_TM};

const URI_APM: &str = "apm";
const URI_RESOURCE: &str = "resource";
const URI_WEBTOP: &str = "webtop";

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant,)+
        }

        impl $name {
            /// Every accepted wire value.
            pub const ALL: &'static [&'static str] = &[$($wire),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(format!(
                        "expected one of [{}], got {:?}",
                        Self::ALL.join(", "),
                        other
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Kind of webtop presented to users.
    WebtopType {
        Portal => "portal-access",
        Full => "full",
        Network => "network-access",
    }
);

wire_enum!(
    CustomizationType {
        Modern => "Modern",
        Standard => "Standard",
    }
);

wire_enum!(
    /// Initial state of the webtop sections.
    InitialState {
        Collapsed => "Collapsed",
        Expanded => "Expanded",
    }
);

wire_enum!(
    LinkType {
        Uri => "uri",
    }
);

/// Booleans that iControl REST encodes as `"true"` / `"false"` strings.
///
/// Deserialization also accepts plain JSON booleans.
mod booled_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Str(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => b,
            Raw::Str(s) => s == "true",
        })
    }
}

/// Updatable part of a webtop, sent as the PATCH body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebtopConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub customization_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<InitialState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization_type: Option<CustomizationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<LinkType>,
    #[serde(rename = "webtopType", default, skip_serializing_if = "Option::is_none")]
    pub webtop_type: Option<WebtopType>,
    #[serde(with = "booled_string", default)]
    pub show_search: bool,
    #[serde(with = "booled_string", default)]
    pub warning_on_close: bool,
    #[serde(with = "booled_string", default)]
    pub url_entry_field: bool,
    #[serde(with = "booled_string", default)]
    pub resource_search: bool,
    #[serde(with = "booled_string", default)]
    pub minimize_to_tray: bool,
    #[serde(with = "booled_string", default)]
    pub location_specific: bool,
}

/// A webtop as created with POST.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webtop {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tm_partition: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub partition: String,
    pub name: String,
    #[serde(flatten)]
    pub config: WebtopConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub link: String,
}

/// A webtop as returned by GET.
///
/// Enumerated fields stay strings here so that values added by newer BIG-IP
/// releases do not fail the read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebtopRead {
    pub name: String,
    pub partition: String,
    pub tm_partition: String,
    pub full_path: String,
    pub self_link: String,
    pub generation: i64,
    pub description: String,
    pub customization_group: String,
    pub customization_group_reference: Reference,
    pub initial_state: String,
    pub customization_type: String,
    pub link_type: String,
    pub webtop_type: String,
    #[serde(with = "booled_string")]
    pub show_search: bool,
    #[serde(with = "booled_string")]
    pub warning_on_close: bool,
    #[serde(with = "booled_string")]
    pub url_entry_field: bool,
    #[serde(with = "booled_string")]
    pub resource_search: bool,
    #[serde(with = "booled_string")]
    pub minimize_to_tray: bool,
    #[serde(with = "booled_string")]
    pub location_specific: bool,
}

fn webtop_path(name: &str) -> String {
    uri(&[URI_MGMT, URI_TM, URI_APM, URI_RESOURCE, URI_WEBTOP, &uri_name(name)])
}

impl BigIpClient {
    pub async fn create_webtop(&self, webtop: &Webtop) -> Result<(), BigIpError> {
        self.post(&webtop_path(""), webtop).await.map(|_| ())
    }

    /// Fetch a webtop by name or full path. `None` when BIG-IP has no such webtop.
    pub async fn get_webtop(&self, name: &str) -> Result<Option<WebtopRead>, BigIpError> {
        self.get_entity(&webtop_path(name)).await
    }

    pub async fn modify_webtop(&self, name: &str, config: &WebtopConfig) -> Result<(), BigIpError> {
        self.patch(&webtop_path(name), config).await
    }

    pub async fn delete_webtop(&self, name: &str) -> Result<(), BigIpError> {
        self.delete(&webtop_path(name)).await
    }
}
