//! Hemmer provider for F5 BIG-IP.
//!
//! Manages APM webtops, iRules LX workspaces and network DNS resolvers
//! through the iControl REST API, and looks up existing webtops.
//!
//! # Overview
//!
//! - **client**: [`client::BigIpClient`], a thin REST client. One marshal → HTTP → unmarshal
//!   round trip per call, token or basic auth, chunked file uploads
//! - **resources**: schema plus create/read/update/delete handlers per BIG-IP object type
//! - **provider**: [`BigIpProvider`], which configures the client and dispatches to resources
//! - **server**: the gRPC plugin protocol and the handshake
//!
//! # Handshake Protocol
//!
//! On start the binary prints a handshake line to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`. Hemmer spawns the
//! provider as a subprocess and connects to that address over gRPC. Logs go
//! to stderr so they never interleave with the handshake.
//!
//! # Resources
//!
//! | Type                     | BIG-IP endpoint                     |
//! |--------------------------|-------------------------------------|
//! | `bigip_apm_webtop`       | `/mgmt/tm/apm/resource/webtop`      |
//! | `bigip_ilx_workspace`    | `/mgmt/tm/ilx/workspace`            |
//! | `bigip_net_dns_resolver` | `/mgmt/tm/net/dns-resolver`         |
//!
//! `bigip_apm_webtop` is also available as a data source.

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use client::{BigIpClient, BigIpError, ClientConfig};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::BigIpProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::validate;

pub use async_trait::async_trait;
