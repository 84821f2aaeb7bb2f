//! iControl REST client for the BIG-IP management API.
//!
//! Every call is a single marshal → HTTP → unmarshal round trip. There is no
//! retry, no caching and no background state: a [`BigIpClient`] is built once
//! by `configure` and then shared read-only.

mod apm_webtop;
mod dns_resolver;
mod error;
mod ilx;
mod transfer;

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use apm_webtop::{
    CustomizationType, InitialState, LinkType, Reference, Webtop, WebtopConfig, WebtopRead,
    WebtopType,
};
pub use dns_resolver::{DnsResolver, DnsResolverForwardZone, DnsResolverNameserver};
pub use error::{is_not_found_message, BigIpError, NOT_FOUND_CODE};
pub use ilx::{ExtensionConfig, IlxExtension, IlxFile, IlxWorkspace, WORKSPACE_UPLOAD_PATH};
pub use transfer::{BashCommand, Upload};

pub(crate) const URI_MGMT: &str = "mgmt";
pub(crate) const URI_TM: &str = "tm";
pub(crate) const URI_SHARED: &str = "shared";

/// Header carrying the token returned by `/mgmt/shared/authn/login`.
pub const AUTH_TOKEN_HEADER: &str = "X-F5-Auth-Token";

/// Connection settings for a BIG-IP device.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host name or IP, optionally with an `https://` scheme.
    pub address: String,
    /// Management port.
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Use token authentication instead of HTTP basic auth.
    pub token_auth: bool,
    /// Login provider passed to `/mgmt/shared/authn/login`.
    pub login_ref: String,
    /// A pre-issued token; skips the login call.
    pub token_value: Option<String>,
    /// Accept self-signed device certificates.
    pub validate_certs_disable: bool,
    /// Per-request timeout.
    pub api_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            port: 443,
            username: String::new(),
            password: String::new(),
            token_auth: true,
            login_ref: "tmos".to_string(),
            token_value: None,
            validate_certs_disable: true,
            api_timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("token_auth", &self.token_auth)
            .field("login_ref", &self.login_ref)
            .field("token_value", &self.token_value.as_ref().map(|_| "[REDACTED]"))
            .field("validate_certs_disable", &self.validate_certs_disable)
            .field("api_timeout", &self.api_timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Base URL of the management API, e.g. `https://10.1.1.4:443`.
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            let scheme_end = address.find("://").map(|i| i + 3).unwrap_or(0);
            if address[scheme_end..].contains(':') {
                address.to_string()
            } else {
                format!("{}:{}", address, self.port)
            }
        } else {
            format!("https://{}:{}", address, self.port)
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    login_provider_name: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<LoginToken>,
}

#[derive(Deserialize)]
struct LoginToken {
    token: String,
}

/// Client for one BIG-IP device.
#[derive(Clone)]
pub struct BigIpClient {
    http: reqwest::Client,
    config: ClientConfig,
    base_url: String,
    token: Option<String>,
}

impl BigIpClient {
    /// Build a client for the device described by `config`.
    pub fn new(config: ClientConfig) -> Result<Self, BigIpError> {
        let base_url = config.base_url();
        Self::with_base_url(config, base_url)
    }

    /// Build a client that talks to `base_url` instead of the configured
    /// address. Used with mock servers.
    pub fn with_base_url(
        config: ClientConfig,
        base_url: impl Into<String>,
    ) -> Result<Self, BigIpError> {
        if config.address.trim().is_empty() {
            return Err(BigIpError::InvalidConfig("address must not be empty".into()));
        }

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.validate_certs_disable)
            .timeout(config.api_timeout)
            .build()?;

        let token = if config.token_auth {
            config.token_value.clone()
        } else {
            None
        };

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            config,
            token,
        })
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Root URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether requests carry an auth token rather than basic credentials.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Obtain an auth token when token auth is enabled and none is set.
    pub async fn login(&mut self) -> Result<(), BigIpError> {
        if !self.config.token_auth || self.token.is_some() {
            return Ok(());
        }

        let path = uri(&[URI_MGMT, URI_SHARED, "authn", "login"]);
        let body = LoginRequest {
            username: &self.config.username,
            password: &self.config.password,
            login_provider_name: &self.config.login_ref,
        };

        debug!(path = %path, login_ref = %self.config.login_ref, "Requesting auth token");
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = match BigIpError::from_response(status.as_u16(), &text) {
                BigIpError::Api { message, .. } => message,
                other => other.to_string(),
            };
            return Err(BigIpError::Auth { message });
        }

        let parsed: LoginResponse =
            serde_json::from_str(&text).map_err(|source| BigIpError::Parse {
                path: path.clone(),
                source,
            })?;
        let token = parsed.token.ok_or_else(|| BigIpError::Auth {
            message: "login response did not contain a token".to_string(),
        })?;

        info!(address = %self.config.address, "Obtained BIG-IP auth token");
        self.token = Some(token.token);
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.header(AUTH_TOKEN_HEADER, token),
            None => builder.basic_auth(&self.config.username, Some(&self.config.password)),
        }
    }

    async fn execute(
        &self,
        builder: RequestBuilder,
        method: &Method,
        path: &str,
    ) -> Result<String, BigIpError> {
        debug!(method = %method, path = %path, "BIG-IP request");
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(method = %method, path = %path, status = status.as_u16(), "BIG-IP response");

        if status.is_success() {
            Ok(body)
        } else {
            Err(BigIpError::from_response(status.as_u16(), &body))
        }
    }

    /// GET an object. A 404 answer yields `Ok(None)`.
    pub(crate) async fn get_entity<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, BigIpError> {
        let method = Method::GET;
        let result = self
            .execute(self.request(method.clone(), path), &method, path)
            .await;
        let body = match result {
            Ok(body) => body,
            Err(err) if err.status() == Some(404) => return Ok(None),
            Err(err) => return Err(err),
        };
        parse_body(path, &body).map(Some)
    }

    pub(crate) async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<String, BigIpError> {
        let method = Method::POST;
        self.execute(self.request(method.clone(), path).json(body), &method, path)
            .await
    }

    pub(crate) async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), BigIpError> {
        let method = Method::PATCH;
        self.execute(self.request(method.clone(), path).json(body), &method, path)
            .await
            .map(|_| ())
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), BigIpError> {
        let method = Method::DELETE;
        self.execute(self.request(method.clone(), path), &method, path)
            .await
            .map(|_| ())
    }

    /// POST a raw byte range, as the file-transfer endpoints expect.
    pub(crate) async fn post_bytes(
        &self,
        path: &str,
        content_range: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BigIpError> {
        let method = Method::POST;
        let range = HeaderValue::from_str(content_range)
            .map_err(|e| BigIpError::InvalidConfig(format!("bad Content-Range: {}", e)))?;
        let builder = self
            .request(method.clone(), path)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header("Content-Range", range)
            .body(bytes);
        self.execute(builder, &method, path).await
    }
}

impl fmt::Debug for BigIpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigIpClient")
            .field("base_url", &self.base_url)
            .field("username", &self.config.username)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

pub(crate) fn parse_body<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, BigIpError> {
    serde_json::from_str(body).map_err(|source| BigIpError::Parse {
        path: path.to_string(),
        source,
    })
}

/// Object names are addressed with `~` in place of `/` (`/Common/wt1` → `~Common~wt1`).
pub fn uri_name(name: &str) -> String {
    name.replace('/', "~")
}

/// Join URI segments into an absolute path, skipping empty segments.
pub(crate) fn uri(segments: &[&str]) -> String {
    let mut path = String::new();
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        path.push('/');
        path.push_str(segment.trim_matches('/'));
    }
    path
}
