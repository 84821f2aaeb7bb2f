//! Provider block parsing.
//!
//! Each attribute of the provider block falls back to an environment
//! variable when it is absent from configuration, then to a built-in default.

use std::time::Duration;

use serde_json::Value;

use crate::client::ClientConfig;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation::as_whole_number;

pub const ENV_HOST: &str = "BIGIP_HOST";
pub const ENV_USER: &str = "BIGIP_USER";
pub const ENV_PASSWORD: &str = "BIGIP_PASSWORD";
pub const ENV_PORT: &str = "BIGIP_PORT";
pub const ENV_TOKEN_AUTH: &str = "BIGIP_TOKEN_AUTH";
pub const ENV_LOGIN_REF: &str = "BIGIP_LOGIN_REF";
pub const ENV_TOKEN_VALUE: &str = "BIGIP_TOKEN_VALUE";
pub const ENV_VERIFY_CERT_DISABLE: &str = "BIGIP_VERIFY_CERT_DISABLE";
pub const ENV_API_TIMEOUT: &str = "BIGIP_API_TIMEOUT";

/// Schema of the provider block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Connection settings for a BIG-IP device")
        .with_attribute(
            "address",
            Attribute::optional_string()
                .with_description("Domain name or IP address of the BIG-IP (BIGIP_HOST)"),
        )
        .with_attribute(
            "username",
            Attribute::optional_string()
                .with_description("Username with API access to the BIG-IP (BIGIP_USER)"),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .sensitive()
                .with_description("Password for the API user (BIGIP_PASSWORD)"),
        )
        .with_attribute(
            "port",
            Attribute::optional_int64()
                .with_description("Management port, 443 by default (BIGIP_PORT)"),
        )
        .with_attribute(
            "token_auth",
            Attribute::optional_bool()
                .with_description("Use token authentication, true by default (BIGIP_TOKEN_AUTH)"),
        )
        .with_attribute(
            "login_ref",
            Attribute::optional_string().with_description(
                "Login provider for token auth, tmos by default (BIGIP_LOGIN_REF)",
            ),
        )
        .with_attribute(
            "token_value",
            Attribute::optional_string()
                .sensitive()
                .with_description("A pre-issued auth token (BIGIP_TOKEN_VALUE)"),
        )
        .with_attribute(
            "validate_certs_disable",
            Attribute::optional_bool().with_description(
                "Skip device certificate validation, true by default (BIGIP_VERIFY_CERT_DISABLE)",
            ),
        )
        .with_attribute(
            "api_timeout",
            Attribute::optional_int64().with_description(
                "Per-request timeout in seconds, 60 by default (BIGIP_API_TIMEOUT)",
            ),
        )
}

/// Parse the provider block, reading fallbacks from the process environment.
pub fn parse_provider_config(config: &Value) -> Result<ClientConfig, Vec<Diagnostic>> {
    parse_provider_config_with(config, |key| std::env::var(key).ok())
}

/// Parse the provider block with a custom environment lookup.
pub fn parse_provider_config_with<F>(
    config: &Value,
    env: F,
) -> Result<ClientConfig, Vec<Diagnostic>>
where
    F: Fn(&str) -> Option<String>,
{
    let source = Source { config, env: &env };
    let mut diagnostics = Vec::new();
    let defaults = ClientConfig::default();

    let address = source.string("address", ENV_HOST).unwrap_or_default();
    let username = source.string("username", ENV_USER).unwrap_or_default();
    let password = source.string("password", ENV_PASSWORD).unwrap_or_default();
    let token_value = source.string("token_value", ENV_TOKEN_VALUE);
    let login_ref = source
        .string("login_ref", ENV_LOGIN_REF)
        .unwrap_or(defaults.login_ref);

    let port = match source.int("port", ENV_PORT) {
        Ok(None) => defaults.port,
        Ok(Some(port)) => match u16::try_from(port) {
            Ok(port) if port > 0 => port,
            _ => {
                diagnostics.push(
                    Diagnostic::error("Invalid port")
                        .with_detail(format!("{} is not a valid TCP port", port))
                        .with_attribute("port"),
                );
                defaults.port
            },
        },
        Err(diag) => {
            diagnostics.push(diag);
            defaults.port
        },
    };

    let api_timeout = match source.int("api_timeout", ENV_API_TIMEOUT) {
        Ok(None) => defaults.api_timeout,
        Ok(Some(secs)) if secs > 0 => Duration::from_secs(secs as u64),
        Ok(Some(secs)) => {
            diagnostics.push(
                Diagnostic::error("Invalid API timeout")
                    .with_detail(format!(
                        "timeout must be a positive number of seconds, got {}",
                        secs
                    ))
                    .with_attribute("api_timeout"),
            );
            defaults.api_timeout
        },
        Err(diag) => {
            diagnostics.push(diag);
            defaults.api_timeout
        },
    };

    let token_auth = source
        .bool("token_auth", ENV_TOKEN_AUTH)
        .unwrap_or_else(|diag| {
            diagnostics.push(diag);
            None
        })
        .unwrap_or(defaults.token_auth);
    let validate_certs_disable = source
        .bool("validate_certs_disable", ENV_VERIFY_CERT_DISABLE)
        .unwrap_or_else(|diag| {
            diagnostics.push(diag);
            None
        })
        .unwrap_or(defaults.validate_certs_disable);

    if address.is_empty() {
        diagnostics.push(missing("address", ENV_HOST));
    }
    // A pre-issued token stands in for credentials.
    if token_value.is_none() || !token_auth {
        if username.is_empty() {
            diagnostics.push(missing("username", ENV_USER));
        }
        if password.is_empty() {
            diagnostics.push(missing("password", ENV_PASSWORD));
        }
    }

    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    Ok(ClientConfig {
        address,
        port,
        username,
        password,
        token_auth,
        login_ref,
        token_value,
        validate_certs_disable,
        api_timeout,
    })
}

fn missing(attribute: &str, env: &str) -> Diagnostic {
    Diagnostic::error(format!("Missing required attribute '{}'", attribute))
        .with_detail(format!(
            "set '{}' in the provider block or the {} environment variable",
            attribute, env
        ))
        .with_attribute(attribute)
}

struct Source<'a, F> {
    config: &'a Value,
    env: &'a F,
}

impl<F> Source<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn configured(&self, attribute: &str) -> Option<&Value> {
        self.config.get(attribute).filter(|v| !v.is_null())
    }

    fn from_env(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, attribute: &str, env: &str) -> Option<String> {
        match self.configured(attribute).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => Some(s.to_string()),
            _ => self.from_env(env),
        }
    }

    fn int(&self, attribute: &str, env: &str) -> Result<Option<i64>, Diagnostic> {
        if let Some(value) = self.configured(attribute) {
            return as_whole_number(value).map(Some).ok_or_else(|| {
                Diagnostic::error(format!("Invalid value for attribute '{}'", attribute))
                    .with_detail(format!("expected an integer, got {}", value))
                    .with_attribute(attribute)
            });
        }
        match self.from_env(env) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                Diagnostic::error(format!("Invalid value in {}", env))
                    .with_detail(format!("expected an integer, got {:?}", raw))
                    .with_attribute(attribute)
            }),
        }
    }

    fn bool(&self, attribute: &str, env: &str) -> Result<Option<bool>, Diagnostic> {
        if let Some(value) = self.configured(attribute) {
            return value.as_bool().map(Some).ok_or_else(|| {
                Diagnostic::error(format!("Invalid value for attribute '{}'", attribute))
                    .with_detail(format!("expected a bool, got {}", value))
                    .with_attribute(attribute)
            });
        }
        match self.from_env(env) {
            None => Ok(None),
            Some(raw) => parse_bool(&raw).map(Some).ok_or_else(|| {
                Diagnostic::error(format!("Invalid value in {}", env))
                    .with_detail(format!("expected true or false, got {:?}", raw))
                    .with_attribute(attribute)
            }),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" => Some(true),
        "0" | "f" | "false" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = parse_provider_config_with(
            &json!({"address": "10.1.1.4", "username": "admin", "password": "secret"}),
            env(&[]),
        )
        .unwrap();

        assert_eq!(config.address, "10.1.1.4");
        assert_eq!(config.port, 443);
        assert!(config.token_auth);
        assert_eq!(config.login_ref, "tmos");
        assert!(config.token_value.is_none());
        assert!(config.validate_certs_disable);
        assert_eq!(config.api_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_environment_fallback() {
        let config = parse_provider_config_with(
            &json!({"username": "from-config", "port": null}),
            env(&[
                (ENV_HOST, "bigip.example.com"),
                (ENV_USER, "from-env"),
                (ENV_PASSWORD, "pw"),
                (ENV_PORT, "8443"),
                (ENV_TOKEN_AUTH, "false"),
                (ENV_API_TIMEOUT, "15"),
            ]),
        )
        .unwrap();

        assert_eq!(config.address, "bigip.example.com");
        assert_eq!(config.username, "from-config");
        assert_eq!(config.password, "pw");
        assert_eq!(config.port, 8443);
        assert!(!config.token_auth);
        assert_eq!(config.api_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_float_integers_parse_like_validate() {
        let raw = json!({
            "address": "10.1.1.4",
            "username": "admin",
            "password": "secret",
            "port": 8443.0,
            "api_timeout": 30.0
        });
        assert!(crate::validation::validate(&provider_schema(), &raw).is_empty());

        let config = parse_provider_config_with(&raw, env(&[])).unwrap();
        assert_eq!(config.port, 8443);
        assert_eq!(config.api_timeout, Duration::from_secs(30));

        let diags =
            parse_provider_config_with(&json!({"address": "a", "port": 443.5}), env(&[]))
                .unwrap_err();
        assert!(diags.iter().any(|d| d.attribute.as_deref() == Some("port")));
    }

    #[test]
    fn test_missing_credentials() {
        let diags = parse_provider_config_with(&json!({}), env(&[])).unwrap_err();
        let attrs: Vec<_> = diags.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(attrs, vec!["address", "username", "password"]);
        assert!(diags.iter().all(Diagnostic::is_error));
    }

    #[test]
    fn test_token_value_replaces_credentials() {
        let config = parse_provider_config_with(
            &json!({"address": "10.1.1.4"}),
            env(&[(ENV_TOKEN_VALUE, "abc123")]),
        )
        .unwrap();
        assert_eq!(config.token_value.as_deref(), Some("abc123"));
        assert!(config.username.is_empty());
    }

    #[test]
    fn test_invalid_values() {
        let diags = parse_provider_config_with(
            &json!({
                "address": "10.1.1.4",
                "username": "admin",
                "password": "secret",
                "port": 70000,
                "api_timeout": 0
            }),
            env(&[(ENV_VERIFY_CERT_DISABLE, "maybe")]),
        )
        .unwrap_err();

        let attrs: Vec<_> = diags.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert_eq!(attrs, vec!["port", "api_timeout", "validate_certs_disable"]);
    }

    #[test]
    fn test_sensitive_attributes() {
        let schema = provider_schema();
        assert!(schema.block.attributes["password"].sensitive);
        assert!(schema.block.attributes["token_value"].sensitive);
        assert!(!schema.block.attributes["username"].sensitive);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("on"), None);
    }
}
