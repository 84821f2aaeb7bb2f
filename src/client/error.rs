use serde::Deserialize;
use thiserror::Error;

/// BIG-IP error code for "object not found" (e.g. `01020036:3: The requested ... was not found.`).
pub const NOT_FOUND_CODE: &str = "01020036";

/// Errors raised by [`BigIpClient`](super::BigIpClient).
///
/// Messages never include the configured password or auth token.
#[derive(Debug, Error)]
pub enum BigIpError {
    /// BIG-IP answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    /// Authentication against `/mgmt/shared/authn/login` failed.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// Connection, TLS or timeout failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("failed to parse response from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading local files for an upload failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The client configuration cannot produce a usable client.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

/// Error body returned by iControl REST.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

impl BigIpError {
    /// Build an [`BigIpError::Api`] from a failed response.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => Self::Api {
                status,
                code: parsed.code,
                message: parsed.message.unwrap_or_else(|| body.to_string()),
            },
            Err(_) => Self::Api {
                status,
                code: None,
                message: if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.trim().to_string()
                },
            },
        }
    }

    /// HTTP status, when the error came from a BIG-IP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the error text says the object does not exist.
    ///
    /// Matches the BIG-IP code `01020036`, "not found" in any case, or `404`.
    pub fn is_not_found(&self) -> bool {
        is_not_found_message(&self.to_string())
    }
}

/// Substring test used for every "not found" decision.
pub fn is_not_found_message(msg: &str) -> bool {
    msg.contains(NOT_FOUND_CODE) || msg.to_lowercase().contains("not found") || msg.contains("404")
}
