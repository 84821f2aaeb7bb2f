//! Error types surfaced at the plugin boundary.

use std::fmt::Display;

use thiserror::Error;

use crate::client::BigIpError;

/// Errors returned by provider operations.
///
/// Every variant maps onto a gRPC status code and, inside responses, onto a
/// single error diagnostic.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested BIG-IP object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error occurred.
    #[error("Internal error: {0}")]
    Internal(String),

    /// The provider is not configured or its configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// State or config could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The BIG-IP object already exists.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// BIG-IP rejected the credentials or the token.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// BIG-IP could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The request to BIG-IP timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// BIG-IP answered with an error the provider has no better mapping for.
    #[error("BIG-IP API error: {0}")]
    Api(String),

    /// The operation is not supported for this resource type.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Get the error message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Internal(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::Api(msg)
            | Self::Unimplemented(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
        }
    }

    /// Wrap a REST client error with a short context such as
    /// `error creating webtop /Common/wt1`.
    ///
    /// The variant follows the kind of client failure so that not-found and
    /// authentication problems stay distinguishable.
    pub fn client(context: impl Display, err: BigIpError) -> Self {
        let msg = format!("{}: {}", context, err);
        if err.is_not_found() {
            return Self::NotFound(msg);
        }
        match err {
            BigIpError::Auth { .. } => Self::PermissionDenied(msg),
            BigIpError::Api { status: 401 | 403, .. } => Self::PermissionDenied(msg),
            BigIpError::Api { status: 409, .. } => Self::AlreadyExists(msg),
            BigIpError::Api { .. } => Self::Api(msg),
            BigIpError::Network(ref e) if e.is_timeout() => Self::DeadlineExceeded(msg),
            BigIpError::Network(_) => Self::Unavailable(msg),
            BigIpError::InvalidConfig(_) => Self::Configuration(msg),
            BigIpError::Parse { .. } | BigIpError::Io(_) => Self::Internal(msg),
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Internal(msg) => tonic::Status::internal(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::DeadlineExceeded(msg) => tonic::Status::deadline_exceeded(msg),
            ProviderError::Api(msg) => tonic::Status::unknown(msg),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
        }
    }
}
