//! Error types for the Coralogix provider.

use std::fmt;

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors that can occur while serving a provider request.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested remote object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A backend RPC failed.
    #[error("{rpc} failed with {code:?}: {message}")]
    Rpc {
        /// Fully qualified RPC name.
        rpc: String,
        /// Status code returned by the backend.
        code: tonic::Code,
        /// Status message returned by the backend.
        message: String,
        /// Debug rendering of the request that was sent.
        request: String,
    },

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred while building the client set.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// The request could not be understood (malformed IDs, bad import strings).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Build an error from a failed backend call.
    ///
    /// The RPC name and the formatted request are kept so the diagnostic shown
    /// to the user carries enough context to reproduce the call. `NotFound`
    /// statuses become [`ProviderError::NotFound`].
    pub fn rpc(rpc: &str, request: &impl fmt::Debug, status: tonic::Status) -> Self {
        if status.code() == tonic::Code::NotFound {
            return Self::NotFound(format!("{}: {}", rpc, status.message()));
        }
        tracing::error!(rpc, code = ?status.code(), message = status.message(), "Coralogix API call failed");
        Self::Rpc {
            rpc: rpc.to_string(),
            code: status.code(),
            message: status.message().to_string(),
            request: format!("{:?}", request),
        }
    }

    /// Whether this error means the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Rpc { message, .. } => message,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Render this error as an error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Rpc {
                rpc,
                code,
                message,
                request,
            } => Diagnostic::error(format!("{} failed", rpc)).with_detail(format!(
                "Error: {:?}: {}\nRequest: {}",
                code, message, request
            )),
            other => Diagnostic::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;

    #[derive(Debug)]
    #[allow(dead_code)]
    struct GetThingRequest {
        id: String,
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: resource-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("coralogix_nothing".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: coralogix_nothing");
    }

    #[test]
    fn test_rpc_not_found_maps_to_not_found() {
        let request = GetThingRequest {
            id: "abc".to_string(),
        };
        let err = ProviderError::rpc(
            "/things.v1.Things/GetThing",
            &request,
            tonic::Status::not_found("no such thing"),
        );
        assert!(err.is_not_found());
        assert!(err.message().contains("no such thing"));
    }

    #[test]
    fn test_rpc_error_keeps_request() {
        let request = GetThingRequest {
            id: "abc".to_string(),
        };
        let err = ProviderError::rpc(
            "/things.v1.Things/GetThing",
            &request,
            tonic::Status::permission_denied("missing scope"),
        );
        assert!(!err.is_not_found());
        match &err {
            ProviderError::Rpc { code, request, .. } => {
                assert_eq!(*code, tonic::Code::PermissionDenied);
                assert!(request.contains("abc"));
            },
            other => panic!("unexpected error: {other:?}"),
        }

        let diagnostic = err.to_diagnostic();
        assert_eq!(diagnostic.severity, DiagnosticSeverity::Error);
        assert_eq!(diagnostic.summary, "/things.v1.Things/GetThing failed");
        let detail = diagnostic.detail.unwrap();
        assert!(detail.contains("missing scope"));
        assert!(detail.contains("GetThingRequest"));
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(err.message(), "resource-123");

        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");

        let err = ProviderError::InvalidRequest("bad request".to_string());
        assert_eq!(err.message(), "bad request");
    }

    #[test]
    fn test_plain_error_diagnostic() {
        let diagnostic = ProviderError::Validation("bad".to_string()).to_diagnostic();
        assert_eq!(diagnostic.summary, "Validation error: bad");
        assert!(diagnostic.detail.is_none());
    }
}
