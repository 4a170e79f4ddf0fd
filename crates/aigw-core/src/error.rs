use http::StatusCode;

use aigw_common::generation::GenerationIdError;
use aigw_protocol::chat::request::InvalidParameter;
use aigw_provider::{AdapterFailure, TransportErrorKind};
use aigw_storage::{StorageError, UsageStatus};

/// Error taxonomy of the dispatch path. Validation and malformed-id failures
/// are detected before any network or ledger activity; everything else is a
/// call-time failure that still leaves a ledger trace.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    Validation(#[from] InvalidParameter),
    #[error("{0}")]
    MalformedId(#[from] GenerationIdError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported capability: {0}")]
    Unsupported(String),
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("upstream transport failure: {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) | GatewayError::MalformedId(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Transport { kind, .. } if kind.is_timeout() => {
                StatusCode::GATEWAY_TIMEOUT
            }
            GatewayError::Transport { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Unsupported(_) | GatewayError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Ledger status for a failed attempt: timeouts are recorded distinctly
    /// from other errors.
    pub fn usage_status(&self) -> UsageStatus {
        match self {
            GatewayError::Transport { kind, .. } if kind.is_timeout() => UsageStatus::Timeout,
            _ => UsageStatus::Error,
        }
    }
}

impl From<AdapterFailure> for GatewayError {
    fn from(failure: AdapterFailure) -> Self {
        match failure {
            AdapterFailure::Unsupported(message) => {
                GatewayError::Unsupported(message.to_string())
            }
            AdapterFailure::Http { status, body } => GatewayError::Upstream { status, body },
            AdapterFailure::Transport { kind, message } => {
                GatewayError::Transport { kind, message }
            }
            AdapterFailure::Codec(message) => GatewayError::Upstream {
                status: 502,
                body: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_map_to_gateway_timeout_and_timeout_status() {
        let err = GatewayError::Transport {
            kind: TransportErrorKind::Timeout,
            message: "deadline exceeded".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.usage_status(), UsageStatus::Timeout);
    }

    #[test]
    fn malformed_id_is_a_client_error_distinct_from_not_found() {
        let malformed: GatewayError = "oops".parse::<aigw_common::GenerationId>().unwrap_err().into();
        assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);
        let missing = GatewayError::NotFound("generation".to_string());
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    }
}
