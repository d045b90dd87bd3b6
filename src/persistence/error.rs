//! Persistence error taxonomy

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// 400: the backend rejected the request shape
    #[error("{message}")]
    Validation { message: String },
    /// 404
    #[error("{message}")]
    NotFound { message: String },
    /// 500
    #[error("Internal server error. Please try again.")]
    Server,
    /// Request sent, no response
    #[error("Unable to connect to server. Please check your connection.")]
    Network { detail: String },
    /// Failed locally (encoding, decoding, envelope)
    #[error("An error occurred while processing your request.")]
    Client { detail: String },
    /// Any other status
    #[error("{message}")]
    Unknown { status: u16, message: String },
}

/// FastAPI-style error body
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

fn detail_from(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
}

impl ApiError {
    /// Classify a non-success HTTP response
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let detail = detail_from(body);
        match status {
            400 => ApiError::Validation {
                message: detail.unwrap_or_else(|| "Invalid request data".to_string()),
            },
            404 => ApiError::NotFound {
                message: detail.unwrap_or_else(|| "Resource not found".to_string()),
            },
            500 => ApiError::Server,
            _ => ApiError::Unknown {
                status,
                message: detail.unwrap_or_else(|| "An unexpected error occurred".to_string()),
            },
        }
    }

    pub fn network(detail: impl Into<String>) -> Self {
        ApiError::Network {
            detail: detail.into(),
        }
    }

    pub fn client(detail: impl Into<String>) -> Self {
        ApiError::Client {
            detail: detail.into(),
        }
    }

    /// HTTP status, 0 when there was no response
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Validation { .. } => 400,
            ApiError::NotFound { .. } => 404,
            ApiError::Server => 500,
            ApiError::Unknown { status, .. } => *status,
            ApiError::Network { .. } | ApiError::Client { .. } => 0,
        }
    }

    /// Text that is safe to show the player
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Server => "server",
            ApiError::Network { .. } => "network",
            ApiError::Client { .. } => "client",
            ApiError::Unknown { .. } => "unknown",
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::client(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ApiError::from_status(400, b"").kind(), "validation");
        assert_eq!(ApiError::from_status(404, b"").kind(), "not_found");
        assert_eq!(ApiError::from_status(500, b"").kind(), "server");
        assert_eq!(ApiError::from_status(503, b"").kind(), "unknown");
        assert_eq!(ApiError::from_status(503, b"").status(), 503);
        assert_eq!(ApiError::network("refused").status(), 0);
    }

    #[test]
    fn test_detail_is_used_as_message() {
        let err = ApiError::from_status(404, br#"{"detail": "Level not found"}"#);
        assert_eq!(err.to_string(), "Level not found");

        let err = ApiError::from_status(400, b"not json");
        assert_eq!(err.to_string(), "Invalid request data");

        // 500 never leaks server detail
        let err = ApiError::from_status(500, br#"{"detail": "Traceback..."}"#);
        assert_eq!(err.to_string(), "Internal server error. Please try again.");
    }

    #[test]
    fn test_decode_failure_is_client() {
        let err: ApiError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert_eq!(err.kind(), "client");
    }
}
