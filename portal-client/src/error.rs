//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with `success: false` or an unusable payload
    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] shared::ShapeError),

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Session storage error
    #[error("Session error: {0}")]
    Session(#[from] std::io::Error),
}

impl ClientError {
    /// Text suitable for a user-facing notice.
    ///
    /// Backend messages are passed through; transport details are not.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Http(e) if e.is_timeout() => "Request timed out".to_string(),
            ClientError::Http(_) => "Network error, please try again".to_string(),
            ClientError::InvalidResponse(shared::ShapeError::Rejected(msg)) => msg.clone(),
            ClientError::Unauthorized => "Session expired, please sign in again".to_string(),
            ClientError::Forbidden(msg)
            | ClientError::NotFound(msg)
            | ClientError::Validation(msg)
            | ClientError::Internal(msg)
                if !msg.is_empty() =>
            {
                backend_message(msg)
            }
            other => other.to_string(),
        }
    }
}

/// Pulls `message` out of a JSON error body, otherwise returns the text as is.
fn backend_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_backend_text() {
        let err = ClientError::Validation(r#"{"success":false,"message":"Invalid status"}"#.into());
        assert_eq!(err.user_message(), "Invalid status");

        let err = ClientError::NotFound("plain text".into());
        assert_eq!(err.user_message(), "plain text");

        let err = ClientError::InvalidResponse(shared::ShapeError::Rejected("Order locked".into()));
        assert_eq!(err.user_message(), "Order locked");
    }

    #[test]
    fn test_user_message_fallbacks() {
        assert_eq!(
            ClientError::Unauthorized.user_message(),
            "Session expired, please sign in again"
        );
        assert_eq!(
            ClientError::Internal(String::new()).user_message(),
            "Internal error: "
        );
    }
}
