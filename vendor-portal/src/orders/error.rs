//! Order controller errors

use portal_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderError {
    /// Precondition not met; nothing was sent to the backend
    #[error("{0}")]
    Validation(String),

    #[error("Order {0} not found")]
    NotFound(String),

    /// A refresh is already in flight
    #[error("Orders are already refreshing")]
    Busy,

    /// Controller shut down before the call finished
    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl OrderError {
    /// Text for a notice
    pub fn user_message(&self) -> String {
        match self {
            OrderError::Client(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_passes_backend_text() {
        let err = OrderError::from(ClientError::Validation(
            r#"{"success":false,"message":"Order already shipped"}"#.into(),
        ));
        assert_eq!(err.user_message(), "Order already shipped");
        assert_eq!(
            OrderError::NotFound("o9".into()).user_message(),
            "Order o9 not found"
        );
    }
}
