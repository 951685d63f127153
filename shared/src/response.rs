//! API response envelopes
//!
//! The vendor backend answers either with
//! ```json
//! { "success": true, "data": { ... }, "message": "..." }
//! ```
//! or with the bare payload. Both shapes are modelled explicitly here so
//! the rest of the code never sniffs JSON by hand.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ShapeError, ShapeResult};

/// `{success, data, message}` envelope or bare payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped {
        success: bool,
        #[serde(default = "Option::default")]
        data: Option<T>,
        #[serde(default)]
        message: Option<String>,
    },
    Bare(T),
}

impl<T> Envelope<T> {
    /// Unwraps the payload; `success: false` becomes [`ShapeError::Rejected`].
    pub fn into_data(self) -> ShapeResult<Option<T>> {
        match self {
            Envelope::Wrapped {
                success: true,
                data,
                ..
            } => Ok(data),
            Envelope::Wrapped {
                success: false,
                message,
                ..
            } => Err(ShapeError::Rejected(
                message.unwrap_or_else(|| "Request failed".to_string()),
            )),
            Envelope::Bare(data) => Ok(Some(data)),
        }
    }

    /// Like [`into_data`](Self::into_data) but an empty success is an error.
    pub fn into_required(self) -> ShapeResult<T> {
        self.into_data()?.ok_or(ShapeError::MissingData)
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    pub fn from_value(value: serde_json::Value) -> ShapeResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A list endpoint that sometimes returns a single object
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrapped_success() {
        let env: Envelope<OneOrMany<serde_json::Value>> =
            Envelope::from_value(json!({"success": true, "data": [{"a": 1}, {"a": 2}]})).unwrap();
        assert_eq!(env.into_required().unwrap().into_vec().len(), 2);
    }

    #[test]
    fn test_wrapped_failure_carries_message() {
        let env: Envelope<serde_json::Value> =
            Envelope::from_value(json!({"success": false, "message": "Order not found"})).unwrap();
        match env.into_data() {
            Err(ShapeError::Rejected(msg)) => assert_eq!(msg, "Order not found"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_bare_payload() {
        let env: Envelope<OneOrMany<serde_json::Value>> =
            Envelope::from_value(json!({"_id": "o1"})).unwrap();
        let items = env.into_required().unwrap().into_vec();
        assert_eq!(items, vec![json!({"_id": "o1"})]);
    }

    #[test]
    fn test_success_without_data() {
        let env: Envelope<serde_json::Value> =
            Envelope::from_value(json!({"success": true})).unwrap();
        assert!(env.into_data().unwrap().is_none());
    }
}
