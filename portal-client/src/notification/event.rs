//! Push events and their decoding from SSE frames

use serde_json::Value;
use shared::Order;
use shared::order::{has_order_id, normalize_order};
use thiserror::Error;

use super::sse::SseFrame;

/// Listener channel names
pub mod channel {
    pub const NEW_ORDER: &str = "new_order";
    pub const ORDER_UPDATED: &str = "order_updated";
    pub const MESSAGE: &str = "message";
    pub const HEARTBEAT: &str = "heartbeat";
    /// Local pseudo-events, never sent by the server
    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const ERROR: &str = "error";
}

/// Event delivered to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// Stream opened
    Connected,
    /// Client disconnected (explicitly, or after giving up)
    Disconnected,
    /// Transport failed; the text is for logs and status badges
    Error(String),
    NewOrder(Box<Order>),
    OrderUpdated(Box<Order>),
    /// Unnamed stream message; `kind` is its `type` field when present
    Message { kind: Option<String>, payload: Value },
    /// Named stream event without a dedicated variant
    Other { event: String, payload: Value },
}

impl NotificationEvent {
    /// Primary channel this event is delivered on
    pub fn channel(&self) -> &str {
        match self {
            NotificationEvent::Connected => channel::CONNECTED,
            NotificationEvent::Disconnected => channel::DISCONNECTED,
            NotificationEvent::Error(_) => channel::ERROR,
            NotificationEvent::NewOrder(_) => channel::NEW_ORDER,
            NotificationEvent::OrderUpdated(_) => channel::ORDER_UPDATED,
            NotificationEvent::Message { .. } => channel::MESSAGE,
            NotificationEvent::Other { event, .. } => event.as_str(),
        }
    }

    /// Additional channel, for typed unnamed messages
    pub fn secondary_channel(&self) -> Option<&str> {
        match self {
            NotificationEvent::Message {
                kind: Some(kind), ..
            } if kind != channel::MESSAGE => Some(kind.as_str()),
            _ => None,
        }
    }

    pub fn order(&self) -> Option<&Order> {
        match self {
            NotificationEvent::NewOrder(order) | NotificationEvent::OrderUpdated(order) => {
                Some(order.as_ref())
            }
            _ => None,
        }
    }
}

/// Outcome of decoding one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Keep-alive; nothing to deliver
    Heartbeat,
    Event(NotificationEvent),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed '{event}' payload: {source}")]
    Json {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// Order event without `_id` / `id` / `orderId`
    #[error("'{event}' payload carries no order id")]
    MissingOrderId { event: String },
}

impl DecodeError {
    pub fn event(&self) -> &str {
        match self {
            DecodeError::Json { event, .. } | DecodeError::MissingOrderId { event } => event,
        }
    }
}

/// Turns an SSE frame into a listener event.
pub fn decode_frame(frame: &SseFrame) -> Result<Decoded, DecodeError> {
    let event = frame.event_name();
    if event == channel::HEARTBEAT {
        return Ok(Decoded::Heartbeat);
    }

    let payload: Value = serde_json::from_str(&frame.data).map_err(|source| DecodeError::Json {
        event: event.to_string(),
        source,
    })?;

    let decoded = match event {
        channel::NEW_ORDER => NotificationEvent::NewOrder(Box::new(order_from(event, &payload)?)),
        channel::ORDER_UPDATED => {
            NotificationEvent::OrderUpdated(Box::new(order_from(event, &payload)?))
        }
        channel::MESSAGE => {
            let kind = payload
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string);
            if kind.as_deref() == Some(channel::HEARTBEAT) {
                return Ok(Decoded::Heartbeat);
            }
            NotificationEvent::Message { kind, payload }
        }
        other => NotificationEvent::Other {
            event: other.to_string(),
            payload,
        },
    };
    Ok(Decoded::Event(decoded))
}

fn order_from(event: &str, payload: &Value) -> Result<Order, DecodeError> {
    if !has_order_id(payload) {
        return Err(DecodeError::MissingOrderId {
            event: event.to_string(),
        });
    }
    Ok(normalize_order(payload))
}
