//! Order push notifications
//!
//! - [`sse`]: `text/event-stream` framing
//! - [`event`]: typed events decoded from frames
//! - [`transport`]: opening the stream (reqwest, or scripted in tests)
//! - [`listeners`]: per-channel callback registry
//! - [`alert`]: sound / desktop notification side channels
//! - [`client`]: [`NotificationClient`], connection lifecycle and reconnects

pub mod alert;
pub mod client;
pub mod event;
pub mod listeners;
pub mod sse;
pub mod transport;

pub use alert::{
    AlertError, AlertSink, DesktopNotification, NotificationPermission, SilentAlerts,
    TerminalAlerts,
};
pub use client::{ConnectionState, NotificationClient, NotificationClientBuilder};
pub use event::{NotificationEvent, channel};
pub use listeners::{ListenerHandle, ListenerRegistry};
pub use sse::{SseDecoder, SseFrame};
pub use transport::{EventStream, HttpPushTransport, PushTransport, TransportError};

use std::time::Duration;

/// Push connection settings
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Reconnects allowed after a connection was established
    pub max_reconnect_attempts: u32,
    /// Linear backoff unit: the n-th reconnect waits `n × base`
    pub reconnect_base_delay: Duration,
    /// Delay before reconnecting over a dead connection handle
    pub stale_reconnect_delay: Duration,
    /// Stream route relative to the API base
    pub stream_path: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_secs(3),
            stale_reconnect_delay: Duration::from_millis(500),
            stream_path: "vendor/orders/stream".to_string(),
        }
    }
}

impl NotificationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    pub fn with_stale_reconnect_delay(mut self, delay: Duration) -> Self {
        self.stale_reconnect_delay = delay;
        self
    }

    pub fn with_stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    /// Wait before reconnect number `attempt` (1-based).
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        self.reconnect_base_delay.saturating_mul(attempt)
    }
}
