//! Audible and desktop alerts for incoming orders
//!
//! Alerts are best-effort side channels: every failure is logged by the
//! caller and never affects event delivery.

use std::io::Write;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    Granted,
    Denied,
    /// Not asked yet
    Default,
    /// Platform has no desktop notifications
    Unsupported,
}

/// Desktop notification body and display hints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesktopNotification {
    pub body: String,
    /// Notifications with the same tag replace each other
    pub tag: Option<String>,
    pub icon: Option<String>,
    pub require_interaction: bool,
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Alerts are not supported here")]
    Unsupported,

    #[error("Alert failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Platform alert facilities.
pub trait AlertSink: Send + Sync {
    fn play_sound(&self) -> Result<(), AlertError>;

    fn permission(&self) -> NotificationPermission;

    /// Ask the user for permission; platforms without a prompt just report.
    fn request_permission(&self) -> NotificationPermission {
        self.permission()
    }

    fn show(&self, title: &str, notification: &DesktopNotification) -> Result<(), AlertError>;
}

/// Rings the terminal bell and logs notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalAlerts;

impl AlertSink for TerminalAlerts {
    fn play_sound(&self) -> Result<(), AlertError> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }

    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn show(&self, title: &str, notification: &DesktopNotification) -> Result<(), AlertError> {
        tracing::info!(title, body = %notification.body, "🔔 Notification");
        Ok(())
    }
}

/// No sound, no notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAlerts;

impl AlertSink for SilentAlerts {
    fn play_sound(&self) -> Result<(), AlertError> {
        Err(AlertError::Unsupported)
    }

    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Unsupported
    }

    fn show(&self, _title: &str, _notification: &DesktopNotification) -> Result<(), AlertError> {
        Err(AlertError::Unsupported)
    }
}

/// Title and body announcing a new order.
pub fn new_order_alert(order: &shared::Order) -> (String, DesktopNotification) {
    let notification = DesktopNotification {
        body: format!(
            "Order #{} from {} - ₹{:.2}",
            order.order_number, order.customer.name, order.total_amount
        ),
        tag: Some(format!("order-{}", order.id)),
        icon: None,
        require_interaction: true,
    };
    ("New Order Received!".to_string(), notification)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_alert_text() {
        let order = shared::Order {
            id: "o1".into(),
            order_number: "ORD-9".into(),
            total_amount: 499.5,
            customer: shared::order::Customer {
                name: "Asha".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let (title, notification) = new_order_alert(&order);
        assert_eq!(title, "New Order Received!");
        assert_eq!(notification.body, "Order #ORD-9 from Asha - ₹499.50");
        assert_eq!(notification.tag.as_deref(), Some("order-o1"));
    }

    #[test]
    fn test_silent_sink() {
        assert!(matches!(SilentAlerts.play_sound(), Err(AlertError::Unsupported)));
        assert_eq!(
            SilentAlerts.request_permission(),
            NotificationPermission::Unsupported
        );
    }
}
