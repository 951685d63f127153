//! Transient notices ("toasts")

use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub shown_at: Instant,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, message)
    }

    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            shown_at: Instant::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

/// Holds the latest notice until it expires or is dismissed.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    ttl: Duration,
    current: Option<Notice>,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    /// Replaces whatever is showing.
    pub fn show(&mut self, notice: Notice) {
        match notice.kind {
            NoticeKind::Success => tracing::info!("{}", notice.message),
            NoticeKind::Error => tracing::warn!("{}", notice.message),
        }
        self.current = Some(notice);
    }

    pub fn current(&self) -> Option<&Notice> {
        self.current
            .as_ref()
            .filter(|notice| notice.shown_at.elapsed() < self.ttl)
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}
