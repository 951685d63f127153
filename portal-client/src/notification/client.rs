//! NotificationClient: one push connection per signed-in vendor
//!
//! Lifecycle fields live in a single struct behind an async mutex, so
//! `connect`, `disconnect`, failure handling and timer callbacks never
//! interleave. Each opened connection gets a generation number; a task whose
//! generation is no longer current is a zombie: its state changes are
//! ignored and its frames are not dispatched.

use futures::StreamExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use super::NotificationConfig;
use super::alert::{
    AlertSink, DesktopNotification, NotificationPermission, TerminalAlerts, new_order_alert,
};
use super::event::{Decoded, NotificationEvent, decode_frame};
use super::listeners::{ListenerHandle, ListenerRegistry};
use super::sse::SseFrame;
use super::transport::{HttpPushTransport, PushTransport, TransportError};
use crate::session::{StaticToken, TokenSource};
use crate::{ClientResult, PortalConfig};

/// Push connection health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the backoff before reconnect number `attempt`
    Reconnecting { attempt: u32 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Short label for status badges
    pub fn badge(&self) -> &'static str {
        if self.is_connected() { "Live" } else { "Offline" }
    }
}

#[derive(Default)]
struct Lifecycle {
    vendor_id: Option<String>,
    connection: Option<JoinHandle<()>>,
    /// Pending reconnect timer with its ticket
    reconnect: Option<(u64, JoinHandle<()>)>,
    next_ticket: u64,
    attempts: u32,
    /// Set once a stream opened since the last disconnect
    ever_connected: bool,
    generation: u64,
}

struct Inner {
    config: PortalConfig,
    settings: NotificationConfig,
    transport: Arc<dyn PushTransport>,
    tokens: Arc<dyn TokenSource>,
    alerts: Arc<dyn AlertSink>,
    listeners: ListenerRegistry,
    lifecycle: Mutex<Lifecycle>,
    /// Mirror of `Lifecycle::generation` for the frame loop
    live_generation: AtomicU64,
    status: watch::Sender<ConnectionState>,
}

/// Push notification client.
///
/// Cheap to clone; clones share the connection and listeners.
///
/// # Example
///
/// ```no_run
/// use portal_client::{PortalConfig, notification::{NotificationClient, channel}};
///
/// # async fn run() -> portal_client::ClientResult<()> {
/// let client = NotificationClient::builder(PortalConfig::default()).build()?;
/// let _handle = client.add_listener(channel::NEW_ORDER, |event| {
///     println!("{:?}", event.order());
/// });
/// client.connect("vendor-1").await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NotificationClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for NotificationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationClient")
            .field("state", &self.connection_status())
            .field("listeners", &self.inner.listeners)
            .finish_non_exhaustive()
    }
}

impl NotificationClient {
    pub fn builder(config: PortalConfig) -> NotificationClientBuilder {
        NotificationClientBuilder::new(config)
    }

    /// Open the vendor's order stream.
    ///
    /// Returns once the connection task is started; progress is reported
    /// through the `connected` / `error` / `disconnected` channels and
    /// [`subscribe_status`](Self::subscribe_status). Calling it while a
    /// connection is live is a no-op. A pending reconnect timer is cancelled
    /// and the stream is opened right away.
    pub async fn connect(&self, vendor_id: impl Into<String>) {
        let mut life = self.inner.lifecycle.lock().await;
        if let Some((_, timer)) = life.reconnect.take() {
            timer.abort();
            tracing::debug!("Pending reconnect replaced by explicit connect");
        }
        self.inner.connect_locked(&mut life, vendor_id.into());
    }

    /// Close the stream and cancel any pending reconnect. Idempotent.
    pub async fn disconnect(&self) {
        let mut life = self.inner.lifecycle.lock().await;
        if self.inner.teardown(&mut life) {
            tracing::info!("Order stream disconnected");
        }
    }

    pub fn add_listener<F>(&self, channel: impl Into<String>, callback: F) -> ListenerHandle
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.add(channel, callback)
    }

    pub fn remove_listener(&self, channel: &str, id: u64) -> bool {
        self.inner.listeners.remove(channel, id)
    }

    pub fn connection_status(&self) -> ConnectionState {
        *self.inner.status.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_status().is_connected()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionState> {
        self.inner.status.subscribe()
    }

    pub fn play_notification_sound(&self) {
        self.inner.play_sound();
    }

    pub fn request_notification_permission(&self) -> NotificationPermission {
        let permission = self.inner.alerts.request_permission();
        tracing::debug!(?permission, "Notification permission");
        permission
    }

    /// Shown only when permission is granted; failures are logged.
    pub fn show_desktop_notification(&self, title: &str, notification: &DesktopNotification) {
        self.inner.show_notification(title, notification);
    }
}

impl Inner {
    fn state(&self) -> ConnectionState {
        *self.status.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        self.status.send_replace(state);
    }

    fn next_generation(&self, life: &mut Lifecycle) -> u64 {
        life.generation += 1;
        self.live_generation.store(life.generation, Ordering::SeqCst);
        life.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.live_generation.load(Ordering::SeqCst) == generation
    }

    fn connect_locked(self: &Arc<Self>, life: &mut Lifecycle, vendor_id: String) {
        if let Some(connection) = &life.connection {
            if !connection.is_finished() {
                tracing::debug!(state = ?self.state(), "Order stream already open");
                return;
            }
            // task ended without reporting back
            tracing::warn!("Found a dead connection handle, resetting");
            self.teardown(life);
            life.vendor_id = Some(vendor_id);
            self.schedule_reconnect(life, self.settings.stale_reconnect_delay);
            return;
        }

        let Some(token) = self.tokens.token() else {
            tracing::error!("No vendor token available, order stream not opened");
            self.teardown(life);
            return;
        };

        let endpoint = self.config.endpoint(&self.settings.stream_path);
        let url = match reqwest::Url::parse_with_params(&endpoint, &[("token", token.as_str())]) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(endpoint = %endpoint, error = %e, "Invalid stream URL");
                self.teardown(life);
                return;
            }
        };

        tracing::info!(vendor_id = %vendor_id, "Opening order stream");
        life.vendor_id = Some(vendor_id);
        let generation = self.next_generation(life);
        self.set_state(ConnectionState::Connecting);

        let inner = Arc::clone(self);
        life.connection = Some(tokio::spawn(async move {
            inner.run_connection(generation, url.to_string()).await;
        }));
    }

    async fn run_connection(self: Arc<Self>, generation: u64, url: String) {
        let mut stream = match self.transport.open(&url).await {
            Ok(stream) => stream,
            Err(e) => {
                self.on_failure(generation, e).await;
                return;
            }
        };

        if !self.on_open(generation).await {
            return;
        }

        let failure = loop {
            match stream.next().await {
                Some(Ok(frame)) => self.dispatch(generation, &frame),
                Some(Err(e)) => break e,
                None => break TransportError::Closed,
            }
        };
        drop(stream);
        self.on_failure(generation, failure).await;
    }

    /// Returns false when this connection was superseded while opening.
    async fn on_open(&self, generation: u64) -> bool {
        let mut life = self.lifecycle.lock().await;
        if life.generation != generation {
            return false;
        }
        life.attempts = 0;
        life.ever_connected = true;
        self.set_state(ConnectionState::Connected);
        tracing::info!("✅ Order stream connected");
        self.listeners.emit(&NotificationEvent::Connected);
        true
    }

    async fn on_failure(self: &Arc<Self>, generation: u64, error: TransportError) {
        let mut life = self.lifecycle.lock().await;
        if life.generation != generation {
            tracing::debug!(error = %error, "Ignoring failure of a superseded connection");
            return;
        }
        // this task is the connection; dropping the handle detaches it
        life.connection = None;
        self.listeners
            .emit(&NotificationEvent::Error(error.to_string()));

        if !life.ever_connected {
            tracing::error!(error = %error, "Order stream could not be established");
            self.teardown(&mut life);
            return;
        }

        if life.attempts >= self.settings.max_reconnect_attempts {
            tracing::error!(
                attempts = life.attempts,
                error = %error,
                "Giving up on the order stream"
            );
            self.teardown(&mut life);
            return;
        }

        life.attempts += 1;
        let attempt = life.attempts;
        let delay = self.settings.reconnect_delay(attempt);
        tracing::warn!(
            error = %error,
            "Order stream lost, reconnecting in {:?} (attempt {}/{})",
            delay,
            attempt,
            self.settings.max_reconnect_attempts
        );
        self.set_state(ConnectionState::Reconnecting { attempt });
        self.schedule_reconnect(&mut life, delay);
    }

    /// Replaces any pending timer; only the newest one may fire.
    fn schedule_reconnect(self: &Arc<Self>, life: &mut Lifecycle, delay: std::time::Duration) {
        if let Some((_, timer)) = life.reconnect.take() {
            timer.abort();
        }
        life.next_ticket += 1;
        let ticket = life.next_ticket;
        let inner = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.fire_reconnect(ticket).await;
        });
        life.reconnect = Some((ticket, timer));
    }

    async fn fire_reconnect(self: &Arc<Self>, ticket: u64) {
        let mut life = self.lifecycle.lock().await;
        match &life.reconnect {
            Some((current, _)) if *current == ticket => {}
            _ => return,
        }
        life.reconnect = None;

        let Some(vendor_id) = life.vendor_id.clone() else {
            return;
        };
        tracing::info!(attempt = life.attempts, "Reconnecting order stream");
        self.connect_locked(&mut life, vendor_id);
    }

    /// Returns whether anything was open or pending.
    fn teardown(&self, life: &mut Lifecycle) -> bool {
        let mut was_active = self.state() != ConnectionState::Disconnected;
        if let Some((_, timer)) = life.reconnect.take() {
            timer.abort();
            was_active = true;
        }
        if let Some(connection) = life.connection.take() {
            connection.abort();
            was_active = true;
        }
        self.next_generation(life);
        life.attempts = 0;
        life.ever_connected = false;
        life.vendor_id = None;
        self.set_state(ConnectionState::Disconnected);

        if was_active {
            self.listeners.emit(&NotificationEvent::Disconnected);
        }
        was_active
    }

    fn dispatch(&self, generation: u64, frame: &SseFrame) {
        if !self.is_current(generation) {
            tracing::debug!(generation, "Dropping frame from a superseded connection");
            return;
        }
        match decode_frame(frame) {
            Ok(Decoded::Heartbeat) => tracing::debug!("💓 Heartbeat"),
            Ok(Decoded::Event(event)) => {
                if let NotificationEvent::NewOrder(order) = &event {
                    tracing::info!(order_number = %order.order_number, "New order received");
                    self.play_sound();
                    let (title, notification) = new_order_alert(order);
                    self.show_notification(&title, &notification);
                }
                self.listeners.emit(&event);
            }
            Err(e) => tracing::warn!(error = %e, "Dropping malformed push payload"),
        }
    }

    fn play_sound(&self) {
        if let Err(e) = self.alerts.play_sound() {
            tracing::debug!(error = %e, "Notification sound not played");
        }
    }

    fn show_notification(&self, title: &str, notification: &DesktopNotification) {
        if self.alerts.permission() != NotificationPermission::Granted {
            return;
        }
        if let Err(e) = self.alerts.show(title, notification) {
            tracing::warn!(error = %e, "Desktop notification failed");
        }
    }
}

/// Builder for [`NotificationClient`].
///
/// Defaults: reqwest transport, token from `config.token` or the session
/// store, terminal alerts.
pub struct NotificationClientBuilder {
    config: PortalConfig,
    settings: NotificationConfig,
    transport: Option<Arc<dyn PushTransport>>,
    tokens: Option<Arc<dyn TokenSource>>,
    alerts: Option<Arc<dyn AlertSink>>,
}

impl NotificationClientBuilder {
    pub fn new(config: PortalConfig) -> Self {
        Self {
            config,
            settings: NotificationConfig::default(),
            transport: None,
            tokens: None,
            alerts: None,
        }
    }

    pub fn settings(mut self, settings: NotificationConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn tokens(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn build(self) -> ClientResult<NotificationClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpPushTransport::new()?),
        };
        let tokens: Arc<dyn TokenSource> = match (self.tokens, &self.config.token) {
            (Some(tokens), _) => tokens,
            (None, Some(token)) => Arc::new(StaticToken(token.clone())),
            (None, None) => Arc::new(self.config.session_store()),
        };
        let alerts: Arc<dyn AlertSink> = match self.alerts {
            Some(alerts) => alerts,
            None => Arc::new(TerminalAlerts),
        };
        let (status, _) = watch::channel(ConnectionState::Disconnected);

        Ok(NotificationClient {
            inner: Arc::new(Inner {
                config: self.config,
                settings: self.settings,
                transport,
                tokens,
                alerts,
                listeners: ListenerRegistry::new(),
                lifecycle: Mutex::new(Lifecycle::default()),
                live_generation: AtomicU64::new(0),
                status,
            }),
        })
    }
}
