// portal-client/tests/notification_client.rs
// Connection lifecycle against a scripted transport

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use portal_client::notification::{
    AlertError, AlertSink, ConnectionState, DesktopNotification, EventStream, ListenerHandle,
    NotificationClient, NotificationEvent, NotificationPermission, PushTransport, SseFrame,
    TransportError, channel,
};
use portal_client::{PortalConfig, StaticToken, TokenSource};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};

type FrameTx = UnboundedSender<Result<SseFrame, TransportError>>;
type FrameRx = UnboundedReceiver<Result<SseFrame, TransportError>>;

enum Outcome {
    Open(FrameRx),
    Fail(TransportError),
    /// The connection task dies without reporting back
    Panic,
}

/// Hands out scripted outcomes; once exhausted every open fails.
#[derive(Default)]
struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Outcome>>,
    opens: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedTransport {
    fn push_stream(&self) -> FrameTx {
        let (tx, rx) = unbounded();
        self.outcomes.lock().unwrap().push_back(Outcome::Open(rx));
        tx
    }

    fn push_failure(&self, error: TransportError) {
        self.outcomes.lock().unwrap().push_back(Outcome::Fail(error));
    }

    fn push_panic(&self) {
        self.outcomes.lock().unwrap().push_back(Outcome::Panic);
    }

    fn open_count(&self) -> usize {
        self.opens.lock().unwrap().len()
    }

    fn open_times(&self) -> Vec<Instant> {
        self.opens.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }

    fn urls(&self) -> Vec<String> {
        self.opens.lock().unwrap().iter().map(|(_, url)| url.clone()).collect()
    }
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn open(&self, url: &str) -> Result<EventStream, TransportError> {
        self.opens.lock().unwrap().push((Instant::now(), url.to_string()));
        let next = self.outcomes.lock().unwrap().pop_front();
        match next {
            Some(Outcome::Open(rx)) => Ok(rx.boxed()),
            Some(Outcome::Fail(error)) => Err(error),
            Some(Outcome::Panic) => panic!("transport bug"),
            None => Err(TransportError::Network("connection refused".into())),
        }
    }
}

#[derive(Default)]
struct CountingAlerts {
    sounds: AtomicUsize,
    shown: Mutex<Vec<String>>,
}

impl AlertSink for CountingAlerts {
    fn play_sound(&self) -> Result<(), AlertError> {
        self.sounds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn show(&self, title: &str, notification: &DesktopNotification) -> Result<(), AlertError> {
        self.shown
            .lock()
            .unwrap()
            .push(format!("{title}: {}", notification.body));
        Ok(())
    }
}

struct NoToken;

impl TokenSource for NoToken {
    fn token(&self) -> Option<String> {
        None
    }
}

fn build_client(transport: &Arc<ScriptedTransport>, alerts: &Arc<CountingAlerts>) -> NotificationClient {
    NotificationClient::builder(PortalConfig::new("http://portal.test/api"))
        .transport(transport.clone())
        .tokens(Arc::new(StaticToken("tok-1".into())))
        .alerts(alerts.clone())
        .build()
        .unwrap()
}

/// Forwards every event on `channels` into a queue.
fn record(
    client: &NotificationClient,
    channels: &[&str],
) -> (mpsc::UnboundedReceiver<(String, NotificationEvent)>, Vec<ListenerHandle>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handles = channels
        .iter()
        .map(|name| {
            let tx = tx.clone();
            let name = name.to_string();
            client.add_listener(name.clone(), move |event| {
                let _ = tx.send((name.clone(), event.clone()));
            })
        })
        .collect();
    (rx, handles)
}

fn frame(event: Option<&str>, data: &str) -> Result<SseFrame, TransportError> {
    Ok(SseFrame {
        event: event.map(str::to_string),
        data: data.to_string(),
        ..Default::default()
    })
}

async fn wait_for_state(client: &NotificationClient, wanted: impl Fn(&ConnectionState) -> bool) {
    let mut status = client.subscribe_status();
    timeout(Duration::from_secs(300), status.wait_for(|s| wanted(s)))
        .await
        .expect("state not reached")
        .unwrap();
}

async fn next_event(
    rx: &mut mpsc::UnboundedReceiver<(String, NotificationEvent)>,
) -> (String, NotificationEvent) {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event")
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_connect_twice_opens_once() {
    let transport = Arc::new(ScriptedTransport::default());
    let _tx = transport.push_stream();
    let client = build_client(&transport, &Arc::default());

    client.connect("v1").await;
    client.connect("v1").await;
    wait_for_state(&client, ConnectionState::is_connected).await;
    client.connect("v1").await;
    sleep(Duration::from_secs(1)).await;

    assert_eq!(transport.open_count(), 1);
    assert_eq!(
        transport.urls()[0],
        "http://portal.test/api/vendor/orders/stream?token=tok-1"
    );
    assert_eq!(client.connection_status().badge(), "Live");
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_are_bounded_with_growing_delays() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let client = build_client(&transport, &Arc::default());
    let (mut events, _handles) = record(
        &client,
        &[channel::CONNECTED, channel::ERROR, channel::DISCONNECTED],
    );

    client.connect("v1").await;
    wait_for_state(&client, ConnectionState::is_connected).await;

    // every later open fails
    drop(tx);
    wait_for_state(&client, |s| *s == ConnectionState::Disconnected).await;

    assert_eq!(transport.open_count(), 6);
    let times = transport.open_times();
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    for (gap, expected) in gaps.iter().zip([3u64, 6, 9, 12, 15]) {
        assert!(*gap >= Duration::from_secs(expected), "gap {gap:?}");
        assert!(*gap < Duration::from_secs(expected + 1), "gap {gap:?}");
    }
    assert!(gaps.windows(2).all(|w| w[0] < w[1]));

    // nothing else is scheduled
    sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.open_count(), 6);

    let mut seen = Vec::new();
    while let Ok((name, _)) = events.try_recv() {
        seen.push(name);
    }
    assert_eq!(seen.iter().filter(|c| *c == channel::CONNECTED).count(), 1);
    assert_eq!(seen.iter().filter(|c| *c == channel::ERROR).count(), 6);
    assert_eq!(seen.last().map(String::as_str), Some(channel::DISCONNECTED));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_resets_attempts_after_success() {
    let transport = Arc::new(ScriptedTransport::default());
    let first = transport.push_stream();
    transport.push_failure(TransportError::Network("reset".into()));
    let second = transport.push_stream();
    let client = build_client(&transport, &Arc::default());

    client.connect("v1").await;
    wait_for_state(&client, ConnectionState::is_connected).await;
    drop(first);
    wait_for_state(&client, |s| *s == ConnectionState::Reconnecting { attempt: 2 }).await;
    wait_for_state(&client, ConnectionState::is_connected).await;
    assert_eq!(transport.open_count(), 3);

    // counter starts over: next loss waits the base delay again
    let lost_at = Instant::now();
    drop(second);
    wait_for_state(&client, |s| *s == ConnectionState::Reconnecting { attempt: 1 }).await;
    wait_for_state(&client, |s| *s == ConnectionState::Reconnecting { attempt: 2 }).await;
    let times = transport.open_times();
    assert!(times[3] - lost_at < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_are_silent() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let client = build_client(&transport, &Arc::default());
    let (mut events, _handles) = record(
        &client,
        &[channel::MESSAGE, channel::HEARTBEAT, "notice", channel::ERROR],
    );

    client.connect("v1").await;
    wait_for_state(&client, ConnectionState::is_connected).await;

    tx.unbounded_send(frame(Some("heartbeat"), "")).unwrap();
    tx.unbounded_send(frame(None, r#"{"type":"heartbeat"}"#)).unwrap();
    tx.unbounded_send(frame(None, r#"{"type":"notice","text":"hi"}"#)).unwrap();

    let (first, event) = next_event(&mut events).await;
    assert_eq!(first, channel::MESSAGE);
    assert!(matches!(event, NotificationEvent::Message { kind: Some(ref k), .. } if k == "notice"));
    let (second, _) = next_event(&mut events).await;
    assert_eq!(second, "notice");

    sleep(Duration::from_secs(1)).await;
    assert!(events.try_recv().is_err());
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_is_dropped() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let alerts = Arc::new(CountingAlerts::default());
    let client = build_client(&transport, &alerts);
    let (mut events, _handles) = record(
        &client,
        &[channel::NEW_ORDER, channel::ORDER_UPDATED, channel::ERROR],
    );

    client.connect("v1").await;
    wait_for_state(&client, ConnectionState::is_connected).await;

    tx.unbounded_send(frame(Some("new_order"), "{oops")).unwrap();
    tx.unbounded_send(frame(Some("new_order"), "{}")).unwrap();
    tx.unbounded_send(frame(Some("order_updated"), r#"{"status":"packed"}"#))
        .unwrap();
    tx.unbounded_send(frame(
        Some("new_order"),
        r#"{"_id":"o1","orderNumber":"ORD-1","customerInfo":{"name":"Asha"},"totalAmount":120}"#,
    ))
    .unwrap();
    tx.unbounded_send(frame(
        Some("order_updated"),
        r#"{"_id":"o1","orderNumber":"ORD-1","status":"confirmed"}"#,
    ))
    .unwrap();

    let (name, event) = next_event(&mut events).await;
    assert_eq!(name, channel::NEW_ORDER);
    assert_eq!(event.order().unwrap().order_number, "ORD-1");
    let (name, event) = next_event(&mut events).await;
    assert_eq!(name, channel::ORDER_UPDATED);
    assert_eq!(event.order().unwrap().status, shared::OrderStatus::Confirmed);

    sleep(Duration::from_secs(1)).await;
    assert!(events.try_recv().is_err(), "no error event expected");
    assert!(client.is_connected());

    // only the new order alerts
    assert_eq!(alerts.sounds.load(Ordering::SeqCst), 1);
    assert_eq!(
        alerts.shown.lock().unwrap().as_slice(),
        ["New Order Received!: Order #ORD-1 from Asha - ₹120.00"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dead_connection_is_reset_then_reopened() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_panic();
    let _tx = transport.push_stream();
    let client = build_client(&transport, &Arc::default());
    let (mut events, _handles) = record(&client, &[channel::CONNECTED, channel::DISCONNECTED]);

    client.connect("v1").await;
    sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.open_count(), 1);
    assert_eq!(client.connection_status(), ConnectionState::Connecting);

    let reset_at = Instant::now();
    client.connect("v1").await;
    assert_eq!(next_event(&mut events).await.0, channel::DISCONNECTED);
    assert_eq!(client.connection_status(), ConnectionState::Disconnected);

    sleep(Duration::from_millis(499)).await;
    assert_eq!(transport.open_count(), 1, "reopened before the stale delay");

    wait_for_state(&client, ConnectionState::is_connected).await;
    assert_eq!(next_event(&mut events).await.0, channel::CONNECTED);
    let reopened = transport.open_times()[1] - reset_at;
    assert!(reopened >= Duration::from_millis(500), "{reopened:?}");
    assert!(reopened < Duration::from_millis(600), "{reopened:?}");

    sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_setup_failure_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.push_failure(TransportError::Rejected { status: 401 });
    let client = build_client(&transport, &Arc::default());
    let (mut events, _handles) = record(&client, &[channel::ERROR, channel::DISCONNECTED]);

    client.connect("v1").await;

    let (name, event) = next_event(&mut events).await;
    assert_eq!(name, channel::ERROR);
    assert_eq!(
        event,
        NotificationEvent::Error("Stream rejected with HTTP 401".into())
    );
    assert_eq!(next_event(&mut events).await.0, channel::DISCONNECTED);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.open_count(), 1);
    assert_eq!(client.connection_status(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_missing_token_does_not_open() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = NotificationClient::builder(PortalConfig::new("http://portal.test/api"))
        .transport(transport.clone())
        .tokens(Arc::new(NoToken))
        .alerts(Arc::new(CountingAlerts::default()))
        .build()
        .unwrap();

    client.connect("v1").await;
    sleep(Duration::from_secs(1)).await;

    assert_eq!(transport.open_count(), 0);
    assert_eq!(client.connection_status(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_is_idempotent_and_silences_stream() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let client = build_client(&transport, &Arc::default());
    let (mut events, _handles) = record(&client, &[channel::DISCONNECTED, channel::MESSAGE]);

    client.connect("v1").await;
    wait_for_state(&client, ConnectionState::is_connected).await;

    client.disconnect().await;
    client.disconnect().await;
    assert_eq!(client.connection_status(), ConnectionState::Disconnected);

    let _ = tx.unbounded_send(frame(None, r#"{"late":true}"#));
    sleep(Duration::from_secs(60)).await;

    assert_eq!(next_event(&mut events).await.0, channel::DISCONNECTED);
    assert!(events.try_recv().is_err());
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_during_backoff_skips_the_wait() {
    let transport = Arc::new(ScriptedTransport::default());
    let first = transport.push_stream();
    let _second = transport.push_stream();
    let client = build_client(&transport, &Arc::default());

    client.connect("v1").await;
    wait_for_state(&client, ConnectionState::is_connected).await;
    drop(first);
    wait_for_state(&client, |s| matches!(s, ConnectionState::Reconnecting { .. })).await;

    let asked_at = Instant::now();
    client.connect("v1").await;
    wait_for_state(&client, ConnectionState::is_connected).await;

    assert_eq!(transport.open_count(), 2);
    assert!(transport.open_times()[1] - asked_at < Duration::from_millis(100));

    // the cancelled timer never fires
    sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.open_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribed_listener_is_not_called() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let client = build_client(&transport, &Arc::default());
    let (mut removed, handles) = record(&client, &[channel::MESSAGE]);
    let (mut kept, _kept_handles) = record(&client, &[channel::MESSAGE]);
    handles[0].unsubscribe();
    assert!(!client.remove_listener(channel::MESSAGE, handles[0].id()));

    client.connect("v1").await;
    wait_for_state(&client, ConnectionState::is_connected).await;
    tx.unbounded_send(frame(None, r#"{"hello":1}"#)).unwrap();

    assert_eq!(next_event(&mut kept).await.0, channel::MESSAGE);
    assert!(removed.try_recv().is_err());
}
