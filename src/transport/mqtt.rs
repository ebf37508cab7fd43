// MIT License - Copyright (c) 2026 Peter Wright
// MQTT session management

use std::sync::{Arc, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, Transport};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};
use tracing::{debug, error, info, warn};

use super::MessageHandler;
use crate::config::ConnectionConfig;
use crate::error::{PulsonError, Result};
use crate::event::{AlarmEvent, EventSender};
use crate::topic;

/// Request queue depth between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 64;

/// How long `stop` waits for the DISCONNECT to be flushed.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Client handle and connection flag of one session. Each session gets its
/// own flag, so a receive task that outlives its session cannot mark a
/// newer one connected.
#[derive(Clone)]
struct Live {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

struct Session {
    live: Live,
    stopping: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

/// One MQTT session to the broker relaying a panel.
///
/// At most one session is active at a time: `start` tears down any previous
/// session first, and overlapping `start`/`stop` calls are serialized. The
/// session is never re-established automatically; when the broker drops it,
/// a [`AlarmEvent::Disconnected`] is emitted and the owner decides whether to
/// call `start` again.
pub struct MqttConnection {
    config: ConnectionConfig,
    event_tx: EventSender,
    live: std::sync::Mutex<Option<Live>>,
    session: Mutex<Option<Session>>,
}

impl MqttConnection {
    pub fn new(config: ConnectionConfig, event_tx: EventSender) -> Self {
        Self {
            config,
            event_tx,
            live: std::sync::Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn current(&self) -> Option<Live> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the broker has accepted the current session and it has not
    /// been lost since.
    pub fn is_connected(&self) -> bool {
        self.current()
            .is_some_and(|live| live.connected.load(Ordering::SeqCst))
    }

    /// Clear a session's connection flag and forget its client if it is
    /// still the current one.
    fn retire(&self, connected: &Arc<AtomicBool>) {
        let was_connected = connected.swap(false, Ordering::SeqCst);
        {
            let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
            if live
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(&current.connected, connected))
            {
                *live = None;
            }
        }
        if was_connected {
            let _ = self
                .event_tx
                .send(AlarmEvent::Disconnected { requested: true });
        }
    }

    fn options(&self) -> MqttOptions {
        let config = &self.config;
        let mut options =
            MqttOptions::new(config.effective_client_id(), &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);
        if !config.username.is_empty() {
            options.set_credentials(&config.username, &config.password);
        }
        if config.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }

    fn connection_error(&self, reason: impl Into<String>) -> PulsonError {
        PulsonError::Connection {
            host: self.config.host.clone(),
            port: self.config.port,
            user: self.config.username.clone(),
            reason: reason.into(),
        }
    }

    /// Open a session and feed every inbound message to `handler`.
    ///
    /// Returns once the broker has acknowledged the connection, or fails with
    /// [`PulsonError::Connection`] / [`PulsonError::ConnectTimeout`]. If the
    /// returned future is dropped before that, the half-open session is torn
    /// down with it.
    pub async fn start<H: MessageHandler>(&self, handler: Arc<H>) -> Result<()> {
        self.config.validate()?;

        let mut slot = self.session.lock().await;
        self.shutdown(&mut slot).await;

        let config = &self.config;
        info!(
            "Connecting to MQTT broker {}:{} (tls={}, client id {})",
            config.host,
            config.port,
            config.tls,
            config.effective_client_id()
        );

        let (client, eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let stopping = Arc::new(AtomicBool::new(false));
        let live = Live {
            client: client.clone(),
            connected: Arc::new(AtomicBool::new(false)),
        };
        *self.live.lock().unwrap_or_else(PoisonError::into_inner) = Some(live.clone());

        let reader = tokio::spawn(receive_loop(
            ReceiveContext {
                client,
                subscription: topic::subscription(&config.serial_number),
                connected: Arc::clone(&live.connected),
                stopping: Arc::clone(&stopping),
                event_tx: self.event_tx.clone(),
            },
            eventloop,
            handler,
            ready_tx,
        ));
        let pending = SessionGuard {
            owner: self,
            session: Some(Session {
                live,
                stopping,
                reader,
            }),
        };

        let wait = Duration::from_millis(config.connect_timeout_ms);
        let outcome = match timeout(wait, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(self.connection_error(reason)),
            Ok(Err(_)) => Err(self.connection_error("receive loop exited before CONNACK")),
            Err(_) => Err(PulsonError::ConnectTimeout {
                host: config.host.clone(),
                port: config.port,
                timeout_ms: config.connect_timeout_ms,
            }),
        };

        match outcome {
            Ok(()) => {
                *slot = pending.release();
                info!("MQTT session established");
                Ok(())
            }
            Err(e) => {
                drop(pending);
                error!("{e}");
                Err(e)
            }
        }
    }

    /// End the current session. Safe to call at any time, any number of
    /// times. Waits for an in-flight `start` to settle first.
    pub async fn stop(&self) {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            self.shutdown(&mut slot).await;
            info!("MQTT session stopped");
        }
    }

    async fn shutdown(&self, slot: &mut Option<Session>) {
        let Some(session) = slot.take() else {
            return;
        };

        session.stopping.store(true, Ordering::SeqCst);
        if session.live.connected.load(Ordering::SeqCst)
            && let Err(e) = session.live.client.try_disconnect()
        {
            debug!("MQTT disconnect request failed: {e}");
        }

        let mut closing = SessionGuard {
            owner: self,
            session: Some(session),
        };
        if let Some(session) = closing.session.as_mut()
            && timeout(STOP_GRACE, &mut session.reader).await.is_err()
        {
            warn!("MQTT receive loop did not stop within {STOP_GRACE:?}, aborting");
        }
    }

    fn live_client(&self) -> Option<AsyncClient> {
        self.current()
            .filter(|live| live.connected.load(Ordering::SeqCst))
            .map(|live| live.client)
    }

    /// Publish `payload` to `system/{serial}/{subtopic}`.
    ///
    /// Never fails: while disconnected the message is dropped with a warning.
    /// Returns whether the message was handed to the transport.
    pub async fn publish(&self, subtopic: &str, payload: &str, retain: bool, qos: QoS) -> bool {
        let full = topic::full_topic(&self.config.serial_number, subtopic);
        let Some(client) = self.live_client() else {
            warn!("Not connected, dropping publish to {full}");
            return false;
        };

        match client
            .publish(full.as_str(), qos, retain, payload.as_bytes().to_vec())
            .await
        {
            Ok(()) => {
                debug!("MQTT publish {full} (retain={retain})");
                true
            }
            Err(e) => {
                warn!("MQTT publish to {full} failed: {e}");
                false
            }
        }
    }

    /// Publish `{code}/{payload}`, using the configured user code when `code`
    /// is `None`.
    pub async fn publish_with_code(
        &self,
        subtopic: &str,
        payload: &str,
        retain: bool,
        qos: QoS,
        code: Option<&str>,
    ) -> bool {
        let code = code.unwrap_or(&self.config.user_code);
        let authorized = format!("{code}/{payload}");
        self.publish(subtopic, &authorized, retain, qos).await
    }
}

impl std::fmt::Debug for MqttConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttConnection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("serial_number", &self.config.serial_number)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Drop for MqttConnection {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.reader.abort();
        }
    }
}

/// Aborts a session's receive task and retires its flag when dropped,
/// unless released. Covers failed and cancelled starts as well as stops.
struct SessionGuard<'a> {
    owner: &'a MqttConnection,
    session: Option<Session>,
}

impl SessionGuard<'_> {
    fn release(mut self) -> Option<Session> {
        self.session.take()
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stopping.store(true, Ordering::SeqCst);
            session.reader.abort();
            self.owner.retire(&session.live.connected);
        }
    }
}

struct ReceiveContext {
    client: AsyncClient,
    subscription: String,
    connected: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    event_tx: EventSender,
}

async fn receive_loop<H: MessageHandler>(
    ctx: ReceiveContext,
    mut eventloop: EventLoop,
    handler: Arc<H>,
    ready_tx: oneshot::Sender<std::result::Result<(), String>>,
) {
    let mut ready_tx = Some(ready_tx);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT: connected, subscribing to {}", ctx.subscription);
                if let Err(e) = ctx
                    .client
                    .subscribe(ctx.subscription.as_str(), QoS::AtMostOnce)
                    .await
                {
                    error!("Failed to subscribe to {}: {e}", ctx.subscription);
                }
                ctx.connected.store(true, Ordering::SeqCst);
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Ok(()));
                }
                let _ = ctx.event_tx.send(AlarmEvent::Connected);
            }
            Ok(Event::Incoming(Packet::Publish(msg))) => {
                debug!("MQTT recv {} ({} bytes)", msg.topic, msg.payload.len());
                handler.handle(&msg.topic, &msg.payload).await;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                if ctx.stopping.load(Ordering::SeqCst) {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                if let Some(tx) = ready_tx.take() {
                    // Never connected: start() reports the failure
                    let _ = tx.send(Err(e.to_string()));
                    return;
                }
                if ctx.stopping.load(Ordering::SeqCst) {
                    debug!("MQTT event loop closed: {e}");
                } else {
                    error!("MQTT connection lost: {e}");
                }
                break;
            }
        }
    }

    ctx.connected.store(false, Ordering::SeqCst);
    let requested = ctx.stopping.load(Ordering::SeqCst);
    let _ = ctx.event_tx.send(AlarmEvent::Disconnected { requested });
    info!("MQTT receive loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::event_channel;

    struct Discard;

    impl MessageHandler for Discard {
        async fn handle(&self, _topic: &str, _payload: &[u8]) {}
    }

    fn unreachable_config() -> ConnectionConfig {
        ConnectionConfig::builder()
            .host("127.0.0.1")
            .port(1)
            .serial_number("PS1")
            .tls(false)
            .connect_timeout_ms(3000)
            .build()
    }

    #[tokio::test]
    async fn test_publish_while_disconnected_is_dropped() {
        let (tx, _rx) = event_channel(16);
        let conn = MqttConnection::new(unreachable_config(), tx);
        assert!(!conn.is_connected());
        assert!(!conn.publish("partitions/1/set_arm", "8888/1", false, QoS::AtMostOnce).await);
        assert!(
            !conn
                .publish_with_code("partitions/1/set_arm", "1", false, QoS::AtMostOnce, None)
                .await
        );
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let (tx, _rx) = event_channel(16);
        let conn = MqttConnection::new(unreachable_config(), tx);
        conn.stop().await;
        conn.stop().await;
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let (tx, _rx) = event_channel(16);
        let conn = MqttConnection::new(ConnectionConfig::default(), tx);
        let err = conn.start(Arc::new(Discard)).await.unwrap_err();
        assert!(matches!(err, PulsonError::InvalidConfig { field: "host", .. }));
    }

    #[tokio::test]
    async fn test_start_against_unreachable_broker_fails() {
        let (tx, _rx) = event_channel(16);
        let conn = MqttConnection::new(unreachable_config(), tx);
        let err = conn.start(Arc::new(Discard)).await.unwrap_err();
        assert!(
            matches!(
                err,
                PulsonError::Connection { .. } | PulsonError::ConnectTimeout { .. }
            ),
            "unexpected error: {err}"
        );
        assert!(err.is_retryable());
        assert!(!conn.is_connected());
        conn.stop().await;
    }
}
