//! WebSocket client for the Baileys bridge sidecar.
//!
//! The sidecar owns the WhatsApp Web protocol (encryption, QR generation,
//! media transfer). This side speaks JSON text frames tagged by `type`:
//!
//! - outgoing: `connect`, `send_message`, `read_messages`, `download_media`
//! - incoming: `connection.update`, `messages.upsert`, `creds.update`, `response`
//!
//! Requests carry a `requestId` and are answered by a `response` frame with
//! the same id.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use super::client::{ClientError, Connector, Session, Transport};
use super::types::{
    ClientEvent, ConnectionUpdate, DisconnectReason, MessageKey, MessagesUpsert, OutboundPayload,
    RawMessage,
};
use crate::config::BridgeConfig;

/// Events buffered between the socket reader and the supervisor.
const EVENT_BUFFER: usize = 64;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<BridgeResponse>>>>;

/// Frames sent by the sidecar.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum BridgeFrame {
    #[serde(rename = "connection.update")]
    ConnectionUpdate(ConnectionUpdate),

    #[serde(rename = "messages.upsert")]
    MessagesUpsert(MessagesUpsert),

    #[serde(rename = "creds.update")]
    CredsUpdate { creds: Value },

    #[serde(rename = "response")]
    Response(BridgeResponse),
}

/// Answer to a request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BridgeResponse {
    request_id: u64,
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    /// Base64-encoded media for `download_media`.
    #[serde(default)]
    media: Option<String>,
}

/// Opens sessions through the bridge sidecar.
#[derive(Debug, Clone)]
pub struct BridgeConnector {
    config: BridgeConfig,
}

impl BridgeConnector {
    /// Creates a connector for the given bridge.
    #[must_use]
    pub const fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for BridgeConnector {
    async fn connect(&self, credentials: Option<Value>) -> Result<Session, ClientError> {
        info!("Connecting to WhatsApp bridge at {}...", self.config.url);

        let (stream, _response) = connect_async(self.config.url.as_str())
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let (mut sink, reader) = stream.split();

        let hello = json!({
            "type": "connect",
            "authDir": self.config.auth_dir,
            "creds": credentials,
        });
        sink.send(Message::Text(hello.to_string().into()))
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(write_loop(sink, outgoing_rx));
        tokio::spawn(read_loop(
            reader,
            event_tx,
            Arc::clone(&pending),
            Arc::clone(&closed),
            outgoing_tx.clone(),
        ));

        debug!("Bridge socket open, waiting for connection updates");

        let session = BridgeSession {
            outgoing: outgoing_tx,
            pending,
            closed,
            next_id: AtomicU64::new(1),
            timeout: self.config.request_timeout(),
        };
        Ok((Arc::new(session), event_rx))
    }
}

/// A live bridge session.
pub struct BridgeSession {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingMap,
    /// Set once the reader has stopped; nothing will answer new requests.
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl BridgeSession {
    /// Sends a request frame built around a fresh id and waits for its answer.
    async fn request(
        &self,
        build: impl FnOnce(u64) -> Value,
    ) -> Result<BridgeResponse, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if self.closed.load(Ordering::SeqCst) {
                return Err(ClientError::Closed);
            }
            pending.insert(id, tx);
        }

        let frame = build(id).to_string();
        if self.outgoing.send(Message::Text(frame.into())).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(ClientError::Closed);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(ClientError::Timeout(self.timeout))
            }
            Ok(Err(_)) => Err(ClientError::Closed),
            Ok(Ok(response)) if response.ok => Ok(response),
            Ok(Ok(response)) => Err(ClientError::Rejected(
                response.error.unwrap_or_else(|| "unknown error".to_owned()),
            )),
        }
    }
}

#[async_trait]
impl Transport for BridgeSession {
    async fn send_message(&self, jid: &str, payload: OutboundPayload) -> Result<(), ClientError> {
        let content = payload_to_wire(&payload);
        self.request(|id| {
            json!({
                "type": "send_message",
                "requestId": id,
                "jid": jid,
                "content": content,
            })
        })
        .await
        .map(|_| ())
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), ClientError> {
        self.request(|id| {
            json!({
                "type": "read_messages",
                "requestId": id,
                "keys": keys,
            })
        })
        .await
        .map(|_| ())
    }

    async fn download_media(&self, message: &RawMessage) -> Result<Vec<u8>, ClientError> {
        let response = self
            .request(|id| {
                json!({
                    "type": "download_media",
                    "requestId": id,
                    "message": message,
                })
            })
            .await?;

        let encoded = response
            .media
            .ok_or_else(|| ClientError::Media("response carried no media".to_owned()))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| ClientError::Media(e.to_string()))
    }

    async fn disconnect(&self) {
        info!("Disconnecting from WhatsApp bridge...");
        let _ = self.outgoing.send(Message::Close(None));
    }
}

impl std::fmt::Debug for BridgeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSession")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Converts an outgoing payload to Baileys message content.
fn payload_to_wire(payload: &OutboundPayload) -> Value {
    match payload {
        OutboundPayload::Text { text } => json!({ "text": text }),
        OutboundPayload::Reaction { emoji, key } => json!({
            "react": { "text": emoji, "key": key }
        }),
        OutboundPayload::Sticker { data } => json!({ "sticker": STANDARD.encode(data) }),
    }
}

/// Forwards queued frames to the socket until the session is dropped.
async fn write_loop<S>(mut sink: S, mut outgoing: mpsc::UnboundedReceiver<Message>)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(message) = outgoing.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!("Bridge writer stopped: {}", e);
            return;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Routes incoming frames until the socket ends, then reports the drop.
///
/// Responses are delivered as soon as they are read. Events go through an
/// unbounded queue drained by a separate task, so a slow event consumer
/// never holds back the answer it is waiting for.
async fn read_loop<R>(
    mut reader: R,
    events: mpsc::Sender<ClientEvent>,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    outgoing: mpsc::UnboundedSender<Message>,
) where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();
    tokio::spawn(forward_events(queue_rx, events));

    let reason = loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => route_frame(text.as_str(), &queue_tx, &pending).await,
            Some(Ok(Message::Ping(data))) => {
                let _ = outgoing.send(Message::Pong(data));
            }
            Some(Ok(Message::Close(_))) | None => break "bridge closed the socket".to_owned(),
            Some(Ok(_)) => {}
            Some(Err(e)) => break format!("bridge socket error: {e}"),
        }
    };

    debug!("Bridge reader stopped: {}", reason);

    // Dropping the senders fails every in-flight request with `Closed`.
    closed.store(true, Ordering::SeqCst);
    pending.lock().await.clear();

    let update = ConnectionUpdate::closed(DisconnectReason::CONNECTION_LOST, reason);
    let _ = queue_tx.send(ClientEvent::ConnectionUpdate(update));
}

/// Hands queued events to the supervisor in order.
async fn forward_events(
    mut queue: mpsc::UnboundedReceiver<ClientEvent>,
    events: mpsc::Sender<ClientEvent>,
) {
    while let Some(event) = queue.recv().await {
        if events.send(event).await.is_err() {
            debug!("Event receiver gone, dropping bridge events");
            return;
        }
    }
}

/// Handles one text frame from the sidecar.
async fn route_frame(
    text: &str,
    events: &mpsc::UnboundedSender<ClientEvent>,
    pending: &PendingMap,
) {
    let frame = match serde_json::from_str::<BridgeFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!("Skipping unreadable bridge frame: {}", e);
            return;
        }
    };

    let event = match frame {
        BridgeFrame::Response(response) => {
            match pending.lock().await.remove(&response.request_id) {
                Some(waiter) => {
                    let _ = waiter.send(response);
                }
                None => debug!("No waiter for response {}", response.request_id),
            }
            return;
        }
        BridgeFrame::ConnectionUpdate(update) => ClientEvent::ConnectionUpdate(update),
        BridgeFrame::MessagesUpsert(upsert) => ClientEvent::MessagesUpsert(upsert),
        BridgeFrame::CredsUpdate { creds } => ClientEvent::CredsUpdate(creds),
    };

    if events.send(event).is_err() {
        debug!("Event queue gone, dropping bridge event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::whatsapp::types::{ConnectionPhase, UpsertKind};

    fn pending_map() -> PendingMap {
        Arc::new(Mutex::new(HashMap::new()))
    }

    #[test]
    fn test_text_payload_to_wire() {
        let wire = payload_to_wire(&OutboundPayload::Text {
            text: "Pong!".to_owned(),
        });
        assert_eq!(wire, json!({ "text": "Pong!" }));
    }

    #[test]
    fn test_reaction_payload_to_wire() {
        let key = MessageKey {
            remote_jid: Some("1@s.whatsapp.net".to_owned()),
            from_me: false,
            id: Some("ID".to_owned()),
            participant: None,
        };
        let wire = payload_to_wire(&OutboundPayload::Reaction {
            emoji: "❤️".to_owned(),
            key,
        });
        assert_eq!(wire["react"]["text"], "❤️");
        assert_eq!(wire["react"]["key"]["remoteJid"], "1@s.whatsapp.net");
        assert_eq!(wire["react"]["key"]["id"], "ID");
    }

    #[test]
    fn test_sticker_payload_is_base64() {
        let wire = payload_to_wire(&OutboundPayload::Sticker {
            data: vec![0xde, 0xad, 0xbe, 0xef],
        });
        assert_eq!(wire["sticker"], "3q2+7w==");
    }

    #[tokio::test]
    async fn test_route_connection_update() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pending = pending_map();

        route_frame(
            r#"{"type": "connection.update", "connection": "open"}"#,
            &tx,
            &pending,
        )
        .await;

        match rx.recv().await {
            Some(ClientEvent::ConnectionUpdate(update)) => {
                assert_eq!(update.connection, Some(ConnectionPhase::Open));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_route_upsert_and_creds() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pending = pending_map();

        route_frame(
            r#"{"type": "messages.upsert", "upsertType": "append", "messages": []}"#,
            &tx,
            &pending,
        )
        .await;
        route_frame(
            r#"{"type": "creds.update", "creds": {"me": {"id": "1"}}}"#,
            &tx,
            &pending,
        )
        .await;

        assert!(matches!(
            rx.recv().await,
            Some(ClientEvent::MessagesUpsert(MessagesUpsert { kind: UpsertKind::Append, .. }))
        ));
        match rx.recv().await {
            Some(ClientEvent::CredsUpdate(creds)) => assert_eq!(creds["me"]["id"], "1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_route_response_wakes_waiter() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pending = pending_map();
        let (waiter, answer) = oneshot::channel();
        pending.lock().await.insert(7, waiter);

        route_frame(
            r#"{"type": "response", "requestId": 7, "ok": false, "error": "not allowed"}"#,
            &tx,
            &pending,
        )
        .await;

        let response = answer.await.unwrap();
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("not allowed"));
        assert!(pending.lock().await.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_route_skips_garbage() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pending = pending_map();

        route_frame("not json", &tx, &pending).await;
        route_frame(r#"{"type": "presence.update"}"#, &tx, &pending).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reader_reports_drop_and_fails_pending() {
        let (tx, mut rx) = mpsc::channel(4);
        let (outgoing, _outgoing_rx) = mpsc::unbounded_channel();
        let pending = pending_map();
        let (waiter, answer) = oneshot::channel();
        pending.lock().await.insert(1, waiter);

        let frames = futures::stream::iter(vec![Ok::<_, tungstenite::Error>(Message::Text(
            r#"{"type": "connection.update", "connection": "open"}"#.into(),
        ))]);
        let closed = Arc::new(AtomicBool::new(false));
        read_loop(frames, tx, Arc::clone(&pending), Arc::clone(&closed), outgoing).await;

        assert!(matches!(rx.recv().await, Some(ClientEvent::ConnectionUpdate(_))));
        match rx.recv().await {
            Some(ClientEvent::ConnectionUpdate(update)) => {
                assert_eq!(update.connection, Some(ConnectionPhase::Close));
                assert_eq!(
                    update.disconnect_reason(),
                    Some(DisconnectReason::CONNECTION_LOST)
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(answer.await.is_err());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_response_not_held_back_by_full_event_queue() {
        // Nobody reads events, so the supervisor side of the queue is full.
        let (tx, _rx) = mpsc::channel(EVENT_BUFFER);
        let (outgoing, _outgoing_rx) = mpsc::unbounded_channel();
        let pending = pending_map();
        let (waiter, answer) = oneshot::channel();
        pending.lock().await.insert(1, waiter);

        let mut frames: Vec<Result<Message, tungstenite::Error>> = (0..=EVENT_BUFFER)
            .map(|_| {
                Ok(Message::Text(
                    r#"{"type": "messages.upsert", "upsertType": "notify", "messages": []}"#
                        .into(),
                ))
            })
            .collect();
        frames.push(Ok(Message::Text(
            r#"{"type": "response", "requestId": 1, "ok": true}"#.into(),
        )));
        let reader = futures::stream::iter(frames).chain(futures::stream::pending());

        tokio::spawn(read_loop(
            reader,
            tx,
            Arc::clone(&pending),
            Arc::new(AtomicBool::new(false)),
            outgoing,
        ));

        let response = tokio::time::timeout(Duration::from_secs(2), answer)
            .await
            .expect("response waited behind queued events")
            .unwrap();
        assert!(response.ok);
        assert_eq!(response.request_id, 1);
    }

    #[tokio::test]
    async fn test_request_after_reader_stopped_fails_fast() {
        let (tx, _rx) = mpsc::channel(4);
        let (outgoing, _outgoing_rx) = mpsc::unbounded_channel();
        let pending = pending_map();
        let closed = Arc::new(AtomicBool::new(false));

        read_loop(
            futures::stream::empty::<Result<Message, tungstenite::Error>>(),
            tx,
            Arc::clone(&pending),
            Arc::clone(&closed),
            outgoing.clone(),
        )
        .await;

        let session = BridgeSession {
            outgoing,
            pending: Arc::clone(&pending),
            closed,
            next_id: AtomicU64::new(1),
            timeout: Duration::from_secs(30),
        };

        let result = tokio::time::timeout(Duration::from_secs(1), session.read_messages(&[]))
            .await
            .expect("request waited for the full timeout");
        assert!(matches!(result, Err(ClientError::Closed)));
        assert!(pending.lock().await.is_empty());
    }
}
