//! Realtime change-feed task.
//!
//! The feed websocket is owned by a dedicated tokio task. The rest of the
//! crate talks to it through a typed command channel; decoded changes fan
//! out over one mpsc channel per subscription. When the socket is lost the
//! task drops every subscription sender, so consumers observe a closed
//! channel and re-subscribe (which reconnects).

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::change::{ChangeKind, RowChange, SubscriptionSpec};
use crate::error::{RemoteError, Result};
use crate::query::Row;

const HEARTBEAT_SECS: u64 = 30;

/// Buffered changes per subscription before the feed starts dropping.
const CHANGE_BUFFER: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum FeedCommand {
    Subscribe {
        spec: SubscriptionSpec,
        reply: oneshot::Sender<Result<mpsc::Receiver<RowChange>>>,
    },
}

/// Handle to the feed task.
pub(crate) struct FeedHandle {
    cmd_tx: mpsc::Sender<FeedCommand>,
}

impl FeedHandle {
    /// Spawn the feed task. The socket is not opened until the first
    /// subscription arrives.
    pub(crate) fn spawn(url: String, cancel: CancellationToken) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        tokio::spawn(run_feed(url, cmd_rx, cancel));
        Self { cmd_tx }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    pub(crate) async fn subscribe(
        &self,
        spec: SubscriptionSpec,
    ) -> Result<mpsc::Receiver<RowChange>> {
        let (reply, response) = oneshot::channel();
        self.cmd_tx
            .send(FeedCommand::Subscribe { spec, reply })
            .await
            .map_err(|_| RemoteError::Feed("feed task stopped".into()))?;
        response
            .await
            .map_err(|_| RemoteError::Feed("feed task dropped the request".into()))?
    }
}

struct Subscription {
    spec: SubscriptionSpec,
    tx: mpsc::Sender<RowChange>,
}

async fn run_feed(
    url: String,
    mut cmd_rx: mpsc::Receiver<FeedCommand>,
    cancel: CancellationToken,
) {
    let mut socket: Option<WsStream> = None;
    let mut subs: Vec<Subscription> = Vec::new();
    let mut join_ref: u64 = 0;

    let mut heartbeat = interval(Duration::from_secs(HEARTBEAT_SECS));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if let Some(mut ws) = socket.take() {
            tokio::select! {
                _ = cancel.cancelled() => break,

                cmd = cmd_rx.recv() => match cmd {
                    Some(FeedCommand::Subscribe { spec, reply }) => {
                        join_ref += 1;
                        match join_channel(&mut ws, &spec, join_ref).await {
                            Ok(()) => {
                                register(&mut subs, spec, reply);
                                socket = Some(ws);
                            }
                            Err(e) => {
                                warn!(error = %e, "channel join failed; dropping feed socket");
                                subs.clear();
                                let _ = reply.send(Err(e));
                            }
                        }
                    }
                    None => break,
                },

                _ = heartbeat.tick() => {
                    let frame = json!({
                        "topic": "phoenix",
                        "event": "heartbeat",
                        "payload": {},
                        "ref": null,
                    });
                    match ws.send(WsMessage::Text(frame.to_string())).await {
                        Ok(()) => socket = Some(ws),
                        Err(e) => {
                            warn!(error = %e, "heartbeat failed; dropping feed socket");
                            subs.clear();
                        }
                    }
                }

                frame = ws.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(change) = decode_frame(&text) {
                            dispatch(&mut subs, change);
                        }
                        socket = Some(ws);
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        info!("feed socket closed by server");
                        subs.clear();
                    }
                    Some(Ok(_)) => socket = Some(ws),
                    Some(Err(e)) => {
                        warn!(error = %e, "feed socket error");
                        subs.clear();
                    }
                },
            }
        } else {
            tokio::select! {
                _ = cancel.cancelled() => break,

                cmd = cmd_rx.recv() => match cmd {
                    Some(FeedCommand::Subscribe { spec, reply }) => {
                        match connect_async(&url).await {
                            Ok((mut ws, _)) => {
                                join_ref += 1;
                                match join_channel(&mut ws, &spec, join_ref).await {
                                    Ok(()) => {
                                        debug!(table = %spec.table, "feed connected");
                                        heartbeat.reset();
                                        register(&mut subs, spec, reply);
                                        socket = Some(ws);
                                    }
                                    Err(e) => {
                                        let _ = reply.send(Err(e));
                                    }
                                }
                            }
                            Err(e) => {
                                let _ = reply.send(Err(RemoteError::Feed(format!(
                                    "connect failed: {e}"
                                ))));
                            }
                        }
                    }
                    None => break,
                },
            }
        }
    }

    info!("realtime feed task stopped");
}

fn register(
    subs: &mut Vec<Subscription>,
    spec: SubscriptionSpec,
    reply: oneshot::Sender<Result<mpsc::Receiver<RowChange>>>,
) {
    let (tx, rx) = mpsc::channel(CHANGE_BUFFER);
    subs.push(Subscription { spec, tx });
    let _ = reply.send(Ok(rx));
}

/// Join the channel for one subscription.
async fn join_channel(ws: &mut WsStream, spec: &SubscriptionSpec, join_ref: u64) -> Result<()> {
    let frame = json!({
        "topic": topic_for(spec),
        "event": "phx_join",
        "payload": {},
        "ref": join_ref.to_string(),
    });
    ws.send(WsMessage::Text(frame.to_string()))
        .await
        .map_err(|e| RemoteError::Feed(format!("join failed: {e}")))
}

/// Channel topic for a subscription, with the optional equality filter
/// encoded the way the feed expects it.
fn topic_for(spec: &SubscriptionSpec) -> String {
    match &spec.filter {
        Some((column, value)) => {
            format!("realtime:public:{}:{}=eq.{}", spec.table, column, value)
        }
        None => format!("realtime:public:{}", spec.table),
    }
}

/// Decode one incoming frame into a [`RowChange`]. Protocol frames
/// (join replies, heartbeat acks) and unknown events yield `None`.
fn decode_frame(text: &str) -> Option<RowChange> {
    let value: Value = serde_json::from_str(text).ok()?;
    let event = value.get("event")?.as_str()?;
    let payload = value.get("payload")?;

    let kind = ChangeKind::from_wire(event).or_else(|| {
        ChangeKind::from_wire(payload.get("type")?.as_str()?)
    })?;

    let table = payload
        .get("table")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            // Fall back to the topic: `realtime:{schema}:{table}[:filter]`.
            let topic = value.get("topic")?.as_str()?;
            Some(topic.split(':').nth(2)?.to_string())
        })?;

    let row = payload
        .get("record")
        .and_then(Value::as_object)
        .cloned();

    Some(RowChange { kind, table, row })
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a change passes a subscription's equality filter. Payload-less
/// changes are always delivered so the consumer can fall back to a reload.
fn filter_accepts(spec: &SubscriptionSpec, row: Option<&Row>) -> bool {
    let Some((column, value)) = &spec.filter else {
        return true;
    };
    let Some(row) = row else {
        return true;
    };
    row.get(column).map(render).as_deref() == Some(value.as_str())
}

fn dispatch(subs: &mut Vec<Subscription>, change: RowChange) {
    subs.retain(|sub| {
        if sub.tx.is_closed() {
            return false;
        }
        if sub.spec.table != change.table || !filter_accepts(&sub.spec, change.row.as_ref()) {
            return true;
        }
        match sub.tx.try_send(change.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(table = %change.table, "subscriber lagging; change dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_frame_decodes_with_record() {
        let text = r#"{
            "topic": "realtime:public:pengaduan",
            "event": "INSERT",
            "payload": {
                "schema": "public",
                "table": "pengaduan",
                "type": "INSERT",
                "record": { "id": "c-1", "status": "diterima" }
            },
            "ref": null
        }"#;

        let change = decode_frame(text).expect("change");
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.table, "pengaduan");
        let row = change.row.expect("row");
        assert_eq!(row.get("id"), Some(&Value::String("c-1".into())));
    }

    #[test]
    fn protocol_frames_are_ignored() {
        let reply = r#"{"topic":"realtime:public:berita","event":"phx_reply","payload":{"status":"ok"},"ref":"1"}"#;
        assert!(decode_frame(reply).is_none());

        let heartbeat = r#"{"topic":"phoenix","event":"heartbeat","payload":{},"ref":null}"#;
        assert!(decode_frame(heartbeat).is_none());
    }

    #[test]
    fn table_falls_back_to_topic() {
        let text = r#"{
            "topic": "realtime:public:notifications:user_id=eq.u-1",
            "event": "INSERT",
            "payload": { "record": { "id": "n-1" } },
            "ref": null
        }"#;

        let change = decode_frame(text).expect("change");
        assert_eq!(change.table, "notifications");
    }

    #[test]
    fn equality_filter_gates_delivery() {
        let spec = SubscriptionSpec::filtered("notifications", "user_id", "u-1");

        let mine: Row = serde_json::from_str(r#"{"user_id":"u-1"}"#).unwrap();
        let theirs: Row = serde_json::from_str(r#"{"user_id":"u-2"}"#).unwrap();

        assert!(filter_accepts(&spec, Some(&mine)));
        assert!(!filter_accepts(&spec, Some(&theirs)));
        // No payload: deliver, consumer reloads.
        assert!(filter_accepts(&spec, None));
    }

    #[test]
    fn filtered_topic_encodes_the_condition() {
        let spec = SubscriptionSpec::filtered("notifications", "user_id", "u-1");
        assert_eq!(topic_for(&spec), "realtime:public:notifications:user_id=eq.u-1");

        let all = SubscriptionSpec::all("berita");
        assert_eq!(topic_for(&all), "realtime:public:berita");
    }
}
