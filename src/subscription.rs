use crate::{
    error::{
        ClientError,
        Result,
    },
    provider::{
        EventSource,
        EventStream,
    },
    rpc::{
        RpcErrorObject,
        decode_envelope,
    },
    types::{
        Event,
        EventFilter,
    },
};
use futures::{
    SinkExt,
    StreamExt,
    stream,
};
use serde::Deserialize;
use serde_json::{
    Value,
    json,
};
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use tokio::{
    net::TcpStream,
    sync::{
        Mutex,
        watch,
    },
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream,
    WebSocketStream,
    connect_async,
    tungstenite::Message,
};
use tracing::{
    debug,
    info,
    warn,
};

const SUBSCRIBE_METHOD: &str = "suix_subscribeEvent";
const SUBSCRIBE_REQUEST_ID: u64 = 1;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Event subscriptions over the node's WebSocket JSON-RPC endpoint.
pub struct WsEventSource {
    url: String,
}

impl WsEventSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Deserialize)]
struct SubscribeReply {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct Notification {
    params: NotificationParams,
}

#[derive(Deserialize)]
struct NotificationParams {
    result: Event,
}

/// `Ok(None)` for frames that are not event notifications.
fn decode_notification(text: &str) -> Result<Option<Event>> {
    let value: Value = serde_json::from_str(text)?;
    if value.get("method").and_then(Value::as_str) != Some(SUBSCRIBE_METHOD) {
        return Ok(None);
    }
    let notification: Notification = serde_json::from_value(value)?;
    Ok(Some(notification.params.result))
}

async fn await_subscription_id(socket: &mut Socket) -> Result<Value> {
    while let Some(frame) = socket.next().await {
        let Message::Text(text) = frame? else {
            continue;
        };
        let reply: SubscribeReply = serde_json::from_str(&text)?;
        if reply.id != Some(SUBSCRIBE_REQUEST_ID) {
            continue;
        }
        return decode_envelope(SUBSCRIBE_METHOD, reply.result, reply.error);
    }
    Err(ClientError::transport(
        "socket closed before the subscription was confirmed",
    ))
}

fn into_event_stream(socket: Socket) -> EventStream {
    stream::unfold(Some(socket), |state| async move {
        let mut socket = state?;
        loop {
            match socket.next().await {
                None | Some(Ok(Message::Close(_))) => return None,
                Some(Err(err)) => return Some((Err(err.into()), None)),
                Some(Ok(Message::Text(text))) => match decode_notification(&text) {
                    Ok(Some(event)) => return Some((Ok(event), Some(socket))),
                    Ok(None) => continue,
                    Err(err) => return Some((Err(err), None)),
                },
                Some(Ok(_)) => continue,
            }
        }
    })
    .boxed()
}

impl EventSource for WsEventSource {
    async fn subscribe(&self, filter: &EventFilter) -> Result<EventStream> {
        let (mut socket, _response) = connect_async(self.url.as_str()).await?;
        let request = json!({
            "jsonrpc": "2.0",
            "id": SUBSCRIBE_REQUEST_ID,
            "method": SUBSCRIBE_METHOD,
            "params": [filter],
        });
        socket.send(Message::Text(request.to_string())).await?;
        let subscription_id = await_subscription_id(&mut socket).await?;
        info!(url = %self.url, %subscription_id, "event subscription opened");
        Ok(into_event_stream(socket))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Subscribed,
    Cancelled,
}

/// Owns the task that delivers events for one subscription.
///
/// Dropping the handle stops delivery as well; `cancel` additionally waits
/// until the delivery task has exited.
pub struct SubscriptionHandle {
    cancel: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    cancelled: AtomicBool,
}

impl SubscriptionHandle {
    pub(crate) fn spawn<F>(mut events: EventStream, mut on_event: F) -> Self
    where
        F: FnMut(Event) + Send + 'static,
    {
        let (cancel, mut cancelled_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled_rx.changed() => {
                        debug!("event subscription cancelled");
                        break;
                    }
                    next = events.next() => match next {
                        Some(Ok(event)) => on_event(event),
                        Some(Err(err)) => {
                            warn!(%err, "event subscription failed");
                            break;
                        }
                        None => {
                            debug!("event stream ended");
                            break;
                        }
                    }
                }
            }
            // stream (and its socket) is dropped here
        });
        Self {
            cancel,
            task: Mutex::new(Some(task)),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SubscriptionState {
        if self.cancelled.load(Ordering::Acquire) {
            SubscriptionState::Cancelled
        } else {
            SubscriptionState::Subscribed
        }
    }

    /// Stops delivery. Once this returns no further callbacks run. Calling it
    /// again is a no-op.
    pub async fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        // the task may already be gone, in which case nobody is listening
        let _ = self.cancel.send(true);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                if err.is_panic() {
                    warn!(%err, "event callback panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::test_helpers::{
        digest,
        event,
    };
    use std::sync::{
        Arc,
        atomic::AtomicUsize,
    };

    #[tokio::test]
    async fn spawn__stream_error_ends_delivery() {
        // given
        let bought = event("0xbf::zombie_house::ZombieBought", digest(1), json!({}));
        let events: EventStream = stream::iter(vec![
            Ok(bought.clone()),
            Err(ClientError::transport("socket reset")),
            Ok(bought),
        ])
        .boxed();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        // when
        let handle = SubscriptionHandle::spawn(events, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.cancel().await;

        // then
        assert_eq!(1, calls.load(Ordering::SeqCst));
        assert_eq!(SubscriptionState::Cancelled, handle.state());
    }

    #[test]
    fn decode_notification__extracts_event() {
        let text = json!({
            "jsonrpc": "2.0",
            "method": "suix_subscribeEvent",
            "params": {
                "subscription": 17,
                "result": {
                    "id": {
                        "txDigest": crate::types::TransactionDigest::from_bytes([1; 32]).as_str(),
                        "eventSeq": "0"
                    },
                    "packageId": "0x5",
                    "transactionModule": "zombie_house",
                    "sender": "0x6",
                    "type": "0x5::zombie_house::ZombieBought",
                    "parsedJson": { "count": "2" }
                }
            }
        })
        .to_string();

        let event = decode_notification(&text).unwrap().unwrap();

        assert_eq!("0x5::zombie_house::ZombieBought", event.event_type);
        assert_eq!("2", event.parsed_json["count"]);
    }

    #[test]
    fn decode_notification__ignores_other_frames() {
        let text = r#"{"jsonrpc":"2.0","id":5,"result":true}"#;
        assert!(decode_notification(text).unwrap().is_none());
    }

    #[test]
    fn decode_notification__malformed_event_is_error() {
        let text = r#"{"method":"suix_subscribeEvent","params":{"result":{"id":1}}}"#;
        assert!(matches!(
            decode_notification(text),
            Err(ClientError::Transport(_))
        ));
    }
}
