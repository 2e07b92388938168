//! Minimal DevTools websocket client.
//!
//! One connection per page target. Commands are correlated to their
//! responses by id; protocol events are routed by a background reader:
//! request URLs go to the registered observer, load events to a
//! notifier the session waits on after navigation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use capture_engine::RequestObserver;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::CdpError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, CdpError>>>>>;
type ObserverSlot = Arc<RwLock<Option<RequestObserver>>>;

/// How the reader routes one incoming frame.
#[derive(Debug)]
enum Routed {
    Response { id: u64, result: Result<Value, String> },
    Request { url: String },
    LoadEvent,
    Other,
}

fn route(value: &Value) -> Routed {
    if let Some(id) = value.get("id").and_then(Value::as_u64) {
        let result = match value.get("error") {
            Some(error) => Err(error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown protocol error")
                .to_string()),
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        return Routed::Response { id, result };
    }

    match value.get("method").and_then(Value::as_str) {
        Some("Network.requestWillBeSent") => {
            match value
                .pointer("/params/request/url")
                .and_then(Value::as_str)
            {
                Some(url) => Routed::Request {
                    url: url.to_string(),
                },
                None => Routed::Other,
            }
        }
        Some("Page.loadEventFired") => Routed::LoadEvent,
        _ => Routed::Other,
    }
}

pub(crate) struct CdpClient {
    next_id: AtomicU64,
    pending: Pending,
    sink: tokio::sync::Mutex<WsSink>,
    observer: ObserverSlot,
    load_events: Arc<tokio::sync::Notify>,
    reader: JoinHandle<()>,
    command_timeout: Duration,
}

impl CdpClient {
    pub(crate) async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self, CdpError> {
        let (stream, _) = tokio_tungstenite::connect_async(ws_url).await?;
        let (sink, mut read) = stream.split();

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let observer: ObserverSlot = Arc::new(RwLock::new(None));
        let load_events = Arc::new(tokio::sync::Notify::new());

        let reader_pending = Arc::clone(&pending);
        let reader_observer = Arc::clone(&observer);
        let reader_load = Arc::clone(&load_events);
        let reader = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                let value: Value = match serde_json::from_str(&text) {
                    Ok(value) => value,
                    Err(reason) => {
                        warn!(%reason, "dropping malformed devtools frame");
                        continue;
                    }
                };
                match route(&value) {
                    Routed::Response { id, result } => {
                        let waiter = reader_pending.lock().unwrap().remove(&id);
                        if let Some(waiter) = waiter {
                            waiter.send(result.map_err(CdpError::Protocol)).ok();
                        }
                    }
                    Routed::Request { url } => {
                        trace!(%url, "request observed");
                        let observer = reader_observer.read().unwrap().clone();
                        if let Some(observer) = observer {
                            observer(&url);
                        }
                    }
                    Routed::LoadEvent => reader_load.notify_one(),
                    Routed::Other => {}
                }
            }
            debug!("devtools connection closed");
            // Wake anything still waiting for a response.
            reader_pending.lock().unwrap().clear();
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            sink: tokio::sync::Mutex::new(sink),
            observer,
            load_events,
            reader,
            command_timeout,
        })
    }

    /// Installs the passive request observer. Must happen before the
    /// first navigation so no early request is missed.
    pub(crate) fn set_request_observer(&self, observer: RequestObserver) {
        *self.observer.write().unwrap() = Some(observer);
    }

    /// Notifier for `Page.loadEventFired`. Grab it before issuing the
    /// navigation command so an early event is not lost.
    pub(crate) fn load_events(&self) -> Arc<tokio::sync::Notify> {
        Arc::clone(&self.load_events)
    }

    /// Sends one command and waits for the correlated response.
    pub(crate) async fn call(&self, method: &str, params: Value) -> Result<Value, CdpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        let frame = json!({ "id": id, "method": method, "params": params }).to_string();
        trace!(method, id, "sending command");
        self.sink.lock().await.send(Message::text(frame)).await?;

        match timeout(self.command_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().unwrap().remove(&id);
                Err(CdpError::Timeout(format!("response to {method}")))
            }
        }
    }

    pub(crate) async fn shutdown(self) {
        self.sink.lock().await.close().await.ok();
        self.reader.abort();
    }
}
