//! WebSocket hub transport
//!
//! Negotiates a session over HTTP, upgrades to WebSocket, performs the JSON
//! protocol handshake and then runs a background reader that dispatches
//! completions and server pushes.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::negotiate::{self, hub_url};
use super::protocol::{
    encode, records, HandshakeRequest, HandshakeResponse, HubMessage, InvocationMessage,
    PingMessage,
};
use super::{CallbackHandler, ConnectionState, HubConnector, HubTransport};
use crate::config::TransportConfig;
use crate::error::HubError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Writer = SplitSink<Socket, Message>;
type Reader = SplitStream<Socket>;
type Completion = oneshot::Sender<Result<(), HubError>>;

/// Opens [`WebSocketHubTransport`]s
pub struct WebSocketHubConnector {
    http: reqwest::Client,
    config: TransportConfig,
}

impl WebSocketHubConnector {
    pub fn new(config: TransportConfig) -> Result<Self, HubError> {
        let http = reqwest::Client::builder()
            .timeout(config.connect_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    async fn open(&self, endpoint: &str, hub: &str) -> Result<WebSocketHubTransport, HubError> {
        let hub_url = hub_url(endpoint, hub)?;
        let negotiated = negotiate::negotiate(&self.http, &hub_url).await?;
        let socket_url = negotiated.socket_url(&hub_url)?;

        let (socket, _) = connect_async(socket_url.as_str()).await?;
        let (mut writer, mut reader) = socket.split();
        writer
            .send(Message::Text(encode(&HandshakeRequest::default())?))
            .await?;
        let leftover = read_handshake(&mut reader).await?;

        let shared = Arc::new(Shared {
            connection_id: negotiated.connection_id,
            state: RwLock::new(ConnectionState::Connected),
            handlers: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            writer: AsyncMutex::new(writer),
        });
        for record in &leftover {
            shared.dispatch(record);
        }

        let reader_task = tokio::spawn(read_loop(
            Arc::clone(&shared),
            reader,
            self.config.keep_alive(),
        ));

        Ok(WebSocketHubTransport {
            shared,
            reader_task: Mutex::new(Some(reader_task)),
            next_invocation: AtomicU64::new(0),
            invocation_timeout: self.config.invocation_timeout(),
        })
    }
}

#[async_trait]
impl HubConnector for WebSocketHubConnector {
    async fn connect(&self, endpoint: &str, hub: &str) -> Result<Arc<dyn HubTransport>, HubError> {
        let timeout = self.config.connect_timeout();
        let transport = tokio::time::timeout(timeout, self.open(endpoint, hub))
            .await
            .map_err(|_| HubError::Timeout(timeout))??;
        debug!(
            connection_id = %transport.shared.connection_id,
            endpoint,
            hub,
            "hub connection established"
        );
        Ok(Arc::new(transport))
    }
}

/// One negotiated WebSocket session with a hub
pub struct WebSocketHubTransport {
    shared: Arc<Shared>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    next_invocation: AtomicU64,
    invocation_timeout: Duration,
}

#[async_trait]
impl HubTransport for WebSocketHubTransport {
    fn connection_id(&self) -> String {
        self.shared.connection_id.clone()
    }

    fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    fn subscribe(&self, method: &str, handler: CallbackHandler) -> Result<(), HubError> {
        if self.state() == ConnectionState::Disconnected {
            return Err(HubError::Closed);
        }
        self.shared
            .handlers
            .write()
            .insert(method.to_lowercase(), handler);
        Ok(())
    }

    async fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<(), HubError> {
        if self.state() != ConnectionState::Connected {
            return Err(HubError::Closed);
        }

        let id = self.next_invocation.fetch_add(1, Ordering::Relaxed).to_string();
        let frame = encode(&InvocationMessage::new(Some(id.clone()), method, arguments))?;
        let (tx, rx) = oneshot::channel();
        self.shared
            .pending
            .lock()
            .insert(id.clone(), (method.to_string(), tx));

        if let Err(e) = self.shared.send(frame).await {
            self.shared.pending.lock().remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.invocation_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(HubError::Closed),
            Err(_) => {
                self.shared.pending.lock().remove(&id);
                Err(HubError::Timeout(self.invocation_timeout))
            }
        }
    }

    async fn close(&self) {
        let task = self.reader_task.lock().take();
        if let Some(task) = task {
            task.abort();
        }
        if let Err(e) = self.shared.writer.lock().await.close().await {
            debug!(error = %e, connection_id = %self.shared.connection_id, "socket close failed");
        }
        self.shared.shut();
    }
}

impl Drop for WebSocketHubTransport {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.get_mut().take() {
            task.abort();
        }
    }
}

/// State shared between a transport and its reader task
struct Shared {
    connection_id: String,
    state: RwLock<ConnectionState>,
    handlers: RwLock<HashMap<String, CallbackHandler>>,
    pending: Mutex<HashMap<String, (String, Completion)>>,
    writer: AsyncMutex<Writer>,
}

impl Shared {
    async fn send(&self, frame: String) -> Result<(), HubError> {
        self.writer.lock().await.send(Message::Text(frame)).await?;
        Ok(())
    }

    /// Handle one record; returns false once the hub has closed the session
    fn dispatch(&self, record: &str) -> bool {
        match HubMessage::parse(record) {
            Ok(HubMessage::Invocation {
                target,
                mut arguments,
                ..
            }) => {
                let handler = self.handlers.read().get(&target.to_lowercase()).cloned();
                match handler {
                    Some(handler) => {
                        let payload = if arguments.len() == 1 {
                            arguments.remove(0)
                        } else {
                            Value::Array(arguments)
                        };
                        // a panicking handler must not take the reader down with it
                        if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
                            warn!(
                                connection_id = %self.connection_id,
                                %target,
                                "callback handler panicked"
                            );
                        }
                    }
                    None => debug!(%target, "no handler registered for hub push"),
                }
                true
            }
            Ok(HubMessage::Completion {
                invocation_id,
                error,
                ..
            }) => {
                let waiter = self.pending.lock().remove(&invocation_id);
                if let Some((target, tx)) = waiter {
                    let outcome = match error {
                        Some(message) => Err(HubError::Rejected { target, message }),
                        None => Ok(()),
                    };
                    let _ = tx.send(outcome);
                }
                true
            }
            Ok(HubMessage::Close { error, .. }) => {
                info!(
                    connection_id = %self.connection_id,
                    error = error.as_deref().unwrap_or(""),
                    "hub closed connection"
                );
                false
            }
            Ok(HubMessage::Ping) | Ok(HubMessage::Other(_)) => true,
            Err(e) => {
                warn!(error = %e, connection_id = %self.connection_id, "dropping malformed hub record");
                true
            }
        }
    }

    fn shut(&self) {
        *self.state.write() = ConnectionState::Disconnected;
        let waiters: Vec<_> = self.pending.lock().drain().collect();
        for (_, (_, tx)) in waiters {
            let _ = tx.send(Err(HubError::Closed));
        }
    }
}

async fn read_handshake(reader: &mut Reader) -> Result<Vec<String>, HubError> {
    loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => {
                let mut parts = records(&text);
                let Some(first) = parts.next() else {
                    continue;
                };
                let response: HandshakeResponse = serde_json::from_str(first)?;
                if let Some(error) = response.error {
                    return Err(HubError::Handshake(error));
                }
                return Ok(parts.map(str::to_string).collect());
            }
            Some(Ok(Message::Close(_))) | None => return Err(HubError::Closed),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

async fn read_loop(shared: Arc<Shared>, mut reader: Reader, keep_alive: Duration) {
    let mut ping = tokio::time::interval(keep_alive);
    ping.tick().await;

    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if !records(&text).all(|record| shared.dispatch(record)) {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, connection_id = %shared.connection_id, "hub socket failed");
                    break;
                }
            },
            _ = ping.tick() => {
                let sent = match encode(&PingMessage::default()) {
                    Ok(frame) => shared.send(frame).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    warn!(error = %e, connection_id = %shared.connection_id, "keep-alive failed");
                    break;
                }
            }
        }
    }

    shared.shut();
}
