//! In-memory hub used by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use hub_load_simulator::hub::{CallbackHandler, ConnectionState, HubConnector, HubTransport};
use hub_load_simulator::HubError;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One recorded hub invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    pub connection_id: String,
    pub method: String,
    pub arguments: Vec<Value>,
    pub at: Instant,
}

/// Fake hub shared by every transport it hands out
#[derive(Default)]
pub struct FakeHub {
    next_id: AtomicUsize,
    attempts: AtomicUsize,
    closed: AtomicUsize,
    /// Refuse every n-th connection attempt (1-based)
    refuse_every: Option<usize>,
    connect_delay: Duration,
    /// Time the hub takes to complete each invocation
    invoke_delay: Duration,
    invocations: Mutex<Vec<Invocation>>,
    transports: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing_every(n: usize) -> Arc<Self> {
        Arc::new(Self {
            refuse_every: Some(n),
            ..Self::default()
        })
    }

    pub fn with_connect_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            connect_delay: delay,
            ..Self::default()
        })
    }

    pub fn with_invoke_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            invoke_delay: delay,
            ..Self::default()
        })
    }

    pub fn connector(self: &Arc<Self>) -> Arc<FakeConnector> {
        Arc::new(FakeConnector {
            hub: Arc::clone(self),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }

    pub fn transports(&self) -> Vec<Arc<FakeTransport>> {
        self.transports.lock().clone()
    }
}

pub struct FakeConnector {
    hub: Arc<FakeHub>,
}

#[async_trait]
impl HubConnector for FakeConnector {
    async fn connect(&self, _endpoint: &str, _hub: &str) -> Result<Arc<dyn HubTransport>, HubError> {
        let attempt = self.hub.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.hub.connect_delay.is_zero() {
            tokio::time::sleep(self.hub.connect_delay).await;
        }
        if let Some(n) = self.hub.refuse_every {
            if attempt % n == 0 {
                return Err(HubError::Handshake(format!("refused attempt {}", attempt)));
            }
        }

        let id = format!("conn-{}", self.hub.next_id.fetch_add(1, Ordering::SeqCst));
        let transport = Arc::new(FakeTransport {
            id,
            hub: Arc::clone(&self.hub),
            state: RwLock::new(ConnectionState::Connected),
            handlers: RwLock::new(HashMap::new()),
        });
        self.hub.transports.lock().push(Arc::clone(&transport));
        Ok(transport)
    }
}

pub struct FakeTransport {
    id: String,
    hub: Arc<FakeHub>,
    state: RwLock<ConnectionState>,
    handlers: RwLock<HashMap<String, CallbackHandler>>,
}

impl FakeTransport {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Simulate a server push; returns false when nobody listens
    pub fn push(&self, method: &str, payload: Value) -> bool {
        let handler = self.handlers.read().get(method).cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl HubTransport for FakeTransport {
    fn connection_id(&self) -> String {
        self.id.clone()
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn subscribe(&self, method: &str, handler: CallbackHandler) -> Result<(), HubError> {
        self.handlers.write().insert(method.to_string(), handler);
        Ok(())
    }

    async fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<(), HubError> {
        if self.state() != ConnectionState::Connected {
            return Err(HubError::Closed);
        }
        self.hub.invocations.lock().push(Invocation {
            connection_id: self.id.clone(),
            method: method.to_string(),
            arguments,
            at: Instant::now(),
        });
        if !self.hub.invoke_delay.is_zero() {
            tokio::time::sleep(self.hub.invoke_delay).await;
        }
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.write();
        if *state != ConnectionState::Disconnected {
            *state = ConnectionState::Disconnected;
            self.hub.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
