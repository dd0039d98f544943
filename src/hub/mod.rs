//! Remote hub transport abstraction
//!
//! The load engine only talks to a hub through [`HubConnector`] and
//! [`HubTransport`]. The shipped implementation speaks the SignalR JSON hub
//! protocol over WebSocket (see [`websocket`]).
//!
//! # Architecture
//! - Negotiate over HTTP, then upgrade to WebSocket
//! - JSON records terminated by the `0x1E` record separator
//! - Invocation / Completion / Ping / Close message pattern

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::HubError;

pub mod negotiate;
pub mod protocol;
pub mod websocket;

pub use websocket::{WebSocketHubConnector, WebSocketHubTransport};

/// Handler invoked with the decoded payload of a server push
pub type CallbackHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Hub Connection State
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Opens transports to a hub
#[async_trait]
pub trait HubConnector: Send + Sync {
    /// Establish a live connection to `hub` at `endpoint`
    async fn connect(&self, endpoint: &str, hub: &str) -> Result<Arc<dyn HubTransport>, HubError>;
}

/// A single live connection to a hub
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Identifier assigned by the hub at connect time
    fn connection_id(&self) -> String;

    fn state(&self) -> ConnectionState;

    /// Deliver every push notification named `method` to `handler`
    fn subscribe(&self, method: &str, handler: CallbackHandler) -> Result<(), HubError>;

    /// Invoke a hub method; valid only while the connection is live
    async fn invoke(&self, method: &str, arguments: Vec<Value>) -> Result<(), HubError>;

    async fn close(&self);
}
