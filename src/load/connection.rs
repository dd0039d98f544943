use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::params::resolve_parameters;
use super::signal::StopSignal;
use super::stats::RunStats;
use super::target::HubTarget;
use crate::error::LoadError;
use crate::hub::{CallbackHandler, ConnectionState, HubConnector, HubTransport};

/// Lifecycle of a connection once its transport is up
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionPhase {
    Live,
    Stopped,
}

/// Result of a single invocation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeOutcome {
    Sent,
    /// Stopped, or the transport was not live
    Skipped,
    Failed,
}

/// One simulated client: a hub transport plus its invocation loop
pub struct ClientConnection {
    id: String,
    transport: Arc<dyn HubTransport>,
    parameters: Vec<Value>,
    stop: StopSignal,
    stats: Arc<RunStats>,
    phase: RwLock<ConnectionPhase>,
    in_flight: TaskTracker,
}

impl ClientConnection {
    pub fn new(
        transport: Arc<dyn HubTransport>,
        parameters: Vec<Value>,
        stop: StopSignal,
        stats: Arc<RunStats>,
    ) -> Self {
        Self {
            id: transport.connection_id(),
            transport,
            parameters,
            stop,
            stats,
            phase: RwLock::new(ConnectionPhase::Live),
            in_flight: TaskTracker::new(),
        }
    }

    /// Open a transport, wire the callback and resolve this connection's arguments.
    ///
    /// Any failure after the transport is up closes it again before returning.
    pub async fn connect(
        connector: &dyn HubConnector,
        target: &HubTarget,
        stop: StopSignal,
        stats: Arc<RunStats>,
    ) -> Result<Self, LoadError> {
        let transport = connector
            .connect(&target.endpoint, &target.hub)
            .await
            .map_err(|source| LoadError::Connect {
                endpoint: target.endpoint.clone(),
                source,
            })?;
        let id = transport.connection_id();

        if let Some((method, handler)) = target.callback() {
            let handler = Arc::clone(handler);
            let counter = Arc::clone(&stats);
            let wired: CallbackHandler = Arc::new(move |payload| {
                counter.callback_received();
                handler(payload);
            });
            if let Err(source) = transport.subscribe(method, wired) {
                transport.close().await;
                return Err(LoadError::Callback {
                    method: method.to_string(),
                    source,
                });
            }
        }

        let parameters = match resolve_parameters(&target.parameters, &id) {
            Ok(parameters) => parameters,
            Err(e) => {
                transport.close().await;
                return Err(e);
            }
        };

        debug!(connection_id = %id, "connection created");
        Ok(Self::new(transport, parameters, stop, stats))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn is_live(&self) -> bool {
        self.transport.state() == ConnectionState::Connected
    }

    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.read()
    }

    /// Invoke `operation` once, unless stopped or the transport is down
    pub async fn invoke_once(&self, operation: &str) -> InvokeOutcome {
        if self.stop.is_stopped() || !self.is_live() {
            self.stats.invocation_skipped();
            return InvokeOutcome::Skipped;
        }

        debug!(connection_id = %self.id, operation, "invoking hub method");
        match self.transport.invoke(operation, self.parameters.clone()).await {
            Ok(()) => {
                self.stats.invocation_sent();
                InvokeOutcome::Sent
            }
            Err(source) => {
                self.stats.invocation_failed();
                let error = LoadError::Invocation {
                    operation: operation.to_string(),
                    source,
                };
                warn!(error = %error, connection_id = %self.id, "invocation failed");
                InvokeOutcome::Failed
            }
        }
    }

    /// Invoke every `interval` until the stop signal is observed.
    ///
    /// Each invocation runs as its own task, so a slow hub never stretches the
    /// cadence. On exit, outstanding invocations get at most one more interval
    /// to finish.
    pub async fn invoke_repeating(self: &Arc<Self>, operation: &str, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.stop.is_stopped() {
                break;
            }
            let connection = Arc::clone(self);
            let operation = operation.to_string();
            self.in_flight.spawn(async move {
                connection.invoke_once(&operation).await;
            });
            debug!(
                connection_id = %self.id,
                seconds = interval.as_secs(),
                "waiting before invoking again"
            );
        }

        self.in_flight.close();
        if tokio::time::timeout(interval, self.in_flight.wait()).await.is_err() {
            debug!(
                connection_id = %self.id,
                outstanding = self.in_flight.len(),
                "closing with invocations still outstanding"
            );
        }
    }

    /// Whole lifetime workload of the connection.
    ///
    /// With an interval the connection invokes repeatedly; without one it
    /// invokes once and idles. Either way the transport is closed once the
    /// stop signal is seen.
    pub async fn run(self: Arc<Self>, operation: String, interval: Option<Duration>) {
        match interval {
            Some(interval) => self.invoke_repeating(&operation, interval).await,
            None => {
                self.invoke_once(&operation).await;
                self.stop.stopped().await;
            }
        }
        self.close().await;
    }

    pub async fn close(&self) {
        *self.phase.write() = ConnectionPhase::Stopped;
        self.transport.close().await;
        debug!(connection_id = %self.id, "connection closed");
    }
}
