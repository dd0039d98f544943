use std::time::Duration;
use thiserror::Error;

/// Failures raised by a hub transport
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Invalid hub address: {0}")]
    InvalidAddress(String),

    #[error("Negotiation with {url} failed: {reason}")]
    Negotiate { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Hub rejected handshake: {0}")]
    Handshake(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Hub rejected invocation of '{target}': {message}")]
    Rejected { target: String, message: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection is closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors produced by the load engine.
///
/// Only `InvalidConfiguration` ever reaches the caller of a run; the other
/// variants are logged where they occur and the load test carries on.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Invalid load test configuration:\n{0}")]
    InvalidConfiguration(String),

    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: HubError,
    },

    #[error("Failed to register callback '{method}': {source}")]
    Callback {
        method: String,
        #[source]
        source: HubError,
    },

    #[error("Parameter template {index} is not valid JSON: {source}")]
    Parameter {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invocation of '{operation}' failed: {source}")]
    Invocation {
        operation: String,
        #[source]
        source: HubError,
    },
}

impl LoadError {
    /// Build an `InvalidConfiguration` error from a list of violated constraints
    pub fn invalid<I, S>(violations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let message = violations
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        LoadError::InvalidConfiguration(message)
    }
}
