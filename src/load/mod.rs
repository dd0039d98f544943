//! Load ramping and per-connection invocation engine
//!
//! A [`LoadController`] validates a [`HubTarget`] and [`LoadProfile`], then a
//! [`LoadRun`] opens connections in batches, lets each one invoke the hub on
//! its own clock and tears everything down once its [`StopSignal`] is set.

pub mod connection;
pub mod controller;
pub mod params;
pub mod pool;
pub mod profile;
pub mod signal;
pub mod stats;
pub mod target;

pub use connection::{ClientConnection, ConnectionPhase, InvokeOutcome};
pub use controller::{LoadController, LoadRun};
pub use params::{resolve_parameters, CONNECTION_ID_TOKEN};
pub use pool::ConnectionPool;
pub use profile::{validate_configuration, LoadProfile};
pub use signal::StopSignal;
pub use stats::{RunStats, StatsSnapshot};
pub use target::HubTarget;
