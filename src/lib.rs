pub mod config;
pub mod error;
pub mod hub;
pub mod load;
pub mod telemetry;

pub use error::{HubError, LoadError};
