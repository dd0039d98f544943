use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::target::HubTarget;
use crate::error::LoadError;

pub(crate) const NOT_CONFIGURED: &str = "Configure should be called before starting a load test";
pub(crate) const START_TOO_LOW: &str =
    "Starting number of client connections cannot be less than 1";
pub(crate) const MAX_TOO_LOW: &str = "Maximum number of client connections cannot be less than 1";
pub(crate) const MAX_BELOW_START: &str =
    "Maximum number of client connections cannot be less than starting number";
pub(crate) const STEP_INTERVAL_TOO_SHORT: &str =
    "Step time to increase client connections cannot be less than 2 seconds";
pub(crate) const DURATION_TOO_SHORT: &str = "Load test duration cannot be less than 10 seconds";

pub const MIN_STEP_INTERVAL_SECONDS: u64 = 2;
pub const MIN_DURATION_SECONDS: u64 = 10;

/// How connections ramp up and how long the test runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProfile {
    /// Connections opened in the initial batch
    pub start_clients: u32,
    /// Upper bound on connections in the pool
    pub max_clients: u32,
    /// Connections added per step; 0 disables stepping
    pub step_clients: u32,
    pub step_interval_seconds: u64,
    /// Seconds between invocations on each connection; 0 invokes once
    pub messaging_interval_seconds: u64,
    pub duration_seconds: u64,
}

impl LoadProfile {
    pub fn step_interval(&self) -> Duration {
        Duration::from_secs(self.step_interval_seconds)
    }

    /// `None` means every connection invokes exactly once
    pub fn messaging_interval(&self) -> Option<Duration> {
        (self.messaging_interval_seconds > 0)
            .then(|| Duration::from_secs(self.messaging_interval_seconds))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }

    /// Every violated bound, in a stable order
    pub fn violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();
        if self.start_clients < 1 {
            violations.push(START_TOO_LOW);
        }
        if self.max_clients < 1 {
            violations.push(MAX_TOO_LOW);
        }
        if self.max_clients < self.start_clients {
            violations.push(MAX_BELOW_START);
        }
        if self.step_interval_seconds < MIN_STEP_INTERVAL_SECONDS {
            violations.push(STEP_INTERVAL_TOO_SHORT);
        }
        if self.duration_seconds < MIN_DURATION_SECONDS {
            violations.push(DURATION_TOO_SHORT);
        }
        violations
    }
}

/// Check a target and profile together, reporting every violation at once
pub fn validate_configuration(target: Option<&HubTarget>, profile: &LoadProfile) -> Result<(), LoadError> {
    let mut violations = Vec::new();
    match target {
        Some(target) => {
            if !target.is_complete() {
                violations.push(NOT_CONFIGURED);
            }
            violations.extend(target.callback_violations());
        }
        None => violations.push(NOT_CONFIGURED),
    }
    violations.extend(profile.violations());

    if violations.is_empty() {
        Ok(())
    } else {
        Err(LoadError::invalid(violations))
    }
}
