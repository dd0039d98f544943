use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::connection::ClientConnection;
use super::pool::ConnectionPool;
use super::profile::{validate_configuration, LoadProfile, NOT_CONFIGURED};
use super::signal::StopSignal;
use super::stats::{RunStats, StatsSnapshot};
use super::target::HubTarget;
use crate::error::LoadError;
use crate::hub::HubConnector;

/// Drives load tests against one configured hub target
pub struct LoadController {
    connector: Arc<dyn HubConnector>,
    target: RwLock<Option<Arc<HubTarget>>>,
    active: Mutex<Option<LoadRun>>,
}

impl LoadController {
    pub fn new(connector: Arc<dyn HubConnector>) -> Self {
        Self {
            connector,
            target: RwLock::new(None),
            active: Mutex::new(None),
        }
    }

    /// Set the hub target. Nothing touches the network until [`run`](Self::run).
    pub fn configure(&self, target: HubTarget) -> Result<(), LoadError> {
        let violations = target.callback_violations();
        if !violations.is_empty() {
            return Err(LoadError::invalid(violations));
        }

        debug!(
            endpoint = %target.endpoint,
            hub = %target.hub,
            method = %target.method,
            callback = ?target.callback_method,
            parameters = ?target.parameters,
            "load controller configured"
        );
        *self.target.write() = Some(Arc::new(target));
        Ok(())
    }

    pub fn validate(&self, profile: &LoadProfile) -> Result<(), LoadError> {
        let target = self.target.read().clone();
        validate_configuration(target.as_deref(), profile)
    }

    /// Validate and start a load test, returning as soon as it is scheduled.
    ///
    /// A run that is still active is stopped first.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run(&self, profile: LoadProfile) -> Result<LoadRun, LoadError> {
        let target = self.target.read().clone();
        if let Err(e) = validate_configuration(target.as_deref(), &profile) {
            warn!(error = %e, "load test rejected");
            return Err(e);
        }
        let target = target.ok_or_else(|| LoadError::invalid([NOT_CONFIGURED]))?;

        // one guard for the swap so concurrent runs cannot orphan each other
        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            previous.stop();
        }
        let run = LoadRun::start(Arc::clone(&self.connector), target, profile);
        *active = Some(run.clone());
        Ok(run)
    }

    /// Stop the active run, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        let active = self.active.lock().clone();
        if let Some(run) = active {
            run.stop();
        }
    }

    pub fn current_run(&self) -> Option<LoadRun> {
        self.active.lock().clone()
    }
}

/// Handle to one running load test
#[derive(Clone)]
pub struct LoadRun {
    inner: Arc<RunInner>,
}

struct RunInner {
    connector: Arc<dyn HubConnector>,
    target: Arc<HubTarget>,
    profile: LoadProfile,
    stop: StopSignal,
    pool: ConnectionPool,
    stats: Arc<RunStats>,
    tasks: TaskTracker,
    started_at: DateTime<Utc>,
}

impl std::fmt::Debug for LoadRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadRun")
            .field("started_at", &self.inner.started_at)
            .finish_non_exhaustive()
    }
}

impl LoadRun {
    fn start(connector: Arc<dyn HubConnector>, target: Arc<HubTarget>, profile: LoadProfile) -> Self {
        let run = Self {
            inner: Arc::new(RunInner {
                connector,
                target,
                profile,
                stop: StopSignal::new(),
                pool: ConnectionPool::new(),
                stats: Arc::new(RunStats::default()),
                tasks: TaskTracker::new(),
                started_at: Utc::now(),
            }),
        };

        info!(
            start_clients = profile.start_clients,
            max_clients = profile.max_clients,
            step_clients = profile.step_clients,
            step_interval_seconds = profile.step_interval_seconds,
            messaging_interval_seconds = profile.messaging_interval_seconds,
            duration_seconds = profile.duration_seconds,
            "starting load test"
        );

        run.inner.tasks.spawn(run.clone().ramp());
        run.inner.tasks.spawn(run.clone().expire());
        run.inner.tasks.close();
        run
    }

    pub fn profile(&self) -> &LoadProfile {
        &self.inner.profile
    }

    pub fn target(&self) -> &HubTarget {
        &self.inner.target
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn pool_size(&self) -> usize {
        self.inner.pool.len()
    }

    pub fn live_connections(&self) -> usize {
        self.inner.pool.live_count()
    }

    pub fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.inner.pool.snapshot()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.inner.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stop.is_stopped()
    }

    pub fn stop(&self) {
        if self.inner.stop.stop() {
            info!(pool_size = self.pool_size(), "load test stop requested");
        }
    }

    pub async fn stopped(&self) {
        self.inner.stop.stopped().await
    }

    /// Resolves once the ramp, the timer and every connection loop have exited
    pub async fn finished(&self) {
        self.inner.tasks.wait().await
    }

    async fn ramp(self) {
        let profile = self.inner.profile;
        let step = profile.step_clients as usize;
        let max = profile.max_clients as usize;

        info!(count = profile.start_clients, "creating initial connections");
        self.create_connections(profile.start_clients).await;

        while !self.is_stopped() && step > 0 && self.pool_size() + step <= max {
            debug!(
                seconds = profile.step_interval_seconds,
                "waiting before adding more connections"
            );
            tokio::time::sleep(profile.step_interval()).await;

            info!(count = step, pool_size = self.pool_size(), "creating step connections");
            self.create_connections(profile.step_clients).await;
        }

        info!(pool_size = self.pool_size(), "ramp finished");
    }

    async fn expire(self) {
        let duration = self.inner.profile.duration();
        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                if self.inner.stop.stop() {
                    info!(seconds = duration.as_secs(), pool_size = self.pool_size(), "load test duration elapsed");
                }
            }
            _ = self.inner.stop.stopped() => {}
        }
    }

    /// Open `count` connections concurrently and wait for all of them.
    ///
    /// A failed connection is logged and counted; its siblings carry on.
    async fn create_connections(&self, count: u32) {
        let mut batch = JoinSet::new();
        for _ in 0..count {
            let run = self.clone();
            batch.spawn(async move { run.create_connection().await });
        }

        while let Some(joined) = batch.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.inner.stats.connection_failed();
                    warn!(error = %e, "failed to create connection");
                }
                Err(e) => {
                    self.inner.stats.connection_failed();
                    warn!(error = %e, "connection task panicked");
                }
            }
        }
    }

    async fn create_connection(&self) -> Result<(), LoadError> {
        if self.is_stopped() {
            return Ok(());
        }

        let inner = &self.inner;
        let connection = ClientConnection::connect(
            inner.connector.as_ref(),
            &inner.target,
            inner.stop.clone(),
            Arc::clone(&inner.stats),
        )
        .await?;

        if self.is_stopped() {
            debug!(connection_id = %connection.id(), "stopped while connecting, discarding connection");
            connection.close().await;
            return Ok(());
        }

        let connection = Arc::new(connection);
        inner.pool.add(Arc::clone(&connection));
        inner.stats.connection_opened();
        inner.tasks.spawn(connection.run(
            inner.target.method.clone(),
            inner.profile.messaging_interval(),
        ));
        Ok(())
    }
}
