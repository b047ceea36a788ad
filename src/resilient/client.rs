//! C8: Resilient client — wraps the session manager with host-state
//! polling, circuit breakers, operation-mode tracking, and retrying
//! execute paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::circuit_breaker::{CircuitBreaker, CircuitState};
use super::operation_mode::OperationMode;
use crate::driver::{ConnectOptions, ConsistencyLevel, QueryOutcome, SessionHandle};
use crate::error::{Error, ErrorKind, Result};
use crate::host::HostId;
use crate::session::SessionManager;

const DEFAULT_HOST_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_POOL_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
const RECREATION_FAILURE_THRESHOLD: u32 = 3;
const RETRY_BACKOFFS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

#[derive(Debug, Clone)]
pub struct HostState {
    pub is_up: bool,
    pub consecutive_failures: u32,
    pub last_state_change: chrono::DateTime<chrono::Utc>,
    pub last_health_check: Option<chrono::DateTime<chrono::Utc>>,
    pub last_health_check_duration: Option<Duration>,
}

impl HostState {
    fn new() -> Self {
        Self {
            is_up: false,
            consecutive_failures: 0,
            last_state_change: chrono::Utc::now(),
            last_health_check: None,
            last_health_check_duration: None,
        }
    }
}

pub struct ResilientClientConfig {
    pub health_check_query: String,
    pub consistency: ConsistencyLevel,
    pub host_poll_interval: Duration,
    pub pool_refresh_interval: Duration,
    pub health_check_interval: Duration,
}

impl Default for ResilientClientConfig {
    fn default() -> Self {
        Self {
            health_check_query: "SELECT now() FROM system.local".to_string(),
            consistency: ConsistencyLevel::One,
            host_poll_interval: DEFAULT_HOST_POLL_INTERVAL,
            pool_refresh_interval: DEFAULT_POOL_REFRESH_INTERVAL,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
        }
    }
}

/// Wraps a `SessionManager`, adding the timers and retry/circuit-breaking
/// machinery an always-on diagnostic runtime needs around an otherwise
/// bare driver session.
pub struct ResilientClient {
    session_manager: SessionManager,
    connect_options: ConnectOptions,
    config: ResilientClientConfig,
    host_states: Arc<RwLock<HashMap<HostId, HostState>>>,
    breakers: Arc<RwLock<HashMap<HostId, Arc<CircuitBreaker>>>>,
    operation_mode: Arc<RwLock<OperationMode>>,
}

impl ResilientClient {
    pub fn new(
        session_manager: SessionManager,
        connect_options: ConnectOptions,
        config: ResilientClientConfig,
    ) -> Self {
        Self {
            session_manager,
            connect_options,
            config,
            host_states: Arc::new(RwLock::new(HashMap::new())),
            breakers: Arc::new(RwLock::new(HashMap::new())),
            operation_mode: Arc::new(RwLock::new(OperationMode::Emergency)),
        }
    }

    pub async fn operation_mode(&self) -> OperationMode {
        *self.operation_mode.read().await
    }

    pub async fn is_healthy(&self) -> bool {
        !matches!(self.operation_mode().await, OperationMode::Emergency)
    }

    /// Spawns the three mandatory background timers. Host-state polling
    /// runs even when the underlying driver also delivers connection
    /// callbacks, since callback delivery is not assumed reliable enough on
    /// its own to drive operation mode.
    pub fn spawn_timers(self: &Arc<Self>, shutdown: CancellationToken) {
        let this = self.clone();
        let token = shutdown.clone();
        tokio::spawn(async move { this.run_host_poll_loop(token).await });

        let this = self.clone();
        let token = shutdown.clone();
        tokio::spawn(async move { this.run_pool_refresh_loop(token).await });

        let this = self.clone();
        tokio::spawn(async move { this.run_health_check_loop(shutdown).await });
    }

    async fn run_host_poll_loop(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.host_poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.cancelled() => return,
            }
            if let Some(session) = self.session_manager.current().await {
                self.poll_hosts(&session).await;
            }
        }
    }

    async fn run_pool_refresh_loop(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.pool_refresh_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.cancelled() => return,
            }
            if let Some(session) = self.session_manager.current().await {
                if let Err(e) = session.discover_hosts().await {
                    tracing::warn!(
                        target: "cassandra_probe::resilient",
                        error = %e,
                        "pool refresh failed",
                    );
                }
            }
        }
    }

    async fn run_health_check_loop(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.health_check_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.cancelled() => return,
            }
            self.run_health_check().await;
        }
    }

    async fn poll_hosts(&self, session: &Arc<dyn SessionHandle>) {
        match session.discover_hosts().await {
            Ok((_name, hosts)) => {
                let mut states = self.host_states.write().await;
                for host in &hosts {
                    let entry = states.entry(host.id.clone()).or_insert_with(HostState::new);
                    if entry.is_up != host.is_up() {
                        entry.is_up = host.is_up();
                        entry.last_state_change = chrono::Utc::now();
                    }
                }
                let up = hosts.iter().filter(|h| h.is_up()).count();
                let total = hosts.len();
                *self.operation_mode.write().await = OperationMode::from_host_counts(up, total);
            }
            Err(e) => {
                tracing::warn!(
                    target: "cassandra_probe::resilient",
                    error = %e,
                    "host-state poll failed",
                );
            }
        }
    }

    async fn run_health_check(&self) {
        let start = std::time::Instant::now();
        let session = match self.session_manager.current().await {
            Some(session) => session,
            None => return,
        };

        let outcome = session
            .execute_query(
                &self.config.health_check_query,
                self.config.consistency,
                self.config.health_check_interval,
                false,
            )
            .await;

        let duration = start.elapsed();
        let mut consecutive_failures = 0;
        {
            let mut states = self.host_states.write().await;
            for state in states.values_mut() {
                state.last_health_check = Some(chrono::Utc::now());
                state.last_health_check_duration = Some(duration);
                match &outcome {
                    Ok(_) => state.consecutive_failures = 0,
                    Err(_) => state.consecutive_failures += 1,
                }
                consecutive_failures = consecutive_failures.max(state.consecutive_failures);
            }
        }

        if outcome.is_err() && consecutive_failures >= RECREATION_FAILURE_THRESHOLD {
            tracing::warn!(
                target: "cassandra_probe::resilient",
                consecutive_failures,
                "health check failure ceiling reached; recreating session",
            );
            if let Err(e) = self.session_manager.recreate(self.connect_options.clone()).await {
                tracing::error!(
                    target: "cassandra_probe::resilient",
                    error = %e,
                    "session recreation failed",
                );
            }
        }
    }

    async fn breaker_for(&self, host: &HostId) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(host) {
            return breaker.clone();
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(host.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new()))
            .clone()
    }

    /// Executes `statement` with circuit-fail-fast and retry/backoff. The
    /// breaker consulted is keyed by the first contact point, since the
    /// underlying driver — not this client — picks the coordinator for a
    /// non-idempotent statement.
    pub async fn execute(
        &self,
        statement: &str,
        consistency: ConsistencyLevel,
        timeout: Duration,
    ) -> Result<QueryOutcome> {
        let host = self.primary_host_id();
        let breaker = self.breaker_for(&host).await;

        if !breaker.is_call_permitted() {
            return Err(Error::from(ErrorKind::CircuitOpen {
                address: self.connect_options.contact_points.first().copied().unwrap_or_else(|| {
                    "0.0.0.0:0".parse().expect("static addr")
                }),
                retry_after_ms: 0,
            }));
        }

        let session = self.current_session().await?;

        let mut last_error = None;
        for (attempt, backoff) in std::iter::once(Duration::ZERO)
            .chain(RETRY_BACKOFFS.into_iter())
            .enumerate()
        {
            if attempt > 0 {
                tokio::time::sleep(backoff).await;
            }
            match session.execute_query(statement, consistency, timeout, false).await {
                Ok(outcome) => {
                    breaker.record_success();
                    return Ok(outcome);
                }
                Err(e) => {
                    let transient = e.is_transient();
                    last_error = Some(e);
                    if !transient {
                        break;
                    }
                }
            }
        }

        breaker.record_failure();
        Err(last_error.unwrap_or_else(|| {
            Error::from(ErrorKind::Query {
                message: "execute failed with no recorded error".to_string(),
            })
        }))
    }

    /// Idempotent path: same retry policy, but lets the driver speculate
    /// across multiple hosts since replaying the statement is always safe.
    pub async fn execute_idempotent(
        &self,
        statement: &str,
        consistency: ConsistencyLevel,
        timeout: Duration,
    ) -> Result<QueryOutcome> {
        let host = self.primary_host_id();
        let breaker = self.breaker_for(&host).await;

        if !breaker.is_call_permitted() {
            return Err(Error::from(ErrorKind::CircuitOpen {
                address: self.connect_options.contact_points.first().copied().unwrap_or_else(|| {
                    "0.0.0.0:0".parse().expect("static addr")
                }),
                retry_after_ms: 0,
            }));
        }

        let session = self.current_session().await?;

        match session.execute_idempotent(statement, consistency, timeout).await {
            Ok(outcome) => {
                breaker.record_success();
                Ok(outcome)
            }
            Err(e) => {
                breaker.record_failure();
                Err(e)
            }
        }
    }

    async fn current_session(&self) -> Result<Arc<dyn SessionHandle>> {
        match self.session_manager.current().await {
            Some(session) => Ok(session),
            None => self.session_manager.get_session(self.connect_options.clone()).await,
        }
    }

    fn primary_host_id(&self) -> HostId {
        let addr = self
            .connect_options
            .contact_points
            .first()
            .copied()
            .unwrap_or_else(|| "0.0.0.0:0".parse().expect("static addr"));
        HostId {
            address: addr.ip(),
            native_port: addr.port(),
        }
    }

    pub async fn host_states(&self) -> HashMap<HostId, HostState> {
        self.host_states.read().await.clone()
    }
}
