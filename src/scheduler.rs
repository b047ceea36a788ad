//! C7: Scheduler — drives the orchestrator on a fixed interval or cron
//! expression, enforces run/duration caps, and owns graceful shutdown.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cron::Schedule;
use tokio_util::sync::CancellationToken;

use crate::driver::ConnectOptions;
use crate::error::{Error, ErrorKind, Result};
use crate::orchestrator::Orchestrator;
use crate::probe_session::ProbeSession;
use crate::probes::ProbeContext;
use crate::session::SessionManager;

/// A tick's firing rule: a plain interval or a cron expression. If both are
/// configured, the interval wins and a warning is logged (an explicit
/// resolution of an otherwise-open ambiguity, kept here rather than pushed
/// onto callers).
pub enum Trigger {
    Interval(Duration),
    Cron(String),
}

pub struct SchedulerConfig {
    pub trigger: Trigger,
    pub max_duration: Option<Duration>,
    pub max_runs: Option<u64>,
    pub concurrent_execution_allowed: bool,
}

impl SchedulerConfig {
    /// Builds a `Trigger` from separately-sourced CLI fields, resolving the
    /// interval-vs-cron conflict in favor of the interval.
    pub fn resolve_trigger(interval: Option<Duration>, cron_expr: Option<String>) -> Result<Trigger> {
        match (interval, cron_expr) {
            (Some(interval), Some(_)) => {
                tracing::warn!(
                    target: "cassandra_probe::scheduler",
                    "both an interval and a cron expression were configured; interval wins",
                );
                Ok(Trigger::Interval(interval))
            }
            (Some(interval), None) => Ok(Trigger::Interval(interval)),
            (None, Some(expr)) => {
                Schedule::from_str(&expr).map_err(|e| {
                    Error::from(ErrorKind::Configuration {
                        message: format!("invalid cron expression {expr:?}: {e}"),
                    })
                })?;
                Ok(Trigger::Cron(expr))
            }
            (None, None) => Err(Error::from(ErrorKind::Configuration {
                message: "neither an interval nor a cron expression was configured".to_string(),
            })),
        }
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    orchestrator: Arc<Orchestrator>,
    session_manager: SessionManager,
    connect_options: ConnectOptions,
    context_template: ProbeContext,
    run_count: AtomicU64,
    in_flight: std::sync::atomic::AtomicBool,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        orchestrator: Arc<Orchestrator>,
        session_manager: SessionManager,
        connect_options: ConnectOptions,
        context_template: ProbeContext,
    ) -> Self {
        Self {
            config,
            orchestrator,
            session_manager,
            connect_options,
            context_template,
            run_count: AtomicU64::new(0),
            in_flight: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Drives ticks until a cap is hit or `shutdown` is triggered. Runs the
    /// first tick immediately; a cron schedule's own cadence governs
    /// subsequent fires.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<Vec<ProbeSession>> {
        let started_at = tokio::time::Instant::now();
        let mut sessions = Vec::new();

        let mut next_fire: Option<tokio::time::Instant> = Some(tokio::time::Instant::now());

        loop {
            if shutdown.is_cancelled() {
                break;
            }
            if let Some(max_runs) = self.config.max_runs {
                if self.run_count.load(Ordering::SeqCst) >= max_runs {
                    break;
                }
            }
            if let Some(max_duration) = self.config.max_duration {
                if self.run_count.load(Ordering::SeqCst) > 0 && started_at.elapsed() >= max_duration {
                    break;
                }
            }

            let target = match next_fire.take() {
                Some(instant) => instant,
                None => self.next_fire_instant(),
            };

            tokio::select! {
                _ = tokio::time::sleep_until(target) => {}
                _ = shutdown.cancelled() => break,
            }

            if !self.config.concurrent_execution_allowed
                && self.in_flight.swap(true, Ordering::SeqCst)
            {
                tracing::warn!(
                    target: "cassandra_probe::scheduler",
                    "previous tick still in flight; dropping this fire",
                );
                continue;
            }

            let session = match self.session_manager.get_session(self.connect_options.clone()).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::error!(
                        target: "cassandra_probe::scheduler",
                        error = %e,
                        "failed to acquire session for this tick",
                    );
                    self.in_flight.store(false, Ordering::SeqCst);
                    continue;
                }
            };

            let probe_session = self
                .orchestrator
                .run_tick(session, self.context_template.clone(), shutdown.clone())
                .await;
            tracing::info!(
                target: "cassandra_probe::scheduler",
                summary = %probe_session.summary_line(),
                "scheduled tick finished",
            );
            sessions.push(probe_session);
            self.run_count.fetch_add(1, Ordering::SeqCst);
            self.in_flight.store(false, Ordering::SeqCst);
        }

        self.session_manager.close().await;
        Ok(sessions)
    }

    fn next_fire_instant(&self) -> tokio::time::Instant {
        match &self.config.trigger {
            Trigger::Interval(interval) => tokio::time::Instant::now() + *interval,
            Trigger::Cron(expr) => {
                let schedule = Schedule::from_str(expr).expect("validated at construction");
                let now = chrono::Utc::now();
                match schedule.after(&now).next() {
                    Some(next) => {
                        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
                        tokio::time::Instant::now() + delay
                    }
                    None => tokio::time::Instant::now() + Duration::from_secs(60),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_wins_over_cron_when_both_configured() {
        let trigger = SchedulerConfig::resolve_trigger(
            Some(Duration::from_secs(5)),
            Some("0 * * * * *".to_string()),
        )
        .unwrap();
        assert!(matches!(trigger, Trigger::Interval(d) if d == Duration::from_secs(5)));
    }

    #[test]
    fn invalid_cron_expression_is_a_configuration_error() {
        let result = SchedulerConfig::resolve_trigger(None, Some("not a cron expr".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn valid_cron_expression_is_accepted() {
        let result = SchedulerConfig::resolve_trigger(None, Some("0 * * * * *".to_string()));
        assert!(result.is_ok());
    }

    #[test]
    fn neither_interval_nor_cron_is_a_configuration_error() {
        let result = SchedulerConfig::resolve_trigger(None, None);
        assert!(result.is_err());
    }
}
