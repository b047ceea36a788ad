//! C6: Orchestrator — per tick, refreshes topology and fans probes across
//! discovered hosts under bounded concurrency.
//!
//! The orchestrator never builds its own session or cluster; it always
//! borrows the singleton from `SessionManager`.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::discovery::{self, DiscoveryConfig};
use crate::driver::SessionHandle;
use crate::probe_session::ProbeSession;
use crate::probes::{Probe, ProbeContext, ProbeType};

/// A hard ceiling on concurrency regardless of how many host/probe-type
/// pairs a tick produces, independent of the configured cap.
pub const MAX_CONCURRENCY_CEILING: usize = 256;

pub struct OrchestratorConfig {
    pub probe_types: Vec<ProbeType>,
    pub concurrency: usize,
    pub discovery: DiscoveryConfig,
}

impl OrchestratorConfig {
    pub fn with_all_probes(concurrency: usize) -> Self {
        Self {
            probe_types: ProbeType::all().to_vec(),
            concurrency: concurrency.min(MAX_CONCURRENCY_CEILING).max(1),
            discovery: DiscoveryConfig::default(),
        }
    }
}

pub struct Orchestrator {
    probes: Vec<Arc<dyn Probe>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let mut probes: Vec<Arc<dyn Probe>> = Vec::new();
        for probe_type in &config.probe_types {
            probes.push(make_probe(*probe_type));
        }
        Self { probes, config }
    }

    /// Runs exactly one tick, producing exactly one `ProbeSession` record.
    pub async fn run_tick(
        &self,
        session: Arc<dyn SessionHandle>,
        context_template: ProbeContext,
        cancellation: CancellationToken,
    ) -> ProbeSession {
        let mut probe_session = ProbeSession::start();

        let topology = match discovery::discover(&session, &self.config.discovery).await {
            Ok(topology) => topology,
            Err(e) => {
                tracing::warn!(
                    target: "cassandra_probe::orchestrator",
                    error = %e,
                    "discovery failed; closing tick with empty results",
                );
                probe_session.failed = true;
                probe_session.close();
                return probe_session;
            }
        };

        let hosts = topology.hosts().to_vec();
        probe_session.topology = Some(topology);

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = tokio::task::JoinSet::new();

        'fanout: for host in hosts {
            for probe in &self.probes {
                if cancellation.is_cancelled() {
                    break 'fanout;
                }
                let permit_fut = semaphore.clone().acquire_owned();
                let permit = tokio::select! {
                    permit = permit_fut => match permit {
                        Ok(p) => p,
                        Err(_) => break 'fanout,
                    },
                    _ = cancellation.cancelled() => break 'fanout,
                };

                let probe = probe.clone();
                let host = host.clone();
                let mut context = context_template.clone();
                context.cancellation = cancellation.clone();

                tasks.spawn(async move {
                    let _permit = permit;
                    probe.execute(&host, &context).await
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => probe_session.results.push(result),
                Err(e) => {
                    tracing::error!(
                        target: "cassandra_probe::orchestrator",
                        error = %e,
                        "probe task panicked",
                    );
                }
            }
        }

        probe_session.close();
        tracing::info!(
            target: "cassandra_probe::orchestrator",
            summary = %probe_session.summary_line(),
            "tick completed",
        );
        probe_session
    }
}

fn make_probe(probe_type: ProbeType) -> Arc<dyn Probe> {
    match probe_type {
        ProbeType::Socket => Arc::new(crate::probes::socket::SocketProbe),
        ProbeType::Ping => Arc::new(crate::probes::ping::PingProbe),
        ProbeType::CqlQuery => Arc::new(crate::probes::cql::CqlQueryProbe),
        ProbeType::NativePort => Arc::new(crate::probes::native_port::NativePortProbe),
        ProbeType::StoragePort => Arc::new(crate::probes::storage_port::StoragePortProbe),
    }
}
