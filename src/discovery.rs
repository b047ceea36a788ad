//! C4: Cluster Discovery — uses the singleton session to enumerate peers
//! and produce an immutable `Topology` snapshot.

use std::sync::Arc;

use crate::driver::SessionHandle;
use crate::error::{Error, ErrorKind, Result};
use crate::host::HostStatus;
use crate::topology::Topology;

pub struct DiscoveryConfig {
    /// Fallback cluster name when the driver adapter cannot resolve one
    /// from `system.local` (see the note in `driver::ScyllaSessionHandle::discover_hosts`).
    pub fallback_cluster_name: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            fallback_cluster_name: "Unknown Cluster".to_string(),
        }
    }
}

/// Reads `system.local`/`system.peers` (via the driver adapter) and produces
/// an immutable snapshot. Hosts present in peers but unreachable are
/// included with `status = Down`. If discovery fails entirely, surfaces a
/// `DiscoveryError`; the orchestrator treats that as fatal for the tick.
pub async fn discover(session: &Arc<dyn SessionHandle>, config: &DiscoveryConfig) -> Result<Topology> {
    let (cluster_name, mut hosts) = session.discover_hosts().await.map_err(|e| {
        Error::from(ErrorKind::Discovery {
            message: format!("failed to read system.local/system.peers: {e}"),
        })
    })?;

    let cluster_name = if cluster_name.is_empty() {
        config.fallback_cluster_name.clone()
    } else {
        cluster_name
    };

    for host in &mut hosts {
        if host.status == HostStatus::Unknown {
            host.status = HostStatus::Down;
        }
    }

    Ok(Topology::new(cluster_name, hosts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ConsistencyLevel, QueryOutcome};
    use crate::host::Host;
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    struct FakeSession {
        cluster_name: String,
        hosts: Vec<Host>,
        fail: bool,
    }

    #[async_trait]
    impl SessionHandle for FakeSession {
        async fn execute_query(
            &self,
            _statement: &str,
            _consistency: ConsistencyLevel,
            _timeout: Duration,
            _tracing: bool,
        ) -> Result<QueryOutcome> {
            unimplemented!()
        }

        async fn execute_idempotent(
            &self,
            _statement: &str,
            _consistency: ConsistencyLevel,
            _timeout: Duration,
        ) -> Result<QueryOutcome> {
            unimplemented!()
        }

        async fn discover_hosts(&self) -> Result<(String, Vec<Host>)> {
            if self.fail {
                return Err(Error::from(ErrorKind::Discovery {
                    message: "boom".to_string(),
                }));
            }
            Ok((self.cluster_name.clone(), self.hosts.clone()))
        }
    }

    fn host(ip: u8) -> Host {
        Host::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, ip)), 9042)
    }

    #[tokio::test]
    async fn unknown_status_hosts_become_down() {
        let session: Arc<dyn SessionHandle> = Arc::new(FakeSession {
            cluster_name: "TestCluster".to_string(),
            hosts: vec![host(1)],
            fail: false,
        });
        let topology = discover(&session, &DiscoveryConfig::default()).await.unwrap();
        assert_eq!(topology.down_hosts(), 1);
    }

    #[tokio::test]
    async fn empty_cluster_name_falls_back() {
        let session: Arc<dyn SessionHandle> = Arc::new(FakeSession {
            cluster_name: String::new(),
            hosts: vec![],
            fail: false,
        });
        let topology = discover(&session, &DiscoveryConfig::default()).await.unwrap();
        assert_eq!(topology.cluster_name, "Unknown Cluster");
    }

    #[tokio::test]
    async fn discovery_failure_surfaces_discovery_error() {
        let session: Arc<dyn SessionHandle> = Arc::new(FakeSession {
            cluster_name: String::new(),
            hosts: vec![],
            fail: true,
        });
        let result = discover(&session, &DiscoveryConfig::default()).await;
        assert!(matches!(result.unwrap_err().kind(), ErrorKind::Discovery { .. }));
    }
}
