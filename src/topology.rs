//! Immutable cluster topology snapshot (C1/C4 data model).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::host::{Host, HostId, HostStatus};

/// Snapshot taken atomically from driver metadata. Replaced wholesale on
/// refresh; never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub cluster_name: String,
    hosts: Vec<Host>,
}

impl Topology {
    /// Builds a snapshot, enforcing the uniqueness invariant: no two hosts
    /// may share `(address, native_port)`. Later entries win on duplicate,
    /// matching the "most recently updated peer row wins" tie-break rule.
    pub fn new(cluster_name: impl Into<String>, hosts: Vec<Host>) -> Self {
        let mut by_id: HashMap<HostId, Host> = HashMap::with_capacity(hosts.len());
        for host in hosts {
            by_id.insert(host.id.clone(), host);
        }
        let mut hosts: Vec<Host> = by_id.into_values().collect();
        hosts.sort_by(|a, b| a.id.address.cmp(&b.id.address).then(a.id.native_port.cmp(&b.id.native_port)));

        Self {
            cluster_name: cluster_name.into(),
            hosts,
        }
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn total_hosts(&self) -> usize {
        self.hosts.len()
    }

    pub fn up_hosts(&self) -> usize {
        self.hosts.iter().filter(|h| h.is_up()).count()
    }

    pub fn down_hosts(&self) -> usize {
        self.hosts.iter().filter(|h| h.status == HostStatus::Down).count()
    }

    /// Datacenter → hosts mapping derived from the flat host list.
    pub fn datacenters(&self) -> HashMap<String, Vec<&Host>> {
        let mut map: HashMap<String, Vec<&Host>> = HashMap::new();
        for host in &self.hosts {
            map.entry(host.datacenter.clone()).or_default().push(host);
        }
        map
    }

    pub fn find(&self, id: &HostId) -> Option<&Host> {
        self.hosts.iter().find(|h| &h.id == id)
    }
}
