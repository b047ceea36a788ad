//! C1: immutable record describing one cluster node.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_NATIVE_PORT: u16 = 9042;
pub const DEFAULT_STORAGE_PORT: u16 = 7000;
pub const DEFAULT_SECURE_STORAGE_PORT: u16 = 7001;

/// Host identity: `(address, native port)`. Two `Host` values with the same
/// identity but different `status`/`last_seen` are the same host observed at
/// different times, never two distinct hosts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostId {
    pub address: IpAddr,
    pub native_port: u16,
}

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.native_port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostStatus {
    Up,
    Down,
    Unknown,
}

impl Default for HostStatus {
    fn default() -> Self {
        HostStatus::Unknown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub storage_port: u16,
    pub status: HostStatus,
    pub last_seen: chrono::DateTime<chrono::Utc>,
    pub datacenter: String,
    pub rack: String,
    pub version: String,
}

impl Host {
    pub fn new(address: IpAddr, native_port: u16) -> Self {
        Self {
            id: HostId {
                address,
                native_port,
            },
            storage_port: DEFAULT_STORAGE_PORT,
            status: HostStatus::Unknown,
            last_seen: chrono::Utc::now(),
            datacenter: String::new(),
            rack: String::new(),
            version: String::new(),
        }
    }

    pub fn address(&self) -> IpAddr {
        self.id.address
    }

    pub fn native_port(&self) -> u16 {
        self.id.native_port
    }

    pub fn is_up(&self) -> bool {
        self.status == HostStatus::Up
    }

    /// Whether `storage_port` matches the known secure-storage (SSL inter-node)
    /// default, used by the storage-port probe to annotate metadata.
    pub fn uses_secure_storage_default(&self) -> bool {
        self.storage_port == DEFAULT_SECURE_STORAGE_PORT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn host_identity_is_address_and_native_port() {
        let a = Host::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9042);
        let b = Host::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9042);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn distinct_ports_are_distinct_identities() {
        let a = Host::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9042);
        let b = Host::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9043);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn default_status_is_unknown() {
        let h = Host::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 9042);
        assert_eq!(h.status, HostStatus::Unknown);
        assert!(!h.is_up());
    }
}
