//! C3: Connection Monitor — subscribes to driver host-state transitions,
//! timestamps every transition, and exposes a sampled pool-status view plus
//! the bounded reconnection-event history (C9).
//!
//! The "event handler" here is simply a `tracing::event!` call plus an
//! append to the shared `EventLog`: there is exactly one internal consumer
//! of these events, so a pluggable handler hierarchy would add indirection
//! without a second caller to justify it.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::events::{EventLog, ReconnectionEvent, ReconnectionEventType};
use crate::host::HostId;

pub const CONNECTION_TRACING_TARGET: &str = "cassandra_probe::monitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
}

#[derive(Debug, Clone, Copy)]
struct HostConnectionRecord {
    state: ConnectionState,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStatus {
    pub total: usize,
    pub active: usize,
    pub failed: usize,
}

pub struct ConnectionMonitor {
    events: std::sync::Arc<EventLog>,
    hosts: Mutex<HashMap<HostId, HostConnectionRecord>>,
}

impl ConnectionMonitor {
    pub fn new(events: std::sync::Arc<EventLog>) -> Self {
        Self {
            events,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Records an initial `Disconnected` snapshot for every currently known
    /// host. Called once the cluster handle's metadata becomes available.
    pub fn register_hosts(&self, hosts: &[HostId]) {
        let mut map = self.hosts.lock().expect("monitor mutex poisoned");
        for host in hosts {
            map.entry(host.clone()).or_insert(HostConnectionRecord {
                state: ConnectionState::Disconnected,
            });
        }
    }

    /// Fired whenever a host transitions between `Connected`/`Disconnected`/
    /// `Reconnecting`. An unrecognized driver state is logged at `warn` and
    /// treated as `Disconnected` for counter purposes rather than dropped
    /// entirely or propagated as an error — losing one event beats aborting
    /// monitoring.
    pub fn on_state_changed(&self, host: HostId, new_state: ConnectionState) {
        let old_state = {
            let mut map = self.hosts.lock().expect("monitor mutex poisoned");
            let record = map.entry(host.clone()).or_insert(HostConnectionRecord {
                state: ConnectionState::Disconnected,
            });
            let old = record.state;
            record.state = new_state;
            old
        };

        tracing::debug!(
            target: CONNECTION_TRACING_TARGET,
            host = %host,
            old_state = ?old_state,
            new_state = ?new_state,
            "connection state changed",
        );

        let event_type = match new_state {
            ConnectionState::Connected => ReconnectionEventType::Success,
            ConnectionState::Disconnected => ReconnectionEventType::ConnectionLost,
            ConnectionState::Reconnecting => ReconnectionEventType::AttemptStarted,
        };
        self.events.push(ReconnectionEvent::new(host, event_type));
    }

    /// Treats an unrecognized driver-reported state as `Disconnected` for
    /// counting purposes rather than dropping it silently.
    pub fn on_unrecognized_state(&self, host: HostId, raw_state: &str) {
        tracing::warn!(
            target: CONNECTION_TRACING_TARGET,
            host = %host,
            raw_state,
            "driver emitted unrecognized connection state; treating as disconnected",
        );
        self.on_state_changed(host, ConnectionState::Disconnected);
    }

    /// Sampled view, cheap, no blocking.
    pub fn pool_status(&self) -> (PoolStatus, HashMap<HostId, ConnectionState>) {
        let map = self.hosts.lock().expect("monitor mutex poisoned");
        let mut status = PoolStatus::default();
        let mut reconnecting = HashMap::new();
        for (host, record) in map.iter() {
            status.total += 1;
            match record.state {
                ConnectionState::Connected => status.active += 1,
                ConnectionState::Disconnected => status.failed += 1,
                ConnectionState::Reconnecting => {
                    reconnecting.insert(host.clone(), record.state);
                }
            }
        }
        (status, reconnecting)
    }

    /// Iteration-safe snapshot of the bounded ring (C9).
    pub fn reconnection_history(&self) -> Vec<ReconnectionEvent> {
        self.events.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    fn host() -> HostId {
        HostId {
            address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            native_port: 9042,
        }
    }

    #[test]
    fn unrecognized_state_counts_as_disconnected() {
        let monitor = ConnectionMonitor::new(Arc::new(EventLog::new(10)));
        monitor.on_unrecognized_state(host(), "weird-state");
        let (status, _) = monitor.pool_status();
        assert_eq!(status.failed, 1);
        assert_eq!(status.active, 0);
    }

    #[test]
    fn pool_status_reflects_latest_transition() {
        let monitor = ConnectionMonitor::new(Arc::new(EventLog::new(10)));
        monitor.on_state_changed(host(), ConnectionState::Connected);
        let (status, _) = monitor.pool_status();
        assert_eq!(status.active, 1);
        monitor.on_state_changed(host(), ConnectionState::Disconnected);
        let (status, _) = monitor.pool_status();
        assert_eq!(status.active, 0);
        assert_eq!(status.failed, 1);
    }

    #[test]
    fn connection_lost_is_recorded_in_event_log() {
        let monitor = ConnectionMonitor::new(Arc::new(EventLog::new(10)));
        monitor.on_state_changed(host(), ConnectionState::Connected);
        monitor.on_state_changed(host(), ConnectionState::Disconnected);
        let history = monitor.reconnection_history();
        assert!(history
            .iter()
            .any(|e| e.event_type == ReconnectionEventType::ConnectionLost));
    }

    #[test]
    fn register_hosts_does_not_overwrite_known_state() {
        let monitor = ConnectionMonitor::new(Arc::new(EventLog::new(10)));
        monitor.on_state_changed(host(), ConnectionState::Connected);
        monitor.register_hosts(&[host()]);
        let (status, _) = monitor.pool_status();
        assert_eq!(status.active, 1);
    }
}
