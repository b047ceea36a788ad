//! C9: bounded, timestamped, typed reconnection event log shared by the
//! connection monitor (C3) and the resilient client (C8).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::HostId;

pub const DEFAULT_CAPACITY: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconnectionEventType {
    ConnectionLost,
    AttemptStarted,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectionEvent {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub host: HostId,
    pub event_type: ReconnectionEventType,
    pub message: Option<String>,
    pub duration: Option<Duration>,
}

impl ReconnectionEvent {
    pub fn new(host: HostId, event_type: ReconnectionEventType) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            host,
            event_type,
            message: None,
            duration: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Thread-safe FIFO ring. Push is O(1) under a short-held lock; snapshot
/// returns a copy so iteration never blocks new pushes.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    ring: Mutex<VecDeque<ReconnectionEvent>>,
    overflow_count: AtomicU64,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            ring: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            overflow_count: AtomicU64::new(0),
        }
    }

    pub fn push(&self, event: ReconnectionEvent) {
        let mut ring = self.ring.lock().expect("event log mutex poisoned");
        if ring.len() >= self.capacity {
            ring.pop_front();
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
        }
        ring.push_back(event);
    }

    /// Iteration-safe snapshot, oldest first.
    pub fn snapshot(&self) -> Vec<ReconnectionEvent> {
        self.ring
            .lock()
            .expect("event log mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().expect("event log mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overflow_count(&self) -> u64 {
        self.overflow_count.load(Ordering::Relaxed)
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn host() -> HostId {
        HostId {
            address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            native_port: 9042,
        }
    }

    #[test]
    fn evicts_oldest_on_overflow() {
        let log = EventLog::new(1);
        log.push(ReconnectionEvent::new(host(), ReconnectionEventType::AttemptStarted));
        log.push(ReconnectionEvent::new(host(), ReconnectionEventType::Success));
        let snap = log.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].event_type, ReconnectionEventType::Success);
        assert_eq!(log.overflow_count(), 1);
    }

    #[test]
    fn capacity_one_retains_only_most_recent() {
        let log = EventLog::new(1);
        for _ in 0..10 {
            log.push(ReconnectionEvent::new(host(), ReconnectionEventType::Failed));
        }
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let log = EventLog::new(4);
        for _ in 0..100 {
            log.push(ReconnectionEvent::new(host(), ReconnectionEventType::Failed));
        }
        assert!(log.len() <= 4);
    }

    #[test]
    fn events_for_one_host_preserve_wall_clock_order() {
        let log = EventLog::new(10);
        log.push(ReconnectionEvent::new(host(), ReconnectionEventType::ConnectionLost));
        log.push(ReconnectionEvent::new(host(), ReconnectionEventType::AttemptStarted));
        log.push(ReconnectionEvent::new(host(), ReconnectionEventType::Success));
        let snap = log.snapshot();
        for pair in snap.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}
