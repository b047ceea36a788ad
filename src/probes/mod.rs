//! C5: Probe Actions — five concrete probes behind a uniform contract.
//!
//! Polymorphic probes are expressed as a trait with one method, not an
//! inheritance hierarchy; the per-probe configuration lives in a small
//! tagged `ProbeType` enum.

pub mod cql;
pub mod native_port;
pub mod ping;
pub mod socket;
pub mod storage_port;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::driver::{ConsistencyLevel, SessionHandle};
use crate::host::Host;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeType {
    Socket,
    Ping,
    CqlQuery,
    NativePort,
    StoragePort,
}

impl ProbeType {
    pub fn all() -> [ProbeType; 5] {
        [
            ProbeType::Socket,
            ProbeType::Ping,
            ProbeType::CqlQuery,
            ProbeType::NativePort,
            ProbeType::StoragePort,
        ]
    }
}

impl std::fmt::Display for ProbeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProbeType::Socket => "Socket",
            ProbeType::Ping => "Ping",
            ProbeType::CqlQuery => "CqlQuery",
            ProbeType::NativePort => "NativePort",
            ProbeType::StoragePort => "StoragePort",
        };
        f.write_str(s)
    }
}

/// A single metadata value attached to a `ProbeResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Boolean(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub host: crate::host::HostId,
    pub probe_type: ProbeType,
    pub success: bool,
    pub duration: Duration,
    pub error_message: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub metadata: HashMap<String, MetadataValue>,
}

impl ProbeResult {
    pub fn success(host: crate::host::HostId, probe_type: ProbeType, duration: Duration) -> Self {
        Self {
            host,
            probe_type,
            success: true,
            duration,
            error_message: None,
            timestamp: chrono::Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn failure(
        host: crate::host::HostId,
        probe_type: ProbeType,
        duration: Duration,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            host,
            probe_type,
            success: false,
            duration,
            error_message: Some(error_message.into()),
            timestamp: chrono::Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `success ⇒ error_message is absent`, `¬success ⇒ error_message is present`.
    pub fn invariant_holds(&self) -> bool {
        self.success == self.error_message.is_none()
    }
}

/// Shared context every probe executes under.
#[derive(Clone)]
pub struct ProbeContext {
    pub session: Arc<dyn SessionHandle>,
    pub socket_timeout: Duration,
    pub query_timeout: Duration,
    pub test_query: String,
    pub consistency: ConsistencyLevel,
    pub tracing_enabled: bool,
    pub cancellation: CancellationToken,
}

#[async_trait]
pub trait Probe: Send + Sync {
    fn probe_type(&self) -> ProbeType;

    /// Executes this probe against `host`. Never throws: every failure is
    /// translated into a `ProbeResult` with `success = false`. Honors
    /// `context.cancellation` at every suspension point.
    async fn execute(&self, host: &Host, context: &ProbeContext) -> ProbeResult;
}

/// Times an async probe body, converting a `Result<(), String>` into a
/// `ProbeResult`. Shared by every concrete probe so elapsed time always
/// covers the whole attempt including internal retries.
pub(crate) async fn timed<F, Fut>(
    host: &Host,
    probe_type: ProbeType,
    body: F,
) -> ProbeResult
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<HashMap<String, MetadataValue>, String>>,
{
    let start = Instant::now();
    match body().await {
        Ok(metadata) => {
            let mut result = ProbeResult::success(host.id.clone(), probe_type, start.elapsed());
            result.metadata = metadata;
            result
        }
        Err(message) => ProbeResult::failure(host.id.clone(), probe_type, start.elapsed(), message),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn host_id() -> crate::host::HostId {
        crate::host::HostId {
            address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            native_port: 9042,
        }
    }

    #[test]
    fn success_implies_no_error_message() {
        let r = ProbeResult::success(host_id(), ProbeType::Socket, Duration::from_millis(1));
        assert!(r.invariant_holds());
    }

    #[test]
    fn failure_implies_error_message_present() {
        let r = ProbeResult::failure(host_id(), ProbeType::Socket, Duration::from_millis(1), "boom");
        assert!(r.invariant_holds());
    }

    #[test]
    fn duration_is_never_negative_by_construction() {
        let r = ProbeResult::success(host_id(), ProbeType::Ping, Duration::from_nanos(0));
        assert!(r.duration >= Duration::ZERO);
    }
}
