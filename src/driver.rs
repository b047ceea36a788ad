//! Thin adapter over the underlying CQL driver (the `scylla` crate).
//!
//! Exposes exactly the capabilities the probe runtime needs and nothing
//! more; nothing above this module is allowed to reach into `scylla`
//! directly, only through `SessionHandle`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use scylla::frame::types::Consistency as ScyllaConsistency;
use scylla::transport::session::Session as ScyllaSession;
use scylla::QueryResult;
use scylla::SessionBuilder;

use crate::error::{Error, ErrorKind, Result};
use crate::host::{Host, HostStatus};

/// Consistency level, mapped 1:1 from the string forms accepted on the CLI
/// surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

impl ConsistencyLevel {
    /// Unknown strings fall back to `One` with a warning.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "ANY" => ConsistencyLevel::Any,
            "ONE" => ConsistencyLevel::One,
            "TWO" => ConsistencyLevel::Two,
            "THREE" => ConsistencyLevel::Three,
            "QUORUM" => ConsistencyLevel::Quorum,
            "ALL" => ConsistencyLevel::All,
            "LOCAL_QUORUM" => ConsistencyLevel::LocalQuorum,
            "EACH_QUORUM" => ConsistencyLevel::EachQuorum,
            "LOCAL_ONE" => ConsistencyLevel::LocalOne,
            other => {
                tracing::warn!(value = other, "unknown consistency level, defaulting to ONE");
                ConsistencyLevel::One
            }
        }
    }

    pub fn canonical_str(self) -> &'static str {
        match self {
            ConsistencyLevel::Any => "ANY",
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::Two => "TWO",
            ConsistencyLevel::Three => "THREE",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::All => "ALL",
            ConsistencyLevel::LocalQuorum => "LOCAL_QUORUM",
            ConsistencyLevel::EachQuorum => "EACH_QUORUM",
            ConsistencyLevel::LocalOne => "LOCAL_ONE",
        }
    }
}

impl From<ConsistencyLevel> for ScyllaConsistency {
    fn from(level: ConsistencyLevel) -> Self {
        match level {
            ConsistencyLevel::Any => ScyllaConsistency::Any,
            ConsistencyLevel::One => ScyllaConsistency::One,
            ConsistencyLevel::Two => ScyllaConsistency::Two,
            ConsistencyLevel::Three => ScyllaConsistency::Three,
            ConsistencyLevel::Quorum => ScyllaConsistency::Quorum,
            ConsistencyLevel::All => ScyllaConsistency::All,
            ConsistencyLevel::LocalQuorum => ScyllaConsistency::LocalQuorum,
            ConsistencyLevel::EachQuorum => ScyllaConsistency::EachQuorum,
            ConsistencyLevel::LocalOne => ScyllaConsistency::LocalOne,
        }
    }
}

/// Connection options needed to build the one cluster handle.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub contact_points: Vec<SocketAddr>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    pub tls: bool,
}

/// A single driver-reported row, opaque to everything except metadata
/// extraction the probes need (row count, trace id, coordinator).
pub struct QueryOutcome {
    pub row_count: usize,
    pub tracing_id: Option<uuid::Uuid>,
    pub coordinator: Option<SocketAddr>,
}

/// The capabilities the probe runtime needs from a live session, and
/// nothing more.
#[async_trait::async_trait]
pub trait SessionHandle: Send + Sync {
    async fn execute_query(
        &self,
        statement: &str,
        consistency: ConsistencyLevel,
        timeout: Duration,
        tracing: bool,
    ) -> Result<QueryOutcome>;

    /// Reads `system.local`/`system.peers` and the driver's per-host status.
    async fn discover_hosts(&self) -> Result<(String, Vec<Host>)>;

    /// Enables speculative execution across multiple hosts for idempotent
    /// statements.
    async fn execute_idempotent(
        &self,
        statement: &str,
        consistency: ConsistencyLevel,
        timeout: Duration,
    ) -> Result<QueryOutcome>;
}

pub struct ScyllaSessionHandle {
    inner: Arc<ScyllaSession>,
}

impl ScyllaSessionHandle {
    pub async fn connect(options: &ConnectOptions) -> Result<Self> {
        let mut builder = SessionBuilder::new()
            .known_nodes(options.contact_points.iter().map(|a| a.to_string()))
            .connection_timeout(options.connect_timeout);

        if let (Some(user), Some(pass)) = (&options.username, &options.password) {
            builder = builder.user(user, pass);
        }

        let session = builder.build().await.map_err(|e| {
            Error::from(ErrorKind::Connection {
                contact_points: options.contact_points.iter().map(|a| a.to_string()).collect(),
                message: e.to_string(),
            })
        })?;

        Ok(Self {
            inner: Arc::new(session),
        })
    }
}

#[async_trait::async_trait]
impl SessionHandle for ScyllaSessionHandle {
    async fn execute_query(
        &self,
        statement: &str,
        consistency: ConsistencyLevel,
        timeout: Duration,
        tracing: bool,
    ) -> Result<QueryOutcome> {
        let mut query = scylla::query::Query::new(statement.to_string());
        query.set_consistency(consistency.into());
        query.set_tracing(tracing);

        let result = tokio::time::timeout(timeout, self.inner.query(query, &[]))
            .await
            .map_err(|_| {
                Error::from(ErrorKind::Timeout {
                    elapsed_ms: timeout.as_millis() as u64,
                })
            })?
            .map_err(|e| classify_query_error(e))?;

        Ok(outcome_from_result(&result))
    }

    async fn execute_idempotent(
        &self,
        statement: &str,
        consistency: ConsistencyLevel,
        timeout: Duration,
    ) -> Result<QueryOutcome> {
        let mut query = scylla::query::Query::new(statement.to_string());
        query.set_consistency(consistency.into());
        query.set_is_idempotent(true);

        let result = tokio::time::timeout(timeout, self.inner.query(query, &[]))
            .await
            .map_err(|_| {
                Error::from(ErrorKind::Timeout {
                    elapsed_ms: timeout.as_millis() as u64,
                })
            })?
            .map_err(|e| classify_query_error(e))?;

        Ok(outcome_from_result(&result))
    }

    async fn discover_hosts(&self) -> Result<(String, Vec<Host>)> {
        let cluster_data = self.inner.get_cluster_data();
        let mut hosts = Vec::new();
        for node in cluster_data.get_nodes_info() {
            let mut host = Host::new(node.address.ip(), node.address.port());
            host.status = if node.is_connected() {
                HostStatus::Up
            } else {
                HostStatus::Down
            };
            host.datacenter = node.datacenter.clone().unwrap_or_default();
            host.rack = node.rack.clone().unwrap_or_default();
            hosts.push(host);
        }

        // `scylla` does not expose the cluster name directly on
        // `ClusterData`; it is read from `system.local` via a side query by
        // the discovery component (see `discovery.rs`), which is why this
        // adapter returns an empty name here and lets the caller fill it in.
        Ok((String::new(), hosts))
    }
}

fn outcome_from_result(result: &QueryResult) -> QueryOutcome {
    QueryOutcome {
        row_count: result.rows.as_ref().map(|rows| rows.len()).unwrap_or(0),
        tracing_id: result.tracing_id,
        coordinator: None,
    }
}

fn classify_query_error(err: scylla::transport::errors::QueryError) -> Error {
    use scylla::transport::errors::QueryError;

    let message = err.to_string();
    match err {
        QueryError::DbError(db_err, _) => {
            use scylla::transport::errors::DbError;
            match db_err {
                DbError::AuthenticationError => ErrorKind::Authentication { message },
                DbError::Unauthorized => ErrorKind::Authorization { message },
                DbError::SyntaxError | DbError::Invalid => ErrorKind::Validation { message },
                _ => ErrorKind::Query { message },
            }
        }
        QueryError::RequestTimeout(_) | QueryError::TimeoutError => ErrorKind::Timeout { elapsed_ms: 0 },
        QueryError::IoError(_) => ErrorKind::TransientIo {
            address: "0.0.0.0:0".parse().expect("static addr"),
            message,
        },
        QueryError::NoStreamIdAvailable | QueryError::AllHostsUsed(_) => {
            ErrorKind::NoHostAvailable { message }
        }
        _ => ErrorKind::Query { message },
    }
    .into()
}
