//! C8: Resilient client — an optional hardening layer in front of the
//! session manager, combining per-host circuit breakers, cluster-wide
//! operation-mode tracking, and retrying execute paths.

pub mod circuit_breaker;
pub mod client;
pub mod operation_mode;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use client::{HostState, ResilientClient, ResilientClientConfig};
pub use operation_mode::OperationMode;
