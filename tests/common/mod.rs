use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a test-scoped `tracing` subscriber once per process, controlled
/// by `RUST_LOG` the way the rest of the crate's logging is.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
