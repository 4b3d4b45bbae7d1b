//! Tracing subscriber initialization for embedding applications.

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `fallback_filter` (e.g. "info")
/// applies. Safe to call once per process; subsequent calls are no-ops.
pub fn init_tracing(fallback_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback_filter)),
        )
        .with_target(false)
        .try_init();
}
