//! Diagnostic tracing for the deploy pipeline.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: command-level diagnostics via `RUST_LOG`,
//!   output to stderr. Ignored failures surface here as warnings.
//!
//! - **Progress output (`cli`)**: stage banners and the final message on
//!   stdout. Always printed, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=site_deploy=debug site-deploy --no-push
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
