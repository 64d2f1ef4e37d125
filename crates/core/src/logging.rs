//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,vkroom=info";

/// Filter used when verbose output is requested.
const VERBOSE_FILTER: &str = "debug,winit=info,calloop=info";

/// Initialize the logging system with tracing.
///
/// `RUST_LOG` always wins. Without it, `verbose` selects between the
/// default and the debug filter.
///
/// # Example
/// ```
/// vkroom_core::init_logging(false);
/// tracing::info!("Viewer starting");
/// ```
pub fn init_logging(verbose: bool) {
    let fallback = if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second call (tests, doctests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
