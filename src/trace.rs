//! Tracing hooks for the ring buffer.
//!
//! Enable with `--features tracing`. Without the feature every macro below
//! expands to nothing, so the crate carries no logging cost at all. Only
//! cold paths (construction, role acquisition and release, wait timeouts)
//! are instrumented; `enqueue` and `dequeue` never log.

/// Installs a formatting subscriber for the `spsc_ring` targets.
///
/// The filter is taken from `RUST_LOG` and defaults to `spsc_ring=debug`.
/// Call this once at the start of a binary or test. Does nothing if the
/// `tracing` feature is not enabled.
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spsc_ring=debug"));

    // A second call (e.g. from another test) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "tracing"))]
pub const fn init_tracing() {}

#[cfg(feature = "tracing")]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
macro_rules! trace_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! debug_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug_noop as debug;
#[cfg(not(feature = "tracing"))]
pub(crate) use trace_noop as trace;
