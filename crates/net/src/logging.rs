//! Tracing setup for scripts
//!
//! Library code only emits `tracing` events; scripts that want to see them
//! call [`init`] once. The filter is read from `RUST_LOG`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install a fmt subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .is_ok()
}
