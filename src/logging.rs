//! Subscriber setup for the collector's `tracing` events.
//!
//! The library only emits events; binaries and tests opt in by calling
//! [`init_logging`]. Targets are the module paths, so
//! `RUST_LOG=rcollector::collector=debug` narrows output to collections.

use tracing_subscriber::{EnvFilter, fmt};

/// Installs a compact fmt subscriber filtered by `RUST_LOG`.
///
/// Without `RUST_LOG`, debug builds log at `debug` and release builds at
/// `info`. A second call is a no-op.
pub fn init_logging() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
    #[cfg(debug_assertions)]
    {
      EnvFilter::new("rcollector=debug")
    }
    #[cfg(not(debug_assertions))]
    {
      EnvFilter::new("rcollector=info")
    }
  });

  fmt()
    .with_env_filter(filter)
    .compact()
    .with_writer(std::io::stderr)
    .try_init()
    .ok();
}
