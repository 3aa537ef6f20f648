//! Installs a debug-level `tracing` subscriber at process startup when the
//! `setup_tracing` feature is enabled, gated by the `DEBUG_IRTREE` environment variable.

#![cfg(feature = "setup_tracing")]

use ctor::ctor;
use tracing::Level;

#[ctor]
fn set_debug_level() {
    // If DEBUG_IRTREE is not set or set to a falsy value, logging stays disabled.
    if std::env::var("DEBUG_IRTREE").map_or(true, |v| v == "0" || v == "false" || v.is_empty()) {
        // Disable logging
    } else {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }
}
