//! Gramc - grammar compiler driver.
//!
//! Reads JSON grammar descriptions, builds a [`gram_ir::Grammar`] and
//! lowers it with the binary backend from `gram_cfg`.

pub mod args;
pub mod commands;
mod error;
pub mod load;

pub use error::DriverError;
pub use load::{load_grammar, LoadError};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=gram_cfg=debug` or
/// `RUST_LOG=gram_lower=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
