//! Tracing setup for the `inbound` binary.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Overrides the configured level, e.g. `INBOUND_LOG=inbound_pipeline=debug`.
pub(crate) const LOG_ENV: &str = "INBOUND_LOG";

static INIT: Once = Once::new();

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine readable.
pub(crate) fn init(level: &str, json: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
        let registry = tracing_subscriber::registry().with(filter);
        if json {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            registry
                .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
                .init();
        }
    });
}
