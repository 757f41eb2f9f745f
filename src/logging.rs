//! Terminal logging for binaries and tests embedding the engine.
use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "taskview=info";

static INIT: Once = Once::new();

/// Installs a global subscriber honouring `RUST_LOG`. Later calls, and calls
/// after another subscriber was installed, do nothing.
pub fn init() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let result = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init();

        if let Err(err) = result {
            tracing::debug!("subscriber already installed: {err}");
        }
    });
}
