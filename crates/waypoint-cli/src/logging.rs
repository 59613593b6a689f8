//! Log subscriber setup.
//!
//! Library code logs through `tracing`; the binary installs one subscriber
//! writing to stderr so stdout stays clean for reports. `RUST_LOG` wins over
//! the verbosity flags.

use crate::config::{CliConfig, Verbosity};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter from `RUST_LOG`, else from verbosity
#[must_use]
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()))
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(config: &CliConfig) {
    let filter = env_filter(config.verbosity);
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.log_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(config.color.should_color())
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}
