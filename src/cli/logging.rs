//! Diagnostic logging on stderr.
//!
//! `RUST_LOG` always wins; otherwise `--debug` selects `debug` and the
//! default is `warn`.  User-facing output does not go through here, see
//! [`crate::cli::output`].

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.  Calling it twice is harmless.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .ok();
}
