//! Log subscriber setup
//!
//! Logs go to stderr so `--format json` output on stdout stays parseable.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::CliConfig;

/// Filter from `RUST_LOG`, else from the verbosity level
#[must_use]
pub fn env_filter(config: &CliConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_filter()))
}

/// Install the global subscriber. Safe to call twice; the second call is a no-op.
pub fn init(config: &CliConfig) {
    let filter = env_filter(config);
    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.color.should_color())
                    .with_target(false),
            )
            .try_init()
    };
    if let Err(e) = result {
        tracing::debug!("log subscriber already set: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Verbosity;

    #[test]
    fn test_init_twice_is_harmless() {
        let config = CliConfig::new().with_verbosity(Verbosity::Quiet);
        init(&config);
        init(&config.with_log_json(true));
    }
}
