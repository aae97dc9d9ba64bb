//! CLI configuration
//!
//! Terminal preferences live in [`CliConfig`]. The harness configuration is
//! layered: defaults, then the YAML file, then flags and `FLOWPROBE_*`
//! variables ([`harness_config`]).

use flowprobe::{HarnessConfig, HoldMode};
use serde::{Deserialize, Serialize};

use crate::commands::HarnessArgs;
use crate::error::{CliError, CliResult};

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - minimal output
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - maximum output
    Debug,
}

impl Verbosity {
    /// Verbosity from `-q` and the `-v` count
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug)
    }

    /// Default log filter when `RUST_LOG` is unset
    #[must_use]
    pub const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn,flowprobe=info",
            Self::Verbose => "info,flowprobe=debug",
            Self::Debug => "debug,flowprobe=trace",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

/// Terminal preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// JSON log lines instead of human-readable ones
    pub log_json: bool,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Set JSON logging
    #[must_use]
    pub const fn with_log_json(mut self, log_json: bool) -> Self {
        self.log_json = log_json;
        self
    }
}

/// Build the harness configuration from the optional file plus overrides,
/// then validate it.
pub fn harness_config(args: &HarnessArgs) -> CliResult<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path).map_err(|e| {
            CliError::config(format!("cannot load {}: {e}", path.display()))
        })?,
        None => HarnessConfig::default(),
    };

    if let Some(url) = &args.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(ms) = args.timeout_ms {
        config = config.with_default_timeout_ms(ms);
    }
    if let Some(ms) = args.poll_ms {
        config = config.with_poll_interval_ms(ms);
    }
    if let Some(ms) = args.dialog_timeout_ms {
        config = config.with_dialog_timeout_ms(ms);
    }
    if let Some(hold) = args.hold {
        config = config.with_hold(hold);
    }
    if let Some(dir) = &args.output {
        config = config.with_output_dir(dir.clone());
    }
    if args.fail_fast {
        config = config.with_fail_fast(true);
    }

    if args.headed {
        config.browser.headless = false;
    }
    if args.no_sandbox {
        config.browser.sandbox = false;
    }
    if let Some(path) = &args.chromium_path {
        config.browser.chromium_path = Some(path.clone());
    }

    if let Some(email) = &args.email {
        config.credentials.email.clone_from(email);
    }
    if let Some(password) = &args.password {
        config.credentials.password.clone_from(password);
    }
    if let Some(username) = &args.username {
        config.credentials.username = Some(username.clone());
    }

    if config.hold == HoldMode::Indefinite && config.browser.headless {
        tracing::warn!("indefinite hold with a headless browser; nothing to inspect");
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
            assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(false, 5), Verbosity::Debug);
        }

        #[test]
        fn test_is_quiet() {
            assert!(Verbosity::Quiet.is_quiet());
            assert!(!Verbosity::Normal.is_quiet());
        }

        #[test]
        fn test_log_filter_widens_with_verbosity() {
            assert_eq!(Verbosity::Quiet.log_filter(), "error");
            assert!(Verbosity::Debug.log_filter().contains("trace"));
        }
    }

    mod color_choice_tests {
        use super::*;

        #[test]
        fn test_default_color() {
            assert_eq!(ColorChoice::default(), ColorChoice::Auto);
        }

        #[test]
        fn test_should_color_fixed() {
            assert!(ColorChoice::Always.should_color());
            assert!(!ColorChoice::Never.should_color());
        }
    }

    mod harness_config_tests {
        use super::*;
        use std::fs;

        #[test]
        fn test_defaults_without_file() {
            let config = harness_config(&HarnessArgs::default()).unwrap();
            assert_eq!(config, HarnessConfig::default());
        }

        #[test]
        fn test_flags_override_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("flowprobe.yaml");
            fs::write(
                &path,
                "base_url: http://staging.test\ndefault_timeout_ms: 9000\ncredentials:\n  email: file@coll.test\n",
            )
            .unwrap();

            let args = HarnessArgs {
                config: Some(path),
                timeout_ms: Some(4000),
                username: Some("abc123".into()),
                headed: true,
                ..HarnessArgs::default()
            };
            let config = harness_config(&args).unwrap();
            assert_eq!(config.base_url, "http://staging.test");
            assert_eq!(config.default_timeout_ms, 4000);
            assert_eq!(config.credentials.email, "file@coll.test");
            assert_eq!(config.credentials.username.as_deref(), Some("abc123"));
            assert!(!config.browser.headless);
        }

        #[test]
        fn test_invalid_override_rejected() {
            let args = HarnessArgs {
                base_url: Some("ftp://nope".into()),
                ..HarnessArgs::default()
            };
            assert!(harness_config(&args).is_err());
        }

        #[test]
        fn test_missing_file_is_config_error() {
            let args = HarnessArgs {
                config: Some("/definitely/not/here.yaml".into()),
                ..HarnessArgs::default()
            };
            let err = harness_config(&args).unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
        }
    }
}
