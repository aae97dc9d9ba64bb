//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use flowprobe::HoldMode;
use std::path::PathBuf;

/// Flowprobe: browser-driven end-to-end checks for signup, login and profile flows
#[derive(Parser, Debug)]
#[command(name = "flowprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "FLOWPROBE_LOG_JSON")]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run flows against the application
    Run(RunArgs),

    /// Show the effective configuration as YAML
    Config(ConfigArgs),
}

/// Flows selectable on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowName {
    /// Register a fresh account
    Signup,
    /// Sign in with the configured credentials
    Login,
    /// Open the configured user's profile
    Profile,
    /// Signup, then login, then profile
    All,
}

/// Options shared by `run` and `config`
#[derive(Args, Debug, Default, Clone)]
pub struct HarnessArgs {
    /// YAML configuration file
    #[arg(short, long, env = "FLOWPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Application base URL
    #[arg(long, env = "FLOWPROBE_BASE_URL")]
    pub base_url: Option<String>,

    /// Default wait budget in milliseconds
    #[arg(long, env = "FLOWPROBE_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Poll interval in milliseconds
    #[arg(long, env = "FLOWPROBE_POLL_MS")]
    pub poll_ms: Option<u64>,

    /// Bound for expected dialogs in milliseconds
    #[arg(long, env = "FLOWPROBE_DIALOG_TIMEOUT_MS")]
    pub dialog_timeout_ms: Option<u64>,

    /// Keep the browser open after a failure: off, <secs> or forever
    #[arg(long, env = "FLOWPROBE_HOLD", value_parser = parse_hold)]
    pub hold: Option<HoldMode>,

    /// Show the browser window
    #[arg(long, env = "FLOWPROBE_HEADED")]
    pub headed: bool,

    /// Chromium executable
    #[arg(long, env = "FLOWPROBE_CHROMIUM")]
    pub chromium_path: Option<PathBuf>,

    /// Disable the Chromium sandbox (containers)
    #[arg(long, env = "FLOWPROBE_NO_SANDBOX")]
    pub no_sandbox: bool,

    /// Login email
    #[arg(long, env = "FLOWPROBE_EMAIL")]
    pub email: Option<String>,

    /// Login password
    #[arg(long, env = "FLOWPROBE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Username whose profile the profile flow opens
    #[arg(long, env = "FLOWPROBE_USERNAME")]
    pub username: Option<String>,

    /// Directory for failure dumps
    #[arg(short, long, env = "FLOWPROBE_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Stop after the first failing flow
    #[arg(long, env = "FLOWPROBE_FAIL_FAST")]
    pub fail_fast: bool,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Flows to run, in order
    #[arg(value_enum, default_value = "all")]
    pub flows: Vec<FlowName>,

    /// Seed for generated signup data
    #[arg(long, env = "FLOWPROBE_SEED")]
    pub seed: Option<u64>,

    /// Result output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: FormatArg,

    #[command(flatten)]
    pub harness: HarnessArgs,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub harness: HarnessArgs,
}

/// Result output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON document with every flow result
    Json,
}

/// Color choice argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Parse `off`, `forever`/`indefinite`, or a number of seconds (`90`, `90s`).
pub fn parse_hold(raw: &str) -> Result<HoldMode, String> {
    let value = raw.trim().to_ascii_lowercase();
    match value.as_str() {
        "off" | "none" | "0" => Ok(HoldMode::Off),
        "forever" | "indefinite" => Ok(HoldMode::Indefinite),
        other => other
            .trim_end_matches('s')
            .parse::<u64>()
            .map(|secs| HoldMode::Bounded { secs })
            .map_err(|_| format!("expected off, forever or a number of seconds, got `{raw}`")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_run_defaults_to_all() {
            let cli = Cli::parse_from(["flowprobe", "run"]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.flows, vec![FlowName::All]);
                assert_eq!(args.format, FormatArg::Text);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_run_with_flows_and_options() {
            let cli = Cli::parse_from([
                "flowprobe",
                "run",
                "login",
                "profile",
                "--base-url",
                "http://app.test:8080",
                "--timeout-ms",
                "500",
                "--hold",
                "90",
                "--username",
                "abc123",
                "--fail-fast",
            ]);
            if let Commands::Run(args) = cli.command {
                assert_eq!(args.flows, vec![FlowName::Login, FlowName::Profile]);
                assert_eq!(args.harness.base_url.as_deref(), Some("http://app.test:8080"));
                assert_eq!(args.harness.timeout_ms, Some(500));
                assert_eq!(args.harness.hold, Some(HoldMode::Bounded { secs: 90 }));
                assert_eq!(args.harness.username.as_deref(), Some("abc123"));
                assert!(args.harness.fail_fast);
            } else {
                panic!("expected Run command");
            }
        }

        #[test]
        fn test_parse_verbosity_and_color() {
            let cli = Cli::parse_from(["flowprobe", "-vv", "--color", "never", "config"]);
            assert_eq!(cli.verbose, 2);
            assert!(matches!(cli.color, ColorArg::Never));
            assert!(matches!(cli.command, Commands::Config(_)));
        }

        #[test]
        fn test_unknown_flow_rejected() {
            let result = Cli::try_parse_from(["flowprobe", "run", "checkout"]);
            assert!(result.is_err());
        }
    }

    mod hold_tests {
        use super::*;

        #[test]
        fn test_parse_hold_values() {
            assert_eq!(parse_hold("off").unwrap(), HoldMode::Off);
            assert_eq!(parse_hold("Forever").unwrap(), HoldMode::Indefinite);
            assert_eq!(parse_hold("30").unwrap(), HoldMode::Bounded { secs: 30 });
            assert_eq!(parse_hold("45s").unwrap(), HoldMode::Bounded { secs: 45 });
        }

        #[test]
        fn test_parse_hold_rejects_garbage() {
            assert!(parse_hold("soon").is_err());
        }
    }
}
