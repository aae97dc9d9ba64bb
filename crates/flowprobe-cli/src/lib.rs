//! Flowprobe CLI Library
//!
//! Command-line front end for the Flowprobe flow harness: argument parsing,
//! layered configuration, log setup, and result reporting.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
mod runner;

pub use commands::{
    parse_hold, Cli, ColorArg, Commands, ConfigArgs, FlowName, FormatArg, HarnessArgs, RunArgs,
};
pub use config::{harness_config, CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{flow_line, results_json, OutputFormat, ProgressReporter};
pub use runner::{build_flows, execute};
