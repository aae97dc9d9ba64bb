//! Flowprobe CLI: run end-to-end flows against a live application
//!
//! ## Usage
//!
//! ```bash
//! flowprobe run                              # signup, login, profile
//! flowprobe run login --headed --hold 60     # keep the window after a failure
//! flowprobe run --format json > results.json
//! flowprobe config -c flowprobe.yaml         # show the effective config
//! ```

use clap::Parser;
use flowprobe_cli::{
    build_flows, execute, harness_config, logging, results_json, Cli, CliConfig, CliError,
    CliResult, ColorChoice, Commands, ConfigArgs, OutputFormat, ProgressReporter, RunArgs,
    Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli);
    logging::init(&config);

    match cli.command {
        Commands::Run(args) => run_flows(&config, args),
        Commands::Config(args) => run_config(&args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_log_json(cli.log_json)
}

fn run_flows(config: &CliConfig, args: RunArgs) -> CliResult<()> {
    let harness = harness_config(&args.harness)?;
    let flows = build_flows(&args.flows, &harness, args.seed)?;
    let format = OutputFormat::from(args.format);

    let mut reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    if format == OutputFormat::Text {
        reporter.info(&format!("{} flow(s) against {}", flows.len(), harness.base_url));
        reporter.start_spinner("running flows");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(execute(&harness, &flows));
    reporter.finish();
    let suite = outcome?;

    match format {
        OutputFormat::Text => reporter.report(&suite),
        OutputFormat::Json => {
            let json = results_json(&suite).map_err(|e| CliError::invalid_argument(e.to_string()))?;
            println!("{json}");
        }
    }

    if suite.all_passed() {
        Ok(())
    } else {
        Err(CliError::flows_failed(format!(
            "{} of {} flow(s) failed; dumps in {}",
            suite.failed_count(),
            suite.total(),
            harness.output_dir.display()
        )))
    }
}

fn run_config(args: &ConfigArgs) -> CliResult<()> {
    let harness = harness_config(&args.harness)?;
    print!("{}", harness.to_yaml()?);
    Ok(())
}
