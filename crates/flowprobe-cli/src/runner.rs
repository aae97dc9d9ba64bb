//! Flow selection and execution

use flowprobe::{
    Flow, FixtureGenerator, HarnessConfig, LoginFlow, ProfileFlow, SignupFlow, SuiteResults,
};

use crate::commands::FlowName;
use crate::error::{CliError, CliResult};

/// Expand the requested names into runnable flows, in order.
///
/// `all` expands to signup, login, profile. Duplicates are kept; running a
/// flow twice is a valid request.
pub fn build_flows(
    names: &[FlowName],
    config: &HarnessConfig,
    seed: Option<u64>,
) -> CliResult<Vec<Box<dyn Flow>>> {
    let mut fixtures = seed.map_or_else(FixtureGenerator::new, FixtureGenerator::seeded);
    let mut flows: Vec<Box<dyn Flow>> = Vec::new();

    for name in names {
        match name {
            FlowName::Signup => flows.push(Box::new(SignupFlow::from_config(config, &mut fixtures))),
            FlowName::Login => flows.push(Box::new(LoginFlow::from_config(config))),
            FlowName::Profile => flows.push(Box::new(ProfileFlow::from_config(config)?)),
            FlowName::All => {
                flows.push(Box::new(SignupFlow::from_config(config, &mut fixtures)));
                flows.push(Box::new(LoginFlow::from_config(config)));
                flows.push(Box::new(ProfileFlow::from_config(config)?));
            }
        }
    }

    if flows.is_empty() {
        return Err(CliError::invalid_argument("no flows selected"));
    }
    Ok(flows)
}

/// Launch Chromium and run `flows` against the configured application.
#[cfg(feature = "browser")]
pub async fn execute(config: &HarnessConfig, flows: &[Box<dyn Flow>]) -> CliResult<SuiteResults> {
    use flowprobe::{ChromiumDriver, FlowRunner, Session};

    tracing::info!(
        base_url = %config.base_url,
        headless = config.browser.headless,
        flows = flows.len(),
        "launching browser"
    );
    let driver = ChromiumDriver::launch(&config.browser).await?;
    let session = Session::from_config(driver, config)?;
    if config.browser.maximize {
        session.maximize_window().await?;
    }
    Ok(FlowRunner::from_config(config).run(session, flows).await?)
}

/// Without the `browser` feature there is nothing to drive.
#[cfg(not(feature = "browser"))]
#[allow(clippy::unused_async)]
pub async fn execute(_config: &HarnessConfig, _flows: &[Box<dyn Flow>]) -> CliResult<SuiteResults> {
    Err(CliError::config(
        "browser support not enabled. Rebuild with --features browser",
    ))
}
